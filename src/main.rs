//! ACO-TSP Solver - Command Line Interface
//!
//! An ant colony optimization solver for the symmetric TSP.

use clap::{Parser, Subcommand, ValueEnum};

use aco_tsp_solver::colony::AcoConfig;
use aco_tsp_solver::instance::TspInstance;
use aco_tsp_solver::trial::TrialRunner;

use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "aco-tsp-solver")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "An ant colony optimization solver for the symmetric TSP")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a TSPLIB instance
    Solve {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,

        /// ACO variant to run
        #[arg(short, long, value_enum, default_value = "mmas")]
        variant: Variant,

        /// Local search applied to constructed tours
        #[arg(short, long, value_enum, default_value = "three-opt")]
        local_search: LocalSearch,

        /// Number of independent trials
        #[arg(long, default_value = "10")]
        trials: usize,

        /// Maximum tour constructions per trial
        #[arg(long, default_value = "100")]
        tours: usize,

        /// Maximum wall time per trial in seconds
        #[arg(short, long, default_value = "10")]
        time_limit: f64,

        /// Target tour length; reaching it stops the trial
        #[arg(long, default_value = "1")]
        optimal: i64,

        /// Number of ants
        #[arg(short, long, default_value = "25")]
        ants: usize,

        /// Pheromone importance
        #[arg(long, default_value = "1.0")]
        alpha: f64,

        /// Heuristic importance
        #[arg(long, default_value = "2.0")]
        beta: f64,

        /// Evaporation rate
        #[arg(long, default_value = "0.5")]
        rho: f64,

        /// Exploitation probability
        #[arg(long, default_value = "0.0")]
        q0: f64,

        /// Candidate-list depth for construction
        #[arg(long, default_value = "20")]
        nn_ants: usize,

        /// Candidate-list depth for local search
        #[arg(long, default_value = "20")]
        nn_ls: usize,

        /// Disable don't-look bits
        #[arg(long)]
        no_dlb: bool,

        /// Elitist weight (0 defaults to the instance size)
        #[arg(long, default_value = "0")]
        elitist_weight: usize,

        /// Number of ranks for the rank-based update
        #[arg(long, default_value = "6")]
        ranks: usize,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Write per-trial results to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the best tour to this JSON file
        #[arg(long)]
        best_out: Option<PathBuf>,

        /// Verbose output
        #[arg(long)]
        verbose: bool,
    },

    /// Analyze an instance
    Analyze {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Variant {
    /// Ant System
    As,
    /// Elitist Ant System
    Eas,
    /// Rank-based Ant System
    Ras,
    /// MAX-MIN Ant System
    Mmas,
    /// Best-Worst Ant System
    Bwas,
    /// Ant Colony System
    Acs,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum LocalSearch {
    /// No local search
    None,
    /// 2-opt
    TwoOpt,
    /// 2.5-opt
    TwoHalfOpt,
    /// 3-opt
    ThreeOpt,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            instance,
            variant,
            local_search,
            trials,
            tours,
            time_limit,
            optimal,
            ants,
            alpha,
            beta,
            rho,
            q0,
            nn_ants,
            nn_ls,
            no_dlb,
            elitist_weight,
            ranks,
            seed,
            output,
            best_out,
            verbose,
        } => {
            let config = AcoConfig {
                variant: match variant {
                    Variant::As => aco_tsp_solver::Variant::AntSystem,
                    Variant::Eas => aco_tsp_solver::Variant::ElitistAntSystem,
                    Variant::Ras => aco_tsp_solver::Variant::RankBasedAntSystem,
                    Variant::Mmas => aco_tsp_solver::Variant::MaxMinAntSystem,
                    Variant::Bwas => aco_tsp_solver::Variant::BestWorstAntSystem,
                    Variant::Acs => aco_tsp_solver::Variant::AntColonySystem,
                },
                local_search: match local_search {
                    LocalSearch::None => aco_tsp_solver::LocalSearchKind::None,
                    LocalSearch::TwoOpt => aco_tsp_solver::LocalSearchKind::TwoOpt,
                    LocalSearch::TwoHalfOpt => aco_tsp_solver::LocalSearchKind::TwoHalfOpt,
                    LocalSearch::ThreeOpt => aco_tsp_solver::LocalSearchKind::ThreeOpt,
                },
                max_trials: trials,
                max_tours: tours,
                max_time: time_limit,
                optimal,
                n_ants: ants,
                alpha,
                beta,
                rho,
                q_0: q0,
                nn_ants,
                nn_ls,
                dlb: !no_dlb,
                elitist_weight,
                ras_ranks: ranks,
                seed,
                ..Default::default()
            };

            solve_instance(&instance, config, output, best_out, verbose);
        }

        Commands::Analyze { instance } => {
            analyze_instance(&instance);
        }
    }
}

fn solve_instance(
    path: &PathBuf,
    config: AcoConfig,
    output: Option<PathBuf>,
    best_out: Option<PathBuf>,
    verbose: bool,
) {
    println!("Loading instance from {:?}...", path);

    let instance = match TspInstance::from_file(path) {
        Ok(inst) => inst,
        Err(e) => {
            eprintln!("Error loading instance: {}", e);
            std::process::exit(1);
        }
    };

    if verbose {
        println!("{}", instance.statistics());
    }

    let mut runner = match TrialRunner::new(instance, config) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    runner.run_all();

    for report in runner.reports() {
        println!(
            "Trial {}: best {} (iteration {}, {:.2}s of {:.2}s)",
            report.trial,
            report.best_length,
            report.found_at_iteration,
            report.found_at_seconds,
            report.time
        );
    }

    if let Some(summary) = runner.summary() {
        println!(
            "{} trials: best {}, worst {}, avg {:.2} +- {:.2}, avg time {:.2}s",
            summary.trials,
            summary.best_length,
            summary.worst_length,
            summary.avg_length,
            summary.std_length,
            summary.avg_time
        );
    }

    if let Some(best) = runner.best_solution() {
        println!("Best tour ({}): {:?}", best.length, best.tour);
    }

    if let Some(path) = output {
        runner.export_csv(&path).expect("Failed to export results");
        let summary_path = path.with_extension("summary.csv");
        runner
            .export_summary_csv(&summary_path)
            .expect("Failed to export summary");
        println!("Results written to {:?}", path);
    }

    if let Some(path) = best_out {
        runner
            .export_best_json(&path)
            .expect("Failed to export best tour");
        println!("Best tour written to {:?}", path);
    }
}

fn analyze_instance(path: &PathBuf) {
    match TspInstance::from_file(path) {
        Ok(instance) => {
            println!("{}", instance.statistics());
        }
        Err(e) => {
            eprintln!("Error loading instance: {}", e);
            std::process::exit(1);
        }
    }
}
