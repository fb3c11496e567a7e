//! Trial controller and result reporting.
//!
//! Runs the iterate-until-termination loop for a configured number of
//! independent trials, collects per-trial reports and exports them as CSV
//! (per-trial rows plus an aggregate summary) and JSON (best tour found).

use std::fs::File;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::colony::{AcoConfig, Colony, Variant};
use crate::instance::TspInstance;
use crate::update::{pheromone_update, search_control};

/// Result of one trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialReport {
    /// Trial index (0-based)
    pub trial: usize,
    /// Instance name
    pub instance: String,
    /// ACO variant used
    pub variant: String,
    /// Best tour length found
    pub best_length: i64,
    /// Iteration at which the best tour was found
    pub found_at_iteration: usize,
    /// Elapsed seconds when the best tour was found
    pub found_at_seconds: f64,
    /// Iterations executed
    pub iterations: usize,
    /// Tour constructions executed
    pub constructions: usize,
    /// Total trial time in seconds
    pub time: f64,
    /// Branching factor at trial end
    pub branching: f64,
}

/// Aggregate over all trials of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialSummary {
    pub instance: String,
    pub variant: String,
    pub trials: usize,
    pub best_length: i64,
    pub worst_length: i64,
    pub avg_length: f64,
    pub std_length: f64,
    pub avg_time: f64,
}

/// The best tour across all trials, for JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestSolution {
    pub instance: String,
    pub variant: String,
    pub trial: usize,
    pub length: i64,
    pub tour: Vec<usize>,
}

/// Multi-trial driver owning the colony.
pub struct TrialRunner {
    colony: Colony,
    reports: Vec<TrialReport>,
    best_solution: Option<BestSolution>,
}

impl TrialRunner {
    /// Validate the configuration and set up the colony.
    pub fn new(instance: TspInstance, config: AcoConfig) -> Result<Self, String> {
        config.validate()?;
        Ok(TrialRunner {
            colony: Colony::new(instance, config),
            reports: Vec::new(),
            best_solution: None,
        })
    }

    /// The termination oracle, evaluated once per iteration boundary.
    fn terminated(&self, elapsed: f64) -> bool {
        let config = &self.colony.config;
        (self.colony.constructions >= config.max_tours && elapsed >= config.max_time)
            || self.colony.best_so_far.tour_length <= config.optimal
    }

    /// Run all configured trials.
    pub fn run_all(&mut self) -> &[TrialReport] {
        for trial in 0..self.colony.config.max_trials {
            let report = self.run_trial(trial);
            log::info!(
                "trial {} done: best {} after {} iterations ({:.2}s)",
                trial,
                report.best_length,
                report.iterations,
                report.time
            );
            self.reports.push(report);
        }
        &self.reports
    }

    /// Run one trial; the per-trial seed derives from the base seed.
    pub fn run_trial(&mut self, trial: usize) -> TrialReport {
        let start = Instant::now();
        let seed = self.colony.config.seed + trial as u64;
        self.colony.reset_trial(seed);

        let mut found_at_seconds = 0.0;

        loop {
            let elapsed = start.elapsed().as_secs_f64();

            self.colony.construct_solutions();
            self.colony.apply_local_search();

            let (_, improved) = self.colony.update_statistics();
            if improved {
                found_at_seconds = start.elapsed().as_secs_f64();
                let branching = self.colony.compute_branching();
                log::info!(
                    "new best {} at iteration {} ({:.2}s, branching {:.5})",
                    self.colony.best_so_far.tour_length,
                    self.colony.iteration,
                    found_at_seconds,
                    branching
                );
            }

            pheromone_update(&mut self.colony, elapsed);

            if self.colony.iteration % 100 == 0 {
                search_control(&mut self.colony, elapsed);
            }

            self.colony.iteration += 1;

            if self.terminated(start.elapsed().as_secs_f64()) {
                break;
            }
        }

        let colony = &mut self.colony;
        let branching = colony.compute_branching();
        let report = TrialReport {
            trial,
            instance: colony.instance.name.clone(),
            variant: format!("{:?}", colony.config.variant),
            best_length: colony.best_so_far.tour_length,
            found_at_iteration: colony.found_best,
            found_at_seconds,
            iterations: colony.iteration,
            constructions: colony.constructions,
            time: start.elapsed().as_secs_f64(),
            branching,
        };

        let is_new_best = self
            .best_solution
            .as_ref()
            .map(|b| report.best_length < b.length)
            .unwrap_or(true);
        if is_new_best {
            self.best_solution = Some(BestSolution {
                instance: report.instance.clone(),
                variant: report.variant.clone(),
                trial,
                length: report.best_length,
                tour: colony.best_so_far.tour.lap().to_vec(),
            });
        }

        report
    }

    /// Reports collected so far.
    pub fn reports(&self) -> &[TrialReport] {
        &self.reports
    }

    /// Best tour found across all trials run so far.
    pub fn best_solution(&self) -> Option<&BestSolution> {
        self.best_solution.as_ref()
    }

    /// Aggregate statistics over the collected reports.
    pub fn summary(&self) -> Option<TrialSummary> {
        if self.reports.is_empty() {
            return None;
        }

        let k = self.reports.len() as f64;
        let lengths: Vec<f64> = self.reports.iter().map(|r| r.best_length as f64).collect();
        let avg = lengths.iter().sum::<f64>() / k;
        let var = lengths.iter().map(|l| (l - avg) * (l - avg)).sum::<f64>() / k;

        Some(TrialSummary {
            instance: self.reports[0].instance.clone(),
            variant: self.reports[0].variant.clone(),
            trials: self.reports.len(),
            best_length: self.reports.iter().map(|r| r.best_length).min().unwrap(),
            worst_length: self.reports.iter().map(|r| r.best_length).max().unwrap(),
            avg_length: avg,
            std_length: var.sqrt(),
            avg_time: self.reports.iter().map(|r| r.time).sum::<f64>() / k,
        })
    }

    /// Export per-trial reports as CSV.
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);
        for report in &self.reports {
            writer.serialize(report)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Export the aggregate summary as CSV.
    pub fn export_summary_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);
        if let Some(summary) = self.summary() {
            writer.serialize(summary)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Export the best tour found as JSON.
    pub fn export_best_json<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        match self.best_solution() {
            Some(best) => serde_json::to_writer_pretty(file, best).map_err(std::io::Error::from),
            None => Ok(()),
        }
    }

    /// Borrow the underlying colony (diagnostics, tests).
    pub fn colony(&self) -> &Colony {
        &self.colony
    }
}

/// Convenience entry point: run every configured trial and return the
/// reports together with the best solution found.
pub fn solve(
    instance: TspInstance,
    config: AcoConfig,
) -> Result<(Vec<TrialReport>, Option<BestSolution>), String> {
    let mut runner = TrialRunner::new(instance, config)?;
    runner.run_all();
    let best = runner.best_solution().cloned();
    Ok((runner.reports, best))
}

/// Variant listing used by reporting call sites.
pub const ALL_VARIANTS: [Variant; 6] = [
    Variant::AntSystem,
    Variant::ElitistAntSystem,
    Variant::RankBasedAntSystem,
    Variant::MaxMinAntSystem,
    Variant::BestWorstAntSystem,
    Variant::AntColonySystem,
];
