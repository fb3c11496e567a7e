//! ACO-TSP Solver Library
//!
//! A metaheuristic solver for the symmetric Traveling Salesman Problem
//! implementing the ant colony optimization family of algorithms.
//!
//! # Features
//!
//! - Six ACO variants: Ant System, Elitist AS, Rank-based AS, MAX-MIN AS,
//!   Best-Worst AS and Ant Colony System
//! - Candidate-list tour construction with pseudorandom-proportional choice
//! - 2-opt, 2.5-opt and 3-opt local search with don't-look bits
//! - TSPLIB instance loading (EUC_2D, CEIL_2D, GEO, ATT, TOROID)
//! - Multi-trial driver with CSV/JSON reporting
//!
//! # Example
//!
//! ```no_run
//! use aco_tsp_solver::colony::{AcoConfig, Variant};
//! use aco_tsp_solver::instance::TspInstance;
//! use aco_tsp_solver::trial::TrialRunner;
//!
//! // Load instance
//! let instance = TspInstance::from_file("instance.tsp").unwrap();
//!
//! // Configure the colony
//! let config = AcoConfig {
//!     variant: Variant::MaxMinAntSystem,
//!     ..Default::default()
//! };
//!
//! // Run all trials
//! let mut runner = TrialRunner::new(instance, config).unwrap();
//! runner.run_all();
//!
//! let best = runner.best_solution().unwrap();
//! println!("Best tour length: {}", best.length);
//! ```

pub mod colony;
pub mod instance;
pub mod local_search;
pub mod matrix;
pub mod pheromone;
pub mod tour;
pub mod trial;
pub mod update;

pub use colony::{AcoConfig, Colony, Variant};
pub use instance::TspInstance;
pub use local_search::LocalSearchKind;
pub use tour::{Ant, Tour};
pub use trial::TrialRunner;
