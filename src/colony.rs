//! Ant colony simulation context and tour construction.
//!
//! The [`Colony`] bundles every piece of mutable simulation state (pheromone
//! model, ant pool, best-so-far and restart-best snapshots, counters and
//! trail levels) into one struct passed by reference between components; no
//! globals. Construction implements the candidate-restricted probabilistic
//! choice with `q_0` exploitation and the greedy fallback chain.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::instance::TspInstance;
use crate::local_search::LocalSearchKind;
use crate::pheromone::PheromoneModel;
use crate::tour::Ant;

/// The six ACO variants.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Variant {
    /// Ant System: every ant deposits
    AntSystem,
    /// Elitist Ant System: extra weight on the best-so-far tour
    ElitistAntSystem,
    /// Rank-based Ant System: only the best ranks deposit
    RankBasedAntSystem,
    /// MAX-MIN Ant System: bounded trails and restarts
    MaxMinAntSystem,
    /// Best-Worst Ant System: worst-ant penalty and trail mutation
    BestWorstAntSystem,
    /// Ant Colony System: pseudorandom-proportional rule and local updates
    AntColonySystem,
}

/// ACO configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcoConfig {
    /// Which update policy drives the colony
    pub variant: Variant,
    /// Number of ants
    pub n_ants: usize,
    /// Number of independent trials
    pub max_trials: usize,
    /// Maximum tour constructions per trial
    pub max_tours: usize,
    /// Maximum wall time per trial in seconds
    pub max_time: f64,
    /// Target tour length; reaching it stops the trial
    pub optimal: i64,
    /// Pheromone importance (alpha)
    pub alpha: f64,
    /// Heuristic importance (beta)
    pub beta: f64,
    /// Evaporation rate (rho)
    pub rho: f64,
    /// Exploitation probability (q0, ACS-style)
    pub q_0: f64,
    /// Local pheromone decay (xi, ACS)
    pub xi: f64,
    /// Candidate-list depth during construction
    pub nn_ants: usize,
    /// Local search variant applied to constructed tours
    pub local_search: LocalSearchKind,
    /// Candidate-list depth during local search
    pub nn_ls: usize,
    /// Use don't-look bits in local search
    pub dlb: bool,
    /// Elitist weight for EAS; 0 defaults to the instance dimension
    pub elitist_weight: usize,
    /// Number of ranks for the rank-based update
    pub ras_ranks: usize,
    /// Branching-factor threshold triggering an MMAS restart
    pub branch_fac: f64,
    /// Lambda for the branching-factor cutoff
    pub lambda: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for AcoConfig {
    fn default() -> Self {
        AcoConfig {
            variant: Variant::MaxMinAntSystem,
            n_ants: 25,
            max_trials: 10,
            max_tours: 100,
            max_time: 10.0,
            optimal: 1,
            alpha: 1.0,
            beta: 2.0,
            rho: 0.5,
            q_0: 0.0,
            xi: 0.1,
            nn_ants: 20,
            local_search: LocalSearchKind::ThreeOpt,
            nn_ls: 20,
            dlb: true,
            elitist_weight: 0,
            ras_ranks: 6,
            branch_fac: 1.00001,
            lambda: 0.05,
            seed: 42,
        }
    }
}

impl AcoConfig {
    /// Validate parameter ranges; the only place user input is checked.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_trials < 1 || self.max_trials > 100 {
            return Err(format!("max_trials {} outside [1, 100]", self.max_trials));
        }
        if self.max_time < 0.0 || self.max_time > 86_400.0 {
            return Err(format!("max_time {} outside [0, 86400]", self.max_time));
        }
        if self.n_ants == 0 || self.n_ants >= 1024 {
            return Err(format!("n_ants {} outside [1, 1023]", self.n_ants));
        }
        if self.nn_ants == 0 || self.nn_ls == 0 {
            return Err("candidate-list depths must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.rho) {
            return Err(format!("rho {} outside [0, 1]", self.rho));
        }
        if !(0.0..1.0).contains(&self.q_0) {
            return Err(format!("q_0 {} outside [0, 1)", self.q_0));
        }
        if self.xi <= 0.0 || self.xi >= 1.0 {
            return Err(format!("xi {} outside (0, 1)", self.xi));
        }
        if self.alpha < 0.0 || self.beta < 0.0 {
            return Err("alpha and beta must be non-negative".to_string());
        }
        if self.ras_ranks == 0 || self.ras_ranks > self.n_ants {
            return Err(format!(
                "ras_ranks {} outside [1, n_ants={}]",
                self.ras_ranks, self.n_ants
            ));
        }
        if self.branch_fac <= 1.0 {
            return Err(format!("branch_fac {} must exceed 1", self.branch_fac));
        }
        Ok(())
    }
}

/// The full simulation state of one colony on one instance.
pub struct Colony {
    pub config: AcoConfig,
    pub instance: TspInstance,
    pub pheromone: PheromoneModel,
    pub ants: Vec<Ant>,
    pub best_so_far: Ant,
    pub restart_best: Ant,
    pub rng: ChaCha8Rng,

    /// Iterations completed in the current trial
    pub iteration: usize,
    /// Tour constructions performed in the current trial
    pub constructions: usize,
    /// Iteration of the last trail reinitialization
    pub restart_iteration: usize,
    /// Iteration at which best-so-far last improved
    pub found_best: usize,
    /// Iteration at which restart-best last improved
    pub restart_found_best: usize,

    /// Trail level used for (re)initialization
    pub trail_0: f64,
    /// MMAS upper trail bound
    pub trail_max: f64,
    /// MMAS lower trail bound
    pub trail_min: f64,
    /// MMAS global-best deposit cadence
    pub u_gb: usize,
    /// Most recently computed branching factor
    pub branching: f64,
    /// Elapsed seconds at the last trail reinitialization
    pub restart_time: f64,

    prob_buf: Vec<f64>,
}

impl Colony {
    /// Create a colony on `instance`; builds the candidate lists at depth
    /// `max(nn_ls, nn_ants)`.
    pub fn new(mut instance: TspInstance, config: AcoConfig) -> Self {
        let n = instance.dimension;
        instance.build_candidate_lists(config.nn_ls.max(config.nn_ants));

        let pheromone = PheromoneModel::new(n, config.alpha, config.beta);
        let ants = (0..config.n_ants).map(|_| Ant::new(n)).collect();
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let nn_ants = config.nn_ants.min(n - 1);

        Colony {
            config,
            instance,
            pheromone,
            ants,
            best_so_far: Ant::new(n),
            restart_best: Ant::new(n),
            rng,
            iteration: 0,
            constructions: 0,
            restart_iteration: 0,
            found_best: 0,
            restart_found_best: 0,
            trail_0: 0.0,
            trail_max: 0.0,
            trail_min: 0.0,
            u_gb: 25,
            branching: 0.0,
            restart_time: 0.0,
            prob_buf: vec![0.0; nn_ants],
        }
    }

    #[inline]
    pub fn n(&self) -> usize {
        self.instance.dimension
    }

    /// Construction candidate depth, capped at n-1.
    #[inline]
    pub fn nn_ants(&self) -> usize {
        self.config.nn_ants.min(self.n() - 1)
    }

    /// Reset all per-trial state and initialize the trails for the variant,
    /// using a nearest-neighbour bootstrap tour to scale the initial level.
    pub fn reset_trial(&mut self, trial_seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(trial_seed);
        self.iteration = 1;
        self.constructions = 0;
        self.restart_iteration = 1;
        self.found_best = 1;
        self.restart_found_best = 1;
        self.u_gb = 25;
        self.restart_time = 0.0;
        self.best_so_far.tour_length = i64::MAX;
        self.restart_best.tour_length = i64::MAX;

        let nn_len = self.nn_tour_length() as f64;
        let n = self.n() as f64;
        let rho = self.config.rho;

        match self.config.variant {
            Variant::AntSystem | Variant::ElitistAntSystem | Variant::RankBasedAntSystem => {
                self.trail_0 = 1.0 / (rho * nn_len);
                self.pheromone.init(self.trail_0);
            }
            Variant::MaxMinAntSystem => {
                self.trail_max = 1.0 / (rho * nn_len);
                self.trail_min = self.trail_max / (2.0 * n);
                self.trail_0 = self.trail_max;
                self.pheromone.init(self.trail_max);
            }
            Variant::BestWorstAntSystem | Variant::AntColonySystem => {
                self.trail_0 = 1.0 / (n * nn_len);
                self.pheromone.init(self.trail_0);
            }
        }

        self.recompute_total();
        log::debug!(
            "trial reset: nn tour {}, initial trail {:.6e}",
            nn_len,
            self.trail_0
        );
    }

    /// Recompute the combined information, candidate-restricted when local
    /// search keeps deposits inside the candidate sets.
    pub fn recompute_total(&mut self) {
        if self.config.local_search != LocalSearchKind::None {
            self.pheromone
                .recompute_total_candidates(&self.instance, self.nn_ants());
        } else {
            self.pheromone.recompute_total_full(&self.instance);
        }
    }

    /// Reinitialize all trails to `level` and reset restart bookkeeping.
    pub fn restart_trails(&mut self, level: f64, elapsed: f64) {
        self.pheromone.init(level);
        self.recompute_total();
        self.restart_best.tour_length = i64::MAX;
        self.restart_iteration = self.iteration;
        self.restart_found_best = self.iteration;
        self.restart_time = elapsed;
        log::info!(
            "trail restart at iteration {} (level {:.6e})",
            self.iteration,
            level
        );
    }

    /// Length of a greedy nearest-neighbour tour from a random start city;
    /// counts as one construction.
    pub fn nn_tour_length(&mut self) -> i64 {
        let n = self.n();
        let ant = &mut self.ants[0];
        ant.reset();

        let start = self.rng.gen_range(0..n);
        ant.tour.place(0, start);
        ant.visited[start] = true;

        for step in 1..n {
            let current = ant.tour.city(step - 1);
            let mut next = usize::MAX;
            let mut best = i64::MAX;
            for c in 0..n {
                if !ant.visited[c] && self.instance.dist(current, c) < best {
                    best = self.instance.dist(current, c);
                    next = c;
                }
            }
            ant.tour.place(step, next);
            ant.visited[next] = true;
        }
        ant.tour.close();
        ant.tour_length = ant.tour.length(&self.instance);
        self.constructions += 1;

        ant.tour_length
    }

    /// Every ant constructs a complete tour; ACS applies its local
    /// pheromone update after each step.
    pub fn construct_solutions(&mut self) {
        let n = self.n();
        let acs = self.config.variant == Variant::AntColonySystem;

        for k in 0..self.ants.len() {
            self.ants[k].reset();
            let start = self.rng.gen_range(0..n);
            self.ants[k].tour.place(0, start);
            self.ants[k].visited[start] = true;

            for step in 1..n {
                self.choose_and_move(k, step);
                if acs {
                    let prev = self.ants[k].tour.city(step - 1);
                    let cur = self.ants[k].tour.city(step);
                    self.pheromone
                        .blend_edge(&self.instance, prev, cur, self.config.xi, self.trail_0);
                }
            }

            self.ants[k].tour.close();
            self.ants[k].tour_length = self.ants[k].tour.length(&self.instance);
            if acs {
                let last = self.ants[k].tour.city(n - 1);
                let first = self.ants[k].tour.city(n);
                self.pheromone
                    .blend_edge(&self.instance, last, first, self.config.xi, self.trail_0);
            }
        }

        self.constructions += self.ants.len();
    }

    /// Pick the next city for ant `k` at tour position `step`.
    fn choose_and_move(&mut self, k: usize, step: usize) {
        let current = self.ants[k].tour.city(step - 1);

        if self.config.q_0 > 0.0 && self.rng.gen::<f64>() < self.config.q_0 {
            self.choose_best_candidate(k, step, current);
            return;
        }

        let depth = self.nn_ants();
        let mut sum_prob = 0.0;
        for i in 0..depth {
            let c = self.instance.nn_lists[current][i];
            let w = if self.ants[k].visited[c] {
                0.0
            } else {
                self.pheromone.total(current, c)
            };
            self.prob_buf[i] = w;
            sum_prob += w;
        }

        if sum_prob <= 0.0 {
            // every candidate is tabu: defined fallback, not an error
            self.choose_best_any(k, step, current);
            return;
        }

        let draw = self.rng.gen::<f64>() * sum_prob;
        let mut partial = self.prob_buf[0];
        let mut i = 0;
        while partial <= draw {
            i += 1;
            if i >= depth {
                // floating-point slack exhausted the mass: greedy fallback
                self.choose_best_candidate(k, step, current);
                return;
            }
            partial += self.prob_buf[i];
        }

        let city = self.instance.nn_lists[current][i];
        self.ants[k].tour.place(step, city);
        self.ants[k].visited[city] = true;
    }

    /// Greedy pick among unvisited candidates by combined information;
    /// falls back to the full-city scan when all candidates are tabu.
    fn choose_best_candidate(&mut self, k: usize, step: usize, current: usize) {
        let depth = self.nn_ants();
        let mut next = usize::MAX;
        let mut value_best = -1.0;

        for i in 0..depth {
            let c = self.instance.nn_lists[current][i];
            if !self.ants[k].visited[c] {
                let v = self.pheromone.total(current, c);
                if v > value_best {
                    value_best = v;
                    next = c;
                }
            }
        }

        if next == usize::MAX {
            self.choose_best_any(k, step, current);
        } else {
            self.ants[k].tour.place(step, next);
            self.ants[k].visited[next] = true;
        }
    }

    /// Greedy pick over all unvisited cities; first maximum wins.
    fn choose_best_any(&mut self, k: usize, step: usize, current: usize) {
        let n = self.n();
        let mut next = usize::MAX;
        let mut value_best = -1.0;

        for c in 0..n {
            if !self.ants[k].visited[c] {
                let v = self.pheromone.total(current, c);
                if v > value_best {
                    value_best = v;
                    next = c;
                }
            }
        }

        debug_assert!(next != usize::MAX, "no unvisited city left mid-construction");
        self.ants[k].tour.place(step, next);
        self.ants[k].visited[next] = true;
    }

    /// Run the configured local search over the whole ant pool and refresh
    /// the stored tour lengths.
    pub fn apply_local_search(&mut self) {
        let kind = self.config.local_search;
        if kind == LocalSearchKind::None {
            return;
        }

        for k in 0..self.ants.len() {
            let before = self.ants[k].tour_length;
            let gain = kind.improve(
                &self.instance,
                &mut self.ants[k].tour,
                &mut self.rng,
                self.config.nn_ls,
                self.config.dlb,
            );
            self.ants[k].tour_length = self.ants[k].tour.length(&self.instance);
            debug_assert_eq!(before + gain, self.ants[k].tour_length);
            if cfg!(debug_assertions) {
                self.ants[k].tour.assert_valid();
            }
        }
    }

    /// Index of the iteration-best ant; the first minimum wins ties.
    pub fn find_best(&self) -> usize {
        let mut best = 0;
        let mut min = self.ants[0].tour_length;
        for (k, ant) in self.ants.iter().enumerate().skip(1) {
            if ant.tour_length < min {
                min = ant.tour_length;
                best = k;
            }
        }
        best
    }

    /// Index of the iteration-worst ant; the first maximum wins ties.
    pub fn find_worst(&self) -> usize {
        let mut worst = 0;
        let mut max = self.ants[0].tour_length;
        for (k, ant) in self.ants.iter().enumerate().skip(1) {
            if ant.tour_length > max {
                max = ant.tour_length;
                worst = k;
            }
        }
        worst
    }

    /// Update best-so-far and restart-best from the current ant pool.
    ///
    /// Returns the index of the iteration-best ant and whether best-so-far
    /// improved (so the caller can report the event).
    pub fn update_statistics(&mut self) -> (usize, bool) {
        let best = self.find_best();
        let mut improved = false;

        if self.ants[best].tour_length < self.best_so_far.tour_length {
            let snapshot = self.ants[best].clone();
            self.best_so_far.clone_from_ant(&snapshot);
            self.restart_best.clone_from_ant(&snapshot);
            self.found_best = self.iteration;
            self.restart_found_best = self.iteration;
            improved = true;

            if self.config.variant == Variant::MaxMinAntSystem {
                self.trail_max = 1.0 / (self.config.rho * self.best_so_far.tour_length as f64);
                self.trail_min = self.trail_max / (2.0 * self.n() as f64);
                self.trail_0 = self.trail_max;
            }
        } else if self.ants[best].tour_length < self.restart_best.tour_length {
            let snapshot = self.ants[best].clone();
            self.restart_best.clone_from_ant(&snapshot);
            self.restart_found_best = self.iteration;
        }

        (best, improved)
    }

    /// Mean and standard deviation of the current population's tour lengths.
    pub fn population_statistics(&self) -> (f64, f64) {
        let k = self.ants.len() as f64;
        let mean = self.ants.iter().map(|a| a.tour_length as f64).sum::<f64>() / k;
        let var = self
            .ants
            .iter()
            .map(|a| {
                let d = a.tour_length as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / k;
        (mean, var.sqrt())
    }

    /// Recompute and cache the branching-factor diagnostic.
    pub fn compute_branching(&mut self) -> f64 {
        self.branching =
            self.pheromone
                .branching_factor(&self.instance, self.nn_ants(), self.config.lambda);
        self.branching
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{EdgeWeightType, Node};

    fn ring_instance(n: usize) -> TspInstance {
        let nodes = (0..n)
            .map(|i| {
                let angle = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
                Node::new(i, 100.0 * angle.cos(), 100.0 * angle.sin())
            })
            .collect();
        TspInstance::from_nodes("ring".to_string(), String::new(), nodes, EdgeWeightType::Euc2d)
    }

    fn small_colony(variant: Variant) -> Colony {
        let config = AcoConfig {
            variant,
            n_ants: 5,
            nn_ants: 4,
            nn_ls: 4,
            seed: 7,
            ..Default::default()
        };
        Colony::new(ring_instance(10), config)
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(AcoConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_rho() {
        let config = AcoConfig {
            rho: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_excess_ranks() {
        let config = AcoConfig {
            n_ants: 4,
            ras_ranks: 6,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_construction_yields_valid_tours() {
        let mut colony = small_colony(Variant::AntSystem);
        colony.reset_trial(7);
        colony.construct_solutions();

        for ant in &colony.ants {
            ant.tour.assert_valid();
            assert_eq!(ant.tour_length, ant.tour.length(&colony.instance));
        }
        // nn bootstrap + 5 ants
        assert_eq!(colony.constructions, 6);
    }

    #[test]
    fn test_construction_deterministic_for_seed() {
        let mut a = small_colony(Variant::AntSystem);
        let mut b = small_colony(Variant::AntSystem);
        a.reset_trial(11);
        b.reset_trial(11);
        a.construct_solutions();
        b.construct_solutions();

        for (x, y) in a.ants.iter().zip(b.ants.iter()) {
            assert_eq!(x.tour.lap(), y.tour.lap());
            assert_eq!(x.tour_length, y.tour_length);
        }
    }

    #[test]
    fn test_exploitation_only_construction() {
        let mut colony = small_colony(Variant::AntColonySystem);
        colony.config.q_0 = 0.99;
        colony.reset_trial(3);
        colony.construct_solutions();

        for ant in &colony.ants {
            ant.tour.assert_valid();
        }
    }

    #[test]
    fn test_update_statistics_tracks_best() {
        let mut colony = small_colony(Variant::AntSystem);
        colony.reset_trial(5);
        colony.construct_solutions();
        let (best, improved) = colony.update_statistics();

        assert!(improved);
        assert_eq!(colony.best_so_far.tour_length, colony.ants[best].tour_length);
        assert_eq!(
            colony.restart_best.tour_length,
            colony.best_so_far.tour_length
        );

        // a second call with the same population cannot improve
        let (_, improved) = colony.update_statistics();
        assert!(!improved);
    }

    #[test]
    fn test_nn_tour_is_complete() {
        let mut colony = small_colony(Variant::AntSystem);
        let len = colony.nn_tour_length();
        assert!(len > 0);
        colony.ants[0].tour.assert_valid();
    }
}
