//! Pheromone trail model for the ant colony.
//!
//! Owns the symmetric pheromone matrix and the derived combined-information
//! matrix `total[i][j] = pheromone[i][j]^alpha * heuristic(i,j)^beta` with
//! `heuristic(i,j) = 1 / (distance(i,j) + 0.1)`. Every public operation
//! preserves matrix symmetry; candidate-restricted variants only touch edges
//! listed in the instance candidate lists.

use ordered_float::OrderedFloat;

use crate::instance::TspInstance;
use crate::matrix::SquareMatrix;
use crate::tour::Tour;

/// Floor used by trail mutation to keep entries strictly positive.
pub const TRAIL_EPSILON: f64 = 1e-10;

/// Pheromone and combined-information matrices with their exponents.
#[derive(Debug, Clone)]
pub struct PheromoneModel {
    pheromone: SquareMatrix<f64>,
    total: SquareMatrix<f64>,
    alpha: f64,
    beta: f64,
}

/// Edge desirability prior: inverse distance, shifted to stay finite.
#[inline]
pub fn heuristic(distance: i64) -> f64 {
    1.0 / (distance as f64 + 0.1)
}

impl PheromoneModel {
    pub fn new(n: usize, alpha: f64, beta: f64) -> Self {
        PheromoneModel {
            pheromone: SquareMatrix::filled(n, 0.0),
            total: SquareMatrix::filled(n, 0.0),
            alpha,
            beta,
        }
    }

    /// Set every pheromone entry to `trail`. The `total` matrix is filled
    /// with the same placeholder; callers recompute it right after.
    pub fn init(&mut self, trail: f64) {
        self.pheromone.fill(trail);
        self.total.fill(trail);
    }

    #[inline]
    pub fn pheromone(&self, i: usize, j: usize) -> f64 {
        self.pheromone[(i, j)]
    }

    #[inline]
    pub fn total(&self, i: usize, j: usize) -> f64 {
        self.total[(i, j)]
    }

    #[inline]
    fn combined(&self, distance: i64, trail: f64) -> f64 {
        trail.powf(self.alpha) * heuristic(distance).powf(self.beta)
    }

    /// Multiply every entry by `1 - rho`.
    pub fn evaporate_all(&mut self, rho: f64) {
        let n = self.pheromone.size();
        for i in 0..n {
            for j in i..n {
                let v = self.pheromone[(i, j)] * (1.0 - rho);
                self.pheromone[(i, j)] = v;
                self.pheromone[(j, i)] = v;
            }
        }
    }

    /// Evaporate only candidate-list edges; cheaper when deposits are
    /// restricted to candidate sets anyway.
    pub fn evaporate_candidates(&mut self, instance: &TspInstance, depth: usize, rho: f64) {
        self.evaporate_candidates_impl(instance, depth, rho, None);
    }

    /// Candidate evaporation that also enforces a lower trail bound in the
    /// same pass (MAX-MIN Ant System).
    pub fn evaporate_candidates_bounded(
        &mut self,
        instance: &TspInstance,
        depth: usize,
        rho: f64,
        trail_min: f64,
    ) {
        self.evaporate_candidates_impl(instance, depth, rho, Some(trail_min));
    }

    fn evaporate_candidates_impl(
        &mut self,
        instance: &TspInstance,
        depth: usize,
        rho: f64,
        trail_min: Option<f64>,
    ) {
        let n = self.pheromone.size();
        let depth = depth.min(instance.nn_depth);
        for i in 0..n {
            for &c in &instance.nn_lists[i][..depth] {
                let mut v = self.pheromone[(i, c)] * (1.0 - rho);
                if let Some(min) = trail_min {
                    if v < min {
                        v = min;
                    }
                }
                self.pheromone[(i, c)] = v;
            }
        }
    }

    /// Add `amount` to every edge of the closed tour, symmetrically.
    pub fn deposit(&mut self, tour: &Tour, amount: f64) {
        for i in 0..tour.n() {
            let a = tour.city(i);
            let b = tour.city(i + 1);
            self.pheromone[(a, b)] += amount;
            self.pheromone[(b, a)] = self.pheromone[(a, b)];
        }
    }

    /// Multiply a single edge by `factor`, symmetrically (BWAS worst-ant
    /// penalization).
    pub fn scale_edge(&mut self, i: usize, j: usize, factor: f64) {
        self.pheromone[(i, j)] *= factor;
        self.pheromone[(j, i)] = self.pheromone[(i, j)];
    }

    /// Add `delta` to a single edge, symmetrically, flooring at
    /// [`TRAIL_EPSILON`] (BWAS mutation).
    pub fn nudge_edge(&mut self, i: usize, j: usize, delta: f64) {
        let mut v = self.pheromone[(i, j)] + delta;
        if v <= 0.0 {
            v = TRAIL_EPSILON;
        }
        self.pheromone[(i, j)] = v;
        self.pheromone[(j, i)] = v;
    }

    /// Blend a single edge toward `target` with rate `rate`, symmetrically,
    /// refreshing its combined information inline (ACS updates).
    pub fn blend_edge(&mut self, instance: &TspInstance, i: usize, j: usize, rate: f64, target: f64) {
        let v = (1.0 - rate) * self.pheromone[(i, j)] + rate * target;
        self.pheromone[(i, j)] = v;
        self.pheromone[(j, i)] = v;
        let t = self.combined(instance.dist(i, j), v);
        self.total[(i, j)] = t;
        self.total[(j, i)] = t;
    }

    /// Clip every entry into `[trail_min, trail_max]` (MAX-MIN Ant System).
    pub fn clamp_bounds(&mut self, trail_min: f64, trail_max: f64) {
        let n = self.pheromone.size();
        for i in 0..n {
            for j in 0..n {
                self.pheromone[(i, j)] = self.pheromone[(i, j)].clamp(trail_min, trail_max);
            }
        }
    }

    /// Recompute the combined information for all pairs.
    pub fn recompute_total_full(&mut self, instance: &TspInstance) {
        let n = self.pheromone.size();
        for i in 0..n {
            for j in 0..i {
                let t = self.combined(instance.dist(i, j), self.pheromone[(i, j)]);
                self.total[(i, j)] = t;
                self.total[(j, i)] = t;
            }
        }
    }

    /// Recompute the combined information for candidate-list pairs only,
    /// forcing the pheromone copies back into symmetry first (the smaller
    /// value wins when they have diverged).
    pub fn recompute_total_candidates(&mut self, instance: &TspInstance, depth: usize) {
        let n = self.pheromone.size();
        let depth = depth.min(instance.nn_depth);
        for i in 0..n {
            for &c in &instance.nn_lists[i][..depth] {
                if self.pheromone[(i, c)] < self.pheromone[(c, i)] {
                    self.pheromone[(c, i)] = self.pheromone[(i, c)];
                }
                let t = self.combined(instance.dist(i, c), self.pheromone[(i, c)]);
                self.total[(i, c)] = t;
                self.total[(c, i)] = t;
            }
        }
    }

    /// Average number of candidate edges per city whose trail exceeds a
    /// lambda-interpolated cutoff between that city's min and max candidate
    /// trails; normalized so full convergence approaches 1.
    pub fn branching_factor(&self, instance: &TspInstance, depth: usize, lambda: f64) -> f64 {
        let n = self.pheromone.size();
        let depth = depth.min(instance.nn_depth);
        let mut branches = 0.0;

        for m in 0..n {
            let list = &instance.nn_lists[m][..depth];
            let min = list
                .iter()
                .map(|&c| OrderedFloat(self.pheromone[(m, c)]))
                .min()
                .map(|v| v.0)
                .unwrap_or(0.0);
            let max = list
                .iter()
                .map(|&c| OrderedFloat(self.pheromone[(m, c)]))
                .max()
                .map(|v| v.0)
                .unwrap_or(0.0);
            let cutoff = min + lambda * (max - min);
            for &c in list {
                if self.pheromone[(m, c)] > cutoff {
                    branches += 1.0;
                }
            }
        }

        branches / (n as f64 * 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{EdgeWeightType, Node, TspInstance};

    fn test_instance() -> TspInstance {
        let nodes = vec![
            Node::new(0, 0.0, 0.0),
            Node::new(1, 3.0, 0.0),
            Node::new(2, 3.0, 4.0),
            Node::new(3, 0.0, 4.0),
        ];
        let mut instance = TspInstance::from_nodes(
            "test".to_string(),
            String::new(),
            nodes,
            EdgeWeightType::Euc2d,
        );
        instance.build_candidate_lists(3);
        instance
    }

    fn assert_symmetric(model: &PheromoneModel, n: usize) {
        for i in 0..n {
            for j in 0..n {
                assert_eq!(
                    model.pheromone(i, j),
                    model.pheromone(j, i),
                    "asymmetry at ({}, {})",
                    i,
                    j
                );
            }
        }
    }

    #[test]
    fn test_deposit_is_symmetric() {
        let instance = test_instance();
        let mut model = PheromoneModel::new(4, 1.0, 2.0);
        model.init(1.0);

        let tour = Tour::from_cities(&[0, 1, 2, 3]);
        model.deposit(&tour, 0.5);

        assert_symmetric(&model, 4);
        assert_eq!(model.pheromone(0, 1), 1.5);
        assert_eq!(model.pheromone(2, 0), 1.0);
        let _ = instance;
    }

    #[test]
    fn test_evaporate_all_strictly_decreases() {
        let mut model = PheromoneModel::new(4, 1.0, 2.0);
        model.init(2.0);
        model.evaporate_all(0.5);

        for i in 0..4 {
            for j in 0..4 {
                assert!(model.pheromone(i, j) < 2.0);
                assert_eq!(model.pheromone(i, j), 1.0);
            }
        }
        assert_symmetric(&model, 4);
    }

    #[test]
    fn test_candidate_evaporation_bounded_below() {
        let instance = test_instance();
        let mut model = PheromoneModel::new(4, 1.0, 2.0);
        model.init(1.0);

        model.evaporate_candidates_bounded(&instance, 3, 0.9, 0.5);
        for i in 0..4 {
            for &c in &instance.nn_lists[i] {
                assert_eq!(model.pheromone(i, c), 0.5);
            }
        }
    }

    #[test]
    fn test_clamp_bounds() {
        let mut model = PheromoneModel::new(4, 1.0, 2.0);
        model.init(1.0);
        let tour = Tour::from_cities(&[0, 1, 2, 3]);
        model.deposit(&tour, 10.0);

        model.clamp_bounds(2.0, 5.0);
        for i in 0..4 {
            for j in 0..4 {
                let v = model.pheromone(i, j);
                assert!((2.0..=5.0).contains(&v));
            }
        }
        assert_symmetric(&model, 4);
    }

    #[test]
    fn test_recompute_total_candidates_symmetrizes() {
        let instance = test_instance();
        let mut model = PheromoneModel::new(4, 1.0, 2.0);
        model.init(1.0);

        // Diverge the two stored copies of edge (0, 1); the smaller wins.
        model.evaporate_candidates(&instance, 3, 0.5);
        model.recompute_total_candidates(&instance, 3);

        for i in 0..4 {
            for &c in &instance.nn_lists[i] {
                assert_eq!(model.pheromone(i, c), model.pheromone(c, i));
                assert_eq!(model.total(i, c), model.total(c, i));
                let expected = model.pheromone(i, c).powf(1.0)
                    * heuristic(instance.dist(i, c)).powf(2.0);
                assert!((model.total(i, c) - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_nudge_edge_floors_at_epsilon() {
        let mut model = PheromoneModel::new(4, 1.0, 2.0);
        model.init(0.1);
        model.nudge_edge(0, 1, -5.0);
        assert_eq!(model.pheromone(0, 1), TRAIL_EPSILON);
        assert_eq!(model.pheromone(1, 0), TRAIL_EPSILON);
    }

    #[test]
    fn test_blend_edge_moves_toward_target() {
        let instance = test_instance();
        let mut model = PheromoneModel::new(4, 1.0, 2.0);
        model.init(1.0);
        model.recompute_total_full(&instance);

        model.blend_edge(&instance, 0, 1, 0.1, 2.0);
        assert!((model.pheromone(0, 1) - 1.1).abs() < 1e-12);
        assert_eq!(model.pheromone(0, 1), model.pheromone(1, 0));
        assert_eq!(model.total(0, 1), model.total(1, 0));
    }

    #[test]
    fn test_branching_factor_uniform_trails() {
        let instance = test_instance();
        let mut model = PheromoneModel::new(4, 1.0, 2.0);
        model.init(1.0);

        // With uniform trails every candidate edge exceeds the cutoff only
        // if lambda interpolation leaves cutoff == min == max; the strict
        // comparison then counts nothing.
        let bf = model.branching_factor(&instance, 3, 0.05);
        assert_eq!(bf, 0.0);

        // Reinforcing one edge per city raises it above the cutoff.
        let tour = Tour::from_cities(&[0, 1, 2, 3]);
        model.deposit(&tour, 1.0);
        let bf = model.branching_factor(&instance, 3, 0.05);
        assert!(bf > 0.0);
    }
}
