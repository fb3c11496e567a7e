//! Global pheromone update policies for the six ACO variants.
//!
//! Every iteration follows the same skeleton: evaporate (full matrix, or
//! candidate-restricted when local search keeps deposits inside the
//! candidate sets), apply the variant's deposit rule, clamp MAX-MIN bounds
//! when running without local search, and refresh the combined information.
//! Ant Colony System sidesteps the skeleton: it only touches the edges of
//! the best-so-far tour and maintains `total` inline.

use rand::prelude::*;

use crate::colony::{Colony, Variant};
use crate::local_search::LocalSearchKind;
use crate::tour::distance_between;

/// Fraction of shared edges below which best and worst tours count as
/// converged, triggering a Best-Worst trail reinitialization.
const BWAS_CONVERGENCE_FACTOR: f64 = 0.05;

/// Base mutation rate of the Best-Worst pheromone mutation.
const BWAS_MUTATION_RATE: f64 = 0.3;

/// Run the variant's global pheromone update for the current iteration.
///
/// `elapsed` is the wall time consumed by the trial so far, used by the
/// Best-Worst mutation to scale its strength.
pub fn pheromone_update(colony: &mut Colony, elapsed: f64) {
    let ls = colony.config.local_search != LocalSearchKind::None;
    let rho = colony.config.rho;
    let depth = colony.nn_ants();

    match colony.config.variant {
        Variant::AntColonySystem => {}
        Variant::MaxMinAntSystem if ls => {
            let trail_min = colony.trail_min;
            colony
                .pheromone
                .evaporate_candidates_bounded(&colony.instance, depth, rho, trail_min);
        }
        _ if ls => colony
            .pheromone
            .evaporate_candidates(&colony.instance, depth, rho),
        _ => colony.pheromone.evaporate_all(rho),
    }

    match colony.config.variant {
        Variant::AntSystem => as_update(colony),
        Variant::ElitistAntSystem => eas_update(colony),
        Variant::RankBasedAntSystem => ras_update(colony),
        Variant::MaxMinAntSystem => mmas_update(colony),
        Variant::BestWorstAntSystem => bwas_update(colony, elapsed),
        Variant::AntColonySystem => acs_update(colony),
    }

    if colony.config.variant == Variant::MaxMinAntSystem && !ls {
        colony.pheromone.clamp_bounds(colony.trail_min, colony.trail_max);
    }

    if colony.config.variant != Variant::AntColonySystem {
        colony.recompute_total();
    }
}

/// Ant System: every ant reinforces its own tour.
fn as_update(colony: &mut Colony) {
    for k in 0..colony.ants.len() {
        let amount = 1.0 / colony.ants[k].tour_length as f64;
        colony.pheromone.deposit(&colony.ants[k].tour, amount);
    }
}

/// Elitist Ant System: Ant System plus a weighted best-so-far deposit.
fn eas_update(colony: &mut Colony) {
    as_update(colony);

    let weight = if colony.config.elitist_weight > 0 {
        colony.config.elitist_weight
    } else {
        colony.n()
    };
    let amount = weight as f64 / colony.best_so_far.tour_length as f64;
    colony.pheromone.deposit(&colony.best_so_far.tour, amount);
}

/// Rank-based Ant System: the `ranks - 1` best ants deposit with linearly
/// decreasing weight, the best-so-far tour with the full rank weight.
///
/// Rank selection re-scans the remaining ants for the current minimum each
/// round; the first minimum found wins ties. `ranks` is small, so the
/// quadratic scan is not worth replacing.
fn ras_update(colony: &mut Colony) {
    let ranks = colony.config.ras_ranks;
    let mut lengths: Vec<i64> = colony.ants.iter().map(|a| a.tour_length).collect();

    for i in 0..ranks.saturating_sub(1) {
        let mut target = 0;
        let mut b = lengths[0];
        for (k, &len) in lengths.iter().enumerate() {
            if len < b {
                b = len;
                target = k;
            }
        }
        lengths[target] = i64::MAX;

        let weight = (ranks - i - 1) as f64;
        let amount = weight / colony.ants[target].tour_length as f64;
        colony.pheromone.deposit(&colony.ants[target].tour, amount);
    }

    let amount = ranks as f64 / colony.best_so_far.tour_length as f64;
    colony.pheromone.deposit(&colony.best_so_far.tour, amount);
}

/// MAX-MIN Ant System: iteration-best deposits, with a scheduled cadence of
/// restart-best (or stale-guarded best-so-far) deposits.
fn mmas_update(colony: &mut Colony) {
    // deposit cadence tightens with the age of the current restart
    let since_restart = colony.iteration - colony.restart_iteration;
    colony.u_gb = if since_restart < 25 {
        25
    } else if since_restart < 75 {
        5
    } else if since_restart < 125 {
        3
    } else if since_restart < 250 {
        2
    } else {
        1
    };

    if colony.iteration % colony.u_gb != 0 {
        let best = colony.find_best();
        let amount = 1.0 / colony.ants[best].tour_length as f64;
        colony.pheromone.deposit(&colony.ants[best].tour, amount);
    } else if colony.u_gb == 1 && colony.iteration - colony.restart_found_best > 50 {
        // restart-best has gone stale; fall back to the best-so-far tour
        let amount = 1.0 / colony.best_so_far.tour_length as f64;
        colony.pheromone.deposit(&colony.best_so_far.tour, amount);
    } else {
        let amount = 1.0 / colony.restart_best.tour_length as f64;
        colony.pheromone.deposit(&colony.restart_best.tour, amount);
    }
}

/// Best-Worst Ant System: best-so-far deposit, extra evaporation on the
/// iteration-worst ant's foreign edges, then either a trail restart (when
/// best and worst have nearly converged) or a random trail mutation.
fn bwas_update(colony: &mut Colony, elapsed: f64) {
    let amount = 1.0 / colony.best_so_far.tour_length as f64;
    colony.pheromone.deposit(&colony.best_so_far.tour, amount);

    let worst = colony.find_worst();
    bwas_worst_ant_update(colony, worst);

    let dist = distance_between(&colony.ants[worst].tour, &colony.best_so_far.tour);
    if (dist as f64) < BWAS_CONVERGENCE_FACTOR * colony.n() as f64 {
        let level = colony.trail_0;
        colony.restart_trails(level, elapsed);
    } else {
        bwas_pheromone_mutation(colony, elapsed);
    }
}

/// Extra `(1 - rho)` evaporation on every edge the worst ant uses that the
/// best-so-far tour does not.
fn bwas_worst_ant_update(colony: &mut Colony, worst: usize) {
    let rho = colony.config.rho;
    let n = colony.n();

    for i in 0..n {
        let from = colony.ants[worst].tour.city(i);
        let to = colony.ants[worst].tour.city(i + 1);
        let shared = colony.best_so_far.tour.successor(from) == to
            || colony.best_so_far.tour.predecessor(from) == to;
        if !shared {
            colony.pheromone.scale_edge(from, to, 1.0 - rho);
        }
    }
}

/// Random symmetric mutation of a few trail entries, scaled by the elapsed
/// fraction of the trial since the last restart.
fn bwas_pheromone_mutation(colony: &mut Colony, elapsed: f64) {
    if colony.iteration - colony.restart_iteration < 2 {
        return;
    }

    let n = colony.n();

    // average trail on the best-so-far tour
    let mut avg_trail = 0.0;
    for i in 0..n {
        let from = colony.best_so_far.tour.city(i);
        let to = colony.best_so_far.tour.city(i + 1);
        avg_trail += colony.pheromone.pheromone(from, to);
    }
    avg_trail /= n as f64;

    let progress = if colony.config.max_time > 0.1 {
        (elapsed - colony.restart_time) / (colony.config.max_time - colony.restart_time)
    } else {
        let done = (colony.iteration - colony.restart_iteration) as f64;
        let span = colony.config.max_tours.saturating_sub(colony.restart_iteration) as f64;
        done / span.max(1.0)
    };
    let mutation_strength = 4.0 * avg_trail * progress.clamp(0.0, 1.0);

    // symmetric writes halve the effective count
    let mutation_rate = BWAS_MUTATION_RATE / n as f64 * colony.nn_ants() as f64;
    let num_mutations = (n as f64 * mutation_rate / 2.0) as usize;

    for _ in 0..num_mutations {
        let j = colony.rng.gen_range(0..n);
        let k = colony.rng.gen_range(0..n);
        if colony.rng.gen::<f64>() < 0.5 {
            colony.pheromone.nudge_edge(j, k, mutation_strength);
        } else {
            colony.pheromone.nudge_edge(j, k, -mutation_strength);
        }
    }
}

/// Ant Colony System: only the best-so-far tour is reinforced, blending
/// each of its edges toward `1 / length`; `total` is refreshed inline.
fn acs_update(colony: &mut Colony) {
    let rho = colony.config.rho;
    let d_tau = 1.0 / colony.best_so_far.tour_length as f64;
    let n = colony.n();

    for i in 0..n {
        let from = colony.best_so_far.tour.city(i);
        let to = colony.best_so_far.tour.city(i + 1);
        colony
            .pheromone
            .blend_edge(&colony.instance, from, to, rho, d_tau);
    }
}

/// Periodic search control: refresh diagnostics and, for MAX-MIN, restart
/// the trails once the colony has converged with no recent improvement.
pub fn search_control(colony: &mut Colony, elapsed: f64) {
    let branching = colony.compute_branching();
    let (mean, stddev) = colony.population_statistics();
    log::info!(
        "iteration {}: best {} mean {:.1} stddev {:.1} branching {:.5}",
        colony.iteration,
        colony.best_so_far.tour_length,
        mean,
        stddev,
        branching
    );

    if colony.config.variant == Variant::MaxMinAntSystem
        && branching < colony.config.branch_fac
        && colony.iteration - colony.restart_found_best > 250
    {
        let level = colony.trail_max;
        colony.restart_trails(level, elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colony::AcoConfig;
    use crate::instance::{EdgeWeightType, Node, TspInstance};
    use crate::tour::Tour;

    fn grid_instance(n: usize) -> TspInstance {
        // n cities on a coarse zig-zag so all pair distances are distinct-ish
        let nodes = (0..n)
            .map(|i| Node::new(i, (i as f64) * 100.0, if i % 2 == 0 { 0.0 } else { 70.0 }))
            .collect();
        TspInstance::from_nodes("grid".to_string(), String::new(), nodes, EdgeWeightType::Euc2d)
    }

    fn colony_with(variant: Variant, n: usize, n_ants: usize, rho: f64) -> Colony {
        let config = AcoConfig {
            variant,
            n_ants,
            nn_ants: n - 1,
            nn_ls: n - 1,
            rho,
            local_search: LocalSearchKind::None,
            ras_ranks: 3.min(n_ants),
            seed: 1,
            ..Default::default()
        };
        let mut colony = Colony::new(grid_instance(n), config);
        colony.reset_trial(1);
        colony
    }

    /// Install a fixed tour and length into ant `k`.
    fn set_ant(colony: &mut Colony, k: usize, cities: &[usize], length: i64) {
        colony.ants[k].tour = Tour::from_cities(cities);
        colony.ants[k].tour_length = length;
    }

    /// Level the trails to a known base after the variant-specific init.
    fn reinit_trails(colony: &mut Colony, level: f64) {
        colony.pheromone.init(level);
        colony.recompute_total();
    }

    fn has_edge(cities: &[usize], a: usize, b: usize) -> bool {
        let n = cities.len();
        (0..n).any(|i| {
            let (x, y) = (cities[i], cities[(i + 1) % n]);
            (x, y) == (a, b) || (x, y) == (b, a)
        })
    }

    #[test]
    fn test_as_update_all_ants_deposit() {
        let mut colony = colony_with(Variant::AntSystem, 6, 2, 0.0);
        set_ant(&mut colony, 0, &[0, 1, 2, 3, 4, 5], 10);
        set_ant(&mut colony, 1, &[0, 2, 4, 1, 3, 5], 20);
        colony.update_statistics();
        reinit_trails(&mut colony, 1.0);

        pheromone_update(&mut colony, 0.0);

        // edge (0,1) is only on ant 0's tour
        assert!((colony.pheromone.pheromone(0, 1) - 1.1).abs() < 1e-12);
        // edge (2,4) is only on ant 1's tour
        assert!((colony.pheromone.pheromone(2, 4) - 1.05).abs() < 1e-12);
    }

    #[test]
    fn test_eas_update_weights_best() {
        let mut colony = colony_with(Variant::ElitistAntSystem, 6, 2, 0.0);
        colony.config.elitist_weight = 4;
        set_ant(&mut colony, 0, &[0, 1, 2, 3, 4, 5], 10);
        set_ant(&mut colony, 1, &[0, 2, 4, 1, 3, 5], 20);
        colony.update_statistics();
        reinit_trails(&mut colony, 1.0);

        pheromone_update(&mut colony, 0.0);

        // ant deposit 1/10 plus elitist deposit 4/10 on the best tour
        assert!((colony.pheromone.pheromone(0, 1) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_eas_elitist_weight_defaults_to_n() {
        let mut colony = colony_with(Variant::ElitistAntSystem, 6, 2, 0.0);
        colony.config.elitist_weight = 0;
        set_ant(&mut colony, 0, &[0, 1, 2, 3, 4, 5], 12);
        set_ant(&mut colony, 1, &[0, 2, 4, 1, 3, 5], 24);
        colony.update_statistics();
        reinit_trails(&mut colony, 1.0);

        pheromone_update(&mut colony, 0.0);

        // 1/12 from the ant plus 6/12 from the default elitist weight
        assert!((colony.pheromone.pheromone(0, 1) - (1.0 + 7.0 / 12.0)).abs() < 1e-12);
    }

    #[test]
    fn test_ras_update_rank_weights_and_ties() {
        let mut colony = colony_with(Variant::RankBasedAntSystem, 6, 4, 0.0);
        colony.config.ras_ranks = 3;
        // ants 0 and 1 tie on length; the scan-order first (ant 0) must take
        // the higher rank weight
        set_ant(&mut colony, 0, &[0, 1, 2, 3, 4, 5], 10);
        set_ant(&mut colony, 1, &[0, 2, 4, 1, 5, 3], 10);
        set_ant(&mut colony, 2, &[0, 4, 1, 3, 2, 5], 30);
        set_ant(&mut colony, 3, &[0, 2, 3, 5, 4, 1], 40);
        colony.update_statistics();
        reinit_trails(&mut colony, 1.0);

        pheromone_update(&mut colony, 0.0);

        // edge (1,2): only on ant 0's tour, weight 2, plus best-so-far
        // (same tour) weight 3 -> (2+3)/10
        assert!((colony.pheromone.pheromone(1, 2) - 1.5).abs() < 1e-12);
        // edge (2,4): only on ant 1's tour, weight 1 -> 1/10
        assert!(has_edge(colony.ants[1].tour.lap(), 2, 4));
        assert!((colony.pheromone.pheromone(2, 4) - 1.1).abs() < 1e-12);
        // ant 2 is outside the ranks: its private edge (0,4) is untouched
        assert!(has_edge(colony.ants[2].tour.lap(), 0, 4));
        assert!((colony.pheromone.pheromone(0, 4) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mmas_schedule_tightens() {
        let mut colony = colony_with(Variant::MaxMinAntSystem, 6, 2, 0.1);
        set_ant(&mut colony, 0, &[0, 1, 2, 3, 4, 5], 10);
        set_ant(&mut colony, 1, &[0, 2, 4, 1, 3, 5], 20);
        colony.update_statistics();

        for (since, expected) in [(1, 25), (30, 5), (100, 3), (200, 2), (400, 1)] {
            colony.iteration = colony.restart_iteration + since;
            pheromone_update(&mut colony, 0.0);
            assert_eq!(colony.u_gb, expected, "since_restart {}", since);
        }
    }

    #[test]
    fn test_mmas_bounds_enforced_without_ls() {
        let mut colony = colony_with(Variant::MaxMinAntSystem, 6, 2, 0.5);
        set_ant(&mut colony, 0, &[0, 1, 2, 3, 4, 5], 10);
        set_ant(&mut colony, 1, &[0, 2, 4, 1, 3, 5], 20);
        colony.update_statistics();

        for _ in 0..30 {
            pheromone_update(&mut colony, 0.0);
            colony.iteration += 1;
        }

        for i in 0..6 {
            for j in 0..6 {
                if i == j {
                    continue;
                }
                let v = colony.pheromone.pheromone(i, j);
                assert!(
                    v >= colony.trail_min - 1e-15 && v <= colony.trail_max + 1e-15,
                    "trail {} outside [{}, {}]",
                    v,
                    colony.trail_min,
                    colony.trail_max
                );
            }
        }
    }

    #[test]
    fn test_mmas_stale_restart_best_uses_best_so_far() {
        let mut colony = colony_with(Variant::MaxMinAntSystem, 6, 2, 0.2);
        set_ant(&mut colony, 0, &[0, 1, 2, 3, 4, 5], 10);
        set_ant(&mut colony, 1, &[0, 2, 4, 1, 3, 5], 20);
        colony.update_statistics();

        // age the restart so u_gb == 1, and make restart-best stale and
        // distinct from best-so-far
        colony.iteration = 400;
        colony.restart_iteration = 1;
        colony.restart_found_best = 100;
        colony.restart_best.tour = Tour::from_cities(&[0, 3, 1, 4, 2, 5]);
        colony.restart_best.tour_length = 50;

        pheromone_update(&mut colony, 0.0);

        // best-so-far edge (0,1) reinforced; the stale restart-best edge
        // (0,3) sees only evaporation, like the neutral edge (0,2)
        assert!(colony.pheromone.pheromone(0, 1) > colony.pheromone.pheromone(0, 3));
        assert!(
            (colony.pheromone.pheromone(0, 3) - colony.pheromone.pheromone(0, 2)).abs() < 1e-15
        );
    }

    #[test]
    fn test_bwas_restart_on_converged_best_and_worst() {
        let mut colony = colony_with(Variant::BestWorstAntSystem, 10, 2, 0.5);
        let cities: Vec<usize> = (0..10).collect();
        set_ant(&mut colony, 0, &cities, 100);
        set_ant(&mut colony, 1, &cities, 100);
        colony.update_statistics();

        pheromone_update(&mut colony, 0.0);

        // identical best and worst tours trigger a full reinitialization
        assert_eq!(colony.restart_best.tour_length, i64::MAX);
        assert_eq!(colony.restart_iteration, colony.iteration);
        for i in 0..10 {
            for j in 0..10 {
                if i != j {
                    assert!((colony.pheromone.pheromone(i, j) - colony.trail_0).abs() < 1e-15);
                }
            }
        }
    }

    #[test]
    fn test_bwas_penalizes_worst_foreign_edges() {
        let mut colony = colony_with(Variant::BestWorstAntSystem, 10, 2, 0.5);
        let best: Vec<usize> = (0..10).collect();
        // worst shares only part of the best tour
        let worst = vec![0, 2, 1, 3, 4, 5, 6, 7, 8, 9];
        set_ant(&mut colony, 0, &best, 100);
        set_ant(&mut colony, 1, &worst, 200);
        colony.update_statistics();
        // keep the mutation quiet: fewer than two iterations since restart
        assert!(colony.iteration - colony.restart_iteration < 2);

        let init = colony.trail_0;
        pheromone_update(&mut colony, 0.0);

        // foreign edge (0,2): evaporation then the extra worst-ant penalty
        let expected_foreign = init * 0.5 * 0.5;
        assert!((colony.pheromone.pheromone(0, 2) - expected_foreign).abs() < 1e-15);
        // shared edge (3,4): evaporation plus the best deposit only
        let expected_shared = init * 0.5 + 1.0 / 100.0;
        assert!((colony.pheromone.pheromone(3, 4) - expected_shared).abs() < 1e-15);
        // no restart happened
        assert_ne!(colony.restart_best.tour_length, i64::MAX);
    }

    #[test]
    fn test_acs_update_blends_toward_deposit() {
        let mut colony = colony_with(Variant::AntColonySystem, 6, 2, 0.1);
        set_ant(&mut colony, 0, &[0, 1, 2, 3, 4, 5], 10);
        set_ant(&mut colony, 1, &[0, 2, 4, 1, 3, 5], 20);
        colony.update_statistics();

        let before = colony.pheromone.pheromone(0, 1);
        let off_tour_before = colony.pheromone.pheromone(0, 2);
        pheromone_update(&mut colony, 0.0);

        let expected = 0.9 * before + 0.1 * (1.0 / 10.0);
        assert!((colony.pheromone.pheromone(0, 1) - expected).abs() < 1e-15);
        // edges off the best tour are untouched by ACS
        assert_eq!(colony.pheromone.pheromone(0, 2), off_tour_before);
    }

    #[test]
    fn test_search_control_triggers_mmas_restart() {
        let mut colony = colony_with(Variant::MaxMinAntSystem, 6, 2, 0.5);
        set_ant(&mut colony, 0, &[0, 1, 2, 3, 4, 5], 10);
        set_ant(&mut colony, 1, &[0, 2, 4, 1, 3, 5], 20);
        colony.update_statistics();

        // converge the trails completely, then age the search
        for _ in 0..60 {
            pheromone_update(&mut colony, 0.0);
            colony.iteration += 1;
        }
        colony.iteration = 300;
        colony.restart_found_best = 1;

        search_control(&mut colony, 0.0);

        assert_eq!(colony.restart_iteration, 300);
        assert_eq!(colony.restart_best.tour_length, i64::MAX);
    }
}
