//! Scheduler: picks one eligible candidate index from a
//! [`UserServiceRoute`] per its declared [`Strategy`]. Health feedback never
//! flows back into the scheduler directly — only through the Health
//! Tracker's eligibility bit on each candidate — so, unlike the teacher's
//! `LoadBalancer` trait, there is no `record_success`/`record_failure` here.
//!
//! Grounded on `services/load_balancer.rs`: each strategy holds the same
//! kind of atomic cursor the teacher's `RoundRobinBalancer` and
//! `WeightedBalancer` hold, but the cursor lives on the route itself inside
//! the installed [`Graph`] rather than in a separate map keyed by path.

use crate::models::graph::{Strategy, UserServiceRoute};
use std::sync::atomic::Ordering;

/// Selects the index of the candidate to dispatch to, or `None` if no
/// candidate in `route` is currently eligible.
pub fn select(route: &UserServiceRoute) -> Option<usize> {
    let eligible: Vec<usize> = route
        .candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_eligible())
        .map(|(i, _)| i)
        .collect();

    if eligible.is_empty() {
        return None;
    }

    match route.strategy {
        Strategy::RoundRobin => Some(round_robin(route, &eligible)),
        Strategy::WeightedRoundRobin => Some(weighted_round_robin(route, &eligible)),
        Strategy::AdaptiveRoundRobin => Some(adaptive_round_robin(route, &eligible)),
        Strategy::StickyHealthy => Some(sticky_healthy(route, &eligible)),
    }
}

fn round_robin(route: &UserServiceRoute, eligible: &[usize]) -> usize {
    let cursor = route.scheduler_state.round_robin_cursor.fetch_add(1, Ordering::Relaxed);
    eligible[(cursor as usize) % eligible.len()]
}

/// Expands the eligible set by declared weight (a candidate with weight 3
/// appears three times) and round-robins over the expansion, exactly as the
/// teacher's `WeightedBalancer` does.
fn weighted_round_robin(route: &UserServiceRoute, eligible: &[usize]) -> usize {
    let mut expanded = Vec::new();
    for &idx in eligible {
        let weight = route.candidates[idx].weight.max(1);
        expanded.extend(std::iter::repeat(idx).take(weight as usize));
    }
    let cursor = route.scheduler_state.round_robin_cursor.fetch_add(1, Ordering::Relaxed);
    expanded[(cursor as usize) % expanded.len()]
}

/// Weighted round-robin over an effective weight that discounts each
/// candidate's declared weight by its recent smoothed error rate, so
/// flakier candidates receive proportionally less traffic without being
/// removed from rotation the way quarantine does.
fn adaptive_round_robin(route: &UserServiceRoute, eligible: &[usize]) -> usize {
    const MIN_EFFECTIVE_WEIGHT: f64 = 0.01;

    let scores: Vec<(usize, f64)> = eligible
        .iter()
        .map(|&idx| {
            let candidate = &route.candidates[idx];
            let error_rate = candidate.health.smoothed_error_rate();
            let score = (candidate.weight as f64) * (1.0 - error_rate).max(MIN_EFFECTIVE_WEIGHT);
            (idx, score)
        })
        .collect();

    const SCALE: f64 = 1000.0;
    let mut expanded = Vec::new();
    for (idx, score) in &scores {
        let slots = ((score * SCALE).round() as usize).max(1);
        expanded.extend(std::iter::repeat(*idx).take(slots));
    }
    let cursor = route.scheduler_state.round_robin_cursor.fetch_add(1, Ordering::Relaxed);
    expanded[(cursor as usize) % expanded.len()]
}

/// Sticks to the same candidate across calls as long as it remains eligible;
/// fails over to the first eligible candidate in declared order otherwise.
fn sticky_healthy(route: &UserServiceRoute, eligible: &[usize]) -> usize {
    if route.scheduler_state.sticky_set.load(Ordering::Relaxed) {
        let current = route.scheduler_state.sticky_index.load(Ordering::Relaxed) as usize;
        if eligible.contains(&current) {
            return current;
        }
    }
    let chosen = eligible[0];
    route
        .scheduler_state
        .sticky_index
        .store(chosen as u64, Ordering::Relaxed);
    route.scheduler_state.sticky_set.store(true, Ordering::Relaxed);
    chosen
}
