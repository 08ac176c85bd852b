use std::sync::Arc;

use crate::backend::{Backend, StatsSnapshot};
use crate::policy::SelectionPolicy;
use crate::roulette::{self, WorkerRng};

/// `(connections + 1) / server_weight`, `+∞` if unweighted.
pub fn score_least_router_connections(snapshot: &StatsSnapshot) -> f64 {
    if snapshot.server_weight == 0.0 {
        return f64::INFINITY;
    }
    (snapshot.connections as f64 + 1.0) / snapshot.server_weight
}

/// `(n_current + 1) / server_weight`, `+∞` if unweighted.
pub fn score_least_global_connections(snapshot: &StatsSnapshot) -> f64 {
    if snapshot.server_weight == 0.0 {
        return f64::INFINITY;
    }
    (snapshot.n_current as f64 + 1.0) / snapshot.server_weight
}

/// `rlag / server_weight`, `+∞` if unweighted. No `+1` bias: replication lag
/// of zero is a perfectly valid, best-possible score.
pub fn score_least_behind_master(snapshot: &StatsSnapshot) -> f64 {
    if snapshot.server_weight == 0.0 {
        return f64::INFINITY;
    }
    snapshot.rlag as f64 / snapshot.server_weight
}

/// `(n_current_ops + 1) / server_weight`, `+∞` if unweighted.
pub fn score_least_current_operations(snapshot: &StatsSnapshot) -> f64 {
    if snapshot.server_weight == 0.0 {
        return f64::INFINITY;
    }
    (snapshot.n_current_ops as f64 + 1.0) / snapshot.server_weight
}

/// Pick the candidate with the lowest score under `score_fn`. A candidate
/// that is not currently `in_use` has its score inflated to
/// `(score + 5.0) * 1.5` for comparison purposes only, biasing toward
/// connection reuse. Ties go to the first (lowest index) candidate seen.
pub fn best_of_score(
    candidates: &[Arc<dyn Backend>],
    score_fn: impl Fn(&StatsSnapshot) -> f64,
) -> Option<usize> {
    let mut best_idx = None;
    let mut best_score = f64::INFINITY;

    for (i, candidate) in candidates.iter().enumerate() {
        let snapshot = StatsSnapshot::read(candidate.stats());
        let mut score = score_fn(&snapshot);
        if !candidate.in_use() {
            score = (score + 5.0) * 1.5;
        }
        if score < best_score {
            best_score = score;
            best_idx = Some(i);
        }
    }

    best_idx
}

/// The bound selection function for one policy: a total, stable mapping from
/// a candidate slice to an index into it (or `None` if empty), combining
/// §4.A's scoring with §4.C's best-of-score, or §4.B's adaptive draw.
#[derive(Debug, Clone, Copy)]
pub enum BackendSelectFn {
    LeastGlobalConnections,
    LeastRouterConnections,
    LeastBehindMaster,
    LeastCurrentOperations,
    AdaptiveRouting,
}

impl BackendSelectFn {
    pub fn from_policy(policy: SelectionPolicy) -> Self {
        match policy {
            SelectionPolicy::LeastGlobalConnections => Self::LeastGlobalConnections,
            SelectionPolicy::LeastRouterConnections => Self::LeastRouterConnections,
            SelectionPolicy::LeastBehindMaster => Self::LeastBehindMaster,
            SelectionPolicy::LeastCurrentOperations => Self::LeastCurrentOperations,
            SelectionPolicy::AdaptiveRouting => Self::AdaptiveRouting,
        }
    }

    /// Select a candidate, drawing from the per-worker PRNG only when this
    /// is the adaptive policy.
    pub fn select(&self, candidates: &[Arc<dyn Backend>], rng: &mut WorkerRng) -> Option<usize> {
        match self {
            Self::LeastGlobalConnections => best_of_score(candidates, score_least_global_connections),
            Self::LeastRouterConnections => best_of_score(candidates, score_least_router_connections),
            Self::LeastBehindMaster => best_of_score(candidates, score_least_behind_master),
            Self::LeastCurrentOperations => best_of_score(candidates, score_least_current_operations),
            Self::AdaptiveRouting => roulette::adaptive_select(candidates, rng),
        }
    }
}
