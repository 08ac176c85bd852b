use std::sync::Arc;

use crate::backend::{Backend, Session, SessionCommandList};
use crate::error::MasterGateFailure;
use crate::policy::{ConnectionType, MasterFailureMode, RouterConfig};
use crate::priority;
use crate::roulette::WorkerRng;
use crate::scoring::BackendSelectFn;
use crate::util;

/// Bring up the backend connections for one session, following the same
/// round every time a session needs a fresh slave (or the initial master):
///
/// 1. Find the root master.
/// 2. If `master_failure_mode` is `FailInstantly` and there's no connectable
///    master, log why and refuse outright.
/// 3. Emit per-backend diagnostics, if enabled.
/// 4. Connect the master when `conn_type == All` and it can take a
///    connection.
/// 5. Compute the slave-pool quota and what's already filled.
/// 6. Filter the candidate set to backends not already in use, connectable,
///    and slave-capable per [`util::valid_for_slave`].
/// 7. Top up the slave pool one connection at a time: `select_fn` over the
///    shrinking candidate set, removing whichever index it returns so a
///    failed or already-chosen candidate is never retried.
/// 8. Return `true` once bring-up is done (a short slave pool is not itself
///    a failure; the router degrades to fewer read backends).
#[allow(clippy::too_many_arguments)]
pub fn select_connect_backend_servers(
    session: &dyn Session,
    backends: &[Arc<dyn Backend>],
    config: &RouterConfig,
    select_fn: &BackendSelectFn,
    master_out: &mut Option<Arc<dyn Backend>>,
    sescmd_list: Option<&dyn SessionCommandList>,
    mut expected_responses: Option<&mut u32>,
    conn_type: ConnectionType,
    rng: &mut WorkerRng,
) -> bool {
    let root_master = util::get_root_master(backends);

    let master_usable = root_master.as_ref().is_some_and(|m| m.can_connect());
    if config.master_failure_mode == MasterFailureMode::FailInstantly && !master_usable {
        let failure = if root_master.is_none() {
            MasterGateFailure::NoCandidate
        } else {
            MasterGateFailure::Drained
        };
        tracing::warn!(reason = %failure, "refusing to bring up session");
        return false;
    }

    if config.diagnostics_enabled {
        util::emit_diagnostics(backends, config.selection_policy);
    }

    if conn_type == ConnectionType::All {
        if let Some(master) = root_master.as_ref() {
            if master.can_connect() && master.connect(session, sescmd_list) {
                bump_expected_responses(&mut expected_responses, sescmd_list);
                *master_out = Some(master.clone());
            }
        }
    }

    let (_slaves_found, mut slaves_connected) = util::get_slave_counts(backends, root_master.as_ref());

    let mut candidates: Vec<Arc<dyn Backend>> = backends
        .iter()
        .filter(|b| !b.in_use() && b.can_connect() && util::valid_for_slave(b, root_master.as_ref()))
        .cloned()
        .collect();

    while quota_remaining(config.max_slave_connections, slaves_connected) && !candidates.is_empty() {
        // Candidates here are already idle and slave-capable, so this always
        // resolves to the priority-1 bucket (the whole candidate set); going
        // through `find_best_backend` still matters because it's the one
        // shared path both bring-up and later per-query routing use to reach
        // a scoring function.
        let Some(chosen) = priority::find_best_backend(
            &candidates,
            select_fn,
            config.master_accepts_reads,
            rng,
        ) else {
            break;
        };
        let candidate = candidates.remove(chosen);

        if candidate.connect(session, sescmd_list) {
            bump_expected_responses(&mut expected_responses, sescmd_list);
            slaves_connected += 1;
        }
    }

    true
}

fn quota_remaining(max_slave_connections: usize, slaves_connected: usize) -> bool {
    max_slave_connections == 0 || slaves_connected < max_slave_connections
}

fn bump_expected_responses(
    expected_responses: &mut Option<&mut u32>,
    sescmd_list: Option<&dyn SessionCommandList>,
) {
    if sescmd_list.is_some_and(|list| !list.is_empty()) {
        if let Some(counter) = expected_responses.as_deref_mut() {
            *counter += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::SelectionPolicy;
    use crate::test_support::{NullSession, TestBackend, TestSescmdList};

    fn select_fn(policy: SelectionPolicy) -> BackendSelectFn {
        BackendSelectFn::from_policy(policy)
    }

    #[test]
    fn fails_instantly_with_no_master_when_configured_to() {
        let backends: Vec<Arc<dyn Backend>> = vec![Arc::new(TestBackend::slave("s1"))];
        let config = RouterConfig {
            master_failure_mode: MasterFailureMode::FailInstantly,
            ..RouterConfig::default()
        };
        let mut master_out = None;
        let mut rng = WorkerRng::seeded(1);
        let session = NullSession;

        let ok = select_connect_backend_servers(
            &session,
            &backends,
            &config,
            &select_fn(config.selection_policy),
            &mut master_out,
            None,
            None,
            ConnectionType::All,
            &mut rng,
        );

        assert!(!ok);
        assert!(master_out.is_none());
    }

    #[test]
    fn connects_master_and_tops_up_slaves() {
        let master: Arc<dyn Backend> = Arc::new(TestBackend::master("m"));
        let s1: Arc<dyn Backend> = Arc::new(TestBackend::slave("s1").with_connections(5));
        let s2: Arc<dyn Backend> = Arc::new(TestBackend::slave("s2").with_connections(1));
        let backends = vec![master, s1, s2];

        let config = RouterConfig {
            max_slave_connections: 1,
            ..RouterConfig::default()
        };
        let mut master_out = None;
        let mut rng = WorkerRng::seeded(1);
        let session = NullSession;

        let ok = select_connect_backend_servers(
            &session,
            &backends,
            &config,
            &select_fn(config.selection_policy),
            &mut master_out,
            None,
            None,
            ConnectionType::All,
            &mut rng,
        );

        assert!(ok);
        assert!(master_out.is_some());
        let (_, connected) = util::get_slave_counts(&backends, master_out.as_ref());
        assert_eq!(connected, 1, "quota of 1 should stop the top-up loop");
    }

    #[test]
    fn unbounded_quota_fills_every_eligible_slave() {
        let master: Arc<dyn Backend> = Arc::new(TestBackend::master("m"));
        let s1: Arc<dyn Backend> = Arc::new(TestBackend::slave("s1"));
        let s2: Arc<dyn Backend> = Arc::new(TestBackend::slave("s2"));
        let backends = vec![master, s1, s2];

        let config = RouterConfig::default(); // max_slave_connections == 0
        let mut master_out = None;
        let mut rng = WorkerRng::seeded(1);
        let session = NullSession;

        select_connect_backend_servers(
            &session,
            &backends,
            &config,
            &select_fn(config.selection_policy),
            &mut master_out,
            None,
            None,
            ConnectionType::All,
            &mut rng,
        );

        let (found, connected) = util::get_slave_counts(&backends, master_out.as_ref());
        assert_eq!(found, connected);
    }

    #[test]
    fn expected_responses_only_bumps_for_nonempty_sescmd_lists() {
        let master: Arc<dyn Backend> = Arc::new(TestBackend::master("m"));
        let s1: Arc<dyn Backend> = Arc::new(TestBackend::slave("s1"));
        let backends = vec![master, s1];

        let config = RouterConfig::default();
        let mut master_out = None;
        let mut expected = 0u32;
        let mut rng = WorkerRng::seeded(1);
        let session = NullSession;
        let sescmds = TestSescmdList(2);

        select_connect_backend_servers(
            &session,
            &backends,
            &config,
            &select_fn(config.selection_policy),
            &mut master_out,
            Some(&sescmds),
            Some(&mut expected),
            ConnectionType::All,
            &mut rng,
        );

        assert_eq!(expected, 2, "one bump per successful connect (master + slave)");
    }

    #[test]
    fn empty_sescmd_list_never_bumps_expected_responses() {
        let master: Arc<dyn Backend> = Arc::new(TestBackend::master("m"));
        let backends = vec![master];

        let config = RouterConfig::default();
        let mut master_out = None;
        let mut expected = 0u32;
        let mut rng = WorkerRng::seeded(1);
        let session = NullSession;
        let empty_sescmds = TestSescmdList(0);

        select_connect_backend_servers(
            &session,
            &backends,
            &config,
            &select_fn(config.selection_policy),
            &mut master_out,
            Some(&empty_sescmds),
            Some(&mut expected),
            ConnectionType::All,
            &mut rng,
        );

        assert_eq!(expected, 0);
    }

    /// Scenario 5 from the invariant suite: a failing candidate is skipped,
    /// not retried, and the next candidate still gets a chance.
    #[test]
    fn connect_failure_moves_on_to_the_next_candidate() {
        let master: Arc<dyn Backend> = Arc::new(TestBackend::master("m"));
        let failing: Arc<dyn Backend> =
            Arc::new(TestBackend::slave("c1").with_connections(0).failing_connect());
        let working: Arc<dyn Backend> = Arc::new(TestBackend::slave("c2").with_connections(1));
        let backends = vec![master, failing.clone(), working.clone()];

        let config = RouterConfig::default();
        let mut master_out = None;
        let mut rng = WorkerRng::seeded(1);
        let session = NullSession;

        select_connect_backend_servers(
            &session,
            &backends,
            &config,
            &select_fn(config.selection_policy),
            &mut master_out,
            None,
            None,
            ConnectionType::All,
            &mut rng,
        );

        assert!(!failing.in_use());
        assert!(working.in_use());
    }

    #[test]
    fn slave_only_round_never_touches_the_master() {
        let master: Arc<dyn Backend> = Arc::new(TestBackend::master("m"));
        let s1: Arc<dyn Backend> = Arc::new(TestBackend::slave("s1"));
        let backends = vec![master, s1];

        let config = RouterConfig::default();
        let mut master_out = None;
        let mut rng = WorkerRng::seeded(1);
        let session = NullSession;

        select_connect_backend_servers(
            &session,
            &backends,
            &config,
            &select_fn(config.selection_policy),
            &mut master_out,
            None,
            None,
            ConnectionType::Slave,
            &mut rng,
        );

        assert!(master_out.is_none());
        assert!(!backends[0].in_use());
    }
}
