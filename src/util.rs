use std::sync::Arc;

use crate::backend::{Backend, StatsSnapshot};
use crate::policy::SelectionPolicy;

/// A backend can take read traffic as a slave connection if it's a slave or
/// relay, and isn't reference-identical to the current master. Reference
/// identity, not a role check, is what rules the master out: a backend that
/// briefly reports `is_slave()` during a role flip is still the same
/// physical connection the session already holds as its master.
pub fn valid_for_slave(backend: &Arc<dyn Backend>, master: Option<&Arc<dyn Backend>>) -> bool {
    let slave_capable = backend.is_slave() || backend.is_relay();
    let is_the_master = master.is_some_and(|m| Arc::ptr_eq(backend, m));
    slave_capable && !is_the_master
}

/// `(slaves_found, slaves_connected)` across `backends`, counting anything
/// `valid_for_slave` against `master` and tallying the ones already `in_use`.
pub fn get_slave_counts(
    backends: &[Arc<dyn Backend>],
    master: Option<&Arc<dyn Backend>>,
) -> (usize, usize) {
    let mut found = 0;
    let mut connected = 0;
    for backend in backends {
        if valid_for_slave(backend, master) {
            found += 1;
            if backend.in_use() {
                connected += 1;
            }
        }
    }
    (found, connected)
}

/// The first backend in list order reporting `is_master()`. List order, not
/// any score, breaks ties: a pool should only ever have one true master at a
/// time, and if monitoring state is briefly inconsistent we want a stable,
/// reproducible pick rather than one that depends on the selection policy.
pub fn get_root_master(backends: &[Arc<dyn Backend>]) -> Option<Arc<dyn Backend>> {
    backends.iter().find(|b| b.is_master()).cloned()
}

/// One `tracing::debug!` line per backend, naming the field the configured
/// policy actually reads, so a log of a bring-up round can be read alongside
/// the selection it produced.
pub fn emit_diagnostics(backends: &[Arc<dyn Backend>], policy: SelectionPolicy) {
    for backend in backends {
        let snapshot = StatsSnapshot::read(backend.stats());
        match policy {
            SelectionPolicy::LeastRouterConnections => {
                tracing::debug!(
                    backend = backend.name(),
                    connections = snapshot.connections,
                    weight = snapshot.server_weight,
                    "candidate"
                );
            }
            SelectionPolicy::LeastGlobalConnections => {
                tracing::debug!(
                    backend = backend.name(),
                    n_current = snapshot.n_current,
                    weight = snapshot.server_weight,
                    "candidate"
                );
            }
            SelectionPolicy::LeastBehindMaster => {
                tracing::debug!(
                    backend = backend.name(),
                    rlag = snapshot.rlag,
                    weight = snapshot.server_weight,
                    "candidate"
                );
            }
            SelectionPolicy::LeastCurrentOperations => {
                tracing::debug!(
                    backend = backend.name(),
                    n_current_ops = snapshot.n_current_ops,
                    weight = snapshot.server_weight,
                    "candidate"
                );
            }
            SelectionPolicy::AdaptiveRouting => {
                tracing::debug!(
                    backend = backend.name(),
                    response_time_average = snapshot.response_time_average,
                    "candidate"
                );
            }
        }
    }
}
