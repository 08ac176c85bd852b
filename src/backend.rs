use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};

/// Opaque handle for the client session driving a selection call.
///
/// The wire protocol, authentication, and SQL-session state this represents
/// are all external collaborators (see SPEC_FULL.md §1); the core only ever
/// passes this through to `Backend::connect`.
pub trait Session: Send + Sync {}

/// A list of session commands (`SET`, `USE`, ...) to replay on newly
/// connected slaves. Parsing and execution live outside this crate; the
/// core only needs to know how many there are.
pub trait SessionCommandList {
    fn size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// Live, monitor-maintained statistics for one backend server.
///
/// Fields are backed by atomics so the health-monitor subsystem can update
/// them concurrently without locking and without the selection core's
/// cooperation. `response_time_average` and `server_weight` are floats
/// stored as their bit pattern in an `AtomicU64`, the usual trick for a
/// lock-free float that doesn't need fetch-add semantics.
#[derive(Debug)]
pub struct ServerStats {
    connections: AtomicUsize,
    n_current: AtomicUsize,
    n_current_ops: AtomicUsize,
    rlag: AtomicI64,
    response_time_average_bits: AtomicU64,
    server_weight_bits: AtomicU64,
}

impl ServerStats {
    pub fn new(server_weight: f64) -> Self {
        Self {
            connections: AtomicUsize::new(0),
            n_current: AtomicUsize::new(0),
            n_current_ops: AtomicUsize::new(0),
            rlag: AtomicI64::new(0),
            response_time_average_bits: AtomicU64::new(0f64.to_bits()),
            server_weight_bits: AtomicU64::new(server_weight.to_bits()),
        }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    pub fn set_connections(&self, value: usize) {
        self.connections.store(value, Ordering::Relaxed);
    }

    pub fn n_current(&self) -> usize {
        self.n_current.load(Ordering::Relaxed)
    }

    pub fn set_n_current(&self, value: usize) {
        self.n_current.store(value, Ordering::Relaxed);
    }

    pub fn n_current_ops(&self) -> usize {
        self.n_current_ops.load(Ordering::Relaxed)
    }

    pub fn set_n_current_ops(&self, value: usize) {
        self.n_current_ops.store(value, Ordering::Relaxed);
    }

    /// Replication lag in seconds. May be negative or carry a monitor-specific
    /// sentinel for "unknown" — this crate does not interpret the value, it
    /// only feeds it into the scoring formula (see SPEC_FULL.md §9).
    pub fn rlag(&self) -> i64 {
        self.rlag.load(Ordering::Relaxed)
    }

    pub fn set_rlag(&self, value: i64) {
        self.rlag.store(value, Ordering::Relaxed);
    }

    pub fn response_time_average(&self) -> f64 {
        f64::from_bits(self.response_time_average_bits.load(Ordering::Relaxed))
    }

    pub fn set_response_time_average(&self, value: f64) {
        self.response_time_average_bits
            .store(value.to_bits(), Ordering::Relaxed);
    }

    /// Zero means "exclude this backend"; see §4.A.
    pub fn server_weight(&self) -> f64 {
        f64::from_bits(self.server_weight_bits.load(Ordering::Relaxed))
    }

    pub fn set_server_weight(&self, value: f64) {
        self.server_weight_bits
            .store(value.to_bits(), Ordering::Relaxed);
    }
}

/// A single, internally-consistent read of the fields a scoring pass needs.
///
/// Reading each atomic exactly once into this struct, instead of calling the
/// `ServerStats` accessors repeatedly inside a comparison, is what the spec's
/// concurrency model means by "reads tolerate staleness, but each comparison
/// snapshot reads each field once".
#[derive(Debug, Clone, Copy)]
pub struct StatsSnapshot {
    pub connections: usize,
    pub n_current: usize,
    pub n_current_ops: usize,
    pub rlag: i64,
    pub response_time_average: f64,
    pub server_weight: f64,
}

impl StatsSnapshot {
    pub fn read(stats: &ServerStats) -> Self {
        Self {
            connections: stats.connections(),
            n_current: stats.n_current(),
            n_current_ops: stats.n_current_ops(),
            rlag: stats.rlag(),
            response_time_average: stats.response_time_average(),
            server_weight: stats.server_weight(),
        }
    }
}

/// One backend server as seen by the selection core.
///
/// Implementors are shared via `Arc<dyn Backend>` between the session and the
/// router's backend list, so mutation performed by `connect` (incrementing
/// connection counts, flipping `in_use`) is visible to every holder.
pub trait Backend: Send + Sync + fmt::Debug {
    fn is_master(&self) -> bool;
    fn is_slave(&self) -> bool;
    fn is_relay(&self) -> bool;
    fn in_use(&self) -> bool;
    fn can_connect(&self) -> bool;
    fn has_session_commands(&self) -> bool;

    fn stats(&self) -> &ServerStats;

    fn name(&self) -> &str;
    fn address(&self) -> SocketAddr;

    /// Attempt to connect this backend to `session`, optionally replaying
    /// `sescmd_list`. Returns success/failure immediately; any I/O this
    /// performs is non-blocking and driven elsewhere (SPEC_FULL.md §5).
    fn connect(
        &self,
        session: &dyn Session,
        sescmd_list: Option<&dyn SessionCommandList>,
    ) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_weight_reads_back_as_zero() {
        let stats = ServerStats::new(0.0);
        assert_eq!(stats.server_weight(), 0.0);
    }

    #[test]
    fn snapshot_matches_individually_read_fields() {
        let stats = ServerStats::new(2.5);
        stats.set_connections(3);
        stats.set_n_current(7);
        stats.set_n_current_ops(1);
        stats.set_rlag(-1);
        stats.set_response_time_average(0.05);

        let snap = StatsSnapshot::read(&stats);
        assert_eq!(snap.connections, 3);
        assert_eq!(snap.n_current, 7);
        assert_eq!(snap.n_current_ops, 1);
        assert_eq!(snap.rlag, -1);
        assert_eq!(snap.response_time_average, 0.05);
        assert_eq!(snap.server_weight, 2.5);
    }
}
