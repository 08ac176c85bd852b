use crate::scoring::BackendSelectFn;

/// Which metric a non-adaptive scoring pass minimizes, or the adaptive
/// response-time-weighted draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    LeastGlobalConnections,
    LeastRouterConnections,
    LeastBehindMaster,
    LeastCurrentOperations,
    AdaptiveRouting,
}

impl SelectionPolicy {
    /// Total constructor from a raw discriminant, e.g. one parsed out of a
    /// config file by the layer above this crate. Unknown values are a
    /// programming defect (SPEC_FULL.md §7): caught by `debug_assert!` in
    /// debug builds, and mapped to `LeastCurrentOperations` in release so the
    /// proxy stays live instead of panicking on the hot path.
    pub fn from_raw(value: u8) -> Self {
        match value {
            0 => Self::LeastGlobalConnections,
            1 => Self::LeastRouterConnections,
            2 => Self::LeastBehindMaster,
            3 => Self::LeastCurrentOperations,
            4 => Self::AdaptiveRouting,
            other => {
                debug_assert!(false, "unknown selection policy discriminant: {other}");
                tracing::warn!(
                    discriminant = other,
                    "unknown selection policy, falling back to least-current-operations"
                );
                Self::LeastCurrentOperations
            }
        }
    }
}

/// Whether bring-up refuses to proceed when no usable master is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterFailureMode {
    /// Bail out immediately if no master can be connected.
    FailInstantly,
    /// Proceed without a master; writes fail once attempted.
    FailOnWrite,
    /// Proceed without a master; writes return an error to the client.
    ErrorOnWrite,
}

/// `All` also selects and connects a master this round; `Slave` only tops up
/// the slave pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    All,
    Slave,
}

/// Recognized router configuration consumed by the selection core.
/// Parsing the surrounding server-pool configuration is out of scope
/// (SPEC_FULL.md §1); this struct only carries the options the core reads.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub selection_policy: SelectionPolicy,
    /// `0` disables the slave-count invariant check (unbounded top-up).
    pub max_slave_connections: usize,
    pub master_accepts_reads: bool,
    pub master_failure_mode: MasterFailureMode,
    /// Gates the per-backend diagnostic log line emitted in bring-up step 3.
    pub diagnostics_enabled: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            selection_policy: SelectionPolicy::LeastCurrentOperations,
            max_slave_connections: 0,
            master_accepts_reads: false,
            master_failure_mode: MasterFailureMode::FailOnWrite,
            diagnostics_enabled: false,
        }
    }
}

impl RouterConfig {
    /// Pre-bind the configured policy to a selection function, the way a
    /// session stashes `backend_select_fct` once and reuses it for its
    /// lifetime (SPEC_FULL.md §3) rather than re-dispatching on every call.
    pub fn backend_select_fct(&self) -> BackendSelectFn {
        get_backend_select_function(self.selection_policy)
    }
}

/// The §4.E dispatcher: total over `SelectionPolicy` since the enum is
/// closed — any out-of-range config value was already normalized by
/// `SelectionPolicy::from_raw` before it could reach here.
pub fn get_backend_select_function(policy: SelectionPolicy) -> BackendSelectFn {
    BackendSelectFn::from_policy(policy)
}
