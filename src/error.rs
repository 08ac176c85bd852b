use std::fmt;

/// Why `select_connect_backend_servers` refused to proceed under
/// `MasterFailureMode::FailInstantly`.
///
/// Only used to shape the diagnostic logged when bring-up bails out early;
/// the public entry point itself still returns a plain `bool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterGateFailure {
    /// No backend in the list has `is_master() == true`.
    NoCandidate,
    /// A master was found but its `can_connect()` reports drained.
    Drained,
}

impl fmt::Display for MasterGateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasterGateFailure::NoCandidate => write!(f, "no master candidate in backend list"),
            MasterGateFailure::Drained => write!(f, "master candidate cannot accept connections"),
        }
    }
}

impl std::error::Error for MasterGateFailure {}
