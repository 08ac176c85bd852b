//! Backend selection core for a read/write-split database proxy.
//!
//! Given a list of backend servers and a configured [`policy::SelectionPolicy`],
//! this crate decides which backend a session should read from and write to.
//! It does not own connections, parse SQL, or speak any wire protocol — those
//! live in the proxy layer that embeds it; this crate is the decision, not
//! the plumbing.
//!
//! The entry point most callers want is [`session::select_connect_backend_servers`].

pub mod backend;
pub mod error;
pub mod policy;
pub mod priority;
pub mod roulette;
pub mod scoring;
pub mod session;
pub mod util;

#[cfg(test)]
mod test_support;

pub use backend::{Backend, ServerStats, Session, SessionCommandList, StatsSnapshot};
pub use error::MasterGateFailure;
pub use policy::{ConnectionType, MasterFailureMode, RouterConfig, SelectionPolicy};
pub use priority::{find_best_backend, priority_of};
pub use roulette::WorkerRng;
pub use scoring::BackendSelectFn;
pub use session::select_connect_backend_servers;
