//! Shared fake `Backend` used by unit tests across this crate's modules.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::backend::{Backend, ServerStats, Session, SessionCommandList};

#[derive(Debug, Default)]
pub struct NullSession;
impl Session for NullSession {}

#[derive(Debug)]
pub struct TestSescmdList(pub usize);
impl SessionCommandList for TestSescmdList {
    fn size(&self) -> usize {
        self.0
    }
}

#[derive(Debug)]
pub struct TestBackend {
    name: String,
    role: Role,
    in_use: AtomicBool,
    can_connect: AtomicBool,
    has_sescmds: bool,
    connect_should_fail: bool,
    stats: ServerStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Master,
    Slave,
    Relay,
}

impl TestBackend {
    fn new(name: &str, role: Role) -> Self {
        Self {
            name: name.to_string(),
            role,
            in_use: AtomicBool::new(false),
            can_connect: AtomicBool::new(true),
            has_sescmds: false,
            connect_should_fail: false,
            stats: ServerStats::new(1.0),
        }
    }

    pub fn master(name: &str) -> Self {
        Self::new(name, Role::Master)
    }

    pub fn slave(name: &str) -> Self {
        Self::new(name, Role::Slave)
    }

    pub fn relay(name: &str) -> Self {
        Self::new(name, Role::Relay)
    }

    pub fn with_connections(self, n: usize) -> Self {
        self.stats.set_connections(n);
        self
    }

    pub fn with_n_current(self, n: usize) -> Self {
        self.stats.set_n_current(n);
        self
    }

    pub fn with_n_current_ops(self, n: usize) -> Self {
        self.stats.set_n_current_ops(n);
        self
    }

    pub fn with_rlag(self, lag: i64) -> Self {
        self.stats.set_rlag(lag);
        self
    }

    pub fn with_response_time_average(self, secs: f64) -> Self {
        self.stats.set_response_time_average(secs);
        self
    }

    pub fn with_weight(self, weight: f64) -> Self {
        self.stats.set_server_weight(weight);
        self
    }

    /// Marks this backend in-use, the way a live connection would.
    pub fn busy(self) -> Self {
        self.in_use.store(true, Ordering::Relaxed);
        self
    }

    pub fn mark_in_use(self) -> Self {
        self.busy()
    }

    pub fn drained(self) -> Self {
        self.can_connect.store(false, Ordering::Relaxed);
        self
    }

    pub fn with_session_commands(mut self) -> Self {
        self.has_sescmds = true;
        self
    }

    pub fn failing_connect(mut self) -> Self {
        self.connect_should_fail = true;
        self
    }
}

impl Backend for TestBackend {
    fn is_master(&self) -> bool {
        self.role == Role::Master
    }

    fn is_slave(&self) -> bool {
        self.role == Role::Slave
    }

    fn is_relay(&self) -> bool {
        self.role == Role::Relay
    }

    fn in_use(&self) -> bool {
        self.in_use.load(Ordering::Relaxed)
    }

    fn can_connect(&self) -> bool {
        self.can_connect.load(Ordering::Relaxed)
    }

    fn has_session_commands(&self) -> bool {
        self.has_sescmds
    }

    fn stats(&self) -> &ServerStats {
        &self.stats
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3306)
    }

    fn connect(&self, _session: &dyn Session, _sescmd_list: Option<&dyn SessionCommandList>) -> bool {
        if self.connect_should_fail {
            return false;
        }
        self.in_use.store(true, Ordering::Relaxed);
        true
    }
}
