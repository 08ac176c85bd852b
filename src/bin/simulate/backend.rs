use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use rwsplit_select::backend::{Backend, ServerStats, Session, SessionCommandList};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Slave,
    Relay,
}

/// A stand-in session: the demo never inspects it, just passes it through.
pub struct DemoSession;
impl Session for DemoSession {}

/// A stand-in session-command list of a given size, for exercising the
/// `expected_responses` accounting.
pub struct DemoSescmdList(pub usize);
impl SessionCommandList for DemoSescmdList {
    fn size(&self) -> usize {
        self.0
    }
}

/// A simulated server with queueing-style latency: each connection adds
/// `latency_per_conn_ms` on top of `base_latency_ms`, the same shape the
/// upstream probe-based simulation used to model request-in-flight latency.
#[derive(Debug)]
pub struct SimulatedBackend {
    name: String,
    role: Role,
    base_latency_ms: u64,
    latency_per_conn_ms: u64,
    capacity: usize,
    in_use: AtomicBool,
    can_connect: AtomicBool,
    live_connections: AtomicU64,
    stats: ServerStats,
}

impl SimulatedBackend {
    pub fn new(
        name: impl Into<String>,
        role: Role,
        base_latency_ms: u64,
        latency_per_conn_ms: u64,
        capacity: usize,
        weight: f64,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            base_latency_ms,
            latency_per_conn_ms,
            capacity,
            in_use: AtomicBool::new(false),
            can_connect: AtomicBool::new(true),
            live_connections: AtomicU64::new(0),
            stats: ServerStats::new(weight),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn estimated_latency_ms(&self) -> u64 {
        let live = self.live_connections.load(Ordering::Relaxed);
        self.base_latency_ms + live * self.latency_per_conn_ms
    }

    /// Record a finished connection's observed latency into the exponential
    /// moving average the adaptive policy reads.
    pub fn record_completion(&self, latency_ms: u64) {
        let previous = self.stats.response_time_average();
        let sample = latency_ms as f64 / 1000.0;
        let updated = if previous == 0.0 {
            sample
        } else {
            previous * 0.8 + sample * 0.2
        };
        self.stats.set_response_time_average(updated);
    }

    pub fn set_rlag(&self, seconds: i64) {
        self.stats.set_rlag(seconds);
    }

    pub fn set_drained(&self, drained: bool) {
        self.can_connect.store(!drained, Ordering::Relaxed);
    }

    pub fn mark_in_use(&self, in_use: bool) {
        self.in_use.store(in_use, Ordering::Relaxed);
        if in_use {
            let live = self.live_connections.fetch_add(1, Ordering::Relaxed) + 1;
            self.stats.set_connections(live as usize);
            self.stats.set_n_current(live as usize);
        } else {
            let live = self.live_connections.fetch_sub(1, Ordering::Relaxed) - 1;
            self.stats.set_connections(live as usize);
            self.stats.set_n_current(live as usize);
        }
    }

    pub fn at_capacity(&self) -> bool {
        self.live_connections.load(Ordering::Relaxed) as usize >= self.capacity
    }
}

impl Backend for SimulatedBackend {
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
        self.can_connect.load(Ordering::Relaxed) && !self.at_capacity()
    }

    fn has_session_commands(&self) -> bool {
        false
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
        // The master is offered to `connect` every round with no `!in_use()`
        // gate (it bypasses the slave exclusivity filter by design). Without
        // this check a reconnect of an already-connected backend would keep
        // incrementing `live_connections` until it pinned itself at capacity.
        if self.in_use.load(Ordering::Relaxed) {
            return true;
        }
        if !self.can_connect() {
            return false;
        }
        self.mark_in_use(true);
        true
    }
}

/// A pool of simulated servers: one master, the rest slaves.
pub struct BackendPool {
    pub backends: Vec<Arc<SimulatedBackend>>,
}

impl BackendPool {
    pub fn new(slave_count: usize, base_latency_ms: u64, capacity: usize) -> Self {
        let mut backends = Vec::with_capacity(slave_count + 1);
        backends.push(Arc::new(SimulatedBackend::new(
            "master",
            Role::Master,
            base_latency_ms,
            1,
            capacity,
            1.0,
        )));
        for i in 0..slave_count {
            let name = format!("slave-{i}");
            backends.push(Arc::new(SimulatedBackend::new(
                name,
                Role::Slave,
                base_latency_ms,
                2,
                capacity,
                1.0,
            )));
        }
        Self { backends }
    }

    pub fn as_dyn(&self) -> Vec<Arc<dyn Backend>> {
        self.backends
            .iter()
            .cloned()
            .map(|b| b as Arc<dyn Backend>)
            .collect()
    }
}
