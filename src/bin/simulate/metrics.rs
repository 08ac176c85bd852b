use std::collections::HashMap;
use std::sync::Mutex;

/// Tallies collected across every bring-up round of one simulation run.
#[derive(Debug)]
pub struct Metrics {
    pub policy_name: String,
    rounds: Mutex<u64>,
    master_connect_failures: Mutex<u64>,
    slaves_requested: Mutex<u64>,
    slaves_connected: Mutex<u64>,
    selections_per_backend: Mutex<HashMap<String, u64>>,
}

impl Metrics {
    pub fn new(policy_name: &str) -> Self {
        Self {
            policy_name: policy_name.to_string(),
            rounds: Mutex::new(0),
            master_connect_failures: Mutex::new(0),
            slaves_requested: Mutex::new(0),
            slaves_connected: Mutex::new(0),
            selections_per_backend: Mutex::new(HashMap::new()),
        }
    }

    pub fn record_round(&self, master_connected: bool, slaves_found: usize, slaves_connected: usize) {
        *self.rounds.lock().unwrap() += 1;
        if !master_connected {
            *self.master_connect_failures.lock().unwrap() += 1;
        }
        *self.slaves_requested.lock().unwrap() += slaves_found as u64;
        *self.slaves_connected.lock().unwrap() += slaves_connected as u64;
    }

    pub fn record_selection(&self, backend_name: &str) {
        *self
            .selections_per_backend
            .lock()
            .unwrap()
            .entry(backend_name.to_string())
            .or_insert(0) += 1;
    }

    pub fn summary(&self) -> MetricsSummary {
        let selections = self.selections_per_backend.lock().unwrap().clone();
        let mut by_backend: Vec<(String, u64)> = selections.into_iter().collect();
        by_backend.sort_by(|a, b| a.0.cmp(&b.0));

        MetricsSummary {
            policy_name: self.policy_name.clone(),
            rounds: *self.rounds.lock().unwrap(),
            master_connect_failures: *self.master_connect_failures.lock().unwrap(),
            slaves_requested: *self.slaves_requested.lock().unwrap(),
            slaves_connected: *self.slaves_connected.lock().unwrap(),
            selections_per_backend: by_backend,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub policy_name: String,
    pub rounds: u64,
    pub master_connect_failures: u64,
    pub slaves_requested: u64,
    pub slaves_connected: u64,
    pub selections_per_backend: Vec<(String, u64)>,
}

impl MetricsSummary {
    pub fn fill_rate(&self) -> f64 {
        if self.slaves_requested == 0 {
            return 0.0;
        }
        self.slaves_connected as f64 / self.slaves_requested as f64 * 100.0
    }
}

/// Print a table summarizing one policy's run, mirroring the distribution of
/// selections a production bring-up log would show.
pub fn print_summary(summary: &MetricsSummary) {
    println!("\n{}", "=".repeat(72));
    println!("Policy: {}", summary.policy_name);
    println!("{}", "=".repeat(72));
    println!(
        "rounds={} master_failures={} slave_fill_rate={:.1}%",
        summary.rounds,
        summary.master_connect_failures,
        summary.fill_rate()
    );
    println!("{:<16} {:>10}", "backend", "selections");
    println!("{}", "-".repeat(28));
    for (name, count) in &summary.selections_per_backend {
        println!("{name:<16} {count:>10}");
    }
}
