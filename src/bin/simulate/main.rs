mod backend;
mod metrics;

use std::time::Duration;

use clap::Parser;
use rand::Rng;
use rand_distr::{Distribution, Exp};
use tokio::time::sleep;

use rwsplit_select::{
    select_connect_backend_servers, util, ConnectionType, MasterFailureMode, RouterConfig,
    SelectionPolicy, SessionCommandList, WorkerRng,
};

use backend::{BackendPool, DemoSescmdList, DemoSession, Role};
use metrics::{print_summary, Metrics, MetricsSummary};

#[derive(Parser, Debug)]
#[command(author, version, about = "Backend selection policy simulation")]
struct Args {
    /// Number of slave backends in the pool
    #[arg(short, long, default_value_t = 5)]
    slaves: usize,

    /// Number of bring-up rounds to simulate
    #[arg(short = 'n', long, default_value_t = 500)]
    rounds: u64,

    /// Max simultaneous connections a single backend can carry
    #[arg(short, long, default_value_t = 8)]
    capacity: usize,

    /// Base per-connection latency in milliseconds
    #[arg(short, long, default_value_t = 20)]
    latency: u64,

    /// Cap on slave connections per session (0 = unbounded)
    #[arg(long, default_value_t = 0)]
    max_slave_connections: usize,

    /// Policies to run, comma-separated, or "all"
    #[arg(short, long, default_value = "all")]
    policies: String,

    /// Session commands attached to each round, to exercise expected_responses accounting
    #[arg(long, default_value_t = 0)]
    sescmds: usize,

    /// PRNG seed, for reproducible runs
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Only print the final table
    #[arg(short, long)]
    quiet: bool,
}

fn parse_policies(s: &str) -> Vec<SelectionPolicy> {
    if s == "all" {
        return vec![
            SelectionPolicy::LeastRouterConnections,
            SelectionPolicy::LeastGlobalConnections,
            SelectionPolicy::LeastBehindMaster,
            SelectionPolicy::LeastCurrentOperations,
            SelectionPolicy::AdaptiveRouting,
        ];
    }

    s.split(',')
        .filter_map(|name| match name.trim() {
            "least-router-connections" => Some(SelectionPolicy::LeastRouterConnections),
            "least-global-connections" => Some(SelectionPolicy::LeastGlobalConnections),
            "least-behind-master" => Some(SelectionPolicy::LeastBehindMaster),
            "least-current-operations" => Some(SelectionPolicy::LeastCurrentOperations),
            "adaptive" => Some(SelectionPolicy::AdaptiveRouting),
            other => {
                eprintln!("unknown policy {other:?}, skipping");
                None
            }
        })
        .collect()
}

fn policy_label(policy: SelectionPolicy) -> &'static str {
    match policy {
        SelectionPolicy::LeastRouterConnections => "least-router-connections",
        SelectionPolicy::LeastGlobalConnections => "least-global-connections",
        SelectionPolicy::LeastBehindMaster => "least-behind-master",
        SelectionPolicy::LeastCurrentOperations => "least-current-operations",
        SelectionPolicy::AdaptiveRouting => "adaptive",
    }
}

async fn run_policy(policy: SelectionPolicy, args: &Args) -> MetricsSummary {
    let pool = BackendPool::new(args.slaves, args.latency, args.capacity);
    let metrics = Metrics::new(policy_label(policy));

    let config = RouterConfig {
        selection_policy: policy,
        max_slave_connections: args.max_slave_connections,
        master_accepts_reads: false,
        master_failure_mode: MasterFailureMode::FailOnWrite,
        diagnostics_enabled: false,
    };
    let select_fn = config.backend_select_fct();
    let mut rng = WorkerRng::seeded(args.seed);

    // Background replication-lag jitter, standing in for the monitor thread
    // that would own this in a real proxy.
    let monitor_backends: Vec<_> = pool
        .backends
        .iter()
        .filter(|b| b.role() != Role::Master)
        .cloned()
        .collect();
    let monitor = tokio::spawn(async move {
        loop {
            sleep(Duration::from_millis(50)).await;
            for b in &monitor_backends {
                let jitter = rand::thread_rng().gen_range(0..3);
                b.set_rlag(jitter);
            }
        }
    });

    let sescmds = if args.sescmds > 0 {
        Some(DemoSescmdList(args.sescmds))
    } else {
        None
    };

    let mean_interval = Duration::from_millis(5);
    for _ in 0..args.rounds {
        let backends = pool.as_dyn();
        let before_in_use: Vec<bool> = backends.iter().map(|b| b.in_use()).collect();

        let session = DemoSession;
        let mut master_out = None;
        let mut expected_responses = 0u32;
        let sescmd_ref: Option<&dyn SessionCommandList> =
            sescmds.as_ref().map(|l| l as &dyn SessionCommandList);

        select_connect_backend_servers(
            &session,
            &backends,
            &config,
            &select_fn,
            &mut master_out,
            sescmd_ref,
            Some(&mut expected_responses),
            ConnectionType::All,
            &mut rng,
        );

        let (slaves_found, slaves_connected) = util::get_slave_counts(&backends, master_out.as_ref());
        metrics.record_round(master_out.is_some(), slaves_found, slaves_connected);

        for (i, b) in backends.iter().enumerate() {
            if !before_in_use[i] && b.in_use() {
                metrics.record_selection(b.name());
                let backend = pool.backends[i].clone();
                let latency_ms = backend.estimated_latency_ms();
                tokio::spawn(async move {
                    sleep(Duration::from_millis(latency_ms)).await;
                    backend.record_completion(latency_ms);
                    backend.mark_in_use(false);
                });
            }
        }

        let exp = Exp::new(1.0 / mean_interval.as_secs_f64()).unwrap();
        let wait = Duration::from_secs_f64(exp.sample(&mut rand::thread_rng()));
        sleep(wait.min(Duration::from_millis(20))).await;
    }

    // Let in-flight releases drain before reading the final tallies.
    sleep(Duration::from_millis(500)).await;
    monitor.abort();

    metrics.summary()
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if !args.quiet {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }

    let policies = parse_policies(&args.policies);
    let mut summaries = Vec::with_capacity(policies.len());

    for policy in policies {
        if !args.quiet {
            println!("Running {}...", policy_label(policy));
        }
        summaries.push(run_policy(policy, &args).await);
    }

    for summary in &summaries {
        print_summary(summary);
    }
}
