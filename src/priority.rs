use std::sync::Arc;

use crate::backend::Backend;
use crate::roulette::WorkerRng;
use crate::scoring::BackendSelectFn;

/// Read-capable and not mid-replay: the bucket every selection policy should
/// draw from whenever it's non-empty.
const PRIORITY_ACTS_SLAVE_IDLE: u8 = 1;
/// Doesn't act as a slave at all — in practice, a master while
/// `master_accepts_reads` is off. Only reachable as a last resort.
const PRIORITY_NOT_SLAVE_CAPABLE: u8 = 2;
/// Read-capable but mid-replay of session commands; pick only when nothing
/// else qualifies.
const PRIORITY_ACTS_SLAVE_BUSY: u8 = 13;

/// `acts_slave` := slave, relay, or a master when masters accept reads.
fn acts_slave(backend: &dyn Backend, master_accepts_reads: bool) -> bool {
    backend.is_slave() || backend.is_relay() || (backend.is_master() && master_accepts_reads)
}

/// `is_busy` := currently connected *and* mid-replay of session commands.
/// An already-connected backend with nothing left to replay is not "busy"
/// in this sense — it's immediately reusable, hence still priority 1.
fn is_busy(backend: &dyn Backend) -> bool {
    backend.in_use() && backend.has_session_commands()
}

/// Lower is better. Total over every backend: every backend falls into
/// exactly one of the three buckets below.
pub fn priority_of(backend: &dyn Backend, master_accepts_reads: bool) -> u8 {
    let slave_capable = acts_slave(backend, master_accepts_reads);
    if slave_capable && !is_busy(backend) {
        return PRIORITY_ACTS_SLAVE_IDLE;
    }
    if !slave_capable {
        return PRIORITY_NOT_SLAVE_CAPABLE;
    }
    PRIORITY_ACTS_SLAVE_BUSY
}

/// Pick the best candidate in `backends` by scanning for the lowest-numbered
/// priority bucket, then delegating to `select_fn` among only that bucket's
/// members.
///
/// Deliberately a two-pass scan over a `Vec<u8>` rather than an ordered map
/// keyed by priority: bucket membership changes every call (it depends on
/// live `in_use`/`can_connect` state), so building and discarding a sorted
/// map every time would just be allocation gold-plating over the same O(n)
/// work a plain scan already does.
pub fn find_best_backend(
    backends: &[Arc<dyn Backend>],
    select_fn: &BackendSelectFn,
    master_accepts_reads: bool,
    rng: &mut WorkerRng,
) -> Option<usize> {
    if backends.is_empty() {
        return None;
    }

    let priorities: Vec<u8> = backends
        .iter()
        .map(|b| priority_of(b.as_ref(), master_accepts_reads))
        .collect();

    let min_priority = *priorities.iter().min()?;

    let mut bucket_indices = Vec::new();
    let mut bucket = Vec::new();
    for (i, priority) in priorities.iter().enumerate() {
        if *priority == min_priority {
            bucket_indices.push(i);
            bucket.push(backends[i].clone());
        }
    }

    let winner_in_bucket = select_fn.select(&bucket, rng)?;
    Some(bucket_indices[winner_in_bucket])
}
