//! Operator-facing snapshots of live pools.

use dynpool_api::snapshot::active_rate;
use dynpool_api::PoolSnapshot;

use crate::executor::ThreadPoolExecutor;
use crate::registry::PoolRegistry;
use crate::rejection::RejectionTracker;

/// Captures the current state of `pool`. Each field is read separately, so
/// a busy pool may yield a slightly inconsistent view.
pub fn snapshot(pool: &ThreadPoolExecutor, tracker: &RejectionTracker) -> PoolSnapshot {
    let queue = pool.queue();
    let active_count = pool.active_count();
    let maximum_pool_size = pool.maximum_pool_size();

    PoolSnapshot {
        pool_name: pool.name().to_string(),
        core_pool_size: pool.core_pool_size(),
        active_count,
        queue_type: pool.queue_type(),
        rejected_policy: pool.rejected_policy(),
        maximum_pool_size,
        active_rate: active_rate(active_count, maximum_pool_size),
        completed_task_count: pool.completed_task_count(),
        queue_capacity: queue.capacity(),
        queue_remaining_capacity: queue.remaining_capacity(),
        queue_size: queue.len(),
        largest_pool_size: pool.largest_pool_size(),
        reject_count: tracker.count(pool.name()),
    }
}

/// Snapshots of every registered pool, ordered by pool name.
pub fn snapshots(registry: &PoolRegistry, tracker: &RejectionTracker) -> Vec<PoolSnapshot> {
    let mut all: Vec<PoolSnapshot> = registry
        .pools()
        .iter()
        .map(|pool| snapshot(pool, tracker))
        .collect();
    all.sort_by(|a, b| a.pool_name.cmp(&b.pool_name));
    all
}
