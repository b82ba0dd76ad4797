//! Point-in-time view of one pool, as served to operators.

use serde::{Deserialize, Serialize};

use crate::config::QueueType;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    pub pool_name: String,
    pub core_pool_size: usize,
    pub active_count: usize,
    pub queue_type: QueueType,
    pub rejected_policy: String,
    pub maximum_pool_size: usize,
    /// `active_count / maximum_pool_size`.
    pub active_rate: f64,
    pub completed_task_count: u64,
    /// `None` for queues without a bound.
    pub queue_capacity: Option<usize>,
    pub queue_remaining_capacity: Option<usize>,
    pub queue_size: usize,
    pub largest_pool_size: usize,
    pub reject_count: u64,
}

/// Fraction of the maximum pool size currently busy, clamped to `[0, 1]`.
///
/// Right after the maximum is lowered, workers above the new bound may still
/// be finishing a task; they do not push the rate past 1.
pub fn active_rate(active_count: usize, maximum_pool_size: usize) -> f64 {
    if maximum_pool_size == 0 {
        return 0.0;
    }
    (active_count as f64 / maximum_pool_size as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_rate_bounds() {
        assert_eq!(active_rate(0, 4), 0.0);
        assert_eq!(active_rate(2, 4), 0.5);
        assert_eq!(active_rate(4, 4), 1.0);
        assert_eq!(active_rate(3, 0), 0.0);
        assert_eq!(active_rate(6, 4), 1.0);
    }
}
