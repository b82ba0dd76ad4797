use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// Counts rejected submissions per pool name.
///
/// The first rejection for a name inserts its counter through the map's
/// entry API, so a burst of concurrent first rejections still ends up on a
/// single counter. Later rejections only take a shard read lock.
#[derive(Debug, Default)]
pub struct RejectionTracker {
    counts: DashMap<String, AtomicU64>,
}

impl RejectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one rejection and returns the new count.
    pub fn record_rejection(&self, pool_name: &str) -> u64 {
        if let Some(counter) = self.counts.get(pool_name) {
            return counter.fetch_add(1, Ordering::AcqRel) + 1;
        }
        self.counts
            .entry(pool_name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::AcqRel)
            + 1
    }

    /// Zero for pools that never rejected anything.
    pub fn count(&self, pool_name: &str) -> u64 {
        self.counts
            .get(pool_name)
            .map(|counter| counter.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    pub fn counts(&self) -> BTreeMap<String, u64> {
        self.counts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Acquire)))
            .collect()
    }

    pub fn clear(&self) {
        self.counts.clear();
    }
}
