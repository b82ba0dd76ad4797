//! # Pool Registry
//!
//! Maps pool names to live pools. This is the single source of truth for
//! which pool serves a name.
//!
//! ## Key Concepts
//! - First registration wins: a later `register` under a taken name is a
//!   silent no-op, so a pool handed out once is never swapped implicitly
//! - Swapping a pool is an explicit, logged [`PoolRegistry::replace`]
//! - A lookup miss is an error, never an implicit pool creation
//!
//! ## Thread Safety
//! Backed by a sharded concurrent map. `register` and `get` from many
//! submitting threads need no external lock, and at most one insert per key
//! wins. `names()` and `pools()` return copies.

use std::collections::BTreeSet;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use dynpool_api::PoolError;

use crate::executor::ThreadPoolExecutor;

#[derive(Debug, Default)]
pub struct PoolRegistry {
    pools: DashMap<String, ThreadPoolExecutor>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `pool` under `name` unless the name is taken. Returns whether
    /// this call inserted.
    pub fn register(&self, name: impl Into<String>, pool: ThreadPoolExecutor) -> bool {
        match self.pools.entry(name.into()) {
            Entry::Occupied(existing) => {
                tracing::debug!(pool = %existing.key(), "Pool already registered, keeping existing");
                false
            }
            Entry::Vacant(slot) => {
                crate::log_pool!(slot.key(), "registered");
                slot.insert(pool);
                true
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pools.contains_key(name)
    }

    /// Returns a handle to the pool registered under `name`.
    pub fn get(&self, name: &str) -> Result<ThreadPoolExecutor, PoolError> {
        self.pools
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PoolError::NotFound(name.to_string()))
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.pools.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn pools(&self) -> Vec<ThreadPoolExecutor> {
        self.pools.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Swaps the pool under `name`, returning the previous one. The caller
    /// owns the previous pool's shutdown.
    pub fn replace(&self, name: impl Into<String>, pool: ThreadPoolExecutor) -> Option<ThreadPoolExecutor> {
        let name = name.into();
        let previous = self.pools.insert(name.clone(), pool);
        crate::log_pool!(name, "replaced", had_previous = previous.is_some());
        previous
    }

    pub fn remove(&self, name: &str) -> Option<ThreadPoolExecutor> {
        self.pools.remove(name).map(|(_, pool)| pool)
    }

    /// Removes every entry. Pools are not shut down.
    pub fn clear(&self) {
        self.pools.clear();
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}
