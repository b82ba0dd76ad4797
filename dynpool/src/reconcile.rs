//! # Pool Reconciliation
//!
//! Brings the registry in line with freshly published configuration.
//!
//! ## Key Concepts
//! - Unknown pool names are created and registered
//! - Known pools are updated in place when the change allows it
//! - A change that needs a new queue replaces the pool: the new pool is
//!   registered, the old queue is drained into it, then the old pool is shut
//!   down. Tasks already running on the old pool finish there, and so do
//!   queued tasks the new pool has no room for. No task runs on the thread
//!   doing the reconciliation
//! - Pools that disappear from configuration are left running
//!
//! Failures are reported per pool and never abort the rest of the batch.

use std::sync::Arc;

use dynpool_api::{ConfigChangeEvent, ConfigChangeListener, ConfigError, PoolConfig, PoolError};

use crate::executor::ThreadPoolExecutor;
use crate::factory::{ApplyOutcome, PoolFactory};
use crate::registry::PoolRegistry;

/// What one reconciliation round did, by pool name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub replaced: Vec<String>,
    pub unchanged: Vec<String>,
    /// Pool name and the error that stopped it.
    pub failed: Vec<(String, String)>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn changed(&self) -> bool {
        !(self.created.is_empty() && self.updated.is_empty() && self.replaced.is_empty())
    }
}

enum Change {
    Created,
    Updated,
    Replaced,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct PoolReconciler {
    registry: Arc<PoolRegistry>,
    factory: PoolFactory,
}

impl PoolReconciler {
    pub fn new(registry: Arc<PoolRegistry>, factory: PoolFactory) -> Self {
        Self { registry, factory }
    }

    /// Binds the event's properties and reconciles the resulting pools. A
    /// binding error rejects the whole event.
    pub fn reconcile_event(&self, event: &ConfigChangeEvent) -> Result<ReconcileReport, ConfigError> {
        let configs = event.pool_configs()?;
        Ok(self.reconcile(&configs))
    }

    pub fn reconcile(&self, configs: &[PoolConfig]) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for config in configs {
            let name = config.pool_name.clone();
            match self.reconcile_one(config) {
                Ok(Change::Created) => report.created.push(name),
                Ok(Change::Updated) => report.updated.push(name),
                Ok(Change::Replaced) => report.replaced.push(name),
                Ok(Change::Unchanged) => report.unchanged.push(name),
                Err(e) => {
                    crate::log_error!(e, pool = %name, operation = "reconcile");
                    report.failed.push((name, e.to_string()));
                }
            }
        }
        report
    }

    fn reconcile_one(&self, config: &PoolConfig) -> Result<Change, PoolError> {
        let current = match self.registry.get(&config.pool_name) {
            Ok(pool) => pool,
            Err(PoolError::NotFound(_)) => {
                let pool = self.factory.create(config)?;
                if self.registry.register(config.pool_name.clone(), pool.clone()) {
                    return Ok(Change::Created);
                }
                // Lost a registration race; reconcile against the winner
                pool.shutdown();
                self.registry.get(&config.pool_name)?
            }
            Err(e) => return Err(e),
        };

        match self.factory.apply(&current, config)? {
            ApplyOutcome::Unchanged => Ok(Change::Unchanged),
            ApplyOutcome::Updated => {
                crate::log_pool!(current.name(), "reconfigured");
                Ok(Change::Updated)
            }
            ApplyOutcome::ReplacementRequired => {
                self.replace(&current, config)?;
                Ok(Change::Replaced)
            }
        }
    }

    /// Swaps `current` for a pool built from `config` and moves its queued
    /// tasks over. Returns how many tasks were moved.
    ///
    /// Tasks never run on the calling thread, whatever the new pool's
    /// rejection policy is. A task the new pool has no room for is counted
    /// as a rejection and put back on the old pool, which runs it before it
    /// terminates. If the old queue cannot hold it either, the task is
    /// dropped and logged.
    pub fn replace(&self, current: &ThreadPoolExecutor, config: &PoolConfig) -> Result<usize, PoolError> {
        let replacement = self.factory.create(config)?;
        self.registry.replace(config.pool_name.clone(), replacement.clone());

        let pending = current.drain_queue();
        let total = pending.len();
        let mut migrated = 0;
        let mut returned = 0;
        let mut dropped = 0;
        for task in pending {
            let refused = match replacement.migrate_task(task) {
                Ok(None) => {
                    migrated += 1;
                    continue;
                }
                Ok(Some(task)) => task,
                Err(e) => {
                    crate::log_error!(e, pool = %replacement.name(), operation = "migrate_task");
                    continue;
                }
            };
            self.factory.tracker().record_rejection(replacement.name());
            match current.queue().offer(refused) {
                Ok(()) => returned += 1,
                Err(_) => dropped += 1,
            }
        }
        current.shutdown();

        if dropped > 0 {
            tracing::warn!(pool = %replacement.name(), dropped, "Queued tasks lost during pool replacement");
        }
        crate::log_pool!(
            replacement.name(),
            "pool_replaced",
            from_queue = %current.queue_type(),
            to_queue = %replacement.queue_type(),
            queued = total,
            migrated,
            returned
        );
        Ok(migrated)
    }
}

impl ConfigChangeListener for PoolReconciler {
    fn on_change(&self, event: &ConfigChangeEvent) {
        match self.reconcile_event(event) {
            Ok(report) => {
                if report.changed() || !report.is_clean() {
                    tracing::info!(
                        event_id = %event.id,
                        created = report.created.len(),
                        updated = report.updated.len(),
                        replaced = report.replaced.len(),
                        failed = report.failed.len(),
                        "Pools reconciled"
                    );
                }
            }
            Err(e) => {
                crate::log_error!(e, event_id = %event.id, operation = "bind_pool_configs");
            }
        }
    }
}
