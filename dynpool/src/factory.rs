//! # Pool Factory
//!
//! Turns a [`PoolConfig`] into a running pool, and applies later revisions
//! of that configuration to it.
//!
//! ## Key Concepts
//! - Every pool gets its configured policy wrapped in a
//!   [`TrackingRejectedHandler`], so all rejections are logged and counted
//! - Sizes, keep-alive, policy, contact and the capacity of a resizable
//!   queue change in place
//! - A different queue type, a new capacity for a fixed-capacity queue or a
//!   new fairness setting cannot be applied to a live queue; `apply` reports
//!   [`ApplyOutcome::ReplacementRequired`] and leaves the pool untouched

use std::sync::Arc;

use dynpool_api::{PoolConfig, PoolError, QueueType, RejectedPolicyKind};

use crate::executor::ThreadPoolExecutor;
use crate::rejection::{PolicyRegistry, RejectedHandler, RejectionTracker, TrackingRejectedHandler};

/// Result of applying a configuration revision to a live pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Nothing differed.
    Unchanged,
    /// At least one setting was changed in place.
    Updated,
    /// The revision needs a new queue; nothing was changed.
    ReplacementRequired,
}

#[derive(Debug, Clone)]
pub struct PoolFactory {
    policies: Arc<PolicyRegistry>,
    tracker: Arc<RejectionTracker>,
}

impl PoolFactory {
    pub fn new(policies: Arc<PolicyRegistry>, tracker: Arc<RejectionTracker>) -> Self {
        Self { policies, tracker }
    }

    pub fn policies(&self) -> &Arc<PolicyRegistry> {
        &self.policies
    }

    pub fn tracker(&self) -> &Arc<RejectionTracker> {
        &self.tracker
    }

    /// Validates `config` and builds a pool with a tracked rejection policy.
    /// No worker is started yet.
    pub fn create(&self, config: &PoolConfig) -> Result<ThreadPoolExecutor, PoolError> {
        config.validate()?;
        let handler = self.tracked_handler(&config.rejected_policy_kind())?;
        ThreadPoolExecutor::new(config.clone(), handler)
    }

    fn tracked_handler(&self, kind: &RejectedPolicyKind) -> Result<Arc<dyn RejectedHandler>, PoolError> {
        let policy = self.policies.resolve(kind)?;
        Ok(Arc::new(TrackingRejectedHandler::named(
            kind.name(),
            policy,
            Arc::clone(&self.tracker),
        )))
    }

    /// Brings `pool` in line with `next`.
    ///
    /// `next` is validated and its policy resolved before anything is
    /// touched, so an error leaves the pool as it was.
    pub fn apply(&self, pool: &ThreadPoolExecutor, next: &PoolConfig) -> Result<ApplyOutcome, PoolError> {
        next.validate()?;
        let current = pool.config();
        if current.requires_replacement(next) {
            return Ok(ApplyOutcome::ReplacementRequired);
        }

        let next_policy = next.rejected_policy_kind();
        let handler = if RejectedPolicyKind::from_name(&current.rejected_policy) != next_policy {
            Some(self.tracked_handler(&next_policy)?)
        } else {
            None
        };

        let mut changed = false;

        if current.core_pool_size != next.core_pool_size || current.maximum_pool_size != next.maximum_pool_size {
            // Order the two setters so core <= maximum holds after each step
            if next.core_pool_size <= current.maximum_pool_size {
                pool.set_core_pool_size(next.core_pool_size)?;
                pool.set_maximum_pool_size(next.maximum_pool_size)?;
            } else {
                pool.set_maximum_pool_size(next.maximum_pool_size)?;
                pool.set_core_pool_size(next.core_pool_size)?;
            }
            changed = true;
        }

        if current.keep_alive_time != next.keep_alive_time || current.time_unit != next.time_unit {
            pool.set_keep_alive_time(next.keep_alive_time, next.time_unit);
            changed = true;
        }

        if next.queue_type == QueueType::ResizableLinked && current.capacity != next.capacity {
            pool.set_queue_capacity(next.capacity)?;
            changed = true;
        }

        if let Some(handler) = handler {
            pool.set_rejected_handler(handler);
            changed = true;
        }

        if current.contact != next.contact {
            pool.set_contact(next.contact.clone());
            changed = true;
        }

        Ok(if changed {
            ApplyOutcome::Updated
        } else {
            ApplyOutcome::Unchanged
        })
    }
}
