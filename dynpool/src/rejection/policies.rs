//! The four standard rejection policies.

use dynpool_api::{PoolError, RejectedError};

use super::RejectedHandler;
use crate::executor::{Task, ThreadPoolExecutor};

/// Raises a [`RejectedError`] to the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct AbortPolicy;

impl RejectedHandler for AbortPolicy {
    fn name(&self) -> &str {
        "abort"
    }

    fn rejected(&self, _task: Task, pool: &ThreadPoolExecutor) -> Result<(), RejectedError> {
        Err(RejectedError {
            pool: pool.name().to_string(),
            pool_size: pool.pool_size(),
            active_count: pool.active_count(),
            queue_size: pool.queue().len(),
        })
    }
}

/// Drops the task.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardPolicy;

impl RejectedHandler for DiscardPolicy {
    fn name(&self) -> &str {
        "discard"
    }

    fn rejected(&self, _task: Task, _pool: &ThreadPoolExecutor) -> Result<(), RejectedError> {
        Ok(())
    }
}

/// Drops the oldest queued task and resubmits the rejected one. Drops the
/// rejected task instead when the pool is shut down or nothing is queued
/// (a synchronous queue never holds anything to discard).
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardOldestPolicy;

impl RejectedHandler for DiscardOldestPolicy {
    fn name(&self) -> &str {
        "discard-oldest"
    }

    fn rejected(&self, task: Task, pool: &ThreadPoolExecutor) -> Result<(), RejectedError> {
        if pool.is_shutdown() || pool.queue().poll().is_none() {
            return Ok(());
        }
        match pool.execute_task(task) {
            Ok(()) => Ok(()),
            Err(PoolError::Rejected(e)) => Err(e),
            Err(e) => {
                crate::log_error!(e, pool = %pool.name(), operation = "discard_oldest_resubmit");
                Ok(())
            }
        }
    }
}

/// Runs the task on the submitting thread, unless the pool is shut down.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallerRunsPolicy;

impl RejectedHandler for CallerRunsPolicy {
    fn name(&self) -> &str {
        "caller-runs"
    }

    fn rejected(&self, task: Task, pool: &ThreadPoolExecutor) -> Result<(), RejectedError> {
        if !pool.is_shutdown() {
            task.run();
        }
        Ok(())
    }
}
