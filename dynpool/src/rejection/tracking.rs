use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use dynpool_api::RejectedError;

use super::{RejectedHandler, RejectionTracker};
use crate::executor::{Task, ThreadPoolExecutor};

/// Decorates a rejection policy with diagnostics and counting.
///
/// For every rejection, in this order:
/// 1. the wrapped policy handles the task (its error, if any, is kept)
/// 2. a warning with the pool's full state is logged
/// 3. the pool's rejection counter is incremented
/// 4. the wrapped policy's result is returned unchanged
///
/// Steps 2 and 3 also happen when the wrapped policy panics, e.g. a
/// caller-runs task that panics on the submitting thread. The panic is then
/// resumed so the caller still sees it.
#[derive(Debug, Clone)]
pub struct TrackingRejectedHandler {
    name: String,
    inner: Arc<dyn RejectedHandler>,
    tracker: Arc<RejectionTracker>,
}

impl TrackingRejectedHandler {
    pub fn new(inner: Arc<dyn RejectedHandler>, tracker: Arc<RejectionTracker>) -> Self {
        let name = inner.name().to_string();
        Self { name, inner, tracker }
    }

    /// Reports `name` instead of the wrapped policy's own name, e.g. the name
    /// a custom policy was registered under.
    pub fn named(name: impl Into<String>, inner: Arc<dyn RejectedHandler>, tracker: Arc<RejectionTracker>) -> Self {
        Self {
            name: name.into(),
            inner,
            tracker,
        }
    }

    pub fn inner(&self) -> &Arc<dyn RejectedHandler> {
        &self.inner
    }
}

impl RejectedHandler for TrackingRejectedHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn rejected(&self, task: Task, pool: &ThreadPoolExecutor) -> Result<(), RejectedError> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.inner.rejected(task, pool)));

        let contact = pool.contact().unwrap_or_default();
        crate::log_rejection!(
            pool.name(),
            policy = %self.name,
            contact = %contact,
            pool_size = pool.pool_size(),
            active_count = pool.active_count(),
            core_pool_size = pool.core_pool_size(),
            maximum_pool_size = pool.maximum_pool_size(),
            largest_pool_size = pool.largest_pool_size(),
            task_count = pool.task_count(),
            completed_task_count = pool.completed_task_count(),
            queue_size = pool.queue().len(),
            is_shutdown = pool.is_shutdown(),
            is_terminated = pool.is_terminated(),
            is_terminating = pool.is_terminating()
        );

        self.tracker.record_rejection(pool.name());
        match outcome {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}
