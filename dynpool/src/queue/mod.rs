//! # Task Queues
//!
//! Pending-task buffers feeding a pool's workers. Every queue type named by
//! [`QueueType`] maps onto one implementation here:
//!
//! - bounded-array, bounded-linked, unbounded-linked and synchronous use a
//!   flume channel (`bounded(n)`, `unbounded()` and the `bounded(0)`
//!   rendezvous respectively)
//! - priority and delay use a binary heap behind a mutex and condvar
//! - resizable-linked uses a deque whose capacity can change at runtime
//!
//! ## Thread Safety
//! All queues are shared between submitting threads and worker threads
//! through `Arc<dyn TaskQueue>`; every method takes `&self`.
//!
//! ## Waking Idle Workers
//! Idle workers block in [`TaskQueue::take`] without a timeout. The pool
//! calls [`TaskQueue::wake_waiters`] whenever a waiting worker may have to
//! retire (shutdown, smaller sizes, shorter keep-alive). A worker reads
//! [`TaskQueue::wakeups`] before checking the pool state, so a wake-up issued
//! between that check and the wait is never lost.

mod channel;
mod delay;
mod priority;
mod resizable;

pub use channel::ChannelQueue;
pub use delay::DelayTaskQueue;
pub use priority::PriorityTaskQueue;
pub use resizable::ResizableTaskQueue;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dynpool_api::{ConfigError, PoolConfig, QueueType};

use crate::executor::Task;

/// Common interface of all pending-task buffers.
pub trait TaskQueue: Send + Sync + fmt::Debug {
    fn queue_type(&self) -> QueueType;

    /// Enqueues without blocking. Hands the task back when the queue is full
    /// (or, for a synchronous queue, when no worker is waiting).
    fn offer(&self, task: Task) -> Result<(), Task>;

    /// Takes the head without blocking.
    fn poll(&self) -> Option<Task>;

    /// Takes the head, waiting until `deadline` (or without limit when
    /// `None`). Returns `None` on timeout, or right away once
    /// [`TaskQueue::wake_waiters`] has run since [`TaskQueue::wakeups`]
    /// returned `seen`.
    fn take(&self, deadline: Option<Instant>, seen: u64) -> Option<Task>;

    /// Number of [`TaskQueue::wake_waiters`] calls so far.
    fn wakeups(&self) -> u64;

    /// Releases every thread blocked in [`TaskQueue::take`].
    fn wake_waiters(&self);

    /// Takes the head, waiting up to `timeout` for one to become available.
    /// A concurrent [`TaskQueue::wake_waiters`] ends the wait early.
    fn poll_timeout(&self, timeout: Duration) -> Option<Task> {
        self.take(Some(Instant::now() + timeout), self.wakeups())
    }

    /// Number of queued tasks (snapshot).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `None` for unbounded queues.
    fn capacity(&self) -> Option<usize>;

    fn remaining_capacity(&self) -> Option<usize> {
        self.capacity().map(|capacity| capacity.saturating_sub(self.len()))
    }

    /// Removes and returns everything queued, ready or not.
    fn drain(&self) -> Vec<Task>;

    fn set_capacity(&self, _capacity: usize) -> Result<(), ConfigError> {
        Err(ConfigError::CapacityNotAdjustable(self.queue_type()))
    }
}

/// Builds the queue a pool configuration asks for.
pub fn build_queue(config: &PoolConfig) -> Arc<dyn TaskQueue> {
    match config.queue_type {
        QueueType::BoundedArray | QueueType::BoundedLinked => {
            Arc::new(ChannelQueue::bounded(config.queue_type, config.capacity))
        }
        QueueType::UnboundedLinked => Arc::new(ChannelQueue::unbounded()),
        QueueType::Synchronous => Arc::new(ChannelQueue::synchronous(config.fair)),
        QueueType::Priority => Arc::new(PriorityTaskQueue::new()),
        QueueType::Delay => Arc::new(DelayTaskQueue::new()),
        QueueType::ResizableLinked => Arc::new(ResizableTaskQueue::new(config.capacity)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_queue_matches_type() {
        for queue_type in QueueType::ALL {
            let config = PoolConfig::named("q").with_queue(queue_type, 4);
            let queue = build_queue(&config);
            assert_eq!(queue.queue_type(), queue_type);
            assert_eq!(queue.capacity(), config.effective_capacity());
        }
    }
}
