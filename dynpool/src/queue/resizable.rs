use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use dynpool_api::{ConfigError, QueueType};
use parking_lot::{Condvar, Mutex};

use super::TaskQueue;
use crate::executor::Task;

/// FIFO queue whose capacity can be changed while workers are consuming it.
///
/// Shrinking below the current length never drops tasks: the queue simply
/// refuses new ones until it has drained under the new bound.
pub struct ResizableTaskQueue {
    items: Mutex<VecDeque<Task>>,
    available: Condvar,
    capacity: AtomicUsize,
    wakeups: AtomicU64,
}

impl ResizableTaskQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            capacity: AtomicUsize::new(capacity),
            wakeups: AtomicU64::new(0),
        }
    }
}

impl fmt::Debug for ResizableTaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResizableTaskQueue")
            .field("capacity", &self.capacity.load(Ordering::Relaxed))
            .field("len", &self.len())
            .finish()
    }
}

impl TaskQueue for ResizableTaskQueue {
    fn queue_type(&self) -> QueueType {
        QueueType::ResizableLinked
    }

    fn offer(&self, task: Task) -> Result<(), Task> {
        let mut items = self.items.lock();
        if items.len() >= self.capacity.load(Ordering::Acquire) {
            return Err(task);
        }
        items.push_back(task);
        drop(items);
        self.available.notify_one();
        Ok(())
    }

    fn poll(&self) -> Option<Task> {
        self.items.lock().pop_front()
    }

    fn take(&self, deadline: Option<Instant>, seen: u64) -> Option<Task> {
        let mut items = self.items.lock();
        loop {
            if let Some(task) = items.pop_front() {
                return Some(task);
            }
            if self.wakeups.load(Ordering::Acquire) != seen {
                return None;
            }
            match deadline {
                Some(deadline) => {
                    if self.available.wait_until(&mut items, deadline).timed_out() {
                        return items.pop_front();
                    }
                }
                None => self.available.wait(&mut items),
            }
        }
    }

    fn wakeups(&self) -> u64 {
        self.wakeups.load(Ordering::Acquire)
    }

    fn wake_waiters(&self) {
        let _items = self.items.lock();
        self.wakeups.fetch_add(1, Ordering::AcqRel);
        self.available.notify_all();
    }

    fn len(&self) -> usize {
        self.items.lock().len()
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.capacity.load(Ordering::Acquire))
    }

    fn drain(&self) -> Vec<Task> {
        self.items.lock().drain(..).collect()
    }

    fn set_capacity(&self, capacity: usize) -> Result<(), ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "capacity".to_string(),
                value: capacity.to_string(),
            });
        }
        // Serialized with the length check in offer
        let _items = self.items.lock();
        self.capacity.store(capacity, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grow_and_shrink_keep_tasks() {
        let queue = ResizableTaskQueue::new(2);
        assert!(queue.offer(Task::new(|| {})).is_ok());
        assert!(queue.offer(Task::new(|| {})).is_ok());
        assert!(queue.offer(Task::new(|| {})).is_err());

        queue.set_capacity(3).unwrap();
        assert!(queue.offer(Task::new(|| {})).is_ok());
        assert_eq!(queue.remaining_capacity(), Some(0));

        queue.set_capacity(1).unwrap();
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.remaining_capacity(), Some(0));
        assert!(queue.offer(Task::new(|| {})).is_err());
    }

    #[test]
    fn test_zero_capacity_refused() {
        let queue = ResizableTaskQueue::new(2);
        assert!(queue.set_capacity(0).is_err());
        assert_eq!(queue.capacity(), Some(2));
    }
}
