use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dynpool_api::QueueType;
use parking_lot::{Condvar, Mutex};

use super::TaskQueue;
use crate::executor::Task;

struct Delayed {
    task: Task,
    seq: u64,
}

impl PartialEq for Delayed {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Delayed {}

impl PartialOrd for Delayed {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Delayed {
    // Reversed so the max-heap yields the earliest deadline
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .task
            .ready_at()
            .cmp(&self.task.ready_at())
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Unbounded queue that only releases a task once its delay has expired.
pub struct DelayTaskQueue {
    heap: Mutex<BinaryHeap<Delayed>>,
    available: Condvar,
    seq: AtomicU64,
    wakeups: AtomicU64,
}

impl DelayTaskQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            available: Condvar::new(),
            seq: AtomicU64::new(0),
            wakeups: AtomicU64::new(0),
        }
    }

    fn pop_ready(heap: &mut BinaryHeap<Delayed>, now: Instant) -> Option<Task> {
        match heap.peek() {
            Some(head) if head.task.ready_at() <= now => heap.pop().map(|entry| entry.task),
            _ => None,
        }
    }
}

impl Default for DelayTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DelayTaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayTaskQueue")
            .field("len", &self.len())
            .finish()
    }
}

impl TaskQueue for DelayTaskQueue {
    fn queue_type(&self) -> QueueType {
        QueueType::Delay
    }

    fn offer(&self, task: Task) -> Result<(), Task> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.heap.lock().push(Delayed { task, seq });
        // A new head may be due sooner than whatever a waiter is sleeping on
        self.available.notify_all();
        Ok(())
    }

    fn poll(&self) -> Option<Task> {
        Self::pop_ready(&mut self.heap.lock(), Instant::now())
    }

    fn take(&self, deadline: Option<Instant>, seen: u64) -> Option<Task> {
        let mut heap = self.heap.lock();
        loop {
            let now = Instant::now();
            if let Some(task) = Self::pop_ready(&mut heap, now) {
                return Some(task);
            }
            if self.wakeups.load(Ordering::Acquire) != seen {
                return None;
            }
            if deadline.is_some_and(|deadline| now >= deadline) {
                return None;
            }
            let head_due = heap.peek().map(|head| head.task.ready_at());
            let wake_at = match (head_due, deadline) {
                (Some(due), Some(deadline)) => Some(due.min(deadline)),
                (due, deadline) => due.or(deadline),
            };
            match wake_at {
                Some(at) => {
                    self.available.wait_until(&mut heap, at);
                }
                None => self.available.wait(&mut heap),
            }
        }
    }

    fn wakeups(&self) -> u64 {
        self.wakeups.load(Ordering::Acquire)
    }

    fn wake_waiters(&self) {
        let _heap = self.heap.lock();
        self.wakeups.fetch_add(1, Ordering::AcqRel);
        self.available.notify_all();
    }

    fn len(&self) -> usize {
        self.heap.lock().len()
    }

    fn capacity(&self) -> Option<usize> {
        None
    }

    fn drain(&self) -> Vec<Task> {
        let mut heap = self.heap.lock();
        let mut tasks = Vec::with_capacity(heap.len());
        while let Some(entry) = heap.pop() {
            tasks.push(entry.task);
        }
        tasks
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_task_hidden_until_delay_expires() {
        let queue = DelayTaskQueue::new();
        assert!(queue.offer(Task::new(|| {}).with_delay(Duration::from_millis(80))).is_ok());

        assert!(queue.poll().is_none());
        assert_eq!(queue.len(), 1);

        let start = Instant::now();
        let task = queue.poll_timeout(Duration::from_secs(2));
        assert!(task.is_some());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_earliest_deadline_first() {
        let queue = DelayTaskQueue::new();
        assert!(queue.offer(Task::new(|| {}).with_priority(2).with_delay(Duration::from_millis(40))).is_ok());
        assert!(queue.offer(Task::new(|| {}).with_priority(1)).is_ok());

        let first = queue.poll_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(first.priority(), 1);
        let second = queue.poll_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(second.priority(), 2);
    }

    #[test]
    fn test_drain_includes_pending() {
        let queue = DelayTaskQueue::new();
        assert!(queue.offer(Task::new(|| {}).with_delay(Duration::from_secs(60))).is_ok());
        assert_eq!(queue.drain().len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_wake_waiters_interrupts_wait_for_head() {
        let queue = Arc::new(DelayTaskQueue::new());
        assert!(queue.offer(Task::new(|| {}).with_delay(Duration::from_secs(60))).is_ok());

        let seen = queue.wakeups();
        let waiter = {
            let queue = queue.clone();
            thread::spawn(move || queue.take(None, seen).is_none())
        };
        thread::sleep(Duration::from_millis(20));
        queue.wake_waiters();
        assert!(waiter.join().unwrap());
        assert_eq!(queue.len(), 1);
    }
}
