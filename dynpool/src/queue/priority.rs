use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dynpool_api::QueueType;
use parking_lot::{Condvar, Mutex};

use super::TaskQueue;
use crate::executor::Task;

struct Prioritized {
    task: Task,
    seq: u64,
}

impl PartialEq for Prioritized {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for Prioritized {}

impl PartialOrd for Prioritized {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Prioritized {
    // Max-heap: higher priority first, then the earlier submission
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.task
            .priority()
            .cmp(&other.task.priority())
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Unbounded queue handing out the highest-priority task first.
pub struct PriorityTaskQueue {
    heap: Mutex<BinaryHeap<Prioritized>>,
    available: Condvar,
    seq: AtomicU64,
    wakeups: AtomicU64,
}

impl PriorityTaskQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            available: Condvar::new(),
            seq: AtomicU64::new(0),
            wakeups: AtomicU64::new(0),
        }
    }
}

impl Default for PriorityTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PriorityTaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityTaskQueue")
            .field("len", &self.len())
            .finish()
    }
}

impl TaskQueue for PriorityTaskQueue {
    fn queue_type(&self) -> QueueType {
        QueueType::Priority
    }

    fn offer(&self, task: Task) -> Result<(), Task> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.heap.lock().push(Prioritized { task, seq });
        self.available.notify_one();
        Ok(())
    }

    fn poll(&self) -> Option<Task> {
        self.heap.lock().pop().map(|entry| entry.task)
    }

    fn take(&self, deadline: Option<Instant>, seen: u64) -> Option<Task> {
        let mut heap = self.heap.lock();
        loop {
            if let Some(entry) = heap.pop() {
                return Some(entry.task);
            }
            if self.wakeups.load(Ordering::Acquire) != seen {
                return None;
            }
            match deadline {
                Some(deadline) => {
                    if self.available.wait_until(&mut heap, deadline).timed_out() {
                        return heap.pop().map(|entry| entry.task);
                    }
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
