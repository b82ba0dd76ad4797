use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use dynpool_api::QueueType;
use flume::{Receiver, Selector, Sender, TrySendError};

use super::TaskQueue;
use crate::executor::Task;

/// FIFO queue over a flume channel.
///
/// A zero-capacity channel is a rendezvous: `try_send` only succeeds when a
/// worker is already blocked in `take`, which is exactly the hand-off a
/// synchronous queue needs. Waiting receivers are served in arrival order,
/// so the fair and unfair variants behave the same.
///
/// Waiters select over the task channel and a wake channel; `wake_waiters`
/// sends one wake message per registered waiter.
pub struct ChannelQueue {
    queue_type: QueueType,
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    waiters: AtomicUsize,
    wakeups: AtomicU64,
    capacity: Option<usize>,
    fair: bool,
}

impl ChannelQueue {
    pub fn bounded(queue_type: QueueType, capacity: usize) -> Self {
        Self::with_channel(queue_type, flume::bounded(capacity), Some(capacity), false)
    }

    pub fn unbounded() -> Self {
        Self::with_channel(QueueType::UnboundedLinked, flume::unbounded(), None, false)
    }

    pub fn synchronous(fair: bool) -> Self {
        Self::with_channel(QueueType::Synchronous, flume::bounded(0), Some(0), fair)
    }

    fn with_channel(
        queue_type: QueueType,
        (sender, receiver): (Sender<Task>, Receiver<Task>),
        capacity: Option<usize>,
        fair: bool,
    ) -> Self {
        let (wake_tx, wake_rx) = flume::unbounded();
        Self {
            queue_type,
            sender,
            receiver,
            wake_tx,
            wake_rx,
            waiters: AtomicUsize::new(0),
            wakeups: AtomicU64::new(0),
            capacity,
            fair,
        }
    }

    pub fn is_fair(&self) -> bool {
        self.fair
    }
}

impl fmt::Debug for ChannelQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelQueue")
            .field("queue_type", &self.queue_type)
            .field("capacity", &self.capacity)
            .field("len", &self.receiver.len())
            .field("fair", &self.fair)
            .finish()
    }
}

impl TaskQueue for ChannelQueue {
    fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    fn offer(&self, task: Task) -> Result<(), Task> {
        match self.sender.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) | Err(TrySendError::Disconnected(task)) => Err(task),
        }
    }

    fn poll(&self) -> Option<Task> {
        self.receiver.try_recv().ok()
    }

    fn take(&self, deadline: Option<Instant>, seen: u64) -> Option<Task> {
        // Register before checking the counter; wake_waiters bumps the
        // counter before reading the waiter count
        self.waiters.fetch_add(1, Ordering::SeqCst);
        let task = if self.wakeups.load(Ordering::SeqCst) != seen {
            self.receiver.try_recv().ok()
        } else {
            let selector = Selector::new()
                .recv(&self.receiver, |task| task.ok())
                .recv(&self.wake_rx, |_| None);
            match deadline {
                Some(deadline) => selector.wait_deadline(deadline).ok().flatten(),
                None => selector.wait(),
            }
        };
        self.waiters.fetch_sub(1, Ordering::SeqCst);
        task
    }

    fn wakeups(&self) -> u64 {
        self.wakeups.load(Ordering::SeqCst)
    }

    fn wake_waiters(&self) {
        self.wakeups.fetch_add(1, Ordering::SeqCst);
        for _ in 0..self.waiters.load(Ordering::SeqCst) {
            // Both ends live in self, so the send cannot fail
            let _ = self.wake_tx.send(());
        }
    }

    fn len(&self) -> usize {
        self.receiver.len()
    }

    fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn drain(&self) -> Vec<Task> {
        self.receiver.drain().collect()
    }
}
