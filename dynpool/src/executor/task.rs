use std::fmt;
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A unit of work submitted to a pool.
///
/// Plain FIFO queues ignore `priority` and `delay`. The priority queue hands
/// out higher priorities first, and the delay queue keeps a task invisible
/// until its delay has expired.
pub struct Task {
    job: Job,
    priority: i32,
    ready_at: Instant,
}

impl Task {
    pub fn new<F>(job: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            job: Box::new(job),
            priority: 0,
            ready_at: Instant::now(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Delay measured from now, not from task construction.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.ready_at = Instant::now() + delay;
        self
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn ready_at(&self) -> Instant {
        self.ready_at
    }

    /// Time left before the task may run, zero once it is ready.
    pub fn remaining_delay(&self) -> Duration {
        self.ready_at.saturating_duration_since(Instant::now())
    }

    pub fn run(self) {
        (self.job)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("priority", &self.priority)
            .field("remaining_delay", &self.remaining_delay())
            .finish()
    }
}
