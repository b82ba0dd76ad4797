//! # Worker Thread Body
//!
//! Every worker runs the same loop:
//! 1. Run the first task it was started with, if any
//! 2. Pull the next task from the pool's queue
//! 3. Retire when the pool shuts down, when the pool has more workers than
//!    allowed, or when a surplus worker stayed idle for the keep-alive time
//!
//! A retiring worker gives its slot back under the pool state lock before
//! leaving the loop, so concurrent retirements can never take the pool below
//! its core size. Panicking tasks are caught and logged; the worker survives.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::time::Instant;

use super::pool::RunState;
use super::{Task, ThreadPoolExecutor};

pub(super) fn run(pool: ThreadPoolExecutor, id: usize, first: Option<Task>) {
    crate::log_worker!(pool.name(), id, "started");

    let mut next = first;
    loop {
        let task = match next.take() {
            Some(task) => task,
            None => match next_task(&pool) {
                Some(task) => task,
                None => break,
            },
        };
        run_task(&pool, id, task);
    }

    pool.on_worker_exit(id);
}

/// Blocks until a task is available, or releases the worker's slot and
/// returns `None` when the worker should retire.
///
/// Untimed waits have no timeout; the pool wakes waiters through the queue
/// whenever the retirement conditions below may have changed.
fn next_task(pool: &ThreadPoolExecutor) -> Option<Task> {
    let inner = &pool.inner;
    let idle_since = Instant::now();

    loop {
        let seen = inner.queue.wakeups();
        let (core, max, keep_alive) = {
            let settings = inner.settings.read();
            (settings.core_pool_size, settings.maximum_pool_size, settings.keep_alive())
        };

        let deadline = {
            let mut state = inner.state.lock();
            let queue_empty = inner.queue.is_empty();

            if state.run_state >= RunState::Stop
                || (state.run_state >= RunState::Shutdown && queue_empty)
            {
                state.worker_count -= 1;
                return None;
            }

            let workers = state.worker_count;
            let timed = inner.allow_core_timeout.load(Ordering::Acquire) || workers > core;
            let timed_out = timed && idle_since.elapsed() >= keep_alive;

            if (workers > max || timed_out) && (workers > 1 || queue_empty) {
                state.worker_count -= 1;
                return None;
            }

            // The last worker stays for queued work even past its keep-alive
            (timed && !timed_out).then(|| idle_since + keep_alive)
        };

        if let Some(task) = inner.queue.take(deadline, seen) {
            release_drain_waiters(pool);
            return Some(task);
        }
    }
}

/// During shutdown nothing refills the queue, so whoever takes the last task
/// wakes the workers still waiting for one and lets them retire.
fn release_drain_waiters(pool: &ThreadPoolExecutor) {
    let inner = &pool.inner;
    if inner.queue.is_empty() && inner.state.lock().run_state >= RunState::Shutdown {
        inner.queue.wake_waiters();
    }
}

fn run_task(pool: &ThreadPoolExecutor, id: usize, task: Task) {
    let inner = &pool.inner;
    inner.active_count.fetch_add(1, Ordering::AcqRel);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.run()));
    inner.active_count.fetch_sub(1, Ordering::AcqRel);
    inner.completed_tasks.fetch_add(1, Ordering::AcqRel);

    if let Err(payload) = outcome {
        tracing::error!(
            pool = %pool.name(),
            worker = id,
            panic = %panic_message(&*payload),
            "Task panicked"
        );
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
