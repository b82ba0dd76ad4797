use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use dynpool_api::{ConfigError, PoolConfig, PoolError, QueueType, TimeUnit};
use parking_lot::{Condvar, Mutex, RwLock};

use super::Task;
use super::worker;
use crate::queue::{self, TaskQueue};
use crate::rejection::RejectedHandler;

/// Lifecycle of a pool. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    /// Accepting and running tasks
    Running,
    /// No new tasks; queued tasks still run
    Shutdown,
    /// No new tasks; queued tasks were handed back to the caller
    Stop,
    /// Every worker has exited
    Terminated,
}

pub(super) struct PoolState {
    pub(super) run_state: RunState,
    pub(super) worker_count: usize,
    largest_pool_size: usize,
    next_worker_id: usize,
}

pub(super) struct PoolInner {
    name: String,
    pub(super) settings: RwLock<PoolConfig>,
    pub(super) allow_core_timeout: AtomicBool,
    pub(super) queue: Arc<dyn TaskQueue>,
    handler: RwLock<Arc<dyn RejectedHandler>>,
    pub(super) state: Mutex<PoolState>,
    terminated: Condvar,
    pub(super) active_count: AtomicUsize,
    pub(super) completed_tasks: AtomicU64,
}

/// A named pool of worker threads fed by a [`TaskQueue`].
///
/// Submission follows the classic bounded-pool algorithm:
/// 1. fewer than `core_pool_size` workers: start a worker with the task
/// 2. otherwise offer the task to the queue
/// 3. queue refused: start a worker if below `maximum_pool_size`
/// 4. otherwise hand the task to the rejection handler
///
/// Handles are cheap to clone and all clones drive the same pool. Sizes,
/// keep-alive, the rejection handler and (for resizable queues) the queue
/// capacity can be changed while the pool runs.
#[derive(Clone)]
pub struct ThreadPoolExecutor {
    pub(super) inner: Arc<PoolInner>,
}

impl ThreadPoolExecutor {
    /// Builds a pool from a validated configuration. No worker is started
    /// until the first submission (see [`Self::prestart_core_threads`]).
    pub fn new(config: PoolConfig, handler: Arc<dyn RejectedHandler>) -> Result<Self, PoolError> {
        config.validate()?;
        let queue = queue::build_queue(&config);
        Self::with_queue(config, queue, handler)
    }

    /// Builds a pool around an existing queue. The queue type recorded in
    /// the configuration is taken from the queue itself.
    pub fn with_queue(
        mut config: PoolConfig,
        queue: Arc<dyn TaskQueue>,
        handler: Arc<dyn RejectedHandler>,
    ) -> Result<Self, PoolError> {
        config.queue_type = queue.queue_type();
        config.rejected_policy = handler.name().to_string();
        config.validate()?;

        let inner = PoolInner {
            name: config.pool_name.clone(),
            settings: RwLock::new(config),
            allow_core_timeout: AtomicBool::new(false),
            queue,
            handler: RwLock::new(handler),
            state: Mutex::new(PoolState {
                run_state: RunState::Running,
                worker_count: 0,
                largest_pool_size: 0,
                next_worker_id: 0,
            }),
            terminated: Condvar::new(),
            active_count: AtomicUsize::new(0),
            completed_tasks: AtomicU64::new(0),
        };
        let pool = Self { inner: Arc::new(inner) };
        crate::log_pool!(pool.name(), "created", queue_type = %pool.queue_type());
        Ok(pool)
    }

    // --- Submission ---

    pub fn execute<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute_task(Task::new(job))
    }

    /// Submits a task. Only the rejection handler can turn a refused
    /// submission into an error; a discarding policy returns `Ok`.
    pub fn execute_task(&self, task: Task) -> Result<(), PoolError> {
        match self.admit(task)? {
            None => Ok(()),
            Some(refused) => self.reject(refused),
        }
    }

    /// Accepts a task moved over from another pool. Unlike
    /// [`Self::execute_task`] the rejection handler is never consulted: a
    /// task the pool has no room for is handed back as `Ok(Some(task))`.
    pub fn migrate_task(&self, task: Task) -> Result<Option<Task>, PoolError> {
        self.admit(task)
    }

    /// Runs the submission steps up to, but not including, the rejection
    /// handler. Returns the task when no worker or queue slot takes it.
    fn admit(&self, task: Task) -> Result<Option<Task>, PoolError> {
        let (core, max) = {
            let settings = self.inner.settings.read();
            (settings.core_pool_size, settings.maximum_pool_size)
        };

        // A delayed task has to wait out its delay inside the queue
        if self.inner.queue.queue_type() == QueueType::Delay {
            return self.enqueue_delayed(task, core);
        }

        if let Some(id) = self.reserve_worker(core) {
            self.spawn_worker(id, Some(task))?;
            return Ok(None);
        }

        let task = match self.offer_while_running(task, 1) {
            Ok(worker) => {
                if let Some(id) = worker {
                    self.spawn_worker(id, None)?;
                }
                return Ok(None);
            }
            Err(refused) => refused,
        };

        if let Some(id) = self.reserve_worker(max) {
            self.spawn_worker(id, Some(task))?;
            return Ok(None);
        }
        Ok(Some(task))
    }

    fn enqueue_delayed(&self, task: Task, core: usize) -> Result<Option<Task>, PoolError> {
        match self.offer_while_running(task, core.max(1)) {
            Ok(Some(id)) => self.spawn_worker(id, None).map(|()| None),
            Ok(None) => Ok(None),
            Err(refused) => Ok(Some(refused)),
        }
    }

    /// Queues `task` if the pool is running. The run-state check and the
    /// offer happen under the state lock, so shutdown either sees the queued
    /// task or the submission sees the shutdown. On success, claims a worker
    /// slot when fewer than `min_workers` are alive.
    fn offer_while_running(&self, task: Task, min_workers: usize) -> Result<Option<usize>, Task> {
        let mut state = self.inner.state.lock();
        if state.run_state != RunState::Running {
            return Err(task);
        }
        self.inner.queue.offer(task)?;
        if state.worker_count < min_workers {
            Ok(Some(Self::claim_slot(&mut state)))
        } else {
            Ok(None)
        }
    }

    fn reject(&self, task: Task) -> Result<(), PoolError> {
        let handler = self.inner.handler.read().clone();
        handler.rejected(task, self).map_err(PoolError::from)
    }

    /// Claims a worker slot if the pool is running and below `bound`.
    fn reserve_worker(&self, bound: usize) -> Option<usize> {
        let mut state = self.inner.state.lock();
        if state.run_state != RunState::Running || state.worker_count >= bound {
            return None;
        }
        Some(Self::claim_slot(&mut state))
    }

    fn claim_slot(state: &mut PoolState) -> usize {
        state.worker_count += 1;
        state.largest_pool_size = state.largest_pool_size.max(state.worker_count);
        state.next_worker_id += 1;
        state.next_worker_id
    }

    fn spawn_worker(&self, id: usize, first: Option<Task>) -> Result<(), PoolError> {
        let pool = self.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-worker-{}", self.inner.name, id))
            .spawn(move || worker::run(pool, id, first));

        match spawned {
            Ok(_) => Ok(()),
            Err(e) => {
                let mut state = self.inner.state.lock();
                state.worker_count -= 1;
                self.try_terminate(&mut state);
                Err(PoolError::ThreadSpawn {
                    pool: self.inner.name.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Called by a worker whose slot has already been released.
    pub(super) fn on_worker_exit(&self, id: usize) {
        let replacement = {
            let mut state = self.inner.state.lock();
            crate::log_worker!(self.name(), id, "exited", remaining = state.worker_count);
            self.try_terminate(&mut state);
            // Never strand queued work without a worker
            if state.run_state == RunState::Running
                && state.worker_count == 0
                && !self.inner.queue.is_empty()
            {
                Some(Self::claim_slot(&mut state))
            } else {
                None
            }
        };
        if let Some(id) = replacement {
            if let Err(e) = self.spawn_worker(id, None) {
                crate::log_error!(e, pool = %self.name(), operation = "replace_worker");
            }
        }
    }

    fn try_terminate(&self, state: &mut PoolState) {
        let drained = state.run_state == RunState::Stop || self.inner.queue.is_empty();
        if state.run_state >= RunState::Shutdown
            && state.run_state != RunState::Terminated
            && state.worker_count == 0
            && drained
        {
            state.run_state = RunState::Terminated;
            self.inner.terminated.notify_all();
            crate::log_pool!(self.name(), "terminated");
        }
    }

    // --- Live reconfiguration ---

    /// Changes the core size. Growing starts workers for tasks already
    /// waiting in the queue; shrinking lets surplus workers retire once idle
    /// for the keep-alive time.
    pub fn set_core_pool_size(&self, core_pool_size: usize) -> Result<(), PoolError> {
        let grown = {
            let mut settings = self.inner.settings.write();
            if core_pool_size > settings.maximum_pool_size {
                return Err(ConfigError::InvalidPoolSize {
                    pool: self.inner.name.clone(),
                    core: core_pool_size,
                    maximum: settings.maximum_pool_size,
                }
                .into());
            }
            let previous = settings.core_pool_size;
            settings.core_pool_size = core_pool_size;
            core_pool_size.saturating_sub(previous)
        };
        if grown == 0 {
            self.wake_idle_workers();
        }

        for _ in 0..grown.min(self.inner.queue.len()) {
            match self.reserve_worker(core_pool_size) {
                Some(id) => self.spawn_worker(id, None)?,
                None => break,
            }
        }
        crate::log_pool!(self.name(), "core_pool_size_changed", core_pool_size);
        Ok(())
    }

    /// Changes the maximum size. Idle workers above the new bound retire
    /// right away, busy ones once their current task is done.
    pub fn set_maximum_pool_size(&self, maximum_pool_size: usize) -> Result<(), PoolError> {
        let mut settings = self.inner.settings.write();
        if maximum_pool_size == 0 || maximum_pool_size < settings.core_pool_size {
            return Err(ConfigError::InvalidPoolSize {
                pool: self.inner.name.clone(),
                core: settings.core_pool_size,
                maximum: maximum_pool_size,
            }
            .into());
        }
        settings.maximum_pool_size = maximum_pool_size;
        drop(settings);
        self.wake_idle_workers();
        crate::log_pool!(self.name(), "maximum_pool_size_changed", maximum_pool_size);
        Ok(())
    }

    pub fn set_keep_alive_time(&self, amount: u64, unit: TimeUnit) {
        let mut settings = self.inner.settings.write();
        settings.keep_alive_time = amount;
        settings.time_unit = unit;
        drop(settings);
        self.wake_idle_workers();
    }

    /// Lets core workers retire after the keep-alive time as well.
    pub fn allow_core_thread_timeout(&self, allow: bool) {
        self.inner.allow_core_timeout.store(allow, Ordering::Release);
        if allow {
            self.wake_idle_workers();
        }
    }

    pub fn allows_core_thread_timeout(&self) -> bool {
        self.inner.allow_core_timeout.load(Ordering::Acquire)
    }

    /// Only resizable queues accept a new capacity.
    pub fn set_queue_capacity(&self, capacity: usize) -> Result<(), PoolError> {
        self.inner.queue.set_capacity(capacity)?;
        self.inner.settings.write().capacity = capacity;
        crate::log_pool!(self.name(), "queue_capacity_changed", capacity);
        Ok(())
    }

    pub fn set_rejected_handler(&self, handler: Arc<dyn RejectedHandler>) {
        let policy = handler.name().to_string();
        *self.inner.handler.write() = handler;
        self.inner.settings.write().rejected_policy = policy.clone();
        crate::log_pool!(self.name(), "rejected_policy_changed", policy = %policy);
    }

    pub fn set_contact(&self, contact: Option<String>) {
        self.inner.settings.write().contact = contact;
    }

    /// Makes idle workers re-check whether they should retire.
    fn wake_idle_workers(&self) {
        self.inner.queue.wake_waiters();
    }

    /// Starts every missing core worker. Returns how many were started.
    pub fn prestart_core_threads(&self) -> Result<usize, PoolError> {
        let core = self.core_pool_size();
        let mut started = 0;
        while let Some(id) = self.reserve_worker(core) {
            self.spawn_worker(id, None)?;
            started += 1;
        }
        Ok(started)
    }

    // --- Lifecycle ---

    /// Stops accepting tasks. Already queued tasks still run.
    pub fn shutdown(&self) {
        let drain_worker = {
            let mut state = self.inner.state.lock();
            if state.run_state != RunState::Running {
                return;
            }
            state.run_state = RunState::Shutdown;
            crate::log_pool!(self.name(), "shutdown", queued = self.inner.queue.len());
            if state.worker_count == 0 && !self.inner.queue.is_empty() {
                Some(Self::claim_slot(&mut state))
            } else {
                self.try_terminate(&mut state);
                None
            }
        };
        self.wake_idle_workers();
        if let Some(id) = drain_worker {
            if let Err(e) = self.spawn_worker(id, None) {
                crate::log_error!(e, pool = %self.name(), operation = "drain_on_shutdown");
            }
        }
    }

    /// Stops accepting tasks and hands back everything still queued.
    /// Running tasks are left to finish.
    pub fn shutdown_now(&self) -> Vec<Task> {
        let pending = {
            let mut state = self.inner.state.lock();
            if state.run_state < RunState::Stop {
                state.run_state = RunState::Stop;
            }
            let pending = self.inner.queue.drain();
            crate::log_pool!(self.name(), "shutdown_now", returned = pending.len());
            self.try_terminate(&mut state);
            pending
        };
        self.wake_idle_workers();
        pending
    }

    /// Waits until every worker has exited. Returns `false` on timeout.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        while state.run_state != RunState::Terminated {
            if self.inner.terminated.wait_until(&mut state, deadline).timed_out() {
                return state.run_state == RunState::Terminated;
            }
        }
        true
    }

    pub fn run_state(&self) -> RunState {
        self.inner.state.lock().run_state
    }

    pub fn is_running(&self) -> bool {
        self.run_state() == RunState::Running
    }

    pub fn is_shutdown(&self) -> bool {
        self.run_state() != RunState::Running
    }

    /// Shut down but with workers still alive.
    pub fn is_terminating(&self) -> bool {
        matches!(self.run_state(), RunState::Shutdown | RunState::Stop)
    }

    pub fn is_terminated(&self) -> bool {
        self.run_state() == RunState::Terminated
    }

    /// Removes every queued task without running it.
    pub fn drain_queue(&self) -> Vec<Task> {
        self.inner.queue.drain()
    }

    // --- Introspection ---

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether both handles drive the same pool.
    pub fn ptr_eq(&self, other: &ThreadPoolExecutor) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Current configuration, including every live change applied so far.
    pub fn config(&self) -> PoolConfig {
        self.inner.settings.read().clone()
    }

    pub fn queue(&self) -> &Arc<dyn TaskQueue> {
        &self.inner.queue
    }

    pub fn queue_type(&self) -> QueueType {
        self.inner.queue.queue_type()
    }

    pub fn rejected_handler(&self) -> Arc<dyn RejectedHandler> {
        self.inner.handler.read().clone()
    }

    pub fn rejected_policy(&self) -> String {
        self.inner.settings.read().rejected_policy.clone()
    }

    pub fn contact(&self) -> Option<String> {
        self.inner.settings.read().contact.clone()
    }

    pub fn core_pool_size(&self) -> usize {
        self.inner.settings.read().core_pool_size
    }

    pub fn maximum_pool_size(&self) -> usize {
        self.inner.settings.read().maximum_pool_size
    }

    pub fn keep_alive(&self) -> Duration {
        self.inner.settings.read().keep_alive()
    }

    /// Live workers.
    pub fn pool_size(&self) -> usize {
        self.inner.state.lock().worker_count
    }

    /// Workers currently running a task.
    pub fn active_count(&self) -> usize {
        self.inner.active_count.load(Ordering::Acquire)
    }

    pub fn largest_pool_size(&self) -> usize {
        self.inner.state.lock().largest_pool_size
    }

    pub fn completed_task_count(&self) -> u64 {
        self.inner.completed_tasks.load(Ordering::Acquire)
    }

    /// Tasks ever accepted: completed, running and queued (approximate while
    /// the pool is busy).
    pub fn task_count(&self) -> u64 {
        self.completed_task_count() + self.active_count() as u64 + self.inner.queue.len() as u64
    }
}

impl fmt::Debug for ThreadPoolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPoolExecutor")
            .field("name", &self.inner.name)
            .field("run_state", &self.run_state())
            .field("pool_size", &self.pool_size())
            .field("active_count", &self.active_count())
            .field("queue", &self.inner.queue)
            .finish()
    }
}
