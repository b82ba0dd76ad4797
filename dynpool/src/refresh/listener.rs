use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use dynpool_api::{
    namespace_properties, ConfigChangeEvent, ConfigChangeListener, ConfigError, ConfigSource, PoolError,
    DEFAULT_NAMESPACE,
};
use flume::{RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};

use crate::executor::panic_message;

/// Name of the scheduler thread.
pub const REFRESH_THREAD_NAME: &str = "dynpool-config-refresh";

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Schedule and namespace of a refresh loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Only keys under this prefix are published.
    pub namespace: String,
    /// Wait before the first tick.
    pub initial_delay: Duration,
    /// Fixed rate between tick starts.
    pub interval: Duration,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            initial_delay: DEFAULT_INITIAL_DELAY,
            interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

impl RefreshOptions {
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

struct RefreshCore {
    source: Arc<dyn ConfigSource>,
    options: RefreshOptions,
    listeners: RwLock<Vec<Arc<dyn ConfigChangeListener>>>,
    ticks: AtomicU64,
    published: AtomicU64,
    failures: AtomicU64,
}

impl RefreshCore {
    /// One poll-and-publish round. Returns whether an event was published.
    fn tick(&self) -> bool {
        let tick = self.ticks.fetch_add(1, Ordering::AcqRel) + 1;
        let source = self.source.name();

        let fetched = panic::catch_unwind(AssertUnwindSafe(|| self.source.fetch()));
        let properties = match fetched {
            Ok(Ok(properties)) => properties,
            Ok(Err(e)) => {
                self.failures.fetch_add(1, Ordering::AcqRel);
                crate::log_error!(e, source = %source, tick, operation = "refresh_fetch");
                return false;
            }
            Err(payload) => {
                self.failures.fetch_add(1, Ordering::AcqRel);
                tracing::error!(
                    source = %source,
                    tick,
                    panic = %panic_message(&*payload),
                    "Configuration fetch panicked"
                );
                return false;
            }
        };

        let namespace = &self.options.namespace;
        let event = ConfigChangeEvent::new(namespace.clone(), namespace_properties(namespace, &properties));
        crate::log_refresh!(source, "fetched", tick, event_id = %event.id, properties = event.properties.len());

        self.publish(&event);
        self.published.fetch_add(1, Ordering::AcqRel);
        true
    }

    fn publish(&self, event: &ConfigChangeEvent) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener.on_change(event))) {
                tracing::error!(
                    event_id = %event.id,
                    panic = %panic_message(&*payload),
                    "Configuration listener panicked"
                );
            }
        }
    }
}

struct Scheduler {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Polls a [`ConfigSource`] at a fixed rate and publishes what it finds
/// under the namespace to every registered [`ConfigChangeListener`].
///
/// A failing or panicking fetch is logged and the tick publishes nothing;
/// the next tick runs as scheduled. Listeners run on the refresh thread, one
/// after another, and a panicking listener does not stop the others.
///
/// `stop` interrupts the pending wait and joins the thread. Dropping the
/// listener stops it as well.
pub struct ConfigRefreshListener {
    core: Arc<RefreshCore>,
    scheduler: Mutex<Option<Scheduler>>,
}

impl ConfigRefreshListener {
    pub fn new(source: Arc<dyn ConfigSource>, options: RefreshOptions) -> Self {
        Self {
            core: Arc::new(RefreshCore {
                source,
                options,
                listeners: RwLock::new(Vec::new()),
                ticks: AtomicU64::new(0),
                published: AtomicU64::new(0),
                failures: AtomicU64::new(0),
            }),
            scheduler: Mutex::new(None),
        }
    }

    /// Listeners added while running receive events from the next tick on.
    pub fn add_listener(&self, listener: Arc<dyn ConfigChangeListener>) {
        self.core.listeners.write().push(listener);
    }

    pub fn options(&self) -> &RefreshOptions {
        &self.core.options
    }

    /// Starts the scheduler thread. Starting a running listener does nothing.
    pub fn start(&self) -> Result<(), PoolError> {
        let interval = self.core.options.interval;
        if interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "interval".to_string(),
                value: format!("{interval:?}"),
            }
            .into());
        }

        let mut scheduler = self.scheduler.lock();
        if scheduler.is_some() {
            return Ok(());
        }

        let (stop_tx, stop_rx) = flume::bounded::<()>(1);
        let core = Arc::clone(&self.core);
        let handle = thread::Builder::new()
            .name(REFRESH_THREAD_NAME.to_string())
            .spawn(move || {
                let mut next = Instant::now() + core.options.initial_delay;
                loop {
                    match stop_rx.recv_deadline(next) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    core.tick();

                    next += core.options.interval;
                    let now = Instant::now();
                    // Skip the ticks a slow fetch ran over
                    while next < now {
                        next += core.options.interval;
                    }
                }
                crate::log_refresh!(core.source.name(), "stopped");
            })
            .map_err(|e| PoolError::ThreadSpawn {
                pool: REFRESH_THREAD_NAME.to_string(),
                reason: e.to_string(),
            })?;

        crate::log_refresh!(
            self.core.source.name(),
            "started",
            namespace = %self.core.options.namespace,
            interval_ms = interval.as_millis() as u64
        );
        *scheduler = Some(Scheduler { stop_tx, handle });
        Ok(())
    }

    /// Cancels the pending tick and waits for a running one to finish.
    pub fn stop(&self) {
        let Some(scheduler) = self.scheduler.lock().take() else {
            return;
        };
        let _ = scheduler.stop_tx.send(());
        // A listener may stop its own refresh loop; never join ourselves
        if scheduler.handle.thread().id() != thread::current().id() {
            if scheduler.handle.join().is_err() {
                tracing::error!(source = %self.core.source.name(), "Refresh thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.lock().is_some()
    }

    /// Runs one tick on the calling thread.
    pub fn refresh_once(&self) -> bool {
        self.core.tick()
    }

    /// Ticks run so far, failed ones included.
    pub fn tick_count(&self) -> u64 {
        self.core.ticks.load(Ordering::Acquire)
    }

    pub fn published_count(&self) -> u64 {
        self.core.published.load(Ordering::Acquire)
    }

    pub fn failure_count(&self) -> u64 {
        self.core.failures.load(Ordering::Acquire)
    }
}

impl Drop for ConfigRefreshListener {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for ConfigRefreshListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigRefreshListener")
            .field("source", &self.core.source)
            .field("options", &self.core.options)
            .field("running", &self.is_running())
            .field("ticks", &self.tick_count())
            .finish()
    }
}
