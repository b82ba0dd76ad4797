//! # Dynamic Pool Manager
//!
//! Owns every collaborator of the pool runtime and wires them together.
//! There is no global state: each manager has its own pools, counters and
//! policy table, so independent managers (e.g. one per test) never interfere.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use dynpool::refresh::{JsonFileConfigSource, RefreshOptions};
//! use dynpool::{DynamicPoolManager, PoolConfig, QueueType};
//!
//! let manager = DynamicPoolManager::new();
//! manager.init(&[PoolConfig::named("io").with_sizes(2, 8).with_queue(QueueType::BoundedArray, 100)])?;
//! manager.execute("io", || println!("hello from io"))?;
//!
//! let source = Arc::new(JsonFileConfigSource::new("pools.json"));
//! manager.watch(source, RefreshOptions::default())?;
//!
//! manager.shutdown_and_wait(Duration::from_secs(5));
//! # Ok::<(), dynpool::PoolError>(())
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dynpool_api::{bind_pool_configs, ConfigError, ConfigSource, PoolConfig, PoolError, PoolSnapshot};
use parking_lot::Mutex;

use crate::executor::ThreadPoolExecutor;
use crate::factory::PoolFactory;
use crate::monitor;
use crate::reconcile::PoolReconciler;
use crate::refresh::{ConfigRefreshListener, RefreshOptions};
use crate::registry::PoolRegistry;
use crate::rejection::{PolicyRegistry, RejectionTracker};

pub struct DynamicPoolManager {
    registry: Arc<PoolRegistry>,
    tracker: Arc<RejectionTracker>,
    factory: PoolFactory,
    watchers: Mutex<Vec<ConfigRefreshListener>>,
}

impl DynamicPoolManager {
    /// A manager with only the built-in rejection policies.
    pub fn new() -> Self {
        Self::with_policies(Arc::new(PolicyRegistry::new()))
    }

    /// A manager resolving policy names through `policies`. Custom policies
    /// must be registered before the pools naming them are created.
    pub fn with_policies(policies: Arc<PolicyRegistry>) -> Self {
        let tracker = Arc::new(RejectionTracker::new());
        Self {
            registry: Arc::new(PoolRegistry::new()),
            factory: PoolFactory::new(policies, Arc::clone(&tracker)),
            tracker,
            watchers: Mutex::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> &Arc<PoolRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &Arc<RejectionTracker> {
        &self.tracker
    }

    pub fn policies(&self) -> &Arc<PolicyRegistry> {
        self.factory.policies()
    }

    pub fn factory(&self) -> &PoolFactory {
        &self.factory
    }

    /// Creates and registers every configured pool.
    ///
    /// All configurations are checked and built before any is registered, so
    /// one bad entry registers nothing. Names that are already registered
    /// keep their existing pool. Returns how many pools were registered.
    pub fn init(&self, configs: &[PoolConfig]) -> Result<usize, PoolError> {
        let mut seen = BTreeSet::new();
        for config in configs {
            if !seen.insert(config.pool_name.as_str()) {
                return Err(ConfigError::DuplicatePool(config.pool_name.clone()).into());
            }
        }

        let pools = configs
            .iter()
            .map(|config| self.factory.create(config))
            .collect::<Result<Vec<_>, _>>()?;

        let mut registered = 0;
        for pool in pools {
            if self.registry.register(pool.name().to_string(), pool.clone()) {
                registered += 1;
            } else {
                pool.shutdown();
            }
        }
        tracing::info!(configured = configs.len(), registered, "Pools initialized");
        Ok(registered)
    }

    /// Binds `<namespace>.executors[i].*` entries of `properties` and
    /// initializes the resulting pools.
    pub fn init_from_properties(
        &self,
        namespace: &str,
        properties: &BTreeMap<String, String>,
    ) -> Result<usize, PoolError> {
        let configs = bind_pool_configs(namespace, properties)?;
        self.init(&configs)
    }

    /// Creates and registers one pool. If the name is taken, the registered
    /// pool is returned instead.
    pub fn create_pool(&self, config: &PoolConfig) -> Result<ThreadPoolExecutor, PoolError> {
        let pool = self.factory.create(config)?;
        if self.registry.register(config.pool_name.clone(), pool.clone()) {
            return Ok(pool);
        }
        pool.shutdown();
        self.registry.get(&config.pool_name)
    }

    pub fn pool(&self, name: &str) -> Result<ThreadPoolExecutor, PoolError> {
        self.registry.get(name)
    }

    /// Submits `job` to the pool registered under `name`.
    pub fn execute<F>(&self, name: &str, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.registry.get(name)?.execute(job)
    }

    pub fn snapshot(&self, name: &str) -> Result<PoolSnapshot, PoolError> {
        let pool = self.registry.get(name)?;
        Ok(monitor::snapshot(&pool, &self.tracker))
    }

    pub fn snapshots(&self) -> Vec<PoolSnapshot> {
        monitor::snapshots(&self.registry, &self.tracker)
    }

    /// A reconciler acting on this manager's pools.
    pub fn reconciler(&self) -> PoolReconciler {
        PoolReconciler::new(Arc::clone(&self.registry), self.factory.clone())
    }

    /// Starts refreshing from `source`, reconciling the pools on every tick.
    pub fn watch(&self, source: Arc<dyn ConfigSource>, options: RefreshOptions) -> Result<(), PoolError> {
        let listener = ConfigRefreshListener::new(source, options);
        listener.add_listener(Arc::new(self.reconciler()));
        listener.start()?;
        self.watchers.lock().push(listener);
        Ok(())
    }

    /// Stops every refresh loop started by [`Self::watch`].
    pub fn stop_watching(&self) {
        let watchers = std::mem::take(&mut *self.watchers.lock());
        for watcher in &watchers {
            watcher.stop();
        }
    }

    /// Stops refreshing, shuts every pool down and forgets pools and
    /// rejection counts. Queued tasks still run.
    pub fn shutdown(&self) {
        self.shutdown_pools();
    }

    /// Like [`Self::shutdown`], then waits up to `timeout` for all workers
    /// to exit. Returns `false` if some pool was still busy.
    pub fn shutdown_and_wait(&self, timeout: Duration) -> bool {
        let pools = self.shutdown_pools();
        let deadline = Instant::now() + timeout;
        pools
            .iter()
            .all(|pool| pool.await_termination(deadline.saturating_duration_since(Instant::now())))
    }

    fn shutdown_pools(&self) -> Vec<ThreadPoolExecutor> {
        self.stop_watching();
        let pools = self.registry.pools();
        for pool in &pools {
            pool.shutdown();
        }
        self.registry.clear();
        self.tracker.clear();
        if !pools.is_empty() {
            tracing::info!(pools = pools.len(), "Pool manager shut down");
        }
        pools
    }
}

impl Default for DynamicPoolManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DynamicPoolManager {
    fn drop(&mut self) {
        self.shutdown_pools();
    }
}

impl fmt::Debug for DynamicPoolManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicPoolManager")
            .field("pools", &self.registry.names())
            .field("policies", self.factory.policies())
            .field("watchers", &self.watchers.lock().len())
            .finish()
    }
}
