// Dynpool Runtime
//
// Named worker pools whose sizing, queueing and rejection behaviour can be
// changed while they run, driven by periodically refreshed configuration.
//
// Module overview:
// - executor: the worker-pool executor and its tasks
// - queue: pending-task buffers, one per queue type
// - rejection: rejection policies, the tracking decorator and counters
// - registry: name to pool map
// - factory: pool construction and in-place reconfiguration
// - refresh: periodic poll-and-publish of external configuration
// - reconcile: applies published configuration to the registry
// - monitor: operator-facing snapshots
// - manager: owner of all of the above
// - logging: tracing setup and logging macros

pub mod executor;
pub mod factory;
pub mod logging;
pub mod manager;
pub mod monitor;
pub mod queue;
pub mod reconcile;
pub mod refresh;
pub mod registry;
pub mod rejection;

// Re-export commonly used types
pub use dynpool_api::*;
pub use executor::{RunState, Task, ThreadPoolExecutor};
pub use factory::{ApplyOutcome, PoolFactory};
pub use manager::DynamicPoolManager;
pub use queue::TaskQueue;
pub use reconcile::{PoolReconciler, ReconcileReport};
pub use refresh::{ConfigRefreshListener, JsonFileConfigSource, MemoryConfigSource, RefreshOptions};
pub use registry::PoolRegistry;
pub use rejection::{
    AbortPolicy, CallerRunsPolicy, DiscardOldestPolicy, DiscardPolicy, PolicyRegistry, RejectedHandler,
    RejectionTracker, TrackingRejectedHandler,
};
