//! # Configuration Refresh
//!
//! Periodic poll-and-publish of external pool configuration.
//!
//! ## Key Concepts
//! - [`ConfigRefreshListener`]: one named scheduler thread per source. Each
//!   tick fetches the full property set, keeps the keys under the namespace
//!   and publishes them as a `ConfigChangeEvent`
//! - Sources: [`MemoryConfigSource`] for in-process updates and tests,
//!   [`JsonFileConfigSource`] for a JSON file re-read on every tick
//!
//! Reacting to an event is left to the listeners; see
//! [`crate::reconcile::PoolReconciler`].
//!
//! ## Thread Safety
//! The refresh thread never runs pool tasks. It blocks only on the source's
//! fetch and on the listeners it calls.

mod listener;
mod source;

pub use listener::{
    ConfigRefreshListener, RefreshOptions, DEFAULT_INITIAL_DELAY, DEFAULT_REFRESH_INTERVAL, REFRESH_THREAD_NAME,
};
pub use source::{JsonFileConfigSource, MemoryConfigSource};
