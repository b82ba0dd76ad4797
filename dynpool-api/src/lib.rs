//! # Dynpool API
//!
//! Data model and seams for dynamically reconfigurable worker pools.
//!
//! This crate holds everything that does not own a thread: the declarative
//! pool description ([`PoolConfig`]), the flat-properties binder that turns
//! external configuration into pool descriptions, the change event published
//! by configuration refreshes, the operator-facing [`PoolSnapshot`], and the
//! error taxonomy shared by the runtime crate.
//!
//! ## Module Organization
//!
//! - [`config`]: Pool configuration, queue types, time units, policy names
//! - [`properties`]: Binding of `key -> value` maps into pool configurations
//! - [`event`]: Configuration sources, change events and listeners
//! - [`snapshot`]: Runtime snapshot model exposed to operators
//! - [`error`]: Error types

pub mod config;
pub mod error;
pub mod event;
pub mod properties;
pub mod snapshot;

pub use config::{PoolConfig, QueueType, RejectedPolicyKind, TimeUnit};
pub use error::{ConfigError, PoolError, RejectedError, SourceError};
pub use event::{ConfigChangeEvent, ConfigChangeListener, ConfigSource};
pub use properties::{bind_pool_configs, namespace_properties, DEFAULT_NAMESPACE};
pub use snapshot::PoolSnapshot;
