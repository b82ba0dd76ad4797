//! # Error Types
//!
//! Errors shared by the configuration model and the pool runtime.
//!
//! - `ConfigError`: a malformed or inconsistent pool definition. Raised when a
//!   pool is created or reconfigured, never deferred to task submission.
//! - `RejectedError`: raised to a submitting caller by the abort policy.
//! - `PoolError`: everything a pool operation can surface to its caller,
//!   including lookup misses in the registry.
//! - `SourceError`: a configuration source could not be read. Contained by the
//!   refresh loop and never propagated to pool operations.

use thiserror::Error;

use crate::config::QueueType;

/// A pool definition that cannot be turned into a working pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Pool name must not be empty")]
    EmptyPoolName,

    #[error("Invalid pool sizes for {pool}: core {core}, maximum {maximum}")]
    InvalidPoolSize {
        pool: String,
        core: usize,
        maximum: usize,
    },

    #[error("Queue {queue_type} of pool {pool} requires a positive capacity")]
    ZeroCapacity { pool: String, queue_type: QueueType },

    #[error("Queue {0} does not support capacity changes")]
    CapacityNotAdjustable(QueueType),

    #[error("Unknown queue type: {0}")]
    UnknownQueueType(String),

    #[error("Unknown time unit: {0}")]
    UnknownTimeUnit(String),

    #[error("Unknown rejected policy: {0}")]
    UnknownRejectedPolicy(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Duplicate pool name: {0}")]
    DuplicatePool(String),
}

/// Raised by the abort policy when a pool can accept neither a new worker
/// nor a queued task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Task rejected from pool {pool} (pool size {pool_size}, active {active_count}, queued {queue_size})")]
pub struct RejectedError {
    pub pool: String,
    pub pool_size: usize,
    pub active_count: usize,
    pub queue_size: usize,
}

/// Errors surfaced by pool and registry operations.
#[derive(Error, Debug)]
pub enum PoolError {
    /// The registry has no pool under this name. Callers are expected to
    /// only ask for names that came from configuration.
    #[error("Pool not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Rejected(#[from] RejectedError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to spawn worker thread for pool {pool}: {reason}")]
    ThreadSpawn { pool: String, reason: String },
}

/// Failure to read from an external configuration source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Configuration source {name} is unavailable: {reason}")]
    Unavailable { name: String, reason: String },

    #[error("Malformed configuration from {name}: {reason}")]
    Malformed { name: String, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
