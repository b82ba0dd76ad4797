//! # Pool Configuration
//!
//! Declarative description of one worker pool: sizing, keep-alive, queue
//! discipline and rejection policy. One `PoolConfig` exists per logical pool
//! name and is normally produced by [`crate::properties::bind_pool_configs`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CORE_POOL_SIZE: usize = 1;
pub const DEFAULT_KEEP_ALIVE_TIME: u64 = 60;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
pub const DEFAULT_REJECTED_POLICY: &str = "discard";

/// Default maximum pool size: one worker per available CPU, never zero.
pub fn default_maximum_pool_size() -> usize {
    num_cpus::get().max(1)
}

// --- Queue Types ---

/// Ordering and capacity discipline of a pool's pending-task buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum QueueType {
    /// Fixed-capacity FIFO buffer.
    BoundedArray,
    /// Fixed-capacity FIFO buffer. Same guarantees as `BoundedArray`.
    #[default]
    BoundedLinked,
    /// Unbounded, highest priority first, FIFO among equal priorities.
    Priority,
    /// Unbounded, a task becomes visible once its delay has expired.
    Delay,
    /// Zero-capacity hand-off: a task is only accepted by an idle worker.
    Synchronous,
    /// Unbounded FIFO buffer.
    UnboundedLinked,
    /// FIFO buffer whose capacity can change while the pool is running.
    ResizableLinked,
}

impl QueueType {
    pub const ALL: [QueueType; 7] = [
        QueueType::BoundedArray,
        QueueType::BoundedLinked,
        QueueType::Priority,
        QueueType::Delay,
        QueueType::Synchronous,
        QueueType::UnboundedLinked,
        QueueType::ResizableLinked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueType::BoundedArray => "bounded-array",
            QueueType::BoundedLinked => "bounded-linked",
            QueueType::Priority => "priority",
            QueueType::Delay => "delay",
            QueueType::Synchronous => "synchronous",
            QueueType::UnboundedLinked => "unbounded-linked",
            QueueType::ResizableLinked => "resizable-linked",
        }
    }

    /// Whether the configured capacity bounds this queue.
    pub fn uses_capacity(&self) -> bool {
        matches!(
            self,
            QueueType::BoundedArray | QueueType::BoundedLinked | QueueType::ResizableLinked
        )
    }

    /// Whether tasks leave the queue in submission order.
    pub fn is_fifo(&self) -> bool {
        matches!(
            self,
            QueueType::BoundedArray
                | QueueType::BoundedLinked
                | QueueType::UnboundedLinked
                | QueueType::ResizableLinked
        )
    }
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueType {
    type Err = ConfigError;

    /// Accepts kebab names as well as the blocking-queue class names found in
    /// existing configuration files.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "boundedarray" | "array" | "arrayblockingqueue" => Ok(QueueType::BoundedArray),
            "boundedlinked" | "linked" | "linkedblockingqueue" => Ok(QueueType::BoundedLinked),
            "priority" | "priorityblockingqueue" => Ok(QueueType::Priority),
            "delay" | "delayqueue" => Ok(QueueType::Delay),
            "synchronous" | "synchronousqueue" => Ok(QueueType::Synchronous),
            "unboundedlinked" | "linkedtransferqueue" | "linkedblockingdeque" => {
                Ok(QueueType::UnboundedLinked)
            }
            "resizablelinked" | "resizablecapacitylinkedblockingqueue" => {
                Ok(QueueType::ResizableLinked)
            }
            _ => Err(ConfigError::UnknownQueueType(s.to_string())),
        }
    }
}

impl TryFrom<String> for QueueType {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QueueType> for String {
    fn from(value: QueueType) -> Self {
        value.as_str().to_string()
    }
}

// --- Time Units ---

/// Unit attached to `keep_alive_time`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    #[default]
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    pub fn to_duration(&self, amount: u64) -> Duration {
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(amount),
            TimeUnit::Microseconds => Duration::from_micros(amount),
            TimeUnit::Milliseconds => Duration::from_millis(amount),
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(amount.saturating_mul(3_600)),
            TimeUnit::Days => Duration::from_secs(amount.saturating_mul(86_400)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "NANOSECONDS",
            TimeUnit::Microseconds => "MICROSECONDS",
            TimeUnit::Milliseconds => "MILLISECONDS",
            TimeUnit::Seconds => "SECONDS",
            TimeUnit::Minutes => "MINUTES",
            TimeUnit::Hours => "HOURS",
            TimeUnit::Days => "DAYS",
        }
    }
}

impl FromStr for TimeUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "nanoseconds" | "ns" => Ok(TimeUnit::Nanoseconds),
            "microseconds" | "us" => Ok(TimeUnit::Microseconds),
            "milliseconds" | "ms" => Ok(TimeUnit::Milliseconds),
            "seconds" | "s" => Ok(TimeUnit::Seconds),
            "minutes" | "m" => Ok(TimeUnit::Minutes),
            "hours" | "h" => Ok(TimeUnit::Hours),
            "days" | "d" => Ok(TimeUnit::Days),
            _ => Err(ConfigError::UnknownTimeUnit(s.to_string())),
        }
    }
}

impl TryFrom<String> for TimeUnit {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeUnit> for String {
    fn from(value: TimeUnit) -> Self {
        value.as_str().to_string()
    }
}

// --- Rejected Policies ---

/// Rejection policy named by a pool configuration.
///
/// Built-in names resolve to the four standard behaviours; any other name is
/// looked up in the runtime's policy registry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RejectedPolicyKind {
    /// Raise a rejection error to the submitting caller.
    Abort,
    /// Drop the rejected task silently.
    Discard,
    /// Drop the oldest queued task and retry the submission.
    DiscardOldest,
    /// Run the rejected task on the submitting thread.
    CallerRuns,
    /// A policy registered by name at startup.
    Custom(String),
}

impl RejectedPolicyKind {
    /// Never fails: unrecognized names become `Custom` and are resolved later.
    pub fn from_name(name: &str) -> Self {
        match normalize(name).as_str() {
            "abort" | "abortpolicy" => RejectedPolicyKind::Abort,
            "discard" | "discardpolicy" => RejectedPolicyKind::Discard,
            "discardoldest" | "discardoldestpolicy" => RejectedPolicyKind::DiscardOldest,
            "callerruns" | "callerrunspolicy" => RejectedPolicyKind::CallerRuns,
            _ => RejectedPolicyKind::Custom(name.trim().to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RejectedPolicyKind::Abort => "abort",
            RejectedPolicyKind::Discard => "discard",
            RejectedPolicyKind::DiscardOldest => "discard-oldest",
            RejectedPolicyKind::CallerRuns => "caller-runs",
            RejectedPolicyKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for RejectedPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// --- Pool Configuration ---

/// Configuration for one named worker pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PoolConfig {
    /// Who to notify when this pool starts rejecting work.
    pub contact: Option<String>,

    /// Unique pool name.
    pub pool_name: String,

    /// Workers kept alive even when idle.
    pub core_pool_size: usize,

    /// Upper bound on live workers.
    pub maximum_pool_size: usize,

    /// Idle time after which a non-core worker retires, in `time_unit`.
    pub keep_alive_time: u64,

    pub time_unit: TimeUnit,

    /// Queue capacity. Ignored by queue types that are not bounded.
    pub capacity: usize,

    /// Fair hand-off ordering for synchronous queues.
    pub fair: bool,

    pub queue_type: QueueType,

    /// Policy name, see [`RejectedPolicyKind::from_name`].
    pub rejected_policy: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            contact: None,
            pool_name: String::new(),
            core_pool_size: DEFAULT_CORE_POOL_SIZE,
            maximum_pool_size: default_maximum_pool_size(),
            keep_alive_time: DEFAULT_KEEP_ALIVE_TIME,
            time_unit: TimeUnit::Seconds,
            capacity: DEFAULT_QUEUE_CAPACITY,
            fair: false,
            queue_type: QueueType::BoundedLinked,
            rejected_policy: DEFAULT_REJECTED_POLICY.to_string(),
        }
    }
}

impl PoolConfig {
    /// Default configuration for the given pool name.
    pub fn named(pool_name: impl Into<String>) -> Self {
        Self {
            pool_name: pool_name.into(),
            ..Default::default()
        }
    }

    pub fn with_sizes(mut self, core_pool_size: usize, maximum_pool_size: usize) -> Self {
        self.core_pool_size = core_pool_size;
        self.maximum_pool_size = maximum_pool_size;
        self
    }

    pub fn with_queue(mut self, queue_type: QueueType, capacity: usize) -> Self {
        self.queue_type = queue_type;
        self.capacity = capacity;
        self
    }

    pub fn with_keep_alive(mut self, amount: u64, unit: TimeUnit) -> Self {
        self.keep_alive_time = amount;
        self.time_unit = unit;
        self
    }

    pub fn with_rejected_policy(mut self, policy: impl Into<String>) -> Self {
        self.rejected_policy = policy.into();
        self
    }

    pub fn with_fair(mut self, fair: bool) -> Self {
        self.fair = fair;
        self
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }

    pub fn keep_alive(&self) -> Duration {
        self.time_unit.to_duration(self.keep_alive_time)
    }

    pub fn rejected_policy_kind(&self) -> RejectedPolicyKind {
        RejectedPolicyKind::from_name(&self.rejected_policy)
    }

    /// Capacity the queue is built with, `None` for queues without a bound.
    pub fn effective_capacity(&self) -> Option<usize> {
        match self.queue_type {
            QueueType::Synchronous => Some(0),
            t if t.uses_capacity() => Some(self.capacity),
            _ => None,
        }
    }

    /// Checks `maximum_pool_size >= core_pool_size`, a positive maximum, a
    /// non-empty name and a usable capacity for bounded queues.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_name.trim().is_empty() {
            return Err(ConfigError::EmptyPoolName);
        }
        if self.maximum_pool_size == 0 || self.maximum_pool_size < self.core_pool_size {
            return Err(ConfigError::InvalidPoolSize {
                pool: self.pool_name.clone(),
                core: self.core_pool_size,
                maximum: self.maximum_pool_size,
            });
        }
        if self.queue_type.uses_capacity() && self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity {
                pool: self.pool_name.clone(),
                queue_type: self.queue_type,
            });
        }
        Ok(())
    }

    /// Whether moving from `self` to `next` needs a new queue, and therefore
    /// a new pool. Sizes, keep-alive, policy and the capacity of a resizable
    /// queue can all be changed in place.
    pub fn requires_replacement(&self, next: &PoolConfig) -> bool {
        if self.queue_type != next.queue_type {
            return true;
        }
        match next.queue_type {
            QueueType::BoundedArray | QueueType::BoundedLinked => self.capacity != next.capacity,
            QueueType::Synchronous => self.fair != next.fair,
            _ => false,
        }
    }
}

/// Lowercases and strips separators so `pool-name`, `pool_name` and
/// `poolName` compare equal.
pub(crate) fn normalize(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| *c != '-' && *c != '_' && *c != ' ')
        .flat_map(char::to_lowercase)
        .collect()
}
