//! # Rejection Handling
//!
//! What happens to a task a saturated pool cannot accept.
//!
//! - [`RejectedHandler`]: the policy seam every pool holds one of
//! - [`policies`]: abort, discard, discard-oldest and caller-runs
//! - [`RejectionTracker`]: per-pool rejection counters
//! - [`TrackingRejectedHandler`]: decorator that logs a diagnostic snapshot
//!   and counts every rejection on top of any policy
//! - [`PolicyRegistry`]: name to policy factory table, used to resolve the
//!   policy named in a pool configuration

pub mod policies;
mod registry;
mod tracker;
mod tracking;

pub use policies::{AbortPolicy, CallerRunsPolicy, DiscardOldestPolicy, DiscardPolicy};
pub use registry::{PolicyFactory, PolicyRegistry};
pub use tracker::RejectionTracker;
pub use tracking::TrackingRejectedHandler;

use std::fmt;

use dynpool_api::RejectedError;

use crate::executor::{Task, ThreadPoolExecutor};

/// Policy invoked when a pool can neither start a worker nor queue a task.
pub trait RejectedHandler: Send + Sync + fmt::Debug {
    /// Name reported in snapshots and logs.
    fn name(&self) -> &str;

    /// Disposes of `task`. An `Err` is returned to the submitting caller
    /// unchanged.
    fn rejected(&self, task: Task, pool: &ThreadPoolExecutor) -> Result<(), RejectedError>;
}
