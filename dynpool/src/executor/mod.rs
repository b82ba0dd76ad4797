//! # Worker Pool Executor
//!
//! A bounded set of worker threads fed by a task queue, with live
//! reconfiguration of its sizing, keep-alive and rejection policy.
//!
//! ## Key Concepts
//! - Core workers stay alive while idle; workers above the core size retire
//!   after the keep-alive time
//! - When both the workers and the queue are saturated, the rejection handler
//!   decides the fate of the task
//! - Shutdown lets queued work finish; shutdown-now hands it back
//!
//! ## Thread Safety
//! - Shared state lives behind `Arc`, sizes and policy behind `RwLock`
//! - Worker slots are claimed and released under one mutex so the pool never
//!   over- or under-shoots its bounds
//! - Counters use atomics and are snapshots when read

mod pool;
mod task;
mod worker;

pub use pool::{RunState, ThreadPoolExecutor};
pub use task::Task;
pub(crate) use worker::panic_message;
