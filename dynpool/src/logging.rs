// Logging System for Dynpool
//
// This module provides a unified logging interface for the pool runtime.
// It's built on top of the `tracing` ecosystem, which offers structured logging
// that log aggregators can index by pool name.
//
// # Usage Examples
//
// ## Basic Initialization
//
// ```rust
// use dynpool::logging;
//
// // Initialize with default settings (INFO level, console output)
// logging::init_default();
//
// // Or initialize with custom settings
// let config = logging::LogConfig {
//     level: tracing::Level::DEBUG,
//     json_format: false,
//     ..Default::default()
// };
// logging::init(config);
// ```
//
// ## Production Environment
//
// Rejection diagnostics are emitted as structured `WARN` events; with JSON
// output every field of the pool snapshot becomes a top-level key:
//
// ```rust
// use dynpool::logging;
//
// logging::init_production();
// ```
//
// ## Using Log Macros
//
// ```rust
// use dynpool::{log_pool, log_rejection};
//
// log_pool!("io", "created", queue_type = "synchronous");
// log_rejection!("io", policy = "abort", active_count = 2);
// ```

use std::io;
use std::sync::Once;

use tracing::{Level, Subscriber};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id. Worker threads are named
    /// `<pool>-worker-<n>`, which makes this useful for pool diagnostics.
    pub show_thread_info: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            target_filters: None,
        }
    }
}

// Initialization guard to ensure we only initialize once
static INIT: Once = Once::new();

/// Initialize the logging system with the given configuration
///
/// It's safe to call multiple times; only the first call will take effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());

        if let Some(filters) = config.target_filters {
            for filter in filters.split(',') {
                if let Ok(directive) = filter.parse() {
                    env_filter = env_filter.add_directive(directive);
                }
            }
        }

        let registry = tracing_subscriber::registry().with(env_filter);

        let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json_format {
            Box::new(
                registry.with(
                    fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_thread_names(config.show_thread_info),
                ),
            )
        } else {
            Box::new(
                registry.with(
                    fmt::layer()
                        .with_ansi(atty::is(atty::Stream::Stdout))
                        .with_file(config.show_file_line)
                        .with_line_number(config.show_file_line)
                        .with_thread_names(config.show_thread_info)
                        .with_thread_ids(config.show_thread_info),
                ),
            )
        };

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Error setting global tracing subscriber: {}", err);
        }
    });
}

/// Initialize logging with both console and file output
///
/// Console output respects the ansi color setting, while file output is
/// always plain.
pub fn init_with_file(config: LogConfig, log_file: &str) -> Result<(), io::Error> {
    // Fail early on an unwritable path rather than inside the subscriber
    file_writer(log_file)?;

    INIT.call_once(|| {
        let env_filter = EnvFilter::from_default_env().add_directive(config.level.into());

        let console_layer = fmt::layer()
            .with_ansi(atty::is(atty::Stream::Stdout))
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_thread_names(config.show_thread_info);

        let log_file_path = log_file.to_string();
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(move || match file_writer(&log_file_path) {
                Ok(writer) => writer,
                Err(_) => Box::new(io::stderr()),
            })
            .with_thread_names(true);

        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer);

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Error setting global tracing subscriber: {}", err);
        }
    });

    Ok(())
}

fn file_writer(path: &str) -> io::Result<Box<dyn io::Write + Send + Sync + 'static>> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    Ok(Box::new(file))
}

/// INFO level with human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// DEBUG for the crate, TRACE for worker lifecycle.
pub fn init_development() {
    init(LogConfig {
        level: Level::DEBUG,
        json_format: false,
        show_file_line: true,
        show_thread_info: true,
        target_filters: Some("dynpool=debug,dynpool::executor=trace".to_string()),
    });
}

/// JSON output without file/line information.
pub fn init_production() {
    init(LogConfig {
        level: Level::INFO,
        json_format: true,
        show_file_line: false,
        show_thread_info: true,
        target_filters: None,
    });
}

/// Only warnings and errors, to keep test output readable.
pub fn init_test() {
    init(LogConfig {
        level: Level::WARN,
        json_format: false,
        show_file_line: true,
        show_thread_info: false,
        target_filters: None,
    });
}

/// Log pool lifecycle and reconfiguration events
///
/// ```rust
/// use dynpool::log_pool;
///
/// log_pool!("io", "created");
/// log_pool!("io", "core_pool_size_changed", core_pool_size = 4);
/// ```
#[macro_export]
macro_rules! log_pool {
    ($pool:expr, $event:expr) => {
        tracing::info!(pool = %$pool, event = $event)
    };
    ($pool:expr, $event:expr, $($fields:tt)*) => {
        tracing::info!(pool = %$pool, event = $event, $($fields)*)
    };
}

/// Log worker thread events
#[macro_export]
macro_rules! log_worker {
    ($pool:expr, $worker:expr, $event:expr) => {
        tracing::trace!(pool = %$pool, worker = $worker, event = $event)
    };
    ($pool:expr, $worker:expr, $event:expr, $($fields:tt)*) => {
        tracing::trace!(pool = %$pool, worker = $worker, event = $event, $($fields)*)
    };
}

/// Log a rejected submission together with the pool's state
#[macro_export]
macro_rules! log_rejection {
    ($pool:expr, $($fields:tt)*) => {
        tracing::warn!(pool = %$pool, event = "task_rejected", $($fields)*)
    };
}

/// Log configuration refresh events
#[macro_export]
macro_rules! log_refresh {
    ($source:expr, $status:expr) => {
        tracing::debug!(source = %$source, status = $status)
    };
    ($source:expr, $status:expr, $($fields:tt)*) => {
        tracing::debug!(source = %$source, status = $status, $($fields)*)
    };
}

/// Log error events
///
/// ```rust
/// use dynpool::log_error;
///
/// let error = std::io::Error::new(std::io::ErrorKind::NotFound, "config file not found");
/// log_error!(error, operation = "refresh");
/// ```
#[macro_export]
macro_rules! log_error {
    ($error:expr) => {
        tracing::error!(error = %$error)
    };
    ($error:expr, $($fields:tt)*) => {
        tracing::error!(error = %$error, $($fields)*)
    };
}

pub use tracing::{debug, error, info, trace, warn};
