// Integration tests for dynpool_api::error

use dynpool_api::config::QueueType;
use dynpool_api::error::*;

#[test]
fn test_config_error_display() {
    assert_eq!(ConfigError::EmptyPoolName.to_string(), "Pool name must not be empty");
    assert_eq!(
        ConfigError::InvalidPoolSize { pool: "io".to_string(), core: 4, maximum: 2 }.to_string(),
        "Invalid pool sizes for io: core 4, maximum 2"
    );
    assert_eq!(
        ConfigError::ZeroCapacity { pool: "io".to_string(), queue_type: QueueType::BoundedArray }.to_string(),
        "Queue bounded-array of pool io requires a positive capacity"
    );
    assert_eq!(
        ConfigError::CapacityNotAdjustable(QueueType::Synchronous).to_string(),
        "Queue synchronous does not support capacity changes"
    );
    assert_eq!(ConfigError::UnknownRejectedPolicy("X".to_string()).to_string(), "Unknown rejected policy: X");
}

#[test]
fn test_pool_error_display() {
    assert_eq!(PoolError::NotFound("io".to_string()).to_string(), "Pool not found: io");

    let rejected = RejectedError { pool: "io".to_string(), pool_size: 2, active_count: 2, queue_size: 0 };
    assert_eq!(
        PoolError::from(rejected).to_string(),
        "Task rejected from pool io (pool size 2, active 2, queued 0)"
    );

    // Config errors pass their message through unchanged
    let err = PoolError::from(ConfigError::EmptyPoolName);
    assert_eq!(err.to_string(), "Pool name must not be empty");
}

#[test]
fn test_source_error_display() {
    let err = SourceError::Unavailable { name: "memory".to_string(), reason: "offline".to_string() };
    assert_eq!(err.to_string(), "Configuration source memory is unavailable: offline");
    let err = SourceError::Other(anyhow::anyhow!("boom"));
    assert!(err.to_string().contains("boom"));
}
