// Integration tests for DynamicPoolManager


use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dynpool::{
    ConfigError, DynamicPoolManager, MemoryConfigSource, PoolConfig, PoolError, QueueType, RefreshOptions,
    DEFAULT_NAMESPACE,
};
use test_helpers::{wait_until, Gate, DEFAULT_WAIT};

fn key(index: usize, field: &str) -> String {
    format!("{DEFAULT_NAMESPACE}.executors[{index}].{field}")
}

#[test]
fn test_init_and_execute() {
    dynpool::logging::init_test();
    let manager = DynamicPoolManager::new();
    let registered = manager
        .init(&[
            PoolConfig::named("io").with_sizes(2, 4),
            PoolConfig::named("cpu").with_sizes(1, 1),
        ])
        .unwrap();
    assert_eq!(registered, 2);

    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        let counter = Arc::clone(&counter);
        manager
            .execute("io", move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }
    assert!(wait_until(DEFAULT_WAIT, || counter.load(Ordering::SeqCst) == 10));

    let err = manager.execute("missing", || {}).unwrap_err();
    assert!(matches!(err, PoolError::NotFound(_)));
    assert!(manager.shutdown_and_wait(DEFAULT_WAIT));
    assert!(manager.registry().is_empty());
}

#[test]
fn test_init_is_all_or_nothing() {
    let manager = DynamicPoolManager::new();
    let err = manager
        .init(&[PoolConfig::named("io"), PoolConfig::named("cpu").with_sizes(3, 1)])
        .unwrap_err();
    assert!(matches!(err, PoolError::Config(ConfigError::InvalidPoolSize { .. })));
    assert!(manager.registry().is_empty());

    let err = manager
        .init(&[PoolConfig::named("io"), PoolConfig::named("io")])
        .unwrap_err();
    assert!(matches!(err, PoolError::Config(ConfigError::DuplicatePool(_))));
    assert!(manager.registry().is_empty());
}

#[test]
fn test_init_from_properties() -> anyhow::Result<()> {
    let manager = DynamicPoolManager::new();
    let mut properties = BTreeMap::new();
    properties.insert(key(0, "pool-name"), "io".to_string());
    properties.insert(key(0, "queue-type"), "ArrayBlockingQueue".to_string());
    properties.insert(key(0, "capacity"), "16".to_string());
    properties.insert("other.setting".to_string(), "ignored".to_string());

    assert_eq!(manager.init_from_properties(DEFAULT_NAMESPACE, &properties)?, 1);
    let snapshot = manager.snapshot("io")?;
    assert_eq!(snapshot.queue_type, QueueType::BoundedArray);
    assert_eq!(snapshot.queue_capacity, Some(16));
    Ok(())
}

#[test]
fn test_create_pool_keeps_first_registration() -> anyhow::Result<()> {
    let manager = DynamicPoolManager::new();
    let first = manager.create_pool(&PoolConfig::named("io").with_sizes(1, 2))?;
    let second = manager.create_pool(&PoolConfig::named("io").with_sizes(4, 8))?;
    assert!(second.ptr_eq(&first));
    assert_eq!(manager.pool("io")?.maximum_pool_size(), 2);
    Ok(())
}

#[test]
fn test_snapshots_report_rejections() {
    let manager = DynamicPoolManager::new();
    manager
        .init(&[PoolConfig::named("io")
            .with_sizes(2, 2)
            .with_queue(QueueType::Synchronous, 0)
            .with_rejected_policy("abort")])
        .unwrap();
    let mut gate = Gate::new();

    manager.execute("io", gate.task()).unwrap();
    manager.execute("io", gate.task()).unwrap();
    assert!(matches!(manager.execute("io", gate.task()), Err(PoolError::Rejected(_))));

    let snapshots = manager.snapshots();
    assert_eq!(snapshots.len(), 1);
    let io = &snapshots[0];
    assert_eq!(io.pool_name, "io");
    assert_eq!(io.reject_count, 1);
    assert_eq!(io.rejected_policy, "abort");
    assert_eq!(io.queue_capacity, Some(0));
    assert!((0.0..=1.0).contains(&io.active_rate));

    let json = serde_json::to_value(io).unwrap();
    assert_eq!(json["poolName"], "io");
    assert_eq!(json["rejectCount"], 1);
    assert_eq!(json["queueType"], "synchronous");

    gate.release();
    assert!(manager.shutdown_and_wait(DEFAULT_WAIT));
    assert_eq!(manager.tracker().count("io"), 0);
}

#[test]
fn test_watch_reconciles_pools() {
    let manager = DynamicPoolManager::new();
    let source = Arc::new(MemoryConfigSource::new("memory"));
    source.set(key(0, "pool-name"), "io");
    source.set(key(0, "core-pool-size"), "1");
    source.set(key(0, "maximum-pool-size"), "2");

    let options = RefreshOptions::default()
        .with_initial_delay(Duration::from_millis(10))
        .with_interval(Duration::from_millis(20));
    manager.watch(source.clone(), options).unwrap();

    assert!(wait_until(DEFAULT_WAIT, || manager.registry().contains("io")));
    let io = manager.pool("io").unwrap();

    source.set(key(0, "maximum-pool-size"), "5");
    source.set(key(0, "core-pool-size"), "3");
    assert!(wait_until(DEFAULT_WAIT, || io.core_pool_size() == 3));
    assert_eq!(io.maximum_pool_size(), 5);

    source.set(key(0, "queue-type"), "priority");
    assert!(wait_until(DEFAULT_WAIT, || {
        manager
            .pool("io")
            .map(|pool| pool.queue_type() == QueueType::Priority)
            .unwrap_or(false)
    }));
    assert!(io.is_shutdown());

    manager.stop_watching();
    assert!(manager.shutdown_and_wait(DEFAULT_WAIT));
}
