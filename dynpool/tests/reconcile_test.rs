// Integration tests for PoolReconciler


use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use dynpool::refresh::REFRESH_THREAD_NAME;
use dynpool::{
    ConfigChangeEvent, ConfigChangeListener, ConfigRefreshListener, MemoryConfigSource, PoolConfig, PoolFactory,
    PoolReconciler, PoolRegistry, QueueType, RefreshOptions, ThreadPoolExecutor, DEFAULT_NAMESPACE,
};
use test_helpers::{finish, test_factory, wait_until, Gate, DEFAULT_WAIT};

/// Queues three tasks behind a gated worker on `pool`. Each task records the
/// name of the thread it ran on, then blocks on `hold`.
fn queue_recording_tasks(pool: &ThreadPoolExecutor, busy: &Gate, hold: &Gate) -> Arc<Mutex<Vec<String>>> {
    let threads = Arc::new(Mutex::new(Vec::new()));
    pool.execute(busy.task()).unwrap();
    for _ in 0..3 {
        let threads = Arc::clone(&threads);
        let wait = hold.task();
        pool.execute(move || {
            let name = thread::current().name().unwrap_or_default().to_string();
            threads.lock().unwrap().push(name);
            wait();
        })
        .unwrap();
    }
    assert_eq!(pool.queue().len(), 3);
    threads
}

fn reconciler() -> (PoolReconciler, Arc<PoolRegistry>) {
    reconciler_with(test_factory())
}

fn reconciler_with(factory: PoolFactory) -> (PoolReconciler, Arc<PoolRegistry>) {
    let registry = Arc::new(PoolRegistry::new());
    (PoolReconciler::new(Arc::clone(&registry), factory), registry)
}

fn event(entries: &[(usize, &str, &str)]) -> ConfigChangeEvent {
    let properties: BTreeMap<String, String> = entries
        .iter()
        .map(|(i, field, value)| (format!("{DEFAULT_NAMESPACE}.executors[{i}].{field}"), value.to_string()))
        .collect();
    ConfigChangeEvent::new(DEFAULT_NAMESPACE, properties)
}

#[test]
fn test_event_creates_missing_pools() {
    let (reconciler, registry) = reconciler();
    let event = event(&[
        (0, "pool-name", "io"),
        (0, "core-pool-size", "2"),
        (0, "maximum-pool-size", "2"),
        (0, "queue-type", "synchronous"),
        (0, "rejected-policy", "AbortPolicy"),
        (1, "poolName", "cpu"),
    ]);

    let report = reconciler.reconcile_event(&event).unwrap();
    assert_eq!(report.created, ["io", "cpu"]);
    assert!(report.is_clean());

    let io = registry.get("io").unwrap();
    assert_eq!(io.queue_type(), QueueType::Synchronous);
    assert_eq!(io.rejected_policy(), "abort");
    assert!(registry.contains("cpu"));
}

#[test]
fn test_in_place_update_keeps_pool() {
    let (reconciler, registry) = reconciler();
    let base = PoolConfig::named("io")
        .with_sizes(1, 2)
        .with_queue(QueueType::ResizableLinked, 10);
    reconciler.reconcile(&[base.clone()]);
    let before = registry.get("io").unwrap();

    let next = base
        .clone()
        .with_sizes(3, 6)
        .with_queue(QueueType::ResizableLinked, 50)
        .with_contact("oncall@example.com");
    let report = reconciler.reconcile(&[next.clone()]);
    assert_eq!(report.updated, ["io"]);

    let after = registry.get("io").unwrap();
    assert!(after.ptr_eq(&before));
    assert_eq!(after.core_pool_size(), 3);
    assert_eq!(after.maximum_pool_size(), 6);
    assert_eq!(after.queue().capacity(), Some(50));
    assert_eq!(after.contact().as_deref(), Some("oncall@example.com"));

    let report = reconciler.reconcile(&[next]);
    assert_eq!(report.unchanged, ["io"]);
    finish(&after);
}

#[test]
fn test_queue_type_change_replaces_and_migrates() {
    let (reconciler, registry) = reconciler();
    let base = PoolConfig::named("io")
        .with_sizes(1, 1)
        .with_queue(QueueType::BoundedLinked, 100);
    reconciler.reconcile(&[base.clone()]);
    let old = registry.get("io").unwrap();

    let mut gate = Gate::new();
    let counter = Arc::new(AtomicUsize::new(0));
    old.execute(gate.task()).unwrap();
    for _ in 0..3 {
        let counter = Arc::clone(&counter);
        old.execute(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }
    assert_eq!(old.queue().len(), 3);

    let report = reconciler.reconcile(&[base.clone().with_queue(QueueType::UnboundedLinked, 0)]);
    assert_eq!(report.replaced, ["io"]);

    let new = registry.get("io").unwrap();
    assert!(!new.ptr_eq(&old));
    assert_eq!(new.queue_type(), QueueType::UnboundedLinked);
    assert!(old.is_shutdown());

    // Migrated tasks run on the new pool while the old one is still busy
    assert!(wait_until(DEFAULT_WAIT, || counter.load(Ordering::SeqCst) == 3));
    assert!(!old.is_terminated());

    gate.release();
    assert!(old.await_termination(DEFAULT_WAIT));
    finish(&new);
}

#[test]
fn test_invalid_pool_fails_alone() {
    let (reconciler, registry) = reconciler();
    let report = reconciler.reconcile(&[
        PoolConfig::named("good"),
        PoolConfig::named("bad").with_sizes(4, 2),
        PoolConfig::named("odd").with_rejected_policy("NoSuchPolicy"),
    ]);

    assert_eq!(report.created, ["good"]);
    assert_eq!(report.failed.len(), 2);
    assert!(!report.is_clean());
    assert_eq!(registry.names().len(), 1);
}

#[test]
fn test_unbindable_event_changes_nothing() {
    let (reconciler, registry) = reconciler();
    let event = event(&[(0, "pool-name", "io"), (0, "core-pool-size", "many")]);

    assert!(reconciler.reconcile_event(&event).is_err());
    reconciler.on_change(&event);
    assert!(registry.is_empty());
}

#[test]
fn test_pools_missing_from_config_are_kept() {
    let (reconciler, registry) = reconciler();
    reconciler.reconcile(&[PoolConfig::named("io"), PoolConfig::named("cpu")]);
    let report = reconciler.reconcile(&[PoolConfig::named("io")]);

    assert_eq!(report.unchanged, ["io"]);
    assert!(registry.contains("cpu"));
}

#[test]
fn test_replacement_overflow_never_runs_on_caller() {
    let factory = test_factory();
    let (reconciler, registry) = reconciler_with(factory.clone());
    let base = PoolConfig::named("io")
        .with_sizes(1, 1)
        .with_queue(QueueType::BoundedLinked, 100);
    reconciler.reconcile(&[base.clone()]);
    let old = registry.get("io").unwrap();

    let mut busy = Gate::new();
    let mut hold = Gate::new();
    let threads = queue_recording_tasks(&old, &busy, &hold);

    let next = base
        .with_queue(QueueType::Synchronous, 0)
        .with_rejected_policy("caller-runs");
    let report = reconciler.reconcile(&[next]);
    assert_eq!(report.replaced, ["io"]);

    // The new single worker takes the first task, the rest go back to the
    // old pool as rejections
    let new = registry.get("io").unwrap();
    assert!(wait_until(DEFAULT_WAIT, || threads.lock().unwrap().len() == 1));
    assert_eq!(factory.tracker().count("io"), 2);
    assert_eq!(old.queue().len(), 2);

    busy.release();
    hold.release();
    assert!(wait_until(DEFAULT_WAIT, || threads.lock().unwrap().len() == 3));
    assert!(old.await_termination(DEFAULT_WAIT));
    finish(&new);

    let caller = thread::current().name().unwrap_or_default().to_string();
    for name in threads.lock().unwrap().iter() {
        assert_ne!(name, &caller);
        assert!(name.starts_with("io-worker-"), "task ran on {name}");
    }
}

#[test]
fn test_refresh_driven_replacement_keeps_tasks_off_refresh_thread() {
    let factory = test_factory();
    let (reconciler, registry) = reconciler_with(factory);
    let reconciler = Arc::new(reconciler);
    let key = |field: &str| format!("{DEFAULT_NAMESPACE}.executors[0].{field}");

    let source = Arc::new(MemoryConfigSource::new("memory"));
    source.set(key("pool-name"), "io");
    source.set(key("core-pool-size"), "1");
    source.set(key("maximum-pool-size"), "1");
    source.set(key("queue-type"), "bounded-linked");
    source.set(key("capacity"), "100");

    let options = RefreshOptions::default()
        .with_initial_delay(Duration::from_millis(10))
        .with_interval(Duration::from_millis(20));
    let listener = ConfigRefreshListener::new(source.clone(), options);
    listener.add_listener(reconciler.clone());
    listener.start().unwrap();

    assert!(wait_until(DEFAULT_WAIT, || registry.contains("io")));
    let old = registry.get("io").unwrap();
    let mut busy = Gate::new();
    let mut hold = Gate::new();
    let threads = queue_recording_tasks(&old, &busy, &hold);

    source.set(key("rejected-policy"), "caller-runs");
    source.set(key("queue-type"), "synchronous");
    assert!(wait_until(DEFAULT_WAIT, || old.is_shutdown()));
    listener.stop();

    busy.release();
    hold.release();
    assert!(wait_until(DEFAULT_WAIT, || threads.lock().unwrap().len() == 3));
    for name in threads.lock().unwrap().iter() {
        assert_ne!(name, REFRESH_THREAD_NAME);
    }

    assert!(old.await_termination(DEFAULT_WAIT));
    finish(&registry.get("io").unwrap());
}
