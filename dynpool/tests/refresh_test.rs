// Integration tests for ConfigRefreshListener and the configuration sources


use std::collections::BTreeMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use dynpool::{
    ConfigChangeEvent, ConfigRefreshListener, ConfigSource, JsonFileConfigSource, MemoryConfigSource,
    RefreshOptions, SourceError, DEFAULT_NAMESPACE,
};
use test_helpers::{wait_until, DEFAULT_WAIT};

/// Fails on the fetches whose 1-based number is listed, panics on the ones
/// listed in `panics`.
#[derive(Debug)]
struct FlakySource {
    calls: AtomicUsize,
    failures: Vec<usize>,
    panics: Vec<usize>,
}

impl FlakySource {
    fn new(failures: Vec<usize>, panics: Vec<usize>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failures,
            panics,
        }
    }
}

impl ConfigSource for FlakySource {
    fn name(&self) -> &str {
        "flaky"
    }

    fn fetch(&self) -> Result<BTreeMap<String, String>, SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.panics.contains(&call) {
            panic!("source exploded on call {call}");
        }
        if self.failures.contains(&call) {
            return Err(SourceError::Unavailable {
                name: "flaky".to_string(),
                reason: format!("call {call} failed"),
            });
        }
        let mut properties = BTreeMap::new();
        properties.insert(format!("{DEFAULT_NAMESPACE}.executors[0].pool-name"), "io".to_string());
        properties.insert("unrelated.key".to_string(), call.to_string());
        Ok(properties)
    }
}

fn fast_options() -> RefreshOptions {
    RefreshOptions::default()
        .with_initial_delay(Duration::from_millis(10))
        .with_interval(Duration::from_millis(30))
}

fn collecting_listener(listener: &ConfigRefreshListener) -> Arc<Mutex<Vec<ConfigChangeEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    listener.add_listener(Arc::new(move |event: &ConfigChangeEvent| {
        sink.lock().unwrap().push(event.clone());
    }));
    events
}

#[test]
fn test_failed_fetch_publishes_nothing_and_next_tick_runs() {
    let source = Arc::new(FlakySource::new(vec![1], vec![]));
    let listener = ConfigRefreshListener::new(source, fast_options());
    let events = collecting_listener(&listener);

    listener.start().unwrap();
    assert!(listener.is_running());
    assert!(wait_until(DEFAULT_WAIT, || events.lock().unwrap().len() >= 2));
    listener.stop();

    let events = events.lock().unwrap();
    assert_eq!(listener.failure_count(), 1);
    assert!(listener.tick_count() >= 3);
    assert_eq!(listener.published_count(), events.len() as u64);
    assert_eq!(listener.tick_count(), listener.published_count() + 1);

    // Only the namespace survives filtering
    for event in events.iter() {
        assert_eq!(event.namespace, DEFAULT_NAMESPACE);
        assert_eq!(event.properties.len(), 1);
    }
    assert_ne!(events[0].id, events[1].id);
}

#[test]
fn test_panicking_fetch_is_contained() {
    let source = Arc::new(FlakySource::new(vec![], vec![1]));
    let listener = ConfigRefreshListener::new(source, fast_options());
    let events = collecting_listener(&listener);

    listener.start().unwrap();
    assert!(wait_until(DEFAULT_WAIT, || events.lock().unwrap().len() >= 1));
    listener.stop();
    assert_eq!(listener.failure_count(), 1);
}

#[test]
fn test_panicking_listener_does_not_block_others() {
    let source = Arc::new(MemoryConfigSource::new("memory"));
    let listener = ConfigRefreshListener::new(source, fast_options());
    listener.add_listener(Arc::new(|_: &ConfigChangeEvent| panic!("listener failure")));
    let events = collecting_listener(&listener);

    assert!(listener.refresh_once());
    assert!(listener.refresh_once());
    assert_eq!(events.lock().unwrap().len(), 2);
}

#[test]
fn test_stop_cancels_pending_tick() {
    let source = Arc::new(MemoryConfigSource::new("memory"));
    let options = RefreshOptions::default()
        .with_initial_delay(Duration::from_secs(30))
        .with_interval(Duration::from_secs(30));
    let listener = ConfigRefreshListener::new(source, options);

    listener.start().unwrap();
    // A second start is a no-op
    listener.start().unwrap();
    listener.stop();
    assert!(!listener.is_running());
    assert_eq!(listener.tick_count(), 0);

    // Restart after stop
    listener.start().unwrap();
    assert!(listener.is_running());
    drop(listener);
}

#[test]
fn test_no_ticks_after_stop() {
    let source = Arc::new(MemoryConfigSource::new("memory"));
    let listener = ConfigRefreshListener::new(source, fast_options());
    listener.start().unwrap();
    assert!(wait_until(DEFAULT_WAIT, || listener.tick_count() >= 1));
    listener.stop();

    let ticks = listener.tick_count();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(listener.tick_count(), ticks);
}

#[test]
fn test_json_file_source() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "dynamic": {{
                "thread-pool": {{
                    "executors": [
                        {{"poolName": "io", "corePoolSize": 2, "maximumPoolSize": 2, "queueType": "SynchronousQueue"}}
                    ]
                }}
            }}
        }}"#
    )
    .unwrap();

    let source = JsonFileConfigSource::new(file.path());
    let properties = source.fetch().unwrap();
    assert_eq!(properties["dynamic.thread-pool.executors[0].poolName"], "io");
    assert_eq!(properties["dynamic.thread-pool.executors[0].corePoolSize"], "2");

    let event = ConfigChangeEvent::new(DEFAULT_NAMESPACE, properties);
    let configs = event.pool_configs().unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].pool_name, "io");
    assert_eq!(configs[0].maximum_pool_size, 2);
}

#[test]
fn test_json_file_source_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = JsonFileConfigSource::new(dir.path().join("absent.json"));
    assert!(matches!(missing.fetch(), Err(SourceError::Unavailable { .. })));

    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();
    let broken = JsonFileConfigSource::new(&path);
    assert!(matches!(broken.fetch(), Err(SourceError::Malformed { .. })));

    std::fs::write(&path, "[1, 2]").unwrap();
    assert!(matches!(broken.fetch(), Err(SourceError::Malformed { .. })));
}
