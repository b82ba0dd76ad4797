// Integration tests for RejectionTracker

use std::sync::{Arc, Barrier};
use std::thread;

use dynpool::RejectionTracker;

#[test]
fn test_concurrent_increments_are_not_lost() {
    let tracker = Arc::new(RejectionTracker::new());
    let threads = 8;
    let per_thread = 5_000;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let tracker = Arc::clone(&tracker);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                // Start together so several threads race on the first insert
                barrier.wait();
                for _ in 0..per_thread {
                    tracker.record_rejection("io");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(tracker.count("io"), (threads * per_thread) as u64);
}

#[test]
fn test_counts_are_per_pool() {
    let tracker = RejectionTracker::new();
    assert_eq!(tracker.record_rejection("io"), 1);
    assert_eq!(tracker.record_rejection("io"), 2);
    assert_eq!(tracker.record_rejection("cpu"), 1);

    assert_eq!(tracker.count("io"), 2);
    assert_eq!(tracker.count("cpu"), 1);
    assert_eq!(tracker.count("web"), 0);

    let counts = tracker.counts();
    assert_eq!(counts.len(), 2);
    assert_eq!(counts["io"], 2);
}

#[test]
fn test_clear_resets_counts() {
    let tracker = RejectionTracker::new();
    tracker.record_rejection("io");
    tracker.clear();
    assert_eq!(tracker.count("io"), 0);
    assert!(tracker.counts().is_empty());
    assert_eq!(tracker.record_rejection("io"), 1);
}
