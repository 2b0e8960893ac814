//! Concurrency tests for Store
//!
//! These tests verify:
//! - Concurrent puts to distinct keys are neither lost nor duplicated
//! - Concurrent puts across segment rotations
//! - Readers running alongside the writer see complete values
//! - A put that returned is visible to a get started afterwards
//! - Close waits for queued writes
//! - Concurrent close calls all return after the store is closed

use std::sync::Arc;
use std::thread;

use segkv::config::{Config, SyncStrategy};
use segkv::entry::Entry;
use segkv::segment::{discover_segments, SegmentRecovery};
use segkv::{SegKvError, Store};
use tempfile::TempDir;

fn open_store(temp_dir: &TempDir, max_segment_size: u64) -> Arc<Store> {
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .max_segment_size(max_segment_size)
        .sync_strategy(SyncStrategy::EveryNEntries { count: 16 })
        .write_queue_capacity(Some(8))
        .build();
    Arc::new(Store::open(config).unwrap())
}

#[test]
fn test_concurrent_puts_distinct_keys() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir, 1024 * 1024);
    let threads = 8;
    let per_thread = 100;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..per_thread {
                    store.put(&format!("t{}-k{}", t, i), &format!("v{}-{}", t, i)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..threads {
        for i in 0..per_thread {
            assert_eq!(store.get(&format!("t{}-k{}", t, i)).unwrap(), format!("v{}-{}", t, i));
        }
    }

    // Exactly one frame per put reached the log
    store.close().unwrap();
    let mut frames = 0;
    for (_, path) in discover_segments(temp_dir.path()).unwrap() {
        let result = SegmentRecovery::verify(&path).unwrap();
        assert!(!result.was_truncated);
        frames += result.entries_recovered;
    }
    assert_eq!(frames, (threads * per_thread) as u64);
}

#[test]
fn test_concurrent_puts_across_rotations() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir, 512);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..50 {
                    store.put(&format!("t{}-k{}", t, i), &"x".repeat(32)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(store.segment_count() > 1);
    for t in 0..4 {
        for i in 0..50 {
            assert_eq!(store.get(&format!("t{}-k{}", t, i)).unwrap(), "x".repeat(32));
        }
    }

    // And again after a restart
    store.close().unwrap();
    drop(store);
    let store = open_store(&temp_dir, 512);
    assert_eq!(store.get("t3-k49").unwrap(), "x".repeat(32));
}

#[test]
fn test_readers_alongside_writer() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir, 2048);
    for i in 0..20 {
        store.put(&format!("key{}", i), &format!("{}", i).repeat(10)).unwrap();
    }

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            // Rewrites the same values so every read has one right answer
            for _ in 0..20 {
                for i in 0..20 {
                    store.put(&format!("key{}", i), &format!("{}", i).repeat(10)).unwrap();
                }
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..50 {
                    for i in 0..20 {
                        let value = store.get(&format!("key{}", i)).unwrap();
                        assert_eq!(value, format!("{}", i).repeat(10));
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn test_put_happens_before_get() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir, 256);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("t{}", t);
                    let value = i.to_string();
                    store.put(&key, &value).unwrap();
                    assert_eq!(store.get(&key).unwrap(), value);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_close_waits_for_queued_writes() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir, 1024 * 1024);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut written = Vec::new();
                for i in 0..200 {
                    let key = format!("t{}-k{}", t, i);
                    match store.put(&key, "v") {
                        Ok(()) => written.push(key),
                        Err(SegKvError::Closed) => break,
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
                written
            })
        })
        .collect();

    store.close().unwrap();
    let written: Vec<String> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    drop(store);

    // Every acknowledged put is on disk
    let store = open_store(&temp_dir, 1024 * 1024);
    for key in written {
        assert_eq!(store.get(&key).unwrap(), "v");
    }
}

#[test]
fn test_frame_size_accounting_under_concurrency() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir, 1024 * 1024);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..25 {
                    store.put(&format!("{}{}", t, i), "value").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    store.close().unwrap();

    let expected: u64 = (0..4)
        .flat_map(|t| (0..25).map(move |i| Entry::new(format!("{}{}", t, i), "value").encoded_len() as u64))
        .sum();
    let actual: u64 = discover_segments(temp_dir.path())
        .unwrap()
        .iter()
        .map(|(_, path)| std::fs::metadata(path).unwrap().len())
        .sum();
    assert_eq!(actual, expected);
}

#[test]
fn test_concurrent_close_waits_for_closed() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir, 1024 * 1024);
    for i in 0..50 {
        store.put(&format!("key{}", i), "value").unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store.close().unwrap();
                // No caller may return while another is still draining
                assert!(store.is_closed());
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(store.is_closed());
    drop(store);
    let store = open_store(&temp_dir, 1024 * 1024);
    assert_eq!(store.get("key49").unwrap(), "value");
}
