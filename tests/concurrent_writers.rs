//! Concurrent ingestion against one snapshot file
//! No entry may be lost when several writers race on the same suite

mod common;

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use benchtrack_history::{HistoryStore, StoreOptions};
use common::{entry, SUITE};
use tempfile::TempDir;

const WRITERS: usize = 4;
const PER_WRITER: usize = 5;

fn store(dir: &TempDir) -> HistoryStore {
    HistoryStore::new(dir.path().join("data.js")).with_options(StoreOptions {
        max_retries: 200,
        retry_backoff: Duration::from_millis(1),
        ..StoreOptions::default()
    })
}

#[test]
fn test_racing_writers_keep_every_entry() {
    let temp_dir = TempDir::new().expect("Should create temp directory");
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let store = store(&temp_dir);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for n in 0..PER_WRITER {
                    // Each writer's clock reads differently, as on separate CI runners
                    let stamp = 1_000 + (n * WRITERS + writer) as i64;
                    store
                        .append_at(SUITE, entry(&format!("w{}-{}", writer, n), 0, 100.0), || stamp)
                        .expect("Append should eventually succeed");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Writer thread panicked");
    }

    let loaded = store(&temp_dir).load().expect("Should load snapshot");
    let ids: HashSet<&str> = loaded
        .snapshot
        .entries(SUITE)
        .iter()
        .map(|e| e.commit.id.as_str())
        .collect();
    assert_eq!(ids.len(), WRITERS * PER_WRITER);
    assert_eq!(loaded.snapshot.entries(SUITE).len(), WRITERS * PER_WRITER);

    let dates: Vec<i64> = loaded.snapshot.entries(SUITE).iter().map(|e| e.date).collect();
    assert!(dates.windows(2).all(|w| w[0] <= w[1]), "dates out of order: {:?}", dates);

    // Each writer's own entries stay in the order it appended them
    for writer in 0..WRITERS {
        let prefix = format!("w{}-", writer);
        let order: Vec<usize> = loaded
            .snapshot
            .entries(SUITE)
            .iter()
            .filter_map(|e| e.commit.id.strip_prefix(&prefix))
            .map(|n| n.parse().expect("numeric suffix"))
            .collect();
        assert_eq!(order, (0..PER_WRITER).collect::<Vec<_>>());
    }

    let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
        .expect("Should list temp directory")
        .filter_map(Result::ok)
        .map(|e| e.file_name())
        .filter(|name| name != "data.js" && name != "data.js.lock")
        .collect();
    assert!(leftovers.is_empty(), "unexpected files: {:?}", leftovers);
}

#[test]
fn test_earlier_dated_writer_losing_the_race_still_lands() {
    for round in 0..20i64 {
        let temp_dir = TempDir::new().expect("Should create temp directory");
        let barrier = Arc::new(Barrier::new(2));
        let base = 1_753_033_097_899 + round;

        let handles: Vec<_> = [("early", base), ("late", base + 1)]
            .into_iter()
            .map(|(id, stamp)| {
                let store = store(&temp_dir);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store
                        .append_at(SUITE, entry(id, 0, 100.0), || stamp)
                        .expect("Both writers must commit")
                        .value
                })
            })
            .collect();

        let stored: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("Writer thread panicked"))
            .collect();
        assert!(stored.iter().all(|e| e.date >= base));

        let loaded = store(&temp_dir).load().expect("Should load snapshot");
        let history = loaded.snapshot.entries(SUITE);
        assert_eq!(history.len(), 2, "round {}: an entry was lost", round);
        assert!(history[0].date <= history[1].date);
        assert_eq!(loaded.snapshot.last_update, base + 1);
    }
}

#[test]
fn test_writers_on_different_suites() {
    let temp_dir = TempDir::new().expect("Should create temp directory");

    let handles: Vec<_> = ["Block import", "Trie", "EVM"]
        .into_iter()
        .map(|suite| {
            let store = store(&temp_dir);
            thread::spawn(move || {
                for n in 0..3 {
                    store
                        .append(suite, entry(&format!("{}-{}", suite, n), n, 10.0 + n as f64))
                        .expect("Append should eventually succeed");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Writer thread panicked");
    }

    let loaded = store(&temp_dir).load().expect("Should load snapshot");
    let mut suites: Vec<&str> = loaded.snapshot.suites().collect();
    suites.sort_unstable();
    assert_eq!(suites, vec!["Block import", "EVM", "Trie"]);
    for suite in suites {
        assert_eq!(loaded.snapshot.entries(suite).len(), 3);
    }
    assert_eq!(loaded.snapshot.last_update, 2);
}
