//! Tests for KvTable
//!
//! These tests verify:
//! - Basic get/put operations
//! - Seek iteration order and bounds
//! - Checkpoints driven by the pool budget
//! - Recovery from snapshot and WAL
//! - Concurrent access patterns

use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use tempfile::TempDir;

use btreedb::config::WalSyncStrategy;
use btreedb::engine::{EngineOptions, KvEngine, KvTable, PAGE_SIZE};

// =============================================================================
// Helper Functions
// =============================================================================

fn options(temp: &TempDir, page_count: usize) -> EngineOptions {
    EngineOptions {
        path: temp.path().join("db"),
        page_count,
        wal_sync_strategy: WalSyncStrategy::EveryWrite,
    }
}

fn setup_temp_table() -> (TempDir, KvTable) {
    let temp = TempDir::new().unwrap();
    let table = KvTable::open(options(&temp, 1024)).unwrap();
    (temp, table)
}

fn keys_from(table: &KvTable, start: &[u8]) -> Vec<Vec<u8>> {
    table
        .seek(start)
        .map(|entry| entry.unwrap().0.to_vec())
        .collect()
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_table_open_creates_directory() {
    let temp = TempDir::new().unwrap();
    let table = KvTable::open(options(&temp, 16)).unwrap();

    assert!(temp.path().join("db").exists());
    assert!(temp.path().join("db").join("wal.log").exists());
    assert_eq!(table.entry_count(), 0);
}

#[test]
fn test_table_put_get() {
    let (_temp, table) = setup_temp_table();

    table.put(b"hello", b"world").unwrap();
    assert_eq!(table.get(b"hello"), Some(Bytes::from_static(b"world")));
    assert_eq!(table.get(b"nonexistent"), None);
}

#[test]
fn test_table_put_overwrite() {
    let (_temp, table) = setup_temp_table();

    table.put(b"key", b"value1").unwrap();
    table.put(b"key", b"value2").unwrap();

    assert_eq!(table.get(b"key"), Some(Bytes::from_static(b"value2")));
    assert_eq!(table.entry_count(), 1);
}

#[test]
fn test_table_trait_primitives() {
    let (_temp, table) = setup_temp_table();

    KvEngine::put(&table, b"k", b"v").unwrap();
    assert_eq!(
        KvEngine::get(&table, b"k").unwrap(),
        Some(Bytes::from_static(b"v"))
    );
    assert_eq!(KvEngine::get(&table, b"x").unwrap(), None);
    assert_eq!(KvEngine::seek(&table, b"").unwrap().count(), 1);
}

// =============================================================================
// Seek Tests
// =============================================================================

#[test]
fn test_seek_is_inclusive_and_ordered() {
    let (_temp, table) = setup_temp_table();
    for key in ["user3", "user1", "user5", "user2", "user4"] {
        table.put(key.as_bytes(), b"v").unwrap();
    }

    assert_eq!(
        keys_from(&table, b"user2"),
        vec![
            b"user2".to_vec(),
            b"user3".to_vec(),
            b"user4".to_vec(),
            b"user5".to_vec()
        ]
    );
}

#[test]
fn test_seek_between_keys() {
    let (_temp, table) = setup_temp_table();
    table.put(b"a", b"1").unwrap();
    table.put(b"c", b"3").unwrap();

    assert_eq!(keys_from(&table, b"b"), vec![b"c".to_vec()]);
}

#[test]
fn test_seek_past_end() {
    let (_temp, table) = setup_temp_table();
    table.put(b"a", b"1").unwrap();

    assert!(keys_from(&table, b"z").is_empty());
}

#[test]
fn test_seek_sees_writes_made_during_iteration() {
    let (_temp, table) = setup_temp_table();
    table.put(b"a", b"1").unwrap();
    table.put(b"c", b"3").unwrap();

    let mut cursor = table.seek(b"a");
    assert_eq!(&cursor.next().unwrap().unwrap().0[..], b"a");
    table.put(b"b", b"2").unwrap();
    assert_eq!(&cursor.next().unwrap().unwrap().0[..], b"b");
    assert_eq!(&cursor.next().unwrap().unwrap().0[..], b"c");
    assert!(cursor.next().is_none());
}

// =============================================================================
// Checkpoint & Recovery Tests
// =============================================================================

#[test]
fn test_pool_budget_triggers_checkpoint() {
    let temp = TempDir::new().unwrap();
    let table = KvTable::open(options(&temp, 1)).unwrap();

    let value = vec![b'x'; PAGE_SIZE / 2];
    table.put(b"k1", &value).unwrap();
    assert!(table.dirty_bytes() > 0);
    table.put(b"k2", &value).unwrap();

    // second write crossed one page worth of logged bytes
    assert_eq!(table.dirty_bytes(), 0);
    assert!(temp.path().join("db").join("table.snap").exists());
    assert_eq!(
        std::fs::metadata(temp.path().join("db").join("wal.log"))
            .unwrap()
            .len(),
        0
    );
}

#[test]
fn test_failed_checkpoint_keeps_write_and_backs_off() {
    let temp = TempDir::new().unwrap();
    let db_dir = temp.path().join("db");
    // a directory where the snapshot temp file goes makes checkpoints fail
    let blocker = db_dir.join("table.snap.tmp");
    std::fs::create_dir_all(&blocker).unwrap();
    let table = KvTable::open(options(&temp, 1)).unwrap();

    let value = vec![b'x'; PAGE_SIZE + 904];
    table.put(b"k1", &value).unwrap();
    assert_eq!(table.get(b"k1"), Some(Bytes::from(value.clone())));
    assert_eq!(table.dirty_bytes(), 2 + value.len());

    // below the backed-off threshold: no checkpoint attempt, write succeeds
    table.put(b"k2", b"small").unwrap();
    assert_eq!(table.get(b"k2"), Some(Bytes::from_static(b"small")));
    assert!(!db_dir.join("table.snap").exists());

    // once the blocker is gone the next threshold crossing checkpoints
    std::fs::remove_dir(&blocker).unwrap();
    table.put(b"k3", &value).unwrap();
    assert_eq!(table.dirty_bytes(), 0);
    assert!(db_dir.join("table.snap").exists());
    table.close().unwrap();

    let reopened = KvTable::open(options(&temp, 1)).unwrap();
    assert_eq!(reopened.entry_count(), 3);
    assert_eq!(reopened.get(b"k2"), Some(Bytes::from_static(b"small")));
}

#[test]
fn test_checkpoint_leaves_no_temp_file() {
    let (temp, table) = setup_temp_table();
    table.put(b"a", b"1").unwrap();
    table.checkpoint().unwrap();

    let db_dir = temp.path().join("db");
    assert!(db_dir.join("table.snap").exists());
    assert!(!db_dir.join("table.snap.tmp").exists());
}

#[test]
fn test_reopen_after_close() {
    let temp = TempDir::new().unwrap();
    {
        let table = KvTable::open(options(&temp, 1024)).unwrap();
        table.put(b"k1", b"v1").unwrap();
        table.put(b"k2", b"v2").unwrap();
        table.close().unwrap();
    }

    let table = KvTable::open(options(&temp, 1024)).unwrap();
    assert_eq!(table.get(b"k1"), Some(Bytes::from_static(b"v1")));
    assert_eq!(table.get(b"k2"), Some(Bytes::from_static(b"v2")));
    assert_eq!(table.dirty_bytes(), 0);
}

#[test]
fn test_recover_from_wal_without_close() {
    let temp = TempDir::new().unwrap();
    {
        let table = KvTable::open(options(&temp, 1024)).unwrap();
        table.put(b"k1", b"v1").unwrap();
        table.put(b"k1", b"v1b").unwrap();
        // dropped without close: only the WAL has the data
    }

    let table = KvTable::open(options(&temp, 1024)).unwrap();
    assert_eq!(table.get(b"k1"), Some(Bytes::from_static(b"v1b")));
    assert!(table.dirty_bytes() > 0);
}

#[test]
fn test_recover_snapshot_plus_wal() {
    let temp = TempDir::new().unwrap();
    {
        let table = KvTable::open(options(&temp, 1024)).unwrap();
        table.put(b"a", b"snap").unwrap();
        table.checkpoint().unwrap();
        table.put(b"a", b"wal").unwrap();
        table.put(b"b", b"wal").unwrap();
    }

    let table = KvTable::open(options(&temp, 1024)).unwrap();
    assert_eq!(table.get(b"a"), Some(Bytes::from_static(b"wal")));
    assert_eq!(table.get(b"b"), Some(Bytes::from_static(b"wal")));
    assert_eq!(table.entry_count(), 2);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_and_readers() {
    let temp = TempDir::new().unwrap();
    let table = Arc::new(KvTable::open(options(&temp, 4)).unwrap());

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                for i in 0..200 {
                    let key = format!("w{}-{:04}", t, i);
                    table.put(key.as_bytes(), &[t as u8; 64]).unwrap();
                }
            })
        })
        .collect();

    let reader = {
        let table = Arc::clone(&table);
        thread::spawn(move || {
            for _ in 0..50 {
                let keys: Vec<Bytes> = table.seek(b"").map(|e| e.unwrap().0).collect();
                assert!(keys.windows(2).all(|w| w[0] < w[1]));
            }
        })
    };

    for handle in writers {
        handle.join().unwrap();
    }
    reader.join().unwrap();

    assert_eq!(table.entry_count(), 800);
    let table = Arc::try_unwrap(table).ok().unwrap();
    table.close().unwrap();

    let reopened = KvTable::open(options(&temp, 4)).unwrap();
    assert_eq!(reopened.entry_count(), 800);
}
