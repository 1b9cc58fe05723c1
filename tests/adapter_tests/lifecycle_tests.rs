//! Tests for the shared engine lifecycle
//!
//! A counting engine records how often it is opened and closed per path, so
//! the tests can check the open-once / close-once contract under contention.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tempfile::TempDir;

use btreedb::engine::{EngineOptions, KvEngine};
use btreedb::{BTreeDb, BTreeDbError, Config, Result, SharedEngine};

// =============================================================================
// Counting Engine
// =============================================================================

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Counts {
    opened: usize,
    closed: usize,
}

static COUNTS: Mutex<BTreeMap<PathBuf, Counts>> = Mutex::new(BTreeMap::new());

fn counts(path: &Path) -> Counts {
    COUNTS.lock().get(path).copied().unwrap_or_default()
}

#[derive(Debug)]
struct CountingEngine {
    path: PathBuf,
    page_count: usize,
}

impl KvEngine for CountingEngine {
    type Cursor<'a> = std::vec::IntoIter<Result<(Bytes, Bytes)>>;

    fn open(options: &EngineOptions) -> Result<Self> {
        // widen the window in which a racing acquire could see a half-open slot
        thread::sleep(Duration::from_millis(20));
        COUNTS
            .lock()
            .entry(options.path.clone())
            .or_default()
            .opened += 1;
        Ok(Self {
            path: options.path.clone(),
            page_count: options.page_count,
        })
    }

    fn get(&self, _key: &[u8]) -> Result<Option<Bytes>> {
        Ok(None)
    }

    fn put(&self, _key: &[u8], _value: &[u8]) -> Result<()> {
        Ok(())
    }

    fn seek(&self, _key: &[u8]) -> Result<Self::Cursor<'_>> {
        Ok(Vec::new().into_iter())
    }

    fn close(self) -> Result<()> {
        COUNTS.lock().entry(self.path).or_default().closed += 1;
        Ok(())
    }
}

fn config_for(temp: &TempDir) -> Config {
    Config::builder().db_path(temp.path()).build()
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_concurrent_acquire_release_opens_and_closes_once() {
    const WORKERS: usize = 16;
    let temp = TempDir::new().unwrap();
    let config = config_for(&temp);
    let shared: Arc<SharedEngine<CountingEngine>> = Arc::new(SharedEngine::new());
    let barrier = Arc::new(Barrier::new(WORKERS));

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let shared = Arc::clone(&shared);
            let barrier = Arc::clone(&barrier);
            let config = config.clone();
            thread::spawn(move || {
                barrier.wait();
                let engine = shared.acquire(&config).unwrap();
                assert_eq!(engine.path, config.db_path.clone().unwrap());
                // nobody releases until everybody holds a handle
                barrier.wait();
                shared.release(engine).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(counts(temp.path()), Counts { opened: 1, closed: 1 });
    assert_eq!(shared.ref_count(), 0);
    assert!(!shared.is_open());
}

#[test]
fn test_reopen_after_last_release() {
    let temp = TempDir::new().unwrap();
    let config = config_for(&temp);
    let shared: SharedEngine<CountingEngine> = SharedEngine::new();

    let engine = shared.acquire(&config).unwrap();
    shared.release(engine).unwrap();
    let engine = shared.acquire(&config).unwrap();
    assert!(shared.is_open());
    shared.release(engine).unwrap();

    assert_eq!(counts(temp.path()), Counts { opened: 2, closed: 2 });
}

#[test]
fn test_first_caller_configuration_wins() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let shared: SharedEngine<CountingEngine> = SharedEngine::new();

    let a = shared.acquire(&config_for(&first)).unwrap();
    let b = shared.acquire(&config_for(&second)).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(shared.ref_count(), 2);

    shared.release(a).unwrap();
    assert!(shared.is_open());
    shared.release(b).unwrap();

    assert_eq!(counts(first.path()), Counts { opened: 1, closed: 1 });
    assert_eq!(counts(second.path()), Counts::default());
}

#[test]
fn test_page_count_from_pool_size() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .db_path(temp.path())
        .pool_size(10 * 4096 + 100)
        .build();
    let shared: SharedEngine<CountingEngine> = SharedEngine::new();

    let engine = shared.acquire(&config).unwrap();
    assert_eq!(engine.page_count, 10);
    shared.release(engine).unwrap();
}

#[test]
fn test_missing_path_is_config_error() {
    let shared: SharedEngine<CountingEngine> = SharedEngine::new();

    let err = shared.acquire(&Config::default()).unwrap_err();
    assert!(matches!(err, BTreeDbError::Config(_)), "got {:?}", err);
    assert_eq!(shared.ref_count(), 0);
    assert!(!shared.is_open());
}

#[test]
fn test_pool_smaller_than_a_page_is_config_error() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .db_path(temp.path())
        .pool_size(100)
        .build();
    let shared: SharedEngine<CountingEngine> = SharedEngine::new();

    assert!(matches!(
        shared.acquire(&config).unwrap_err(),
        BTreeDbError::Config(_)
    ));
    assert_eq!(counts(temp.path()), Counts::default());
}

#[test]
fn test_unbalanced_release_is_error() {
    let temp = TempDir::new().unwrap();
    let shared: SharedEngine<CountingEngine> = SharedEngine::new();

    let engine = shared.acquire(&config_for(&temp)).unwrap();
    shared.release(engine).unwrap();

    let stray = Arc::new(CountingEngine {
        path: temp.path().to_path_buf(),
        page_count: 1,
    });
    let err = shared.release(stray).unwrap_err();
    assert!(matches!(err, BTreeDbError::Storage(_)));
    assert_eq!(counts(temp.path()), Counts { opened: 1, closed: 1 });
}

#[test]
fn test_leaked_handle_blocks_close() {
    let temp = TempDir::new().unwrap();
    let shared: SharedEngine<CountingEngine> = SharedEngine::new();

    let engine = shared.acquire(&config_for(&temp)).unwrap();
    let leaked = Arc::clone(&engine);

    let err = shared.release(engine).unwrap_err();
    assert!(matches!(err, BTreeDbError::Storage(_)));
    assert_eq!(counts(temp.path()).closed, 0);
    drop(leaked);
}

#[test]
fn test_adapters_share_one_kv_table() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .db_path(temp.path())
        .field_count(1)
        .build();
    let shared = Arc::new(SharedEngine::new());

    let writer: BTreeDb = BTreeDb::init(&shared, &config).unwrap();
    let reader: BTreeDb = BTreeDb::init(&shared, &config).unwrap();
    assert_eq!(shared.ref_count(), 2);

    writer
        .insert("k", &[btreedb::Field::new("f", "v")])
        .unwrap();
    assert!(reader.read("k", None).unwrap().is_some());

    writer.close().unwrap();
    assert!(shared.is_open());
    reader.close().unwrap();
    assert!(!shared.is_open());
}
