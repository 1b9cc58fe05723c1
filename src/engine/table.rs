//! KvTable
//!
//! The engine implementation: an ordered MemTable made durable by a WAL and
//! periodic checkpoint snapshots.

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;

use super::memtable::MemTable;
use super::snapshot::{SnapshotMeta, SnapshotReader, SnapshotWriter};
use super::wal::{WalRecovery, WalWriter};
use super::{EngineOptions, KvEngine};
use crate::error::Result;

/// Write-side state, guarded by one mutex so WAL order equals apply order
struct WriteState {
    wal: WalWriter,
    /// Bytes logged since the last checkpoint
    dirty_bytes: usize,
    /// `dirty_bytes` level at which `put` attempts the next checkpoint
    checkpoint_at: usize,
}

/// Ordered key-value table
///
/// ## Concurrency Model
///
/// - **Writes** (`put`, checkpoint): serialized by the `write` mutex, which
///   owns the WAL. A write is appended to the WAL, then applied to the
///   MemTable before the mutex is released.
/// - **Reads** (`get`, `seek`): never touch the mutex; they take the
///   MemTable's read lock for the duration of a single lookup or cursor step.
///
/// ## Pool Budget
///
/// Once `page_count * PAGE_SIZE` bytes have been logged since the last
/// checkpoint, the whole table is written to a fresh snapshot and the WAL
/// is truncated. A failed checkpoint does not fail the write that triggered
/// it: the WAL still holds everything, and the next attempt waits for
/// another budget's worth of writes.
pub struct KvTable {
    options: EngineOptions,
    snapshot_path: PathBuf,
    memtable: MemTable,
    write: Mutex<WriteState>,
}

impl KvTable {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SNAPSHOT_FILENAME: &'static str = "table.snap";

    /// Open or create a table
    ///
    /// On startup:
    /// 1. Create the directory if needed
    /// 2. Load the last snapshot, if any
    /// 3. Replay the WAL on top of it
    pub fn open(options: EngineOptions) -> Result<Self> {
        fs::create_dir_all(&options.path)?;

        let snapshot_path = options.path.join(Self::SNAPSHOT_FILENAME);
        let wal_path = options.path.join(Self::WAL_FILENAME);
        let memtable = MemTable::new();

        if snapshot_path.exists() {
            let (entries, meta) = SnapshotReader::read_all(&snapshot_path)?;
            for (key, value) in entries {
                memtable.put(key, value);
            }
            tracing::info!(
                "Loaded snapshot {}: {} entries, {} bytes",
                meta.path.display(),
                meta.entry_count,
                meta.file_size
            );
        }

        let mut dirty_bytes = 0;
        let mut next_lsn = 1;
        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;
            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    "WAL recovery: {} entries recovered, {} corrupted, last_lsn={}",
                    recovery.entries_recovered,
                    recovery.entries_corrupted,
                    recovery.last_lsn
                );
            }
            for entry in entries {
                dirty_bytes += entry.key.len() + entry.value.len();
                memtable.put(Bytes::from(entry.key), Bytes::from(entry.value));
            }
            next_lsn = recovery.last_lsn + 1;
        }

        let wal = WalWriter::open(&wal_path, options.wal_sync_strategy, next_lsn)?;
        let checkpoint_at = options.pool_bytes();

        tracing::debug!(
            "Opened table at {} ({} pages, {} entries)",
            options.path.display(),
            options.page_count,
            memtable.entry_count()
        );

        Ok(Self {
            options,
            snapshot_path,
            memtable,
            write: Mutex::new(WriteState {
                wal,
                dirty_bytes,
                checkpoint_at,
            }),
        })
    }

    /// Get a value by key
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.memtable.get(key)
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Acquire write mutex
    /// 2. Append to WAL (durability)
    /// 3. Apply to MemTable
    /// 4. Checkpoint if the pool budget is used up
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut state = self.write.lock();

        state.wal.append(key, value)?;
        self.memtable
            .put(Bytes::copy_from_slice(key), Bytes::copy_from_slice(value));
        state.dirty_bytes += key.len() + value.len();

        if state.dirty_bytes >= state.checkpoint_at {
            if let Err(e) = self.checkpoint_locked(&mut state) {
                // the write itself is logged and applied
                state.checkpoint_at = state.dirty_bytes.saturating_add(self.options.pool_bytes());
                tracing::warn!(
                    "Checkpoint failed, retrying after {} more bytes: {}",
                    self.options.pool_bytes(),
                    e
                );
            }
        }
        Ok(())
    }

    /// Cursor at the first key `>= key`
    pub fn seek(&self, key: &[u8]) -> TableCursor<'_> {
        TableCursor {
            memtable: &self.memtable,
            position: Bytes::copy_from_slice(key),
            exclusive: false,
        }
    }

    /// Force a checkpoint regardless of the pool budget
    pub fn checkpoint(&self) -> Result<SnapshotMeta> {
        let mut state = self.write.lock();
        self.checkpoint_locked(&mut state)
    }

    /// Write a snapshot and truncate the WAL (called with the write mutex held)
    fn checkpoint_locked(&self, state: &mut WriteState) -> Result<SnapshotMeta> {
        let mut writer = SnapshotWriter::new(&self.snapshot_path)?;
        self.memtable.for_each(|key, value| writer.add(key, value))?;
        let meta = writer.finish()?;

        state.wal.truncate()?;
        state.dirty_bytes = 0;
        state.checkpoint_at = self.options.pool_bytes();

        tracing::debug!(
            "Checkpoint: {} entries, {} bytes",
            meta.entry_count,
            meta.file_size
        );
        Ok(meta)
    }

    /// Close the table gracefully
    ///
    /// Checkpoints outstanding writes and syncs the WAL
    pub fn close(self) -> Result<()> {
        let mut state = self.write.lock();
        if state.dirty_bytes > 0 {
            self.checkpoint_locked(&mut state)?;
        }
        state.wal.sync()?;
        tracing::debug!("Closed table at {}", self.options.path.display());
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn path(&self) -> &Path {
        &self.options.path
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Approximate size of all keys and values in memory
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Bytes logged since the last checkpoint
    pub fn dirty_bytes(&self) -> usize {
        self.write.lock().dirty_bytes
    }
}

impl KvEngine for KvTable {
    type Cursor<'a> = TableCursor<'a>;

    fn open(options: &EngineOptions) -> Result<Self> {
        KvTable::open(options.clone())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        Ok(KvTable::get(self, key))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        KvTable::put(self, key, value)
    }

    fn seek(&self, key: &[u8]) -> Result<Self::Cursor<'_>> {
        Ok(KvTable::seek(self, key))
    }

    fn close(self) -> Result<()> {
        KvTable::close(self)
    }
}

/// Forward cursor over a [`KvTable`].
///
/// Each step looks up the successor of the last returned key under a short
/// read lock, so concurrent writes are visible to the rest of the scan.
pub struct TableCursor<'a> {
    memtable: &'a MemTable,
    position: Bytes,
    /// False until the first entry has been returned (seek is inclusive)
    exclusive: bool,
}

impl Iterator for TableCursor<'_> {
    type Item = Result<(Bytes, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = self.memtable.next_from(&self.position, self.exclusive)?;
        self.position = key.clone();
        self.exclusive = true;
        Some(Ok((key, value)))
    }
}
