//! Engine Module
//!
//! The ordered key-value engine the adapter stores rows in.
//!
//! ## Responsibilities
//! - Point lookups and writes (`get` / `put`)
//! - Forward iteration from a key, inclusive (`seek`)
//! - Durability across close/reopen and crashes
//!
//! [`KvEngine`] is the seam the adapter is written against. [`KvTable`] is
//! the implementation shipped with the crate:
//!
//! ```text
//!   put ──► WAL (append, CRC) ──► MemTable (RwLock<BTreeMap>)
//!                                      │
//!               pool budget exceeded   ▼
//!                             Snapshot (table.snap) ──► WAL truncate
//! ```

mod memtable;
mod snapshot;
mod table;
mod wal;

use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::config::WalSyncStrategy;
use crate::error::Result;

pub use memtable::MemTable;
pub use snapshot::{SnapshotMeta, SnapshotReader, SnapshotWriter};
pub use table::{KvTable, TableCursor};
pub use wal::{RecoveryResult, WalEntry, WalRecovery, WalWriter};

/// Size of one page of the engine's pool, in bytes
pub const PAGE_SIZE: usize = 4096;

/// Parameters an engine is opened with
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Root directory of the engine's files
    pub path: PathBuf,

    /// Pool budget in pages of [`PAGE_SIZE`]
    pub page_count: usize,

    /// WAL sync strategy
    pub wal_sync_strategy: WalSyncStrategy,
}

impl EngineOptions {
    pub fn new(path: impl Into<PathBuf>, page_count: usize) -> Self {
        Self {
            path: path.into(),
            page_count,
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pool budget in bytes
    pub fn pool_bytes(&self) -> usize {
        self.page_count.saturating_mul(PAGE_SIZE)
    }
}

/// Ordered key-value engine primitives used by the adapter.
///
/// Implementations must be safe to share across threads: `get`, `put` and
/// `seek` are called concurrently without any external locking and must be
/// linearizable per key.
pub trait KvEngine: Send + Sync + Sized {
    /// Forward cursor yielding `(key, value)` pairs in ascending key order
    type Cursor<'a>: Iterator<Item = Result<(Bytes, Bytes)>>
    where
        Self: 'a;

    /// Open or create the engine
    fn open(options: &EngineOptions) -> Result<Self>;

    /// Get the value stored under `key`
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>>;

    /// Create or overwrite `key`
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Cursor positioned at the first key `>= key`
    fn seek(&self, key: &[u8]) -> Result<Self::Cursor<'_>>;

    /// Flush and release all resources
    fn close(self) -> Result<()>;
}
