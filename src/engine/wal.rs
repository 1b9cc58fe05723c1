//! Write-Ahead Log
//!
//! Every `put` is appended here before it is applied to the MemTable, so
//! writes survive a crash between checkpoints.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Frame 1                                 │
//! │ ┌─────────┬─────────┬─────────────────┐ │
//! │ │ Len (4) │ CRC (4) │ bincode(Entry)  │ │
//! │ └─────────┴─────────┴─────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Frame 2 ...                             │
//! └─────────────────────────────────────────┘
//! ```
//! Len and CRC are little-endian `u32`; CRC covers the payload only.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::config::WalSyncStrategy;
use crate::error::{BTreeDbError, Result};

/// Frame header size: payload length (4) + CRC (4)
pub const FRAME_HEADER_SIZE: usize = 8;

// =============================================================================
// Entry
// =============================================================================

/// A single logged write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    pub key: Vec<u8>,

    pub value: Vec<u8>,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

impl WalEntry {
    pub fn new(lsn: u64, key: &[u8], value: &[u8]) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            key: key.to_vec(),
            value: value.to_vec(),
            timestamp,
        }
    }

    /// Encode as a complete frame (header + payload)
    pub fn to_frame(&self) -> Result<Vec<u8>> {
        let payload =
            bincode::serialize(self).map_err(|e| BTreeDbError::Serialization(e.to_string()))?;
        let len = u32::try_from(payload.len())
            .map_err(|_| BTreeDbError::WalCorruption("entry too large".to_string()))?;

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Appends entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    next_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries appended since the last fsync
    unsynced: usize,
}

impl WalWriter {
    /// Open or create a WAL file for appending.
    ///
    /// `next_lsn` continues numbering after whatever recovery replayed.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy, next_lsn: u64) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            next_lsn,
            sync_strategy,
            unsynced: 0,
        })
    }

    /// Append a write, returning its LSN
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<u64> {
        let lsn = self.next_lsn;
        let frame = WalEntry::new(lsn, key, value).to_frame()?;
        self.writer.write_all(&frame)?;
        self.next_lsn += 1;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if due {
            self.sync()?;
        }
        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Drop every entry (after a checkpoint made them redundant)
    pub fn truncate(&mut self) -> Result<()> {
        self.writer.flush()?;
        let file = self.writer.get_mut();
        file.set_len(0)?;
        file.sync_all()?;
        self.unsynced = 0;
        Ok(())
    }

    /// LSN the next append will get
    pub fn next_lsn(&self) -> u64 {
        self.next_lsn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// =============================================================================
// Recovery
// =============================================================================

/// Replays the WAL after a restart
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries found (replay stops at the first)
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the WAL was truncated (torn or corrupt tail removed)
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover entries from a WAL file.
    ///
    /// Reads frames in order and stops at the first incomplete or corrupt
    /// frame; everything from that point on is cut off the file so new
    /// appends start on a clean boundary.
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, mut result, valid_len, file_len) = Self::scan(path)?;

        if valid_len < file_len {
            tracing::warn!(
                "Discarding {} bytes of WAL tail in {}",
                file_len - valid_len,
                path.display()
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len)?;
            file.sync_all()?;
            result.was_truncated = true;
        }

        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, mut result, valid_len, file_len) = Self::scan(path)?;
        result.was_truncated = valid_len < file_len;
        Ok(result)
    }

    /// Parse all valid frames; returns entries, stats, valid prefix length
    /// and total file length
    fn scan(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult, u64, u64)> {
        let mut data = Vec::new();
        File::open(path)?.read_to_end(&mut data)?;

        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();
        let mut pos = 0usize;

        while pos < data.len() {
            if data.len() - pos < FRAME_HEADER_SIZE {
                break; // torn header
            }
            let len = u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
                as usize;
            let crc =
                u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]);

            let start = pos + FRAME_HEADER_SIZE;
            if data.len() - start < len {
                break; // torn payload
            }
            let payload = &data[start..start + len];

            if crc32fast::hash(payload) != crc {
                result.entries_corrupted += 1;
                break;
            }
            let entry: WalEntry = match bincode::deserialize(payload) {
                Ok(entry) => entry,
                Err(_) => {
                    result.entries_corrupted += 1;
                    break;
                }
            };

            result.entries_recovered += 1;
            result.last_lsn = entry.lsn;
            entries.push(entry);
            pos = start + len;
        }

        Ok((entries, result, pos as u64, data.len() as u64))
    }
}
