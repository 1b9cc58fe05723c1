//! Checkpoint snapshot
//!
//! A full, sorted image of the table written at checkpoint time.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic: "BTDB" (4) | Version: u16 (2) | Count: u64 (8) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                   │
//! │   [KeyLen: u32][ValLen: u32][Key][Value]                │
//! │   ... repeated for each entry, ascending key order ...  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (8 bytes)                                        │
//! │   DataCRC: u32 (4) | Padding (4)                        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//! The file is written under a temporary name and renamed into place, so a
//! crash mid-checkpoint leaves the previous snapshot intact.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::{BTreeDbError, Result};

/// Magic bytes identifying a snapshot file
pub(crate) const MAGIC: &[u8; 4] = b"BTDB";

/// Current snapshot format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + EntryCount (8) = 14 bytes
pub(crate) const HEADER_SIZE: usize = 14;

/// Footer size: DataCRC (4) + Padding (4) = 8 bytes
pub(crate) const FOOTER_SIZE: usize = 8;

/// Metadata of a written or loaded snapshot
#[derive(Debug, Clone)]
pub struct SnapshotMeta {
    pub path: PathBuf,
    pub entry_count: u64,
    pub file_size: u64,
}

// =============================================================================
// Writer
// =============================================================================

/// Writes sorted entries to a new snapshot file
pub struct SnapshotWriter {
    /// Final path, renamed into place by `finish`
    path: PathBuf,
    tmp_path: PathBuf,
    writer: BufWriter<File>,
    entry_count: u64,
    data_hasher: crc32fast::Hasher,
}

impl SnapshotWriter {
    /// Create a writer; the header is written immediately
    pub fn new(path: &Path) -> Result<Self> {
        let tmp_path = path.with_extension("snap.tmp");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        let mut writer = BufWriter::new(file);
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?; // Placeholder for entry count

        Ok(Self {
            path: path.to_path_buf(),
            tmp_path,
            writer,
            entry_count: 0,
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Add an entry (must be called in ascending key order)
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let key_len = Self::len_prefix(key)?.to_le_bytes();
        let val_len = Self::len_prefix(value)?.to_le_bytes();

        for chunk in [&key_len[..], &val_len[..], key, value] {
            self.writer.write_all(chunk)?;
            self.data_hasher.update(chunk);
        }
        self.entry_count += 1;
        Ok(())
    }

    fn len_prefix(chunk: &[u8]) -> Result<u32> {
        u32::try_from(chunk.len()).map_err(|_| {
            BTreeDbError::Storage(format!("entry of {} bytes too large", chunk.len()))
        })
    }

    /// Write the footer, fix up the header and atomically replace the
    /// previous snapshot
    pub fn finish(mut self) -> Result<SnapshotMeta> {
        let data_crc = self.data_hasher.finalize();
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;
        self.writer.flush()?;

        let mut file = self.writer.into_inner().map_err(|e| {
            BTreeDbError::Storage(format!("Failed to flush snapshot: {}", e))
        })?;
        file.seek(SeekFrom::Start(6))?; // After magic + version
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;
        let file_size = file.metadata()?.len();
        drop(file);

        fs::rename(&self.tmp_path, &self.path)?;
        sync_parent_dir(&self.path)?;

        Ok(SnapshotMeta {
            path: self.path,
            entry_count: self.entry_count,
            file_size,
        })
    }
}

/// Persist a rename by syncing the directory that holds `path`
fn sync_parent_dir(path: &Path) -> Result<()> {
    // directories cannot be opened as files elsewhere
    if !cfg!(unix) {
        return Ok(());
    }
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    File::open(dir)?.sync_all()?;
    Ok(())
}

// =============================================================================
// Reader
// =============================================================================

/// Loads a snapshot, validating magic, version and data checksum
pub struct SnapshotReader;

impl SnapshotReader {
    /// Read every entry in key order. Keys and values share the file buffer.
    pub fn read_all(path: &Path) -> Result<(Vec<(Bytes, Bytes)>, SnapshotMeta)> {
        let data = Bytes::from(fs::read(path)?);
        let file_size = data.len() as u64;

        if data.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(BTreeDbError::Corruption(format!(
                "snapshot {} is {} bytes, shorter than header + footer",
                path.display(),
                data.len()
            )));
        }
        if &data[0..4] != MAGIC {
            return Err(BTreeDbError::Corruption(format!(
                "Invalid snapshot magic: expected BTDB, got {:?}",
                &data[0..4]
            )));
        }
        let version = u16::from_le_bytes([data[4], data[5]]);
        if version != VERSION {
            return Err(BTreeDbError::Corruption(format!(
                "Unsupported snapshot version: {}",
                version
            )));
        }
        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&data[6..14]);
        let entry_count = u64::from_le_bytes(count_bytes);

        let data_end = data.len() - FOOTER_SIZE;
        let block = &data[HEADER_SIZE..data_end];
        let stored_crc = u32::from_le_bytes([
            data[data_end],
            data[data_end + 1],
            data[data_end + 2],
            data[data_end + 3],
        ]);
        if crc32fast::hash(block) != stored_crc {
            return Err(BTreeDbError::Corruption(format!(
                "snapshot {} data checksum mismatch",
                path.display()
            )));
        }

        // each entry takes at least its 8-byte header
        let mut entries = Vec::with_capacity((entry_count as usize).min(block.len() / 8));
        let mut pos = HEADER_SIZE;
        while pos < data_end {
            if data_end - pos < 8 {
                return Err(BTreeDbError::Corruption("truncated entry header".to_string()));
            }
            let key_len =
                u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
                    as usize;
            let val_len =
                u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]])
                    as usize;
            pos += 8;

            if data_end - pos < key_len + val_len {
                return Err(BTreeDbError::Corruption("truncated entry body".to_string()));
            }
            let key = data.slice(pos..pos + key_len);
            let value = data.slice(pos + key_len..pos + key_len + val_len);
            pos += key_len + val_len;
            entries.push((key, value));
        }

        if entries.len() as u64 != entry_count {
            return Err(BTreeDbError::Corruption(format!(
                "snapshot header claims {} entries, found {}",
                entry_count,
                entries.len()
            )));
        }

        Ok((
            entries,
            SnapshotMeta {
                path: path.to_path_buf(),
                entry_count,
                file_size,
            },
        ))
    }
}
