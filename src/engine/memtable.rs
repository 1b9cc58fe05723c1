//! MemTable
//!
//! BTreeMap-based ordered table with RwLock for concurrency.
//!
//! Holds every live entry of the engine. Keys are ordered bytewise, which
//! is what `seek` iterates in.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;

/// In-memory ordered table
pub struct MemTable {
    data: RwLock<BTreeMap<Bytes, Bytes>>,
    /// Approximate size of keys + values in bytes
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Get a value by key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.data.read().get(key).cloned()
    }

    /// Put a key-value pair (write lock). Returns the new approximate size.
    pub fn put(&self, key: Bytes, value: Bytes) -> usize {
        let key_len = key.len();
        let new_len = value.len();

        let mut data = self.data.write();
        match data.insert(key, value) {
            Some(old) if old.len() > new_len => {
                self.size.fetch_sub(old.len() - new_len, Ordering::Relaxed);
            }
            Some(old) => {
                self.size.fetch_add(new_len - old.len(), Ordering::Relaxed);
            }
            None => {
                self.size.fetch_add(key_len + new_len, Ordering::Relaxed);
            }
        }
        self.size.load(Ordering::Relaxed)
    }

    /// First entry with key `>= key` (or `> key` when `exclusive`)
    pub fn next_from(&self, key: &[u8], exclusive: bool) -> Option<(Bytes, Bytes)> {
        let lower = if exclusive {
            Bound::Excluded(key)
        } else {
            Bound::Included(key)
        };
        self.data
            .read()
            .range::<[u8], _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()))
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Get entry count
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Run `f` over all entries in sorted key order under the read lock
    pub fn for_each<F>(&self, mut f: F) -> crate::error::Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> crate::error::Result<()>,
    {
        for (k, v) in self.data.read().iter() {
            f(k, v)?;
        }
        Ok(())
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
