//! CRUD surface
//!
//! The interface a benchmark harness drives, independent of the backend.

use bytes::Bytes;

use crate::error::Result;
use crate::row::{Field, Row};

/// Outcome of a CRUD call as the harness counts it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Error = 0x02,
}

impl Status {
    /// Status of a call that returns no data
    pub fn of<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(_) => Status::Error,
        }
    }

    /// Status of a lookup, where `Ok(None)` means the key is absent
    pub fn of_lookup<T>(result: &Result<Option<T>>) -> Self {
        match result {
            Ok(Some(_)) => Status::Ok,
            Ok(None) => Status::NotFound,
            Err(_) => Status::Error,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

/// A database as seen by the workload.
///
/// `table` names the logical table; backends with a single table ignore it.
/// `fields`, when given, restricts reads to those field names, in stored
/// field order.
pub trait Db: Send + Sync {
    /// Read one record; `Ok(None)` if the key does not exist
    fn read(&self, table: &str, key: &str, fields: Option<&[Bytes]>) -> Result<Option<Row>>;

    /// Read up to `count` records in key order, starting at `start_key`
    fn scan(
        &self,
        table: &str,
        start_key: &str,
        count: usize,
        fields: Option<&[Bytes]>,
    ) -> Result<Vec<Row>>;

    /// Replace the record stored under `key`
    fn update(&self, table: &str, key: &str, values: &[Field]) -> Result<()>;

    /// Create or overwrite the record stored under `key`
    fn insert(&self, table: &str, key: &str, values: &[Field]) -> Result<()>;

    /// Delete the record stored under `key`
    fn delete(&self, table: &str, key: &str) -> Result<()>;

    /// Release per-instance resources; called once when the worker exits
    fn cleanup(self: Box<Self>) -> Result<()>;
}
