//! Storage adapter
//!
//! Translates the CRUD surface onto the engine's `get` / `put` / `seek`,
//! storing each record in the binary row format.

use std::sync::Arc;

use bytes::Bytes;

use crate::config::Config;
use crate::db::Db;
use crate::engine::{KvEngine, KvTable};
use crate::error::{BTreeDbError, Result};
use crate::row::{self, Field, Row};
use crate::shared::SharedEngine;

/// CRUD adapter over a shared ordered engine.
///
/// One instance per benchmark worker; all instances created from the same
/// [`SharedEngine`] operate on the same handle without further locking.
/// The `table` argument of every operation is ignored.
pub struct BTreeDb<E: KvEngine = KvTable> {
    engine: Arc<E>,
    shared: Arc<SharedEngine<E>>,
    /// Fields a full (unfiltered) read must produce
    field_count: usize,
}

impl<E: KvEngine> BTreeDb<E> {
    /// Acquire the shared engine and build an adapter over it
    pub fn init(shared: &Arc<SharedEngine<E>>, config: &Config) -> Result<Self> {
        let engine = shared.acquire(config)?;
        Ok(Self {
            engine,
            shared: Arc::clone(shared),
            field_count: config.field_count,
        })
    }

    pub fn field_count(&self) -> usize {
        self.field_count
    }

    /// Release the shared engine; the last adapter out closes it
    pub fn close(self) -> Result<()> {
        let Self { engine, shared, .. } = self;
        shared.release(engine)
    }

    /// Decode a stored row, filtered or in full
    fn decode(&self, data: Bytes, fields: Option<&[Bytes]>) -> Result<Row> {
        match fields {
            Some(names) => row::decode_row_filtered(data, names),
            None => {
                let row = row::decode_row(data)?;
                if row.len() != self.field_count {
                    return Err(BTreeDbError::FieldCountMismatch {
                        expected: self.field_count,
                        actual: row.len(),
                    });
                }
                Ok(row)
            }
        }
    }

    pub fn read(&self, key: &str, fields: Option<&[Bytes]>) -> Result<Option<Row>> {
        match self.engine.get(key.as_bytes())? {
            None => Ok(None),
            Some(data) => self.decode(data, fields).map(Some),
        }
    }

    /// Rows of up to `count` entries with key `>= start_key`, ascending.
    /// Running out of keys early is not an error.
    pub fn scan(&self, start_key: &str, count: usize, fields: Option<&[Bytes]>) -> Result<Vec<Row>> {
        let mut rows = Vec::with_capacity(count.min(1024));
        if count == 0 {
            return Ok(rows);
        }

        for entry in self.engine.seek(start_key.as_bytes())? {
            let (_key, data) = entry?;
            rows.push(self.decode(data, fields)?);
            if rows.len() == count {
                break;
            }
        }
        Ok(rows)
    }

    /// Overwrites the whole record: fields not listed in `values` are gone
    /// afterwards.
    pub fn update(&self, key: &str, values: &[Field]) -> Result<()> {
        self.insert(key, values)
    }

    pub fn insert(&self, key: &str, values: &[Field]) -> Result<()> {
        let data = row::encode_row(values)?;
        self.engine.put(key.as_bytes(), &data)
    }

    /// Does nothing: records are never removed from the engine, and a
    /// subsequent read still returns the stored row.
    pub fn delete(&self, key: &str) -> Result<()> {
        tracing::trace!("delete({}) ignored", key);
        Ok(())
    }
}

impl<E: KvEngine + 'static> Db for BTreeDb<E> {
    fn read(&self, _table: &str, key: &str, fields: Option<&[Bytes]>) -> Result<Option<Row>> {
        BTreeDb::read(self, key, fields)
    }

    fn scan(
        &self,
        _table: &str,
        start_key: &str,
        count: usize,
        fields: Option<&[Bytes]>,
    ) -> Result<Vec<Row>> {
        BTreeDb::scan(self, start_key, count, fields)
    }

    fn update(&self, _table: &str, key: &str, values: &[Field]) -> Result<()> {
        BTreeDb::update(self, key, values)
    }

    fn insert(&self, _table: &str, key: &str, values: &[Field]) -> Result<()> {
        BTreeDb::insert(self, key, values)
    }

    fn delete(&self, _table: &str, key: &str) -> Result<()> {
        BTreeDb::delete(self, key)
    }

    fn cleanup(self: Box<Self>) -> Result<()> {
        (*self).close()
    }
}
