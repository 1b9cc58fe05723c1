//! Row Module
//!
//! Named byte-string fields and the binary row format they are stored in.
//!
//! ## Row Format
//! ```text
//! ┌──────────────┬──────────┬───────────────┬───────────┐
//! │ NameLen (4)  │  Name    │ ValueLen (4)  │  Value    │  ... repeated per field
//! └──────────────┴──────────┴───────────────┴───────────┘
//! ```
//! Lengths are little-endian `u32`. There is no row header, field count or
//! checksum: the end of the buffer terminates the row.

mod codec;

use bytes::Bytes;

pub use codec::{
    decode_row, decode_row_filtered, encode_row, encode_row_into, encoded_len, RowReader,
    LEN_PREFIX_SIZE,
};

/// One logical record: fields in stored order
pub type Row = Vec<Field>;

/// A named value within a row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: Bytes,
    pub value: Bytes,
}

impl Field {
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Lossy UTF-8 view of the name, for messages and display
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}
