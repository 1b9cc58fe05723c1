//! Row codec
//!
//! Encoding and decoding between [`Field`] sequences and the binary row
//! format. Decoding never reads past the buffer: every length prefix is
//! checked against the bytes that remain, and a violation is reported as
//! [`BTreeDbError::MalformedRow`].

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{Field, Row};
use crate::error::{BTreeDbError, Result};

/// Size of each name/value length prefix
pub const LEN_PREFIX_SIZE: usize = 4;

// =============================================================================
// Encoding
// =============================================================================

/// Exact encoded size of `fields`
pub fn encoded_len(fields: &[Field]) -> usize {
    fields
        .iter()
        .map(|f| 2 * LEN_PREFIX_SIZE + f.name.len() + f.value.len())
        .sum()
}

/// Encode a row to bytes
pub fn encode_row(fields: &[Field]) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(encoded_len(fields));
    encode_row_into(fields, &mut buf)?;
    Ok(buf.freeze())
}

/// Append the encoding of `fields` to `buf`
pub fn encode_row_into(fields: &[Field], buf: &mut BytesMut) -> Result<()> {
    buf.reserve(encoded_len(fields));
    for field in fields {
        put_chunk(buf, &field.name)?;
        put_chunk(buf, &field.value)?;
    }
    Ok(())
}

fn put_chunk(buf: &mut BytesMut, chunk: &[u8]) -> Result<()> {
    let len = u32::try_from(chunk.len())
        .map_err(|_| BTreeDbError::FieldTooLarge { len: chunk.len() })?;
    buf.put_u32_le(len);
    buf.put_slice(chunk);
    Ok(())
}

// =============================================================================
// Decoding
// =============================================================================

/// Bounds-checked cursor over an encoded row.
///
/// Names and values are returned as slices of the source buffer, so no
/// payload bytes are copied.
#[derive(Debug, Clone)]
pub struct RowReader {
    buf: Bytes,
    /// Offset of `buf` within the original buffer, for error messages
    offset: usize,
}

impl RowReader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf, offset: 0 }
    }

    /// True once every byte has been consumed
    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Decode the next field, or `None` at the end of the buffer
    pub fn next_field(&mut self) -> Result<Option<Field>> {
        if self.is_empty() {
            return Ok(None);
        }
        let name = self.take_chunk("name")?;
        let value = self.take_chunk("value")?;
        Ok(Some(Field { name, value }))
    }

    fn take_chunk(&mut self, what: &str) -> Result<Bytes> {
        if self.buf.remaining() < LEN_PREFIX_SIZE {
            return Err(BTreeDbError::MalformedRow(format!(
                "truncated {} length at offset {}: {} bytes left",
                what,
                self.offset,
                self.buf.remaining()
            )));
        }
        let len = self.buf.get_u32_le() as usize;
        self.offset += LEN_PREFIX_SIZE;

        if self.buf.remaining() < len {
            return Err(BTreeDbError::MalformedRow(format!(
                "{} of {} bytes at offset {} overruns buffer ({} bytes left)",
                what,
                len,
                self.offset,
                self.buf.remaining()
            )));
        }
        let chunk = self.buf.split_to(len);
        self.offset += len;
        Ok(chunk)
    }
}

impl Iterator for RowReader {
    type Item = Result<Field>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_field() {
            Ok(Some(field)) => Some(Ok(field)),
            Ok(None) => None,
            Err(e) => {
                // Poison the cursor so iteration stops after the first error
                self.buf.clear();
                Some(Err(e))
            }
        }
    }
}

/// Decode every field of an encoded row
pub fn decode_row(buf: Bytes) -> Result<Row> {
    RowReader::new(buf).collect()
}

/// Decode only the `requested` fields, in the order given.
///
/// `requested` must be a subsequence of the stored field order: the buffer
/// is walked once and each field is compared with the next unmatched name
/// only. Fields that do not match are skipped. If the buffer ends before
/// every requested name is matched, the first unmatched name is reported as
/// [`BTreeDbError::FieldNotFound`].
pub fn decode_row_filtered<N: AsRef<[u8]>>(buf: Bytes, requested: &[N]) -> Result<Row> {
    let mut reader = RowReader::new(buf);
    let mut wanted = requested.iter().peekable();
    let mut row = Vec::with_capacity(requested.len());

    while let Some(name) = wanted.peek() {
        let Some(field) = reader.next_field()? else {
            return Err(BTreeDbError::FieldNotFound {
                name: String::from_utf8_lossy(name.as_ref()).into_owned(),
            });
        };
        if field.name.as_ref() == name.as_ref() {
            row.push(field);
            wanted.next();
        }
    }

    Ok(row)
}
