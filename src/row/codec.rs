//! Binary row encoding
//!
//! Rows cross the legacy scan boundary in this format:
//!
//! ```text
//! +------------------+
//! | Row Length       | (u32 LE, whole row including this field)
//! +------------------+
//! | Table ID         | (u32 LE)
//! +------------------+
//! | Field Count      | (u16 LE)
//! +------------------+
//! | Fields           | (tag u8 + payload, repeated)
//! +------------------+
//! | Checksum         | (u32 LE)
//! +------------------+
//! ```
//!
//! Field tags: 0 null, 1 bool (u8), 2 int (i64 LE), 3 float (f64 bits LE),
//! 4 text (u32 LE length + UTF-8 bytes). The checksum is CRC32 over every
//! byte before it, and every decode verifies it.

use crc32fast::Hasher;

use super::errors::{RowError, RowResult};
use super::value::Value;
use crate::schema::TableId;

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_TEXT: u8 = 4;

const HEADER_LEN: usize = 4 + 4 + 2;
const CHECKSUM_LEN: usize = 4;

fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// An encoded row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowData {
    bytes: Vec<u8>,
}

impl RowData {
    /// Encodes the fields of a row of `table`.
    ///
    /// Fails when the row length, the field count or a text length does not
    /// fit its header field.
    pub fn encode(table: TableId, fields: &[Value]) -> RowResult<Self> {
        let total = Self::encoded_len(fields);
        let row_len = u32::try_from(total)
            .map_err(|_| RowError::Malformed(format!("row of {} bytes is too long", total)))?;
        let n_fields = u16::try_from(fields.len()).map_err(|_| {
            RowError::Malformed(format!("row of {} fields has too many", fields.len()))
        })?;
        let mut bytes = Vec::with_capacity(total);
        bytes.extend_from_slice(&row_len.to_le_bytes());
        bytes.extend_from_slice(&table.0.to_le_bytes());
        bytes.extend_from_slice(&n_fields.to_le_bytes());

        for value in fields {
            match value {
                Value::Null => bytes.push(TAG_NULL),
                Value::Bool(v) => {
                    bytes.push(TAG_BOOL);
                    bytes.push(u8::from(*v));
                }
                Value::Int(v) => {
                    bytes.push(TAG_INT);
                    bytes.extend_from_slice(&v.to_le_bytes());
                }
                Value::Float(v) => {
                    bytes.push(TAG_FLOAT);
                    bytes.extend_from_slice(&v.to_bits().to_le_bytes());
                }
                Value::Text(v) => {
                    let text_len = u32::try_from(v.len()).map_err(|_| {
                        RowError::Malformed(format!("text of {} bytes is too long", v.len()))
                    })?;
                    bytes.push(TAG_TEXT);
                    bytes.extend_from_slice(&text_len.to_le_bytes());
                    bytes.extend_from_slice(v.as_bytes());
                }
            }
        }

        let checksum = compute_checksum(&bytes);
        bytes.extend_from_slice(&checksum.to_le_bytes());
        Ok(Self { bytes })
    }

    /// Size in bytes that `encode` produces for `fields`
    pub fn encoded_len(fields: &[Value]) -> usize {
        let body: usize = fields
            .iter()
            .map(|v| match v {
                Value::Null => 1,
                Value::Bool(_) => 2,
                Value::Int(_) | Value::Float(_) => 9,
                Value::Text(s) => 5 + s.len(),
            })
            .sum();
        HEADER_LEN + body + CHECKSUM_LEN
    }

    /// Reads one row from the front of `data`, verifying its checksum.
    ///
    /// Returns the row and the number of bytes consumed.
    pub fn from_bytes(data: &[u8]) -> RowResult<(Self, usize)> {
        if data.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(RowError::Malformed("row too short".into()));
        }
        let length = read_u32(data, 0)? as usize;
        if length < HEADER_LEN + CHECKSUM_LEN {
            return Err(RowError::Malformed(format!("invalid row length {}", length)));
        }
        if data.len() < length {
            return Err(RowError::Malformed(format!(
                "row truncated: expected {} bytes, got {}",
                length,
                data.len()
            )));
        }

        let checksum_offset = length - CHECKSUM_LEN;
        let expected = read_u32(data, checksum_offset)?;
        let computed = compute_checksum(&data[..checksum_offset]);
        if expected != computed {
            return Err(RowError::ChecksumMismatch { expected, computed });
        }

        Ok((
            Self {
                bytes: data[..length].to_vec(),
            },
            length,
        ))
    }

    /// Raw encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encoded length
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; an encoded row has at least a header
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Table the row belongs to
    pub fn table_id(&self) -> TableId {
        TableId(read_u32(&self.bytes, 4).unwrap_or_default())
    }

    /// Number of encoded fields
    pub fn field_count(&self) -> usize {
        read_u16(&self.bytes, 8).unwrap_or_default() as usize
    }

    /// Decodes all field values
    pub fn decode_fields(&self) -> RowResult<Vec<Value>> {
        let end = self.bytes.len() - CHECKSUM_LEN;
        let count = self.field_count();
        let mut fields = Vec::with_capacity(count);
        let mut pos = HEADER_LEN;

        for _ in 0..count {
            if pos >= end {
                return Err(RowError::Malformed("field data truncated".into()));
            }
            let tag = self.bytes[pos];
            pos += 1;
            let value = match tag {
                TAG_NULL => Value::Null,
                TAG_BOOL => {
                    let b = *self
                        .bytes
                        .get(pos)
                        .ok_or_else(|| RowError::Malformed("bool truncated".into()))?;
                    pos += 1;
                    Value::Bool(b != 0)
                }
                TAG_INT => {
                    let v = read_u64(&self.bytes[..end], pos)?;
                    pos += 8;
                    Value::Int(v as i64)
                }
                TAG_FLOAT => {
                    let v = read_u64(&self.bytes[..end], pos)?;
                    pos += 8;
                    Value::Float(f64::from_bits(v))
                }
                TAG_TEXT => {
                    let len = read_u32(&self.bytes[..end], pos)? as usize;
                    pos += 4;
                    let raw = self
                        .bytes
                        .get(pos..pos + len)
                        .filter(|_| pos + len <= end)
                        .ok_or_else(|| RowError::Malformed("text truncated".into()))?;
                    let text = String::from_utf8(raw.to_vec())
                        .map_err(|e| RowError::Malformed(format!("invalid UTF-8: {}", e)))?;
                    pos += len;
                    Value::Text(text)
                }
                other => {
                    return Err(RowError::Malformed(format!("unknown field tag {}", other)))
                }
            };
            fields.push(value);
        }

        if pos != end {
            return Err(RowError::Malformed("trailing bytes after fields".into()));
        }
        Ok(fields)
    }
}

fn read_u16(data: &[u8], at: usize) -> RowResult<u16> {
    data.get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| RowError::Malformed(format!("u16 at {} out of bounds", at)))
}

fn read_u32(data: &[u8], at: usize) -> RowResult<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| RowError::Malformed(format!("u32 at {} out of bounds", at)))
}

fn read_u64(data: &[u8], at: usize) -> RowResult<u64> {
    let mut buf = [0u8; 8];
    let raw = data
        .get(at..at + 8)
        .ok_or_else(|| RowError::Malformed(format!("u64 at {} out of bounds", at)))?;
    buf.copy_from_slice(raw);
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Value> {
        vec![
            Value::Int(42),
            Value::Null,
            Value::text("héllo"),
            Value::Bool(true),
            Value::Float(-2.5),
        ]
    }

    #[test]
    fn test_encode_decode() {
        let data = RowData::encode(TableId(3), &sample()).unwrap();
        assert_eq!(data.len(), RowData::encoded_len(&sample()));
        assert_eq!(data.table_id(), TableId(3));
        assert_eq!(data.field_count(), 5);
        assert_eq!(data.decode_fields().unwrap(), sample());
    }

    #[test]
    fn test_int_rows_have_fixed_size() {
        let a = RowData::encode(TableId(1), &[Value::Int(1), Value::Int(i64::MAX)]).unwrap();
        let b = RowData::encode(TableId(1), &[Value::Int(-7), Value::Int(0)]).unwrap();
        assert_eq!(a.len(), b.len());
        assert_eq!(a.len(), 4 + 4 + 2 + 2 * 9 + 4);
    }

    #[test]
    fn test_from_bytes_consumes_one_row() {
        let first = RowData::encode(TableId(1), &[Value::Int(1)]).unwrap();
        let second = RowData::encode(TableId(1), &[Value::Int(2)]).unwrap();
        let mut buf = first.as_bytes().to_vec();
        buf.extend_from_slice(second.as_bytes());

        let (row, used) = RowData::from_bytes(&buf).unwrap();
        assert_eq!(row, first);
        let (row, _) = RowData::from_bytes(&buf[used..]).unwrap();
        assert_eq!(row, second);
    }

    #[test]
    fn test_corruption_detected() {
        let data = RowData::encode(TableId(1), &sample()).unwrap();
        let mut bytes = data.as_bytes().to_vec();
        bytes[12] ^= 0xFF;
        assert!(matches!(
            RowData::from_bytes(&bytes),
            Err(RowError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_truncation_detected() {
        let data = RowData::encode(TableId(1), &sample()).unwrap();
        let bytes = &data.as_bytes()[..data.len() - 1];
        assert!(matches!(
            RowData::from_bytes(bytes),
            Err(RowError::Malformed(_))
        ));
    }

    #[test]
    fn test_field_count_overflow_rejected() {
        let fields = vec![Value::Null; usize::from(u16::MAX) + 1];
        assert!(matches!(
            RowData::encode(TableId(1), &fields),
            Err(RowError::Malformed(_))
        ));
        let fields = vec![Value::Null; usize::from(u16::MAX)];
        assert_eq!(RowData::encode(TableId(1), &fields).unwrap().field_count(), u16::MAX as usize);
    }
}
