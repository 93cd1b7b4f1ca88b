//! Row model errors

use thiserror::Error;

use crate::schema::ColumnType;

/// Result type for row operations
pub type RowResult<T> = Result<T, RowError>;

/// Errors raised while building, encoding or decoding rows
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    /// Value count does not match the row type
    #[error("Row arity mismatch: expected {expected} fields, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// Value type does not match the declared field type
    #[error("Type at {position} must be {expected}, is {actual}")]
    TypeMismatch {
        position: usize,
        expected: ColumnType,
        actual: &'static str,
    },

    /// Field position outside the row
    #[error("Field {position} out of range for row with {n_fields} fields")]
    FieldOutOfRange { position: usize, n_fields: usize },

    /// Encoded row is truncated or malformed
    #[error("Malformed row data: {0}")]
    Malformed(String),

    /// Encoded row failed checksum verification
    #[error("Row checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { expected: u32, computed: u32 },

    /// Row has no hierarchical key
    #[error("Row of type {0} has no hkey")]
    NoHKey(u32),
}
