//! Index usage errors
//!
//! Raised while building selectors, key ranges and orderings for a scan,
//! before any row is produced.

use thiserror::Error;

use crate::schema::SchemaError;

/// Result type for index usage construction
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors raised while preparing an index scan
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// Required table is not covered by the index
    #[error("{table} not in {index}")]
    TableNotInIndex { index: String, table: String },

    /// Key bound has more values than the index has columns
    #[error("Bound on {index} has {len} values but the index has {columns} columns")]
    BoundTooLong {
        index: String,
        len: usize,
        columns: usize,
    },

    /// Bound value does not have the type of its index column
    #[error("Bound value {position} on {index} must be {expected}, is {actual}")]
    BoundTypeMismatch {
        index: String,
        position: usize,
        expected: String,
        actual: String,
    },

    /// Ordering does not follow the index column order
    #[error("Ordering field {found} at {position} does not follow the key order of {index}")]
    OrderingNotIndexPrefix {
        index: String,
        position: usize,
        found: usize,
    },

    /// Catalog lookup failed
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
