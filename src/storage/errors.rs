//! Storage collaborator errors

use thiserror::Error;

use crate::index::IndexError;
use crate::row::RowError;
use crate::schema::{GroupId, IndexId, SchemaError, TableId};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by the storage collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Table has no storage
    #[error("No storage for table {0}")]
    UnknownTable(TableId),

    /// Index has no storage
    #[error("No storage for index {0}")]
    UnknownIndex(IndexId),

    /// Group has no storage
    #[error("No storage for group {0}")]
    UnknownGroup(GroupId),

    /// Primary key already present
    #[error("Duplicate key {key} in table {table}")]
    DuplicateKey { table: String, key: String },

    /// Second row with the same non-null key in a unique index
    #[error("Unique index {index} already holds key {key}")]
    UniqueViolation { index: String, key: String },

    /// Primary key not present
    #[error("No row with key {key} in table {table}")]
    RowNotFound { table: String, key: String },

    /// Scan shape the store cannot serve
    #[error("Unsupported scan: {0}")]
    UnsupportedScan(String),

    /// Collector used in the other output mode
    #[error("Row collector is in {0} output mode")]
    WrongOutputMode(&'static str),

    /// Collector used after close
    #[error("Row collector is closed")]
    CollectorClosed,

    /// Row validation or decoding failed
    #[error(transparent)]
    Row(#[from] RowError),

    /// Catalog lookup or DDL failed
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Index usage failed
    #[error(transparent)]
    Index(#[from] IndexError),
}
