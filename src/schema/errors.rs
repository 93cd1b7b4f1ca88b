//! Catalog errors

use thiserror::Error;

use super::types::{IndexId, TableId};

/// Result type for catalog operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised by catalog lookups, DDL and catalog loading
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// No table with this name
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// No table with this id
    #[error("Unknown table id: {0}")]
    UnknownTableId(TableId),

    /// No index with this name
    #[error("Unknown index: {0}")]
    UnknownIndex(String),

    /// No index with this id
    #[error("Unknown index id: {0}")]
    UnknownIndexId(IndexId),

    /// No column with this name in the table
    #[error("Unknown column {column} in table {table}")]
    UnknownColumn { table: String, column: String },

    /// A table with this name already exists
    #[error("Duplicate table: {0}")]
    DuplicateTable(String),

    /// An index with this name already exists
    #[error("Duplicate index: {0}")]
    DuplicateIndex(String),

    /// Table definition is inconsistent
    #[error("Invalid table {table}: {reason}")]
    InvalidTable { table: String, reason: String },

    /// Index definition is inconsistent
    #[error("Invalid index {index}: {reason}")]
    InvalidIndex { index: String, reason: String },

    /// Table still has child tables
    #[error("Table {0} has child tables")]
    HasChildren(String),

    /// Catalog file could not be read
    #[error("Failed to read catalog file {path}: {reason}")]
    Io { path: String, reason: String },

    /// Catalog file is not valid JSON for a catalog definition
    #[error("Malformed catalog definition: {0}")]
    Malformed(String),
}

impl SchemaError {
    /// Shorthand for an invalid index error
    pub fn invalid_index(index: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::InvalidIndex {
            index: index.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an invalid table error
    pub fn invalid_table(table: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::InvalidTable {
            table: table.into(),
            reason: reason.into(),
        }
    }
}
