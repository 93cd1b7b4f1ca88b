//! Bridge cursor identifiers

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::TableId;

/// Identifies one open bridge scan within a session.
///
/// Ids are never reused by the `DmlFunctions` that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CursorId {
    /// Sequence number
    pub id: u64,
    /// Scanned table
    pub table: TableId,
}

impl CursorId {
    /// Create a cursor id
    pub fn new(id: u64, table: TableId) -> Self {
        Self { id, table }
    }
}

impl fmt::Display for CursorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cursor {} on table {}", self.id, self.table)
    }
}
