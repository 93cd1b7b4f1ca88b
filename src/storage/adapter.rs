//! Storage collaborator interfaces
//!
//! The execution layer reaches storage only through these traits: ordered
//! group traversal, seekable index key cursors, hkey lookups and the
//! buffer-oriented row collectors behind the legacy scan bridge.

use std::sync::Arc;

use super::collector::RowBuffer;
use super::entries::IndexEntry;
use super::errors::StorageResult;
use crate::index::IndexKeyRange;
use crate::row::{ColumnSelector, HKey, LegacyRow, Value};
use crate::schema::{Catalog, GroupId, IndexId, TableId};

/// A stored row together with its place in the group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    /// Table the row belongs to
    pub table: TableId,
    /// Position in the group
    pub hkey: HKey,
    /// Column values
    pub fields: Vec<Value>,
}

/// Traversal direction of a key cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Ascending key order
    Forward,
    /// Descending key order
    Backward,
}

/// Rows of one group in HKey order.
pub trait GroupCursor: Send {
    /// Next row, `None` once exhausted
    fn next_row(&mut self) -> StorageResult<Option<GroupRow>>;
}

/// Seekable cursor over the entries of one index.
pub trait KeyCursor: Send {
    /// Positions before the first entry in `direction`
    fn seek_edge(&mut self, direction: Direction);

    /// Positions so that `advance` returns, going forward, the first entry
    /// whose key prefix is at or after `prefix`; going backward, the last
    /// entry whose key prefix is at or before `prefix`.
    fn seek(&mut self, prefix: &[Value], direction: Direction);

    /// Next entry in the current direction
    fn advance(&mut self) -> StorageResult<Option<IndexEntry>>;
}

/// What a row collector scans
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorRequest {
    /// Scanned table
    pub table: TableId,
    /// Table index to scan through; primary key order when absent
    pub index: Option<IndexId>,
    /// Key range over the index (or primary key) columns
    pub range: IndexKeyRange,
    /// Columns to populate; others come back null
    pub columns: ColumnSelector,
    /// Scan in descending key order
    pub descending: bool,
}

/// Buffer-oriented row source behind a legacy scan.
pub trait RowCollector: Send {
    /// Scanned table
    fn table_id(&self) -> TableId;

    /// Scanned index, if any
    fn index_id(&self) -> Option<IndexId>;

    /// False once the underlying scan is exhausted
    fn has_more(&self) -> bool;

    /// Switches between binary (`true`) and object (`false`) output
    fn output_to_message(&mut self, to_message: bool);

    /// Object mode: next row, `None` once exhausted
    fn collect_next_row(&mut self) -> StorageResult<Option<LegacyRow>>;

    /// Binary mode: appends the next row to `buffer`.
    ///
    /// Returns false without consuming the row when it does not fit, and
    /// false once exhausted; `has_more` tells the two apart.
    fn collect_next_row_into(&mut self, buffer: &mut RowBuffer) -> StorageResult<bool>;

    /// Releases the scan
    fn close(&mut self);
}

/// The storage collaborator consumed by cursors and the scan bridge.
pub trait StoreAdapter: Send + Sync {
    /// Current catalog snapshot
    fn catalog(&self) -> Arc<Catalog>;

    /// Rows of `group` in HKey order, restricted to `subtree` and its
    /// descendants when given
    fn group_cursor(
        &self,
        group: GroupId,
        subtree: Option<HKey>,
    ) -> StorageResult<Box<dyn GroupCursor>>;

    /// Key cursor over an index
    fn index_cursor(&self, index: IndexId) -> StorageResult<Box<dyn KeyCursor>>;

    /// The row at `hkey`, if present
    fn lookup(&self, group: GroupId, hkey: &HKey) -> StorageResult<Option<GroupRow>>;

    /// Row collector for a legacy scan
    fn row_collector(&self, request: &CollectorRequest) -> StorageResult<Box<dyn RowCollector>>;

    /// Inserts a row
    fn write_row(&self, table: TableId, fields: Vec<Value>) -> StorageResult<()>;

    /// Deletes the row with the primary key of `fields`
    fn delete_row(&self, table: TableId, fields: &[Value]) -> StorageResult<()>;

    /// Replaces `old` with `new`
    fn update_row(&self, table: TableId, old: &[Value], new: Vec<Value>) -> StorageResult<()>;

    /// Number of rows stored for a table
    fn row_count(&self, table: TableId) -> usize;

    /// Removes every row of every table in a group
    fn truncate_group(&self, group: GroupId) -> StorageResult<()>;
}
