//! Scan requests
//!
//! A request names the table, the index to scan through (primary key order
//! without one), the columns to populate, an optional key range and a row
//! limit. Range bounds are key prefixes over the index columns; flags say
//! whether each bound is exclusive or ignored.

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use crate::index::{IndexBound, IndexKeyRange};
use crate::row::{ColumnSelector, RowData, Value};
use crate::schema::{IndexId, TableId};

/// Scan option bits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ScanFlags(u32);

impl ScanFlags {
    /// No options
    pub const NONE: ScanFlags = ScanFlags(0);
    /// Return rows in descending key order
    pub const DESCENDING: ScanFlags = ScanFlags(1);
    /// Keys equal to the start bound are excluded
    pub const START_RANGE_EXCLUSIVE: ScanFlags = ScanFlags(1 << 1);
    /// Keys equal to the end bound are excluded
    pub const END_RANGE_EXCLUSIVE: ScanFlags = ScanFlags(1 << 2);
    /// Ignore the start bound
    pub const START_AT_BEGINNING: ScanFlags = ScanFlags(1 << 5);
    /// Ignore the end bound
    pub const END_AT_END: ScanFlags = ScanFlags(1 << 6);

    /// Raw bits
    pub fn bits(self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set
    pub fn contains(self, other: ScanFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ScanFlags {
    type Output = ScanFlags;

    fn bitor(self, rhs: ScanFlags) -> ScanFlags {
        ScanFlags(self.0 | rhs.0)
    }
}

/// Predicate over a produced row; true once the scan should stop
pub type LimitPredicate = Arc<dyn Fn(&RowData) -> bool + Send + Sync>;

/// When a scan stops before its range is exhausted.
///
/// The row that trips the limit is never delivered.
#[derive(Clone, Default)]
pub enum ScanLimit {
    /// Scan the whole range
    #[default]
    None,
    /// Deliver at most this many rows
    Rows(u64),
    /// Stop at the first row the predicate accepts
    Until(LimitPredicate),
}

impl ScanLimit {
    /// Whether `row`, after `delivered` rows, trips the limit
    pub fn reached(&self, row: &RowData, delivered: u64) -> bool {
        match self {
            ScanLimit::None => false,
            ScanLimit::Rows(n) => delivered >= *n,
            ScanLimit::Until(predicate) => predicate(row),
        }
    }
}

impl fmt::Debug for ScanLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanLimit::None => write!(f, "None"),
            ScanLimit::Rows(n) => f.debug_tuple("Rows").field(n).finish(),
            ScanLimit::Until(_) => write!(f, "Until(..)"),
        }
    }
}

/// Scan of one table, optionally through one of its indexes
#[derive(Debug, Clone)]
pub struct ScanRequest {
    table: TableId,
    index: Option<IndexId>,
    columns: ColumnSelector,
    start: Option<Vec<Value>>,
    end: Option<Vec<Value>>,
    flags: ScanFlags,
    limit: ScanLimit,
    scan_all: bool,
}

impl ScanRequest {
    /// Unbounded scan of `columns` of `table` in primary key order
    pub fn new(table: TableId, columns: ColumnSelector) -> Self {
        Self {
            table,
            index: None,
            columns,
            start: None,
            end: None,
            flags: ScanFlags::NONE,
            limit: ScanLimit::None,
            scan_all: false,
        }
    }

    /// Unbounded scan of the columns set in a legacy byte bitmap (bit `i % 8`
    /// of byte `i / 8` selects column `i`)
    pub fn from_legacy_columns(table: TableId, bitmap: &[u8]) -> Self {
        Self::new(table, ColumnSelector::unpack_from_legacy(bitmap))
    }

    /// Scan through a table index
    pub fn index(mut self, index: IndexId) -> Self {
        self.index = Some(index);
        self
    }

    /// Start bound over the leading scanned key columns
    pub fn start(mut self, key: Vec<Value>) -> Self {
        self.start = Some(key);
        self
    }

    /// End bound over the leading scanned key columns
    pub fn end(mut self, key: Vec<Value>) -> Self {
        self.end = Some(key);
        self
    }

    /// Scan options
    pub fn flags(mut self, flags: ScanFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Row limit
    pub fn limit(mut self, limit: ScanLimit) -> Self {
        self.limit = limit;
        self
    }

    /// Scanned table
    pub fn table_id(&self) -> TableId {
        self.table
    }

    /// Index scanned through, if any
    pub fn index_id(&self) -> Option<IndexId> {
        self.index
    }

    /// Populated columns
    pub fn columns(&self) -> &ColumnSelector {
        &self.columns
    }

    /// Populated columns as a legacy byte bitmap
    pub fn legacy_columns(&self) -> Vec<u8> {
        self.columns.pack_to_legacy()
    }

    /// Scan options
    pub fn scan_flags(&self) -> ScanFlags {
        self.flags
    }

    /// Row limit
    pub fn scan_limit(&self) -> &ScanLimit {
        &self.limit
    }

    /// True for a request that populates every column without a limit
    pub fn is_scan_all(&self) -> bool {
        self.scan_all
    }

    /// Rows in descending key order
    pub fn is_descending(&self) -> bool {
        self.flags.contains(ScanFlags::DESCENDING)
    }

    /// Populates every one of `n_columns` columns, without a limit
    pub(crate) fn resolve_scan_all(mut self, n_columns: usize) -> Self {
        if self.scan_all {
            self.columns = ColumnSelector::all(n_columns);
            self.limit = ScanLimit::None;
        }
        self
    }

    /// Key range described by the bounds and flags
    pub fn range(&self) -> IndexKeyRange {
        let low = match &self.start {
            Some(key) if !self.flags.contains(ScanFlags::START_AT_BEGINNING) => {
                Some(if self.flags.contains(ScanFlags::START_RANGE_EXCLUSIVE) {
                    IndexBound::exclusive(key.clone())
                } else {
                    IndexBound::inclusive(key.clone())
                })
            }
            _ => None,
        };
        let high = match &self.end {
            Some(key) if !self.flags.contains(ScanFlags::END_AT_END) => {
                Some(if self.flags.contains(ScanFlags::END_RANGE_EXCLUSIVE) {
                    IndexBound::exclusive(key.clone())
                } else {
                    IndexBound::inclusive(key.clone())
                })
            }
            _ => None,
        };
        match (low, high) {
            (Some(low), Some(high)) => IndexKeyRange::bounded(low, high),
            (Some(low), None) => IndexKeyRange::starting_at(low),
            (None, Some(high)) => IndexKeyRange::ending_at(high),
            (None, None) => IndexKeyRange::unbounded(),
        }
    }
}

/// Every column of every row of a table, in primary key order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanAllRequest {
    table: TableId,
    descending: bool,
}

impl ScanAllRequest {
    /// Full scan of `table`
    pub fn new(table: TableId) -> Self {
        Self {
            table,
            descending: false,
        }
    }

    /// Scan in descending primary key order
    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }
}

impl From<ScanAllRequest> for ScanRequest {
    fn from(request: ScanAllRequest) -> Self {
        let flags = if request.descending {
            ScanFlags::DESCENDING
        } else {
            ScanFlags::NONE
        };
        let mut scan = ScanRequest::new(request.table, ColumnSelector::new()).flags(flags);
        scan.scan_all = true;
        scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TableId;

    #[test]
    fn test_flags_combine() {
        let flags = ScanFlags::DESCENDING | ScanFlags::END_RANGE_EXCLUSIVE;
        assert!(flags.contains(ScanFlags::DESCENDING));
        assert!(flags.contains(ScanFlags::END_RANGE_EXCLUSIVE));
        assert!(!flags.contains(ScanFlags::START_RANGE_EXCLUSIVE));
        assert_eq!(flags.bits(), 5);
    }

    #[test]
    fn test_range_from_bounds_and_flags() {
        let request = ScanRequest::new(TableId(1), ColumnSelector::all(2))
            .start(vec![Value::Int(10)])
            .end(vec![Value::Int(20)])
            .flags(ScanFlags::START_RANGE_EXCLUSIVE);
        let range = request.range();
        assert!(!range.contains(&[Value::Int(10)]));
        assert!(range.contains(&[Value::Int(11)]));
        assert!(range.contains(&[Value::Int(20)]));
        assert!(!range.contains(&[Value::Int(21)]));

        let open = request.flags(ScanFlags::START_AT_BEGINNING | ScanFlags::END_AT_END);
        assert_eq!(open.range(), IndexKeyRange::unbounded());
    }

    #[test]
    fn test_legacy_column_bitmap() {
        let request = ScanRequest::from_legacy_columns(TableId(1), &[0b0000_0101, 0b1000_0000]);
        let positions: Vec<usize> = request.columns().positions().collect();
        assert_eq!(positions, vec![0, 2, 15]);
        assert_eq!(request.legacy_columns(), vec![0b0000_0101, 0b1000_0000]);

        let empty = ScanRequest::from_legacy_columns(TableId(1), &[]);
        assert!(empty.columns().is_empty());
        assert!(empty.legacy_columns().is_empty());
    }

    #[test]
    fn test_row_limit() {
        let row = RowData::encode(TableId(1), &[Value::Int(1)]).unwrap();
        let limit = ScanLimit::Rows(2);
        assert!(!limit.reached(&row, 0));
        assert!(!limit.reached(&row, 1));
        assert!(limit.reached(&row, 2));
        assert!(!ScanLimit::None.reached(&row, u64::MAX));
    }

    #[test]
    fn test_scan_all_request() {
        let request: ScanRequest = ScanAllRequest::new(TableId(3)).descending().into();
        assert!(request.is_scan_all());
        assert!(request.is_descending());
        assert_eq!(request.table_id(), TableId(3));
    }
}
