//! Row types
//!
//! A RowType describes the arity and per-field types of rows and, for
//! table- and index-backed rows, where they come from. Row types are created
//! once per plan and shared read-only. Every row type gets a process-unique
//! small integer id, so equality is an integer compare.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::schema::{Catalog, ColumnType, IndexId, TableId};

static NEXT_ROW_TYPE_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique row type identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowTypeId(u32);

impl RowTypeId {
    fn next() -> Self {
        RowTypeId(NEXT_ROW_TYPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for RowTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where rows of a type come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowTypeKind {
    /// Rows of a user table
    Table(TableId),
    /// Entries of an index
    Index(IndexId),
    /// Literal rows
    Values,
    /// Output of a projection
    Projection,
}

/// Structural descriptor shared by all rows of one type.
#[derive(Debug)]
pub struct RowType {
    id: RowTypeId,
    kind: RowTypeKind,
    fields: Vec<ColumnType>,
}

impl RowType {
    fn create(kind: RowTypeKind, fields: Vec<ColumnType>) -> Arc<Self> {
        Arc::new(Self {
            id: RowTypeId::next(),
            kind,
            fields,
        })
    }

    /// Row type for literal rows
    pub fn values(fields: Vec<ColumnType>) -> Arc<Self> {
        Self::create(RowTypeKind::Values, fields)
    }

    /// Row type for projected rows
    pub fn projection(fields: Vec<ColumnType>) -> Arc<Self> {
        Self::create(RowTypeKind::Projection, fields)
    }

    /// Row type for table rows
    pub fn table(table: TableId, fields: Vec<ColumnType>) -> Arc<Self> {
        Self::create(RowTypeKind::Table(table), fields)
    }

    /// Row type for index rows
    pub fn index(index: IndexId, fields: Vec<ColumnType>) -> Arc<Self> {
        Self::create(RowTypeKind::Index(index), fields)
    }

    /// Unique id
    pub fn id(&self) -> RowTypeId {
        self.id
    }

    /// Kind of row
    pub fn kind(&self) -> RowTypeKind {
        self.kind
    }

    /// Number of fields
    pub fn n_fields(&self) -> usize {
        self.fields.len()
    }

    /// Type of field `i`
    pub fn type_at(&self, i: usize) -> Option<ColumnType> {
        self.fields.get(i).copied()
    }

    /// All field types
    pub fn fields(&self) -> &[ColumnType] {
        &self.fields
    }

    /// Originating table, for table rows
    pub fn table_id(&self) -> Option<TableId> {
        match self.kind {
            RowTypeKind::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Originating index, for index rows
    pub fn index_id(&self) -> Option<IndexId> {
        match self.kind {
            RowTypeKind::Index(i) => Some(i),
            _ => None,
        }
    }
}

impl PartialEq for RowType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RowType {}

impl fmt::Display for RowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RowTypeKind::Table(t) => write!(f, "table({})", t)?,
            RowTypeKind::Index(i) => write!(f, "index({})", i)?,
            RowTypeKind::Values => write!(f, "values")?,
            RowTypeKind::Projection => write!(f, "project")?,
        }
        write!(f, "#{}", self.id)
    }
}

/// Row types for the tables and indexes of one catalog snapshot.
///
/// Built once per plan; repeated lookups return the same `Arc`.
#[derive(Debug, Clone)]
pub struct RowSchema {
    tables: HashMap<TableId, Arc<RowType>>,
    indexes: HashMap<IndexId, Arc<RowType>>,
}

impl RowSchema {
    /// Creates row types for every table and index in `catalog`
    pub fn new(catalog: &Catalog) -> Self {
        let tables = catalog
            .tables()
            .map(|t| {
                let fields = t.columns.iter().map(|c| c.column_type).collect();
                (t.id, RowType::table(t.id, fields))
            })
            .collect();

        let indexes = catalog
            .indexes()
            .map(|index| {
                let fields = index
                    .columns
                    .iter()
                    .map(|c| {
                        catalog
                            .table(c.table)
                            .and_then(|t| t.columns.get(c.position))
                            .map_or(ColumnType::Int, |col| col.column_type)
                    })
                    .collect();
                (index.id, RowType::index(index.id, fields))
            })
            .collect();

        Self { tables, indexes }
    }

    /// Row type of a table
    pub fn table_row_type(&self, table: TableId) -> Option<Arc<RowType>> {
        self.tables.get(&table).cloned()
    }

    /// Row type of an index
    pub fn index_row_type(&self, index: IndexId) -> Option<Arc<RowType>> {
        self.indexes.get(&index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_ids_are_unique() {
        let a = RowType::values(vec![ColumnType::Int]);
        let b = RowType::values(vec![ColumnType::Int]);
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_kind_accessors() {
        let t = RowType::table(TableId(7), vec![ColumnType::Int, ColumnType::Text]);
        assert_eq!(t.table_id(), Some(TableId(7)));
        assert_eq!(t.index_id(), None);
        assert_eq!(t.n_fields(), 2);
        assert_eq!(t.type_at(1), Some(ColumnType::Text));
        assert_eq!(t.type_at(2), None);
    }
}
