//! Catalog type definitions
//!
//! Supported column types:
//! - int: 64-bit signed integer
//! - float: 64-bit floating point
//! - text: UTF-8 string
//! - bool: Boolean

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! catalog_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

catalog_id!(
    /// Table identifier, unique within a catalog
    TableId
);
catalog_id!(
    /// Index identifier, unique within a catalog
    IndexId
);
catalog_id!(
    /// Group identifier; a group is named after its root table
    GroupId
);

/// Column value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// 64-bit signed integer
    Int,
    /// 64-bit floating point
    Float,
    /// UTF-8 string
    Text,
    /// Boolean
    Bool,
}

impl ColumnType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnType::Int => "int",
            ColumnType::Float => "float",
            ColumnType::Text => "text",
            ColumnType::Bool => "bool",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name, unique within its table
    pub name: String,
    /// Column value type
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnDef {
    /// Create a column definition
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Deepest nesting level a group may reach; depths index a `u64` presence bitmap.
pub const MAX_TABLE_DEPTH: usize = 63;

/// A user table and its place in its group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    /// Table id
    pub id: TableId,
    /// Table name
    pub name: String,
    /// Group the table belongs to
    pub group: GroupId,
    /// Parent table, `None` for a group root
    pub parent: Option<TableId>,
    /// Columns holding the parent's primary key, in parent key order
    pub join_columns: Vec<usize>,
    /// Column definitions
    pub columns: Vec<ColumnDef>,
    /// Primary key column positions
    pub primary_key: Vec<usize>,
    /// Nesting level within the group (root = 0)
    pub depth: usize,
    /// Table ordinal within the group, used in HKey segments
    pub ordinal: u32,
    /// Bumped whenever the table's definition or one of its indexes changes
    pub generation: u64,
}

impl TableDef {
    /// Position of a column by name
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// True for a group root
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Field types in column order
    pub fn column_types(&self) -> Vec<ColumnType> {
        self.columns.iter().map(|c| c.column_type).collect()
    }
}

/// What an index covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Columns of a single table
    Table {
        /// Indexed table
        table: TableId,
    },
    /// Columns along a join chain of one group
    Group {
        /// Deepest table of the chain
        leafmost: TableId,
        /// Shallowest table of the chain
        rootmost: TableId,
    },
}

/// One indexed column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexColumn {
    /// Table the column belongs to
    pub table: TableId,
    /// Column position in that table
    pub position: usize,
}

/// Index definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    /// Index id
    pub id: IndexId,
    /// Index name
    pub name: String,
    /// Table or group index
    pub kind: IndexKind,
    /// Indexed columns, in key order
    pub columns: Vec<IndexColumn>,
    /// Rejects a second row with the same non-null key
    pub unique: bool,
}

impl IndexDef {
    /// True for a group index
    pub fn is_group_index(&self) -> bool {
        matches!(self.kind, IndexKind::Group { .. })
    }

    /// Deepest table covered; the indexed table for a table index
    pub fn leafmost_table(&self) -> TableId {
        match self.kind {
            IndexKind::Table { table } => table,
            IndexKind::Group { leafmost, .. } => leafmost,
        }
    }

    /// Shallowest table covered; the indexed table for a table index
    pub fn rootmost_table(&self) -> TableId {
        match self.kind {
            IndexKind::Table { table } => table,
            IndexKind::Group { rootmost, .. } => rootmost,
        }
    }

    /// Number of key columns
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }
}

/// A group of tables sharing HKey order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDef {
    /// Group id
    pub id: GroupId,
    /// Root table
    pub root: TableId,
    /// Bumped whenever a table of the group is dropped
    pub generation: u64,
}

/// Parent link in a table definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentSpec {
    /// Parent table name
    pub table: String,
    /// Child columns holding the parent's primary key, in key order
    pub join_columns: Vec<String>,
}

/// Table as declared by a caller or a catalog file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name
    pub name: String,
    /// Columns
    pub columns: Vec<ColumnDef>,
    /// Primary key column names
    pub primary_key: Vec<String>,
    /// Parent link
    #[serde(default)]
    pub parent: Option<ParentSpec>,
}

impl TableSpec {
    /// Root table with the given columns and primary key
    pub fn root(name: impl Into<String>, columns: Vec<ColumnDef>, primary_key: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns,
            primary_key: primary_key.iter().map(|s| s.to_string()).collect(),
            parent: None,
        }
    }

    /// Child table joined to `parent` through `join_columns`
    pub fn child(
        name: impl Into<String>,
        columns: Vec<ColumnDef>,
        primary_key: &[&str],
        parent: impl Into<String>,
        join_columns: &[&str],
    ) -> Self {
        Self {
            parent: Some(ParentSpec {
                table: parent.into(),
                join_columns: join_columns.iter().map(|s| s.to_string()).collect(),
            }),
            ..Self::root(name, columns, primary_key)
        }
    }
}

/// Declared index kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexSpecKind {
    /// All columns from one table
    #[default]
    Table,
    /// Columns along one group's join chain
    Group,
}

/// Indexed column as declared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumnSpec {
    /// Table name
    pub table: String,
    /// Column name
    pub column: String,
}

/// Index as declared by a caller or a catalog file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name
    pub name: String,
    /// Table or group index
    #[serde(default)]
    pub kind: IndexSpecKind,
    /// Key columns in order
    pub columns: Vec<IndexColumnSpec>,
    /// Table indexes only; keys holding a null never conflict
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    /// Table index over `columns` of `table`
    pub fn table(name: impl Into<String>, table: &str, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            kind: IndexSpecKind::Table,
            columns: columns
                .iter()
                .map(|c| IndexColumnSpec {
                    table: table.to_string(),
                    column: c.to_string(),
                })
                .collect(),
            unique: false,
        }
    }

    /// Group index over `(table, column)` pairs
    pub fn group(name: impl Into<String>, columns: &[(&str, &str)]) -> Self {
        Self {
            name: name.into(),
            kind: IndexSpecKind::Group,
            columns: columns
                .iter()
                .map(|(t, c)| IndexColumnSpec {
                    table: t.to_string(),
                    column: c.to_string(),
                })
                .collect(),
            unique: false,
        }
    }

    /// Marks the index unique
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}
