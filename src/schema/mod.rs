//! Catalog subsystem
//!
//! The metadata collaborator consumed by the execution layer: tables arranged
//! in groups, table and group indexes, and the generation numbers used to
//! detect definition changes under open scans.

mod catalog;
mod errors;
mod loader;
mod types;

pub use catalog::Catalog;
pub use errors::{SchemaError, SchemaResult};
pub use loader::{CatalogDefinition, CatalogLoader};
pub use types::{
    ColumnDef, ColumnType, GroupDef, GroupId, IndexColumn, IndexColumnSpec, IndexDef, IndexId,
    IndexKind, IndexSpec, IndexSpecKind, ParentSpec, TableDef, TableId, TableSpec,
    MAX_TABLE_DEPTH,
};
