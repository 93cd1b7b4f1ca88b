//! Catalog loader
//!
//! Builds a catalog from a JSON definition. Tables are created in file
//! order, so parents must precede their children; indexes follow.
//!
//! ```json
//! {
//!   "tables": [
//!     {"name": "customer", "columns": [{"name": "cid", "type": "int"}], "primary_key": ["cid"]}
//!   ],
//!   "indexes": [
//!     {"name": "c_cid", "columns": [{"table": "customer", "column": "cid"}]}
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::catalog::Catalog;
use super::errors::{SchemaError, SchemaResult};
use super::types::{IndexSpec, TableSpec};

/// Serialized catalog definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDefinition {
    /// Tables, parents first
    #[serde(default)]
    pub tables: Vec<TableSpec>,
    /// Indexes
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
}

impl CatalogDefinition {
    /// Applies every definition to an empty catalog
    pub fn build(&self) -> SchemaResult<Catalog> {
        let mut catalog = Catalog::new();
        for table in &self.tables {
            catalog.create_table(table)?;
        }
        for index in &self.indexes {
            catalog.create_index(index)?;
        }
        Ok(catalog)
    }
}

/// Reads catalog definitions from JSON text or files.
pub struct CatalogLoader;

impl CatalogLoader {
    /// Parses a definition and builds the catalog
    pub fn from_json_str(json: &str) -> SchemaResult<Catalog> {
        let definition: CatalogDefinition =
            serde_json::from_str(json).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        definition.build()
    }

    /// Reads a definition file and builds the catalog
    pub fn load_file(path: &Path) -> SchemaResult<Catalog> {
        let json = fs::read_to_string(path).map_err(|e| SchemaError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DEFINITION: &str = r#"{
        "tables": [
            {"name": "customer",
             "columns": [{"name": "cid", "type": "int"}, {"name": "name", "type": "text"}],
             "primary_key": ["cid"]},
            {"name": "order",
             "columns": [{"name": "oid", "type": "int"}, {"name": "cid", "type": "int"}],
             "primary_key": ["oid"],
             "parent": {"table": "customer", "join_columns": ["cid"]}}
        ],
        "indexes": [
            {"name": "c_name", "columns": [{"table": "customer", "column": "name"}]},
            {"name": "gi", "kind": "group",
             "columns": [{"table": "customer", "column": "name"}, {"table": "order", "column": "oid"}]}
        ]
    }"#;

    #[test]
    fn test_from_json_str() {
        let catalog = CatalogLoader::from_json_str(DEFINITION).unwrap();
        assert_eq!(catalog.tables().count(), 2);
        assert!(!catalog.index_by_name("c_name").unwrap().is_group_index());
        assert!(catalog.index_by_name("gi").unwrap().is_group_index());
    }

    #[test]
    fn test_load_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(DEFINITION.as_bytes()).unwrap();
        let catalog = CatalogLoader::load_file(file.path()).unwrap();
        assert!(catalog.table_by_name("order").is_some());
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            CatalogLoader::from_json_str("{not json"),
            Err(SchemaError::Malformed(_))
        ));
        assert!(matches!(
            CatalogLoader::load_file(Path::new("/nonexistent/catalog.json")),
            Err(SchemaError::Io { .. })
        ));
    }
}
