//! In-memory catalog snapshots
//!
//! A `Catalog` is an immutable-by-convention snapshot: DDL is applied to a
//! clone and the clone is published in place of the old snapshot. Every DDL
//! bumps the schema generation. A table's generation is set to the new
//! schema generation when the table is dropped or when an index covering it
//! is created or dropped. Adding a child table does not touch the parent.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use super::errors::{SchemaError, SchemaResult};
use super::types::{
    GroupDef, GroupId, IndexColumn, IndexDef, IndexId, IndexKind, IndexSpec, IndexSpecKind,
    TableDef, TableId, TableSpec, MAX_TABLE_DEPTH,
};
use crate::observability::Event;

/// Tables, groups and indexes known to the execution layer.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    schema_generation: u64,
    tables: BTreeMap<TableId, TableDef>,
    indexes: BTreeMap<IndexId, IndexDef>,
    groups: BTreeMap<GroupId, GroupDef>,
    next_table_id: u32,
    next_index_id: u32,
}

impl Catalog {
    /// An empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonically increasing DDL counter
    pub fn schema_generation(&self) -> u64 {
        self.schema_generation
    }

    /// All tables, by id
    pub fn tables(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.values()
    }

    /// All indexes, by id
    pub fn indexes(&self) -> impl Iterator<Item = &IndexDef> {
        self.indexes.values()
    }

    /// All groups, by id
    pub fn groups(&self) -> impl Iterator<Item = &GroupDef> {
        self.groups.values()
    }

    /// Table by id
    pub fn table(&self, id: TableId) -> Option<&TableDef> {
        self.tables.get(&id)
    }

    /// Table by id, or an error
    pub fn require_table(&self, id: TableId) -> SchemaResult<&TableDef> {
        self.table(id).ok_or(SchemaError::UnknownTableId(id))
    }

    /// Table by name
    pub fn table_by_name(&self, name: &str) -> Option<&TableDef> {
        self.tables.values().find(|t| t.name == name)
    }

    /// Index by id
    pub fn index(&self, id: IndexId) -> Option<&IndexDef> {
        self.indexes.get(&id)
    }

    /// Index by id, or an error
    pub fn require_index(&self, id: IndexId) -> SchemaResult<&IndexDef> {
        self.index(id).ok_or(SchemaError::UnknownIndexId(id))
    }

    /// Index by name
    pub fn index_by_name(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.values().find(|i| i.name == name)
    }

    /// Group by id
    pub fn group(&self, id: GroupId) -> Option<&GroupDef> {
        self.groups.get(&id)
    }

    /// Current generation of a table, `None` once dropped
    pub fn table_generation(&self, id: TableId) -> Option<u64> {
        self.table(id).map(|t| t.generation)
    }

    /// Current generation of a group, `None` once its root is dropped
    pub fn group_generation(&self, id: GroupId) -> Option<u64> {
        self.group(id).map(|g| g.generation)
    }

    /// Direct children of a table
    pub fn children(&self, table: TableId) -> impl Iterator<Item = &TableDef> {
        self.tables.values().filter(move |t| t.parent == Some(table))
    }

    /// Tables of a group, parents before children
    pub fn group_tables(&self, group: GroupId) -> Vec<&TableDef> {
        let mut tables: Vec<&TableDef> =
            self.tables.values().filter(|t| t.group == group).collect();
        tables.sort_by_key(|t| (t.depth, t.ordinal));
        tables
    }

    /// `table` followed by its ancestors up to the group root
    pub fn ancestry(&self, table: TableId) -> SchemaResult<Vec<&TableDef>> {
        let mut chain = Vec::new();
        let mut current = Some(table);
        while let Some(id) = current {
            let def = self.require_table(id)?;
            chain.push(def);
            current = def.parent;
        }
        Ok(chain)
    }

    /// Tables covered by an index, leafmost first up to the rootmost
    pub fn index_chain(&self, index: &IndexDef) -> SchemaResult<Vec<&TableDef>> {
        let rootmost = index.rootmost_table();
        let mut chain = Vec::new();
        for table in self.ancestry(index.leafmost_table())? {
            chain.push(table);
            if table.id == rootmost {
                return Ok(chain);
            }
        }
        Err(SchemaError::invalid_index(
            &index.name,
            "rootmost table is not an ancestor of the leafmost table",
        ))
    }

    /// Indexes whose join chain includes `table`
    pub fn indexes_on(&self, table: TableId) -> Vec<&IndexDef> {
        self.indexes
            .values()
            .filter(|index| {
                self.index_chain(index)
                    .map(|chain| chain.iter().any(|t| t.id == table))
                    .unwrap_or(false)
            })
            .collect()
    }

    fn bump(&mut self) -> u64 {
        self.schema_generation += 1;
        self.schema_generation
    }

    fn bump_tables(&mut self, tables: &[TableId], generation: u64) {
        for id in tables {
            if let Some(table) = self.tables.get_mut(id) {
                table.generation = generation;
            }
        }
    }

    fn resolve_column(&self, table: &TableDef, column: &str) -> SchemaResult<usize> {
        table
            .column_position(column)
            .ok_or_else(|| SchemaError::UnknownColumn {
                table: table.name.clone(),
                column: column.to_string(),
            })
    }

    /// Creates a table.
    ///
    /// A table without a parent starts a new group. A child table's join
    /// columns must match its parent's primary key in count and type.
    pub fn create_table(&mut self, spec: &TableSpec) -> SchemaResult<TableId> {
        if self.table_by_name(&spec.name).is_some() {
            return Err(SchemaError::DuplicateTable(spec.name.clone()));
        }
        if spec.columns.is_empty() {
            return Err(SchemaError::invalid_table(&spec.name, "no columns"));
        }
        let mut names = HashSet::new();
        for column in &spec.columns {
            if !names.insert(column.name.as_str()) {
                return Err(SchemaError::invalid_table(
                    &spec.name,
                    format!("duplicate column {}", column.name),
                ));
            }
        }
        if spec.primary_key.is_empty() {
            return Err(SchemaError::invalid_table(&spec.name, "no primary key"));
        }

        let id = TableId(self.next_table_id);
        let mut table = TableDef {
            id,
            name: spec.name.clone(),
            group: GroupId(id.0),
            parent: None,
            join_columns: Vec::new(),
            columns: spec.columns.clone(),
            primary_key: Vec::new(),
            depth: 0,
            ordinal: 0,
            generation: 0,
        };
        table.primary_key = spec
            .primary_key
            .iter()
            .map(|c| self.resolve_column(&table, c))
            .collect::<SchemaResult<_>>()?;

        if let Some(parent_spec) = &spec.parent {
            let parent = self
                .table_by_name(&parent_spec.table)
                .ok_or_else(|| SchemaError::UnknownTable(parent_spec.table.clone()))?;
            let join_columns = parent_spec
                .join_columns
                .iter()
                .map(|c| self.resolve_column(&table, c))
                .collect::<SchemaResult<Vec<_>>>()?;
            if join_columns.len() != parent.primary_key.len() {
                return Err(SchemaError::invalid_table(
                    &spec.name,
                    format!(
                        "{} join columns for a parent key of {} columns",
                        join_columns.len(),
                        parent.primary_key.len()
                    ),
                ));
            }
            for (child_pos, parent_pos) in join_columns.iter().zip(&parent.primary_key) {
                if table.columns[*child_pos].column_type != parent.columns[*parent_pos].column_type
                {
                    return Err(SchemaError::invalid_table(
                        &spec.name,
                        format!(
                            "join column {} does not match the parent key type",
                            table.columns[*child_pos].name
                        ),
                    ));
                }
            }
            if parent.depth >= MAX_TABLE_DEPTH {
                return Err(SchemaError::invalid_table(
                    &spec.name,
                    format!("nesting deeper than {} levels", MAX_TABLE_DEPTH),
                ));
            }
            table.group = parent.group;
            table.parent = Some(parent.id);
            table.depth = parent.depth + 1;
            table.ordinal = self
                .tables
                .values()
                .filter(|t| t.group == parent.group)
                .map(|t| t.ordinal + 1)
                .max()
                .unwrap_or(0);
            table.join_columns = join_columns;
        }

        let generation = self.bump();
        table.generation = generation;
        if table.parent.is_none() {
            self.groups.insert(
                table.group,
                GroupDef {
                    id: table.group,
                    root: id,
                    generation,
                },
            );
        }
        debug!(
            event = Event::CatalogChanged.as_str(),
            table = %table.name,
            generation,
            "table created"
        );
        self.next_table_id += 1;
        self.tables.insert(id, table);
        Ok(id)
    }

    /// Drops a table with no children, together with every index covering it.
    pub fn drop_table(&mut self, id: TableId) -> SchemaResult<()> {
        let table = self.require_table(id)?.clone();
        if self.children(id).next().is_some() {
            return Err(SchemaError::HasChildren(table.name));
        }

        let doomed: Vec<IndexId> = self.indexes_on(id).iter().map(|i| i.id).collect();
        for index in doomed {
            self.drop_index(index)?;
        }

        let generation = self.bump();
        self.tables.remove(&id);
        if table.is_root() {
            self.groups.remove(&table.group);
        } else if let Some(group) = self.groups.get_mut(&table.group) {
            group.generation = generation;
        }
        debug!(
            event = Event::CatalogChanged.as_str(),
            table = %table.name,
            generation,
            "table dropped"
        );
        Ok(())
    }

    /// Creates an index.
    ///
    /// A table index must name columns of one table. A group index must name
    /// columns of tables on a single ancestor chain of one group.
    pub fn create_index(&mut self, spec: &IndexSpec) -> SchemaResult<IndexId> {
        if self.index_by_name(&spec.name).is_some() {
            return Err(SchemaError::DuplicateIndex(spec.name.clone()));
        }
        if spec.columns.is_empty() {
            return Err(SchemaError::invalid_index(&spec.name, "no columns"));
        }

        let mut columns = Vec::with_capacity(spec.columns.len());
        for column in &spec.columns {
            let table = self
                .table_by_name(&column.table)
                .ok_or_else(|| SchemaError::UnknownTable(column.table.clone()))?;
            columns.push(IndexColumn {
                table: table.id,
                position: self.resolve_column(table, &column.column)?,
            });
        }

        let kind = match spec.kind {
            IndexSpecKind::Table => {
                let table = columns[0].table;
                if columns.iter().any(|c| c.table != table) {
                    return Err(SchemaError::invalid_index(
                        &spec.name,
                        "table index spans several tables",
                    ));
                }
                IndexKind::Table { table }
            }
            IndexSpecKind::Group if spec.unique => {
                return Err(SchemaError::invalid_index(
                    &spec.name,
                    "unique group index",
                ));
            }
            IndexSpecKind::Group => {
                let mut tables: Vec<&TableDef> = Vec::new();
                for c in &columns {
                    tables.push(self.require_table(c.table)?);
                }
                let group = tables[0].group;
                if tables.iter().any(|t| t.group != group) {
                    return Err(SchemaError::invalid_index(
                        &spec.name,
                        "group index spans several groups",
                    ));
                }
                let leafmost = tables.iter().max_by_key(|t| t.depth).map(|t| t.id);
                let rootmost = tables.iter().min_by_key(|t| t.depth).map(|t| t.id);
                let (Some(leafmost), Some(rootmost)) = (leafmost, rootmost) else {
                    return Err(SchemaError::invalid_index(&spec.name, "no columns"));
                };
                let ancestry: Vec<TableId> =
                    self.ancestry(leafmost)?.iter().map(|t| t.id).collect();
                if tables.iter().any(|t| !ancestry.contains(&t.id)) {
                    return Err(SchemaError::invalid_index(
                        &spec.name,
                        "columns are not on a single join chain",
                    ));
                }
                IndexKind::Group { leafmost, rootmost }
            }
        };

        let id = IndexId(self.next_index_id);
        let index = IndexDef {
            id,
            name: spec.name.clone(),
            kind,
            columns,
            unique: spec.unique,
        };
        let chain: Vec<TableId> = self.index_chain(&index)?.iter().map(|t| t.id).collect();

        let generation = self.bump();
        self.bump_tables(&chain, generation);
        debug!(
            event = Event::CatalogChanged.as_str(),
            index = %index.name,
            generation,
            "index created"
        );
        self.next_index_id += 1;
        self.indexes.insert(id, index);
        Ok(id)
    }

    /// Drops an index
    pub fn drop_index(&mut self, id: IndexId) -> SchemaResult<()> {
        let index = self.require_index(id)?.clone();
        let chain: Vec<TableId> = self.index_chain(&index)?.iter().map(|t| t.id).collect();
        let generation = self.bump();
        self.bump_tables(&chain, generation);
        self.indexes.remove(&id);
        debug!(
            event = Event::CatalogChanged.as_str(),
            index = %index.name,
            generation,
            "index dropped"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, ColumnType};

    fn int(name: &str) -> ColumnDef {
        ColumnDef::new(name, ColumnType::Int)
    }

    /// customer(cid) <- order(oid, cid) <- item(iid, oid)
    fn coi() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .create_table(&TableSpec::root("customer", vec![int("cid")], &["cid"]))
            .unwrap();
        catalog
            .create_table(&TableSpec::child(
                "order",
                vec![int("oid"), int("cid")],
                &["oid"],
                "customer",
                &["cid"],
            ))
            .unwrap();
        catalog
            .create_table(&TableSpec::child(
                "item",
                vec![int("iid"), int("oid")],
                &["iid"],
                "order",
                &["oid"],
            ))
            .unwrap();
        catalog
    }

    #[test]
    fn test_group_structure() {
        let catalog = coi();
        let item = catalog.table_by_name("item").unwrap();
        let customer = catalog.table_by_name("customer").unwrap();
        assert_eq!(item.depth, 2);
        assert_eq!(item.ordinal, 2);
        assert_eq!(item.group, customer.group);
        let names: Vec<&str> = catalog
            .group_tables(customer.group)
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["customer", "order", "item"]);
    }

    #[test]
    fn test_depth_limit() {
        let mut catalog = Catalog::new();
        catalog
            .create_table(&TableSpec::root("t0", vec![int("id")], &["id"]))
            .unwrap();
        for depth in 1..=MAX_TABLE_DEPTH {
            catalog
                .create_table(&TableSpec::child(
                    &format!("t{}", depth),
                    vec![int("id"), int("pid")],
                    &["id"],
                    &format!("t{}", depth - 1),
                    &["pid"],
                ))
                .unwrap();
        }
        let deepest = catalog
            .table_by_name(&format!("t{}", MAX_TABLE_DEPTH))
            .unwrap();
        assert_eq!(deepest.depth, MAX_TABLE_DEPTH);

        let generation = catalog.schema_generation();
        let result = catalog.create_table(&TableSpec::child(
            "too_deep",
            vec![int("id"), int("pid")],
            &["id"],
            &format!("t{}", MAX_TABLE_DEPTH),
            &["pid"],
        ));
        assert!(matches!(result, Err(SchemaError::InvalidTable { .. })));
        assert!(catalog.table_by_name("too_deep").is_none());
        assert_eq!(catalog.schema_generation(), generation);
    }

    #[test]
    fn test_group_index_chain() {
        let mut catalog = coi();
        let id = catalog
            .create_index(&IndexSpec::group(
                "gi",
                &[("customer", "cid"), ("item", "iid")],
            ))
            .unwrap();
        let index = catalog.index(id).unwrap();
        let chain: Vec<&str> = catalog
            .index_chain(index)
            .unwrap()
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(chain, vec!["item", "order", "customer"]);
    }

    #[test]
    fn test_index_ddl_bumps_table_generation() {
        let mut catalog = coi();
        let customer = catalog.table_by_name("customer").unwrap().id;
        let order = catalog.table_by_name("order").unwrap().id;
        let before = catalog.table_generation(customer).unwrap();
        let order_before = catalog.table_generation(order).unwrap();

        let id = catalog
            .create_index(&IndexSpec::table("c_cid", "customer", &["cid"]))
            .unwrap();
        let after_create = catalog.table_generation(customer).unwrap();
        assert!(after_create > before);
        assert_eq!(catalog.table_generation(order), Some(order_before));

        catalog.drop_index(id).unwrap();
        assert!(catalog.table_generation(customer).unwrap() > after_create);
    }

    #[test]
    fn test_adding_child_keeps_parent_generation() {
        let mut catalog = coi();
        let item = catalog.table_by_name("item").unwrap().id;
        let before = catalog.table_generation(item).unwrap();
        catalog
            .create_table(&TableSpec::child(
                "note",
                vec![int("nid"), int("iid")],
                &["nid"],
                "item",
                &["iid"],
            ))
            .unwrap();
        assert_eq!(catalog.table_generation(item), Some(before));
    }

    #[test]
    fn test_drop_table_rules() {
        let mut catalog = coi();
        let order = catalog.table_by_name("order").unwrap().id;
        let item = catalog.table_by_name("item").unwrap().id;
        assert!(matches!(
            catalog.drop_table(order),
            Err(SchemaError::HasChildren(_))
        ));
        catalog
            .create_index(&IndexSpec::table("i_oid", "item", &["oid"]))
            .unwrap();
        catalog.drop_table(item).unwrap();
        assert!(catalog.table_generation(item).is_none());
        assert!(catalog.index_by_name("i_oid").is_none());
    }

    #[test]
    fn test_invalid_definitions_rejected() {
        let mut catalog = coi();
        assert!(matches!(
            catalog.create_index(&IndexSpec::table(
                "bad",
                "customer",
                &["nope"]
            )),
            Err(SchemaError::UnknownColumn { .. })
        ));
        let mut spec = IndexSpec::table("mixed", "customer", &["cid"]);
        spec.columns.extend(IndexSpec::table("x", "order", &["oid"]).columns);
        assert!(matches!(
            catalog.create_index(&spec),
            Err(SchemaError::InvalidIndex { .. })
        ));
        assert!(matches!(
            catalog.create_table(&TableSpec::root("customer", vec![int("cid")], &["cid"])),
            Err(SchemaError::DuplicateTable(_))
        ));
    }
}
