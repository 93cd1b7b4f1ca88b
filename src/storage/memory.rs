//! In-memory store
//!
//! Rows are kept per table by primary key. Each group's rows in HKey order
//! and every index's entries are derived from them and rebuilt after every
//! change to the group. Readers get `Arc` snapshots, so an open storage
//! cursor never observes a half-applied change.
//!
//! A child row whose parent is missing is an orphan: its ancestors' HKey
//! segments carry null keys, so orphans sort ahead of adopted rows. Writing
//! the parent later adopts the orphan on the next rebuild.
//!
//! A change whose rebuild fails, such as a unique index conflict, is undone
//! before the error is returned.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::adapter::{
    CollectorRequest, Direction, GroupCursor, GroupRow, KeyCursor, RowCollector, StoreAdapter,
};
use super::collector::MemoryRowCollector;
use super::entries::{build_entries, IndexEntry};
use super::errors::{StorageError, StorageResult};
use crate::observability::Event;
use crate::row::{compare_prefix, HKey, HKeySegment, RowError, Value};
use crate::schema::{
    Catalog, GroupId, IndexId, IndexKind, IndexSpec, TableDef, TableId, TableSpec,
};

#[derive(Debug, Default)]
struct StoreState {
    catalog: Arc<Catalog>,
    tables: HashMap<TableId, BTreeMap<Vec<Value>, Vec<Value>>>,
    groups: HashMap<GroupId, Arc<Vec<GroupRow>>>,
    indexes: HashMap<IndexId, Arc<Vec<IndexEntry>>>,
}

impl StoreState {
    fn table_def(&self, table: TableId) -> StorageResult<&TableDef> {
        self.catalog
            .table(table)
            .ok_or(StorageError::UnknownTable(table))
    }

    fn rebuild_group(&mut self, group: GroupId) -> StorageResult<()> {
        let catalog = self.catalog.clone();
        let mut hkeys: HashMap<TableId, HashMap<Vec<Value>, HKey>> = HashMap::new();
        let mut rows = Vec::new();

        for table in catalog.group_tables(group) {
            let Some(stored) = self.tables.get(&table.id) else {
                continue;
            };
            let mut table_hkeys = HashMap::with_capacity(stored.len());
            for (pk, fields) in stored {
                let hkey = match table.parent {
                    None => HKey::root(table.ordinal, pk.clone()),
                    Some(parent) => {
                        let parent_key: Vec<Value> = table
                            .join_columns
                            .iter()
                            .map(|p| fields[*p].clone())
                            .collect();
                        let parent_hkey = match hkeys.get(&parent).and_then(|m| m.get(&parent_key))
                        {
                            Some(h) => h.clone(),
                            None => orphan_hkey(&catalog, parent, parent_key)?,
                        };
                        parent_hkey.child(table.ordinal, pk.clone())
                    }
                };
                table_hkeys.insert(pk.clone(), hkey.clone());
                rows.push(GroupRow {
                    table: table.id,
                    hkey,
                    fields: fields.clone(),
                });
            }
            hkeys.insert(table.id, table_hkeys);
        }
        rows.sort_by(|a, b| a.hkey.cmp(&b.hkey));

        for index in catalog.indexes() {
            let table = match index.kind {
                IndexKind::Table { table } => table,
                IndexKind::Group { leafmost, .. } => leafmost,
            };
            if catalog.table(table).is_some_and(|t| t.group == group) {
                let entries = build_entries(&catalog, index, &rows)?;
                if index.unique {
                    check_unique(&index.name, &entries)?;
                }
                self.indexes.insert(index.id, Arc::new(entries));
            }
        }
        self.groups.insert(group, Arc::new(rows));
        Ok(())
    }

    fn rebuild_all(&mut self) -> StorageResult<()> {
        let catalog = self.catalog.clone();
        self.groups.retain(|g, _| catalog.group(*g).is_some());
        self.indexes.retain(|i, _| catalog.index(*i).is_some());
        self.tables.retain(|t, _| catalog.table(*t).is_some());
        for table in catalog.tables() {
            self.tables.entry(table.id).or_default();
        }
        for group in catalog.groups() {
            self.rebuild_group(group.id)?;
        }
        Ok(())
    }

    fn check_row(&self, table: &TableDef, fields: &[Value]) -> StorageResult<()> {
        if fields.len() != table.columns.len() {
            return Err(RowError::ArityMismatch {
                expected: table.columns.len(),
                actual: fields.len(),
            }
            .into());
        }
        for (position, (value, column)) in fields.iter().zip(&table.columns).enumerate() {
            if let Some(actual) = value.column_type() {
                if actual != column.column_type {
                    return Err(RowError::TypeMismatch {
                        position,
                        expected: column.column_type,
                        actual: value.type_name(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

fn primary_key(table: &TableDef, fields: &[Value]) -> Vec<Value> {
    table
        .primary_key
        .iter()
        .map(|p| fields.get(*p).cloned().unwrap_or(Value::Null))
        .collect()
}

fn render_key(key: &[Value]) -> String {
    let parts: Vec<String> = key.iter().map(|v| v.to_string()).collect();
    format!("({})", parts.join(", "))
}

/// Entries are sorted, so a conflict is two neighbours with the same key
fn check_unique(index: &str, entries: &[IndexEntry]) -> StorageResult<()> {
    for pair in entries.windows(2) {
        if pair[0].key == pair[1].key && !pair[0].key.iter().any(Value::is_null) {
            return Err(StorageError::UniqueViolation {
                index: index.to_string(),
                key: render_key(&pair[0].key),
            });
        }
    }
    Ok(())
}

/// HKey of a missing parent row: null keys for every ancestor above it
fn orphan_hkey(catalog: &Catalog, parent: TableId, parent_key: Vec<Value>) -> StorageResult<HKey> {
    let mut ancestry = catalog.ancestry(parent)?;
    ancestry.reverse();
    let last = ancestry.len() - 1;
    let segments = ancestry
        .iter()
        .enumerate()
        .map(|(depth, table)| {
            let keys = if depth == last {
                parent_key.clone()
            } else {
                vec![Value::Null; table.primary_key.len()]
            };
            HKeySegment::new(table.ordinal, keys)
        })
        .collect();
    Ok(HKey::from_segments(segments))
}

/// In-memory implementation of [`StoreAdapter`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    /// Empty store over `catalog`
    pub fn new(catalog: Catalog) -> StorageResult<Self> {
        let mut state = StoreState {
            catalog: Arc::new(catalog),
            ..Default::default()
        };
        state.rebuild_all()?;
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    fn apply_ddl<T>(
        &self,
        ddl: impl FnOnce(&mut Catalog) -> Result<T, crate::schema::SchemaError>,
    ) -> StorageResult<T> {
        let mut state = self.state.write();
        let mut next = (*state.catalog).clone();
        let out = ddl(&mut next)?;
        let previous = std::mem::replace(&mut state.catalog, Arc::new(next));
        if let Err(err) = state.rebuild_all() {
            state.catalog = previous;
            state.rebuild_all()?;
            return Err(err);
        }
        Ok(out)
    }

    /// Creates a table
    pub fn create_table(&self, spec: &TableSpec) -> StorageResult<TableId> {
        self.apply_ddl(|c| c.create_table(spec))
    }

    /// Drops a table and its rows
    pub fn drop_table(&self, table: TableId) -> StorageResult<()> {
        self.apply_ddl(|c| c.drop_table(table))
    }

    /// Creates an index and builds its entries
    pub fn create_index(&self, spec: &IndexSpec) -> StorageResult<IndexId> {
        self.apply_ddl(|c| c.create_index(spec))
    }

    /// Drops an index
    pub fn drop_index(&self, index: IndexId) -> StorageResult<()> {
        self.apply_ddl(|c| c.drop_index(index))
    }

    /// Index entries, for inspection
    pub fn index_entries(&self, index: IndexId) -> StorageResult<Vec<IndexEntry>> {
        let state = self.state.read();
        state
            .indexes
            .get(&index)
            .map(|e| e.as_ref().clone())
            .ok_or(StorageError::UnknownIndex(index))
    }

    fn scan_rows(
        state: &StoreState,
        request: &CollectorRequest,
    ) -> StorageResult<Vec<Vec<Value>>> {
        let table = state.table_def(request.table)?;
        let group_rows = state
            .groups
            .get(&table.group)
            .ok_or(StorageError::UnknownGroup(table.group))?;

        let mut rows: Vec<Vec<Value>> = match request.index {
            None => group_rows
                .iter()
                .filter(|r| r.table == table.id)
                .filter(|r| request.range.contains(&primary_key(table, &r.fields)))
                .map(|r| r.fields.clone())
                .collect(),
            Some(index_id) => {
                let index = state.catalog.require_index(index_id)?;
                if index.kind != (IndexKind::Table { table: table.id }) {
                    return Err(StorageError::UnsupportedScan(format!(
                        "index {} is not a table index on {}",
                        index.name, table.name
                    )));
                }
                let entries = state
                    .indexes
                    .get(&index_id)
                    .ok_or(StorageError::UnknownIndex(index_id))?;
                let mut rows = Vec::new();
                for entry in entries.iter().filter(|e| request.range.contains(&e.key)) {
                    if let Ok(at) = group_rows.binary_search_by(|r| r.hkey.cmp(&entry.hkey)) {
                        rows.push(group_rows[at].fields.clone());
                    }
                }
                rows
            }
        };
        if request.descending {
            rows.reverse();
        }
        Ok(rows)
    }
}

impl StoreAdapter for MemoryStore {
    fn catalog(&self) -> Arc<Catalog> {
        self.state.read().catalog.clone()
    }

    fn group_cursor(
        &self,
        group: GroupId,
        subtree: Option<HKey>,
    ) -> StorageResult<Box<dyn GroupCursor>> {
        let rows = self
            .state
            .read()
            .groups
            .get(&group)
            .cloned()
            .ok_or(StorageError::UnknownGroup(group))?;
        let position = match &subtree {
            Some(h) => rows.partition_point(|r| r.hkey < *h),
            None => 0,
        };
        Ok(Box::new(MemoryGroupCursor {
            rows,
            position,
            subtree,
        }))
    }

    fn index_cursor(&self, index: IndexId) -> StorageResult<Box<dyn KeyCursor>> {
        let entries = self
            .state
            .read()
            .indexes
            .get(&index)
            .cloned()
            .ok_or(StorageError::UnknownIndex(index))?;
        Ok(Box::new(MemoryKeyCursor {
            entries,
            position: 0,
            direction: Direction::Forward,
        }))
    }

    fn lookup(&self, group: GroupId, hkey: &HKey) -> StorageResult<Option<GroupRow>> {
        let state = self.state.read();
        let rows = state
            .groups
            .get(&group)
            .ok_or(StorageError::UnknownGroup(group))?;
        Ok(rows
            .binary_search_by(|r| r.hkey.cmp(hkey))
            .ok()
            .map(|at| rows[at].clone()))
    }

    fn row_collector(&self, request: &CollectorRequest) -> StorageResult<Box<dyn RowCollector>> {
        let state = self.state.read();
        let rows = Self::scan_rows(&state, request)?;
        Ok(Box::new(MemoryRowCollector::new(
            request.table,
            request.index,
            request.columns.clone(),
            rows,
        )))
    }

    fn write_row(&self, table: TableId, fields: Vec<Value>) -> StorageResult<()> {
        let mut state = self.state.write();
        let def = state.table_def(table)?.clone();
        state.check_row(&def, &fields)?;
        let pk = primary_key(&def, &fields);
        let stored = state.tables.entry(table).or_default();
        if stored.contains_key(&pk) {
            return Err(StorageError::DuplicateKey {
                table: def.name,
                key: render_key(&pk),
            });
        }
        stored.insert(pk.clone(), fields);
        if let Err(err) = state.rebuild_group(def.group) {
            if let Some(stored) = state.tables.get_mut(&table) {
                stored.remove(&pk);
            }
            state.rebuild_group(def.group)?;
            return Err(err);
        }
        debug!(
            event = Event::RowWritten.as_str(),
            table = %def.name,
            key = %render_key(&pk),
            "row written"
        );
        Ok(())
    }

    fn delete_row(&self, table: TableId, fields: &[Value]) -> StorageResult<()> {
        let mut state = self.state.write();
        let def = state.table_def(table)?.clone();
        let pk = primary_key(&def, fields);
        let removed = state
            .tables
            .get_mut(&table)
            .and_then(|stored| stored.remove(&pk));
        if removed.is_none() {
            return Err(StorageError::RowNotFound {
                table: def.name,
                key: render_key(&pk),
            });
        }
        state.rebuild_group(def.group)?;
        debug!(
            event = Event::RowDeleted.as_str(),
            table = %def.name,
            key = %render_key(&pk),
            "row deleted"
        );
        Ok(())
    }

    fn update_row(&self, table: TableId, old: &[Value], new: Vec<Value>) -> StorageResult<()> {
        let mut state = self.state.write();
        let def = state.table_def(table)?.clone();
        state.check_row(&def, &new)?;
        let old_pk = primary_key(&def, old);
        let new_pk = primary_key(&def, &new);
        let stored = state.tables.entry(table).or_default();
        if old_pk != new_pk && stored.contains_key(&new_pk) {
            return Err(StorageError::DuplicateKey {
                table: def.name,
                key: render_key(&new_pk),
            });
        }
        let Some(previous) = stored.remove(&old_pk) else {
            return Err(StorageError::RowNotFound {
                table: def.name,
                key: render_key(&old_pk),
            });
        };
        stored.insert(new_pk.clone(), new);
        if let Err(err) = state.rebuild_group(def.group) {
            if let Some(stored) = state.tables.get_mut(&table) {
                stored.remove(&new_pk);
                stored.insert(old_pk, previous);
            }
            state.rebuild_group(def.group)?;
            return Err(err);
        }
        debug!(
            event = Event::RowUpdated.as_str(),
            table = %def.name,
            key = %render_key(&new_pk),
            "row updated"
        );
        Ok(())
    }

    fn row_count(&self, table: TableId) -> usize {
        self.state.read().tables.get(&table).map_or(0, BTreeMap::len)
    }

    fn truncate_group(&self, group: GroupId) -> StorageResult<()> {
        let mut state = self.state.write();
        let catalog = state.catalog.clone();
        if catalog.group(group).is_none() {
            return Err(StorageError::UnknownGroup(group));
        }
        for table in catalog.group_tables(group) {
            state.tables.entry(table.id).or_default().clear();
        }
        state.rebuild_group(group)
    }
}

struct MemoryGroupCursor {
    rows: Arc<Vec<GroupRow>>,
    position: usize,
    subtree: Option<HKey>,
}

impl GroupCursor for MemoryGroupCursor {
    fn next_row(&mut self) -> StorageResult<Option<GroupRow>> {
        let Some(row) = self.rows.get(self.position) else {
            return Ok(None);
        };
        if let Some(subtree) = &self.subtree {
            if !subtree.is_prefix_of(&row.hkey) {
                self.position = self.rows.len();
                return Ok(None);
            }
        }
        self.position += 1;
        Ok(Some(row.clone()))
    }
}

/// Key cursor over an entry snapshot.
///
/// Going forward, `position` is the next entry to return; going backward,
/// the entry before `position` is.
struct MemoryKeyCursor {
    entries: Arc<Vec<IndexEntry>>,
    position: usize,
    direction: Direction,
}

impl KeyCursor for MemoryKeyCursor {
    fn seek_edge(&mut self, direction: Direction) {
        self.direction = direction;
        self.position = match direction {
            Direction::Forward => 0,
            Direction::Backward => self.entries.len(),
        };
    }

    fn seek(&mut self, prefix: &[Value], direction: Direction) {
        self.direction = direction;
        self.position = match direction {
            Direction::Forward => self
                .entries
                .partition_point(|e| compare_prefix(&e.key, prefix).is_lt()),
            Direction::Backward => self
                .entries
                .partition_point(|e| compare_prefix(&e.key, prefix).is_le()),
        };
    }

    fn advance(&mut self) -> StorageResult<Option<IndexEntry>> {
        match self.direction {
            Direction::Forward => {
                let entry = self.entries.get(self.position).cloned();
                if entry.is_some() {
                    self.position += 1;
                }
                Ok(entry)
            }
            Direction::Backward => {
                if self.position == 0 {
                    return Ok(None);
                }
                self.position -= 1;
                Ok(self.entries.get(self.position).cloned())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, ColumnType};

    fn int(name: &str) -> ColumnDef {
        ColumnDef::new(name, ColumnType::Int)
    }

    fn store() -> (MemoryStore, TableId, TableId) {
        let store = MemoryStore::new(Catalog::new()).unwrap();
        let c = store
            .create_table(&TableSpec::root("c", vec![int("cid")], &["cid"]))
            .unwrap();
        let o = store
            .create_table(&TableSpec::child(
                "o",
                vec![int("oid"), int("cid")],
                &["oid"],
                "c",
                &["cid"],
            ))
            .unwrap();
        (store, c, o)
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::Int(*v)).collect()
    }

    fn drain(cursor: &mut dyn GroupCursor) -> Vec<(TableId, Vec<Value>)> {
        let mut out = Vec::new();
        while let Some(row) = cursor.next_row().unwrap() {
            out.push((row.table, row.fields));
        }
        out
    }

    #[test]
    fn test_group_order_is_depth_first() {
        let (store, c, o) = store();
        store.write_row(c, ints(&[2])).unwrap();
        store.write_row(o, ints(&[20, 2])).unwrap();
        store.write_row(c, ints(&[1])).unwrap();
        store.write_row(o, ints(&[10, 1])).unwrap();
        store.write_row(o, ints(&[11, 1])).unwrap();

        let group = store.catalog().table(c).unwrap().group;
        let rows = drain(store.group_cursor(group, None).unwrap().as_mut());
        assert_eq!(
            rows,
            vec![
                (c, ints(&[1])),
                (o, ints(&[10, 1])),
                (o, ints(&[11, 1])),
                (c, ints(&[2])),
                (o, ints(&[20, 2])),
            ]
        );

        let subtree = HKey::root(0, ints(&[1]));
        let rows = drain(store.group_cursor(group, Some(subtree)).unwrap().as_mut());
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_orphans_are_adopted() {
        let (store, c, o) = store();
        store.write_row(o, ints(&[10, 1])).unwrap();
        let group = store.catalog().table(c).unwrap().group;
        let orphan = store.group_cursor(group, None).unwrap().next_row().unwrap().unwrap();
        assert_eq!(orphan.hkey.segments()[0].keys(), &[Value::Int(1)]);
        assert!(store
            .lookup(group, &HKey::root(0, ints(&[1])))
            .unwrap()
            .is_none());

        store.write_row(c, ints(&[1])).unwrap();
        let parent = HKey::root(0, ints(&[1]));
        let rows = drain(store.group_cursor(group, Some(parent)).unwrap().as_mut());
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_dml_errors() {
        let (store, c, _) = store();
        store.write_row(c, ints(&[1])).unwrap();
        assert!(matches!(
            store.write_row(c, ints(&[1])),
            Err(StorageError::DuplicateKey { .. })
        ));
        assert!(matches!(
            store.delete_row(c, &ints(&[9])),
            Err(StorageError::RowNotFound { .. })
        ));
        assert!(matches!(
            store.write_row(c, vec![Value::text("x")]),
            Err(StorageError::Row(RowError::TypeMismatch { .. }))
        ));
        store.update_row(c, &ints(&[1]), ints(&[5])).unwrap();
        assert_eq!(store.row_count(c), 1);
    }

    #[test]
    fn test_key_cursor_seek() {
        let (store, c, _) = store();
        for v in [1, 3, 5, 7] {
            store.write_row(c, ints(&[v])).unwrap();
        }
        let index = store
            .create_index(&IndexSpec::table("c_cid", "c", &["cid"]))
            .unwrap();
        let mut cursor = store.index_cursor(index).unwrap();

        cursor.seek(&ints(&[4]), Direction::Forward);
        assert_eq!(cursor.advance().unwrap().unwrap().key, ints(&[5]));

        cursor.seek(&ints(&[5]), Direction::Backward);
        assert_eq!(cursor.advance().unwrap().unwrap().key, ints(&[5]));
        assert_eq!(cursor.advance().unwrap().unwrap().key, ints(&[3]));

        cursor.seek_edge(Direction::Backward);
        assert_eq!(cursor.advance().unwrap().unwrap().key, ints(&[7]));
    }

    #[test]
    fn test_collector_through_index_in_range() {
        let (store, c, _) = store();
        for v in [1, 2, 3, 4] {
            store.write_row(c, ints(&[v])).unwrap();
        }
        let index = store
            .create_index(&IndexSpec::table("c_cid", "c", &["cid"]))
            .unwrap();
        let request = CollectorRequest {
            table: c,
            index: Some(index),
            range: crate::index::IndexKeyRange::exact(ints(&[3])),
            columns: crate::row::ColumnSelector::all(1),
            descending: false,
        };
        let mut collector = store.row_collector(&request).unwrap();
        let row = collector.collect_next_row().unwrap().unwrap();
        assert_eq!(row.fields().unwrap(), &[Value::Int(3)]);
        assert!(!collector.has_more());
    }

    #[test]
    fn test_unique_index_rejects_duplicate_keys() {
        let (store, _, o) = store();
        store
            .create_index(&IndexSpec::table("o_cid", "o", &["cid"]).unique())
            .unwrap();
        store.write_row(o, ints(&[10, 1])).unwrap();

        let err = store.write_row(o, ints(&[11, 1])).unwrap_err();
        assert!(matches!(err, StorageError::UniqueViolation { .. }));
        assert_eq!(store.row_count(o), 1);

        store.write_row(o, vec![Value::Int(12), Value::Null]).unwrap();
        store.write_row(o, vec![Value::Int(13), Value::Null]).unwrap();
        store.write_row(o, ints(&[14, 2])).unwrap();
        assert_eq!(store.row_count(o), 4);

        let err = store
            .update_row(o, &ints(&[14, 2]), ints(&[14, 1]))
            .unwrap_err();
        assert!(matches!(err, StorageError::UniqueViolation { .. }));
        store.delete_row(o, &ints(&[14, 2])).unwrap();
        store.update_row(o, &ints(&[10, 1]), ints(&[10, 3])).unwrap();
        store.write_row(o, ints(&[11, 1])).unwrap();
    }

    #[test]
    fn test_unique_index_over_existing_duplicates() {
        let (store, _, o) = store();
        store.write_row(o, ints(&[10, 1])).unwrap();
        store.write_row(o, ints(&[11, 1])).unwrap();
        let generation = store.catalog().schema_generation();

        let err = store
            .create_index(&IndexSpec::table("o_cid", "o", &["cid"]).unique())
            .unwrap_err();
        assert!(matches!(err, StorageError::UniqueViolation { .. }));
        assert!(store.catalog().index_by_name("o_cid").is_none());
        assert_eq!(store.catalog().schema_generation(), generation);

        let err = store
            .create_index(&IndexSpec::group("co", &[("c", "cid"), ("o", "oid")]).unique())
            .unwrap_err();
        assert!(matches!(err, StorageError::Schema(_)));
    }
}
