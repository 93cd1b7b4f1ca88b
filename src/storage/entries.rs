//! Index entries
//!
//! Entries are derived state, rebuilt from the group rows they describe.
//! A table index has one entry per row of its table. A group index has one
//! entry per leafmost-table row, plus one per row of any other chain table
//! that has no row in the next deeper chain table: a customer without
//! orders still appears, with order and item columns null. Each entry
//! records which chain tables contributed a row in its presence bitmap
//! (bit `1 << depth`).

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use super::adapter::GroupRow;
use super::errors::StorageResult;
use crate::row::{HKey, Value};
use crate::schema::{Catalog, IndexDef, IndexKind};

/// One index entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Key column values, in index column order
    pub key: Vec<Value>,
    /// HKey of the deepest row the entry was built from
    pub hkey: HKey,
    /// Chain tables present, one bit per depth
    pub table_map: u64,
}

impl Ord for IndexEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.hkey.cmp(&other.hkey))
    }
}

impl PartialOrd for IndexEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Builds the sorted entries of `index` from the rows of its group
pub fn build_entries(
    catalog: &Catalog,
    index: &IndexDef,
    rows: &[GroupRow],
) -> StorageResult<Vec<IndexEntry>> {
    let mut entries = match index.kind {
        IndexKind::Table { table } => {
            let depth = catalog.require_table(table)?.depth;
            rows.iter()
                .filter(|r| r.table == table)
                .map(|r| IndexEntry {
                    key: index
                        .columns
                        .iter()
                        .map(|c| r.fields.get(c.position).cloned().unwrap_or(Value::Null))
                        .collect(),
                    hkey: r.hkey.clone(),
                    table_map: 1u64 << depth,
                })
                .collect()
        }
        IndexKind::Group { .. } => build_group_entries(catalog, index, rows)?,
    };
    entries.sort();
    Ok(entries)
}

fn build_group_entries(
    catalog: &Catalog,
    index: &IndexDef,
    rows: &[GroupRow],
) -> StorageResult<Vec<IndexEntry>> {
    let chain = catalog.index_chain(index)?;
    let by_hkey: HashMap<&HKey, &GroupRow> = rows.iter().map(|r| (&r.hkey, r)).collect();
    let mut entries = Vec::new();

    for (i, table) in chain.iter().enumerate() {
        // Parents of rows one level deeper in the chain
        let covered: HashSet<HKey> = match i.checked_sub(1).map(|j| chain[j].id) {
            Some(child) => rows
                .iter()
                .filter(|r| r.table == child)
                .filter_map(|r| r.hkey.parent())
                .collect(),
            None => HashSet::new(),
        };

        for row in rows.iter().filter(|r| r.table == table.id) {
            if covered.contains(&row.hkey) {
                continue;
            }

            let mut table_map = 0u64;
            let mut present: HashMap<_, &GroupRow> = HashMap::new();
            for ancestor in &chain[i..] {
                let found = row
                    .hkey
                    .ancestor(ancestor.depth)
                    .and_then(|h| by_hkey.get(&h).copied())
                    .filter(|r| r.table == ancestor.id);
                if let Some(found) = found {
                    table_map |= 1u64 << ancestor.depth;
                    present.insert(ancestor.id, found);
                }
            }

            let key = index
                .columns
                .iter()
                .map(|c| {
                    present
                        .get(&c.table)
                        .and_then(|r| r.fields.get(c.position))
                        .cloned()
                        .unwrap_or(Value::Null)
                })
                .collect();
            entries.push(IndexEntry {
                key,
                hkey: row.hkey.clone(),
                table_map,
            });
        }
    }
    Ok(entries)
}
