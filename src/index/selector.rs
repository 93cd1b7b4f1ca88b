//! Index scan selectors
//!
//! A group index spans a join chain of tables. Each index entry carries a
//! presence bitmap with bit `1 << depth` set for every table of the chain
//! that contributed a row. A selector decides which entries a scan sees by
//! requiring a set of those bits; the remaining chain tables are optional.
//!
//! Table indexes have no chain to filter and always use [`IndexScanSelector::All`].

use super::errors::{IndexError, IndexResult};
use crate::schema::{Catalog, IndexDef, IndexKind, TableDef, TableId};

/// Decides which table-depth combinations of a group index are matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexScanSelector {
    /// Every entry matches
    All,
    /// Entries must have every bit of `required_map`
    Selective {
        required_map: u64,
        description: String,
    },
}

/// Which chain tables are required
#[derive(Debug, Clone, Copy)]
enum Policy {
    Inner,
    LeftJoinAfter(TableId),
    RightJoinUntil(TableId),
}

impl Policy {
    fn include(&self, table: &TableDef, required: Option<&TableDef>) -> bool {
        match (self, required) {
            (Policy::LeftJoinAfter(_), Some(r)) => table.depth <= r.depth,
            (Policy::RightJoinUntil(_), Some(r)) => table.depth >= r.depth,
            _ => true,
        }
    }

    fn required_table(&self) -> Option<TableId> {
        match self {
            Policy::Inner => None,
            Policy::LeftJoinAfter(t) | Policy::RightJoinUntil(t) => Some(*t),
        }
    }

    fn description(&self, index: &IndexDef, required: Option<&TableDef>) -> String {
        match (self, required) {
            (Policy::LeftJoinAfter(_), Some(r)) if index.leafmost_table() != r.id => {
                format!(" INNER JOIN thru {}, then LEFT", r.name)
            }
            (Policy::RightJoinUntil(_), Some(r)) if index.rootmost_table() != r.id => {
                format!(" RIGHT JOIN thru {}, then INNER", r.name)
            }
            _ => String::new(),
        }
    }
}

impl IndexScanSelector {
    /// Every chain table required
    pub fn inner(catalog: &Catalog, index: &IndexDef) -> IndexResult<Self> {
        Self::create(catalog, index, Policy::Inner)
    }

    /// Tables from the chain root down to `leafmost_required` are required;
    /// deeper tables are optional.
    pub fn left_join_after(
        catalog: &Catalog,
        index: &IndexDef,
        leafmost_required: TableId,
    ) -> IndexResult<Self> {
        Self::create(catalog, index, Policy::LeftJoinAfter(leafmost_required))
    }

    /// Tables from `rootmost_required` down to the chain leaf are required;
    /// shallower tables are optional.
    pub fn right_join_until(
        catalog: &Catalog,
        index: &IndexDef,
        rootmost_required: TableId,
    ) -> IndexResult<Self> {
        Self::create(catalog, index, Policy::RightJoinUntil(rootmost_required))
    }

    fn create(catalog: &Catalog, index: &IndexDef, policy: Policy) -> IndexResult<Self> {
        let required = match policy.required_table() {
            Some(id) => Some(catalog.require_table(id)?),
            None => None,
        };
        let complain = |table: &TableDef| IndexError::TableNotInIndex {
            index: index.name.clone(),
            table: table.name.clone(),
        };

        if let IndexKind::Table { table } = index.kind {
            return match required {
                Some(r) if r.id != table => Err(complain(r)),
                _ => Ok(IndexScanSelector::All),
            };
        }

        let mut required_map = 0u64;
        let mut saw_table = false;
        for table in catalog.index_chain(index)? {
            if required.is_some_and(|r| r.id == table.id) {
                saw_table = true;
            }
            if policy.include(table, required) {
                required_map |= 1u64 << table.depth;
            }
        }
        if let Some(r) = required {
            if !saw_table {
                return Err(complain(r));
            }
        }

        Ok(IndexScanSelector::Selective {
            required_map,
            description: policy.description(index, required),
        })
    }

    /// True if every entry matches
    pub fn matches_all(&self) -> bool {
        matches!(self, IndexScanSelector::All)
    }

    /// True if an entry with presence bitmap `map` matches
    pub fn matches(&self, map: u64) -> bool {
        match self {
            IndexScanSelector::All => true,
            IndexScanSelector::Selective { required_map, .. } => {
                map & required_map == *required_map
            }
        }
    }

    /// Required bits, `None` for [`IndexScanSelector::All`]
    pub fn required_map(&self) -> Option<u64> {
        match self {
            IndexScanSelector::All => None,
            IndexScanSelector::Selective { required_map, .. } => Some(*required_map),
        }
    }

    /// Join transformation applied, for plan explain output
    pub fn describe(&self) -> &str {
        match self {
            IndexScanSelector::All => "",
            IndexScanSelector::Selective { description, .. } => description,
        }
    }
}
