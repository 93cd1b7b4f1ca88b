//! Index scans
//!
//! An index scan emits index rows (key values plus the HKey of the row the
//! entry was built from) in index order, restricted to a key range and
//! filtered by an [`IndexScanSelector`].
//!
//! When every ordered field shares one direction the scan streams from a
//! storage key cursor, forward or backward. Mixed directions cannot be
//! served by one storage traversal, so the in-range entries are read once at
//! open and sorted.
//!
//! Range checks run in scan order. Going forward, entries below the low
//! bound are skipped and the first entry above the high bound ends the scan;
//! going backward the roles swap. A jump therefore only needs to seek: the
//! range checks take care of targets outside the range.

use std::cmp::Ordering;
use std::sync::Arc;

use super::cursor::CursorImpl;
use super::errors::{ExecutorError, ExecutorResult};
use crate::context::QueryContext;
use crate::index::{IndexKeyRange, IndexScanSelector, OrderBy, SortDirection};
use crate::row::{ColumnSelector, Row, RowSchema, RowType, Value};
use crate::schema::{Catalog, IndexDef, IndexId, TableId};
use crate::storage::{Direction, IndexEntry, KeyCursor};

/// Scan of one index.
#[derive(Debug)]
pub struct IndexScan {
    index: IndexDef,
    tables: Vec<TableId>,
    row_type: Arc<RowType>,
    range: IndexKeyRange,
    ordering: OrderBy,
    selector: IndexScanSelector,
}

impl IndexScan {
    /// Scan of `index` over `range`.
    ///
    /// `ordering` must cover a prefix of the index columns; the remaining
    /// columns follow the direction of its last field.
    pub fn new(
        catalog: &Catalog,
        schema: &RowSchema,
        index: IndexId,
        range: IndexKeyRange,
        ordering: &OrderBy,
        selector: IndexScanSelector,
    ) -> ExecutorResult<Self> {
        let def = catalog.require_index(index)?.clone();
        range.validate(catalog, &def)?;
        let ordering = ordering.for_index(&def)?;
        if def.is_group_index() && selector.matches_all() {
            return Err(ExecutorError::plan_invalid(format!(
                "Group index {} needs a selective scan selector",
                def.name
            )));
        }
        let tables = catalog.index_chain(&def)?.iter().map(|t| t.id).collect();
        let row_type = schema.index_row_type(index).ok_or_else(|| {
            ExecutorError::plan_invalid(format!("No row type for index {}", def.name))
        })?;
        Ok(Self {
            index: def,
            tables,
            row_type,
            range,
            ordering,
            selector,
        })
    }

    /// Scanned index
    pub fn index(&self) -> &IndexDef {
        &self.index
    }

    /// Output row type
    pub fn row_type(&self) -> &Arc<RowType> {
        &self.row_type
    }

    /// Key range
    pub fn range(&self) -> &IndexKeyRange {
        &self.range
    }

    /// Ordering over every index column
    pub fn ordering(&self) -> &OrderBy {
        &self.ordering
    }

    /// Entry selector
    pub fn selector(&self) -> &IndexScanSelector {
        &self.selector
    }

    fn direction(&self) -> Option<Direction> {
        self.ordering.uniform_direction().map(|d| match d {
            SortDirection::Asc => Direction::Forward,
            SortDirection::Desc => Direction::Backward,
        })
    }
}

enum Source {
    Stream {
        cursor: Box<dyn KeyCursor>,
        direction: Direction,
        done: bool,
    },
    Sorted {
        entries: Vec<IndexEntry>,
        position: usize,
    },
}

pub(crate) struct IndexScanCursor {
    plan: Arc<IndexScan>,
    generations: Vec<(TableId, u64)>,
    source: Option<Source>,
}

impl IndexScanCursor {
    pub(crate) fn new(plan: Arc<IndexScan>) -> Self {
        Self {
            plan,
            generations: Vec::new(),
            source: None,
        }
    }

    fn stamp(&self, ctx: &QueryContext) -> ExecutorResult<Vec<(TableId, u64)>> {
        let catalog = ctx.catalog();
        if catalog.index(self.plan.index.id).is_none() {
            return Err(self.changed());
        }
        self.plan
            .tables
            .iter()
            .map(|t| {
                catalog
                    .table_generation(*t)
                    .map(|g| (*t, g))
                    .ok_or_else(|| self.changed())
            })
            .collect()
    }

    fn check_generations(&self, ctx: &QueryContext) -> ExecutorResult<()> {
        if self.stamp(ctx)? != self.generations {
            return Err(self.changed());
        }
        Ok(())
    }

    fn changed(&self) -> ExecutorError {
        ExecutorError::table_definition_changed(self.plan.index.name.clone())
    }

    fn wanted(&self, entry: &IndexEntry) -> bool {
        self.plan.range.contains(&entry.key) && self.plan.selector.matches(entry.table_map)
    }

    fn sorted_entries(&self, ctx: &QueryContext) -> ExecutorResult<Vec<IndexEntry>> {
        let mut cursor = ctx.store().index_cursor(self.plan.index.id)?;
        cursor.seek_edge(Direction::Forward);
        let mut entries = Vec::new();
        while let Some(entry) = cursor.advance()? {
            if self.wanted(&entry) {
                entries.push(entry);
            }
        }
        let ordering = &self.plan.ordering;
        entries.sort_by(|a, b| {
            ordering
                .compare(&a.key, &b.key)
                .then_with(|| a.hkey.cmp(&b.hkey))
        });
        Ok(entries)
    }

    fn to_row(&self, entry: IndexEntry) -> ExecutorResult<Row> {
        Ok(Row::new(self.plan.row_type.clone(), entry.key)?.with_hkey(entry.hkey))
    }
}

impl CursorImpl for IndexScanCursor {
    fn open(&mut self, ctx: &QueryContext) -> ExecutorResult<()> {
        self.generations = self.stamp(ctx)?;
        let source = match self.plan.direction() {
            Some(direction) => {
                let mut cursor = ctx.store().index_cursor(self.plan.index.id)?;
                let start = match direction {
                    Direction::Forward => self.plan.range.low(),
                    Direction::Backward => self.plan.range.high(),
                };
                match start {
                    Some(bound) => cursor.seek(&bound.key, direction),
                    None => cursor.seek_edge(direction),
                }
                Source::Stream {
                    cursor,
                    direction,
                    done: false,
                }
            }
            None => Source::Sorted {
                entries: self.sorted_entries(ctx)?,
                position: 0,
            },
        };
        self.source = Some(source);
        Ok(())
    }

    fn next(&mut self, ctx: &QueryContext) -> ExecutorResult<Option<Row>> {
        self.check_generations(ctx)?;
        let range = &self.plan.range;
        let selector = &self.plan.selector;
        let entry = match self.source.as_mut() {
            None => None,
            Some(Source::Sorted { entries, position }) => {
                let entry = entries.get(*position).cloned();
                *position += usize::from(entry.is_some());
                entry
            }
            Some(Source::Stream {
                cursor,
                direction,
                done,
            }) => {
                let mut found = None;
                while !*done {
                    let Some(entry) = cursor.advance()? else {
                        *done = true;
                        break;
                    };
                    let (before, after) = match direction {
                        Direction::Forward => {
                            (range.below_low(&entry.key), range.above_high(&entry.key))
                        }
                        Direction::Backward => {
                            (range.above_high(&entry.key), range.below_low(&entry.key))
                        }
                    };
                    if after {
                        *done = true;
                    } else if !before && selector.matches(entry.table_map) {
                        found = Some(entry);
                        break;
                    }
                }
                found
            }
        };
        entry.map(|e| self.to_row(e)).transpose()
    }

    fn jump(
        &mut self,
        ctx: &QueryContext,
        target: &[Value],
        columns: &ColumnSelector,
    ) -> ExecutorResult<()> {
        self.check_generations(ctx)?;
        let n = columns.prefix_len().ok_or_else(|| {
            ExecutorError::plan_invalid(format!(
                "Jump columns {} are not a prefix of index {}",
                columns, self.plan.index.name
            ))
        })?;
        if n > self.plan.index.n_columns() || n > target.len() {
            return Err(ExecutorError::plan_invalid(format!(
                "Jump on {} columns of index {} with a {} value target",
                n,
                self.plan.index.name,
                target.len()
            )));
        }
        let ordering = &self.plan.ordering;
        match self.source.as_mut() {
            None => {}
            Some(Source::Sorted { entries, position }) => {
                *position = entries
                    .partition_point(|e| ordering.compare_first(n, &e.key, target) == Ordering::Less);
            }
            Some(Source::Stream {
                cursor,
                direction,
                done,
            }) => {
                cursor.seek(&target[..n], *direction);
                *done = false;
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        self.source = None;
    }

    fn name(&self) -> &'static str {
        "IndexScan"
    }
}
