//! Literal and group scans

use std::collections::HashMap;
use std::sync::Arc;

use super::cursor::CursorImpl;
use super::errors::{ExecutorError, ExecutorResult};
use crate::context::QueryContext;
use crate::row::{HKey, Row, RowSchema, RowType};
use crate::schema::{Catalog, GroupId, TableId};
use crate::storage::GroupCursor;

/// Emits a fixed list of rows.
#[derive(Debug)]
pub struct ValuesScan {
    row_type: Arc<RowType>,
    rows: Vec<Row>,
}

impl ValuesScan {
    /// Every row must be of `row_type`
    pub fn new(row_type: Arc<RowType>, rows: Vec<Row>) -> ExecutorResult<Self> {
        if let Some(bad) = rows.iter().find(|r| r.row_type() != &row_type) {
            return Err(ExecutorError::plan_invalid(format!(
                "Row of type {} in values scan of type {}",
                bad.row_type(),
                row_type
            )));
        }
        Ok(Self { row_type, rows })
    }

    /// Output row type
    pub fn row_type(&self) -> &Arc<RowType> {
        &self.row_type
    }

    /// Rows emitted
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}

pub(crate) struct ValuesCursor {
    plan: Arc<ValuesScan>,
    position: usize,
}

impl ValuesCursor {
    pub(crate) fn new(plan: Arc<ValuesScan>) -> Self {
        Self { plan, position: 0 }
    }
}

impl CursorImpl for ValuesCursor {
    fn open(&mut self, _ctx: &QueryContext) -> ExecutorResult<()> {
        self.position = 0;
        Ok(())
    }

    fn next(&mut self, _ctx: &QueryContext) -> ExecutorResult<Option<Row>> {
        let row = self.plan.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }

    fn close(&mut self) {
        self.position = self.plan.rows.len();
    }

    fn name(&self) -> &'static str {
        "ValuesScan"
    }
}

/// Emits the rows of a group in HKey order, optionally only one subtree.
///
/// Rows of tables added to the group after planning are skipped.
#[derive(Debug)]
pub struct GroupScan {
    group: GroupId,
    name: String,
    row_types: HashMap<TableId, Arc<RowType>>,
    subtree: Option<HKey>,
}

impl GroupScan {
    /// Scan of `group`; with `subtree`, only that row and its descendants
    pub fn new(
        catalog: &Catalog,
        schema: &RowSchema,
        group: GroupId,
        subtree: Option<HKey>,
    ) -> ExecutorResult<Self> {
        let def = catalog
            .group(group)
            .ok_or_else(|| ExecutorError::plan_invalid(format!("Unknown group {}", group)))?;
        let root = catalog.require_table(def.root)?;
        let mut row_types = HashMap::new();
        for table in catalog.group_tables(group) {
            let row_type = schema.table_row_type(table.id).ok_or_else(|| {
                ExecutorError::plan_invalid(format!("No row type for table {}", table.name))
            })?;
            row_types.insert(table.id, row_type);
        }
        Ok(Self {
            group,
            name: root.name.clone(),
            row_types,
            subtree,
        })
    }

    /// Scanned group
    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Name of the group's root table
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subtree restriction
    pub fn subtree(&self) -> Option<&HKey> {
        self.subtree.as_ref()
    }
}

pub(crate) struct GroupScanCursor {
    plan: Arc<GroupScan>,
    generation: u64,
    rows: Option<Box<dyn GroupCursor>>,
}

impl GroupScanCursor {
    pub(crate) fn new(plan: Arc<GroupScan>) -> Self {
        Self {
            plan,
            generation: 0,
            rows: None,
        }
    }

    fn current_generation(&self, ctx: &QueryContext) -> ExecutorResult<u64> {
        ctx.catalog()
            .group_generation(self.plan.group)
            .ok_or_else(|| ExecutorError::table_definition_changed(self.plan.name.clone()))
    }
}

impl CursorImpl for GroupScanCursor {
    fn open(&mut self, ctx: &QueryContext) -> ExecutorResult<()> {
        self.generation = self.current_generation(ctx)?;
        self.rows = Some(
            ctx.store()
                .group_cursor(self.plan.group, self.plan.subtree.clone())?,
        );
        Ok(())
    }

    fn next(&mut self, ctx: &QueryContext) -> ExecutorResult<Option<Row>> {
        if self.current_generation(ctx)? != self.generation {
            return Err(ExecutorError::table_definition_changed(
                self.plan.name.clone(),
            ));
        }
        let Some(rows) = self.rows.as_mut() else {
            return Ok(None);
        };
        while let Some(stored) = rows.next_row()? {
            if let Some(row_type) = self.plan.row_types.get(&stored.table) {
                let row = Row::new(row_type.clone(), stored.fields)?.with_hkey(stored.hkey);
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.rows = None;
    }

    fn name(&self) -> &'static str {
        "GroupScan"
    }
}
