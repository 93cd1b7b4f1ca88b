//! Ancestor lookup
//!
//! For each input row, emits the stored rows of the requested ancestor
//! tables (root first), then the input row itself when asked to. The
//! ancestors are found by truncating the input row's HKey, so output keeps
//! the group's depth-first order. Missing ancestors (orphans) are skipped.

use std::collections::VecDeque;
use std::sync::Arc;

use super::cursor::{close_child, pull, Cursor, CursorImpl};
use super::errors::{ExecutorError, ExecutorResult};
use super::operator::Operator;
use crate::context::QueryContext;
use crate::row::{Row, RowSchema, RowType};
use crate::schema::{Catalog, GroupId, TableId};

#[derive(Debug)]
struct Ancestor {
    table: TableId,
    name: String,
    depth: usize,
    row_type: Arc<RowType>,
}

/// Looks up ancestors of the rows of its input.
#[derive(Debug)]
pub struct AncestorLookup {
    input: Arc<Operator>,
    group: GroupId,
    ancestors: Vec<Ancestor>,
    keep_input: bool,
}

impl AncestorLookup {
    /// Lookup of `ancestors` in `group`; every table must belong to the group
    pub fn new(
        catalog: &Catalog,
        schema: &RowSchema,
        input: Arc<Operator>,
        group: GroupId,
        ancestors: &[TableId],
        keep_input: bool,
    ) -> ExecutorResult<Self> {
        if ancestors.is_empty() && !keep_input {
            return Err(ExecutorError::plan_invalid(
                "Ancestor lookup must emit ancestors or its input",
            ));
        }
        let mut resolved = Vec::with_capacity(ancestors.len());
        for id in ancestors {
            let table = catalog.require_table(*id)?;
            if table.group != group {
                return Err(ExecutorError::plan_invalid(format!(
                    "Table {} is not in group {}",
                    table.name, group
                )));
            }
            let row_type = schema.table_row_type(table.id).ok_or_else(|| {
                ExecutorError::plan_invalid(format!("No row type for table {}", table.name))
            })?;
            resolved.push(Ancestor {
                table: table.id,
                name: table.name.clone(),
                depth: table.depth,
                row_type,
            });
        }
        resolved.sort_by_key(|a| a.depth);
        Ok(Self {
            input,
            group,
            ancestors: resolved,
            keep_input,
        })
    }

    /// Input operator
    pub fn input(&self) -> &Arc<Operator> {
        &self.input
    }

    /// Looked-up tables, root first
    pub fn ancestors(&self) -> impl Iterator<Item = TableId> + '_ {
        self.ancestors.iter().map(|a| a.table)
    }

    /// Names of the looked-up tables, root first
    pub fn ancestor_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.ancestors.iter().map(|a| a.name.as_str())
    }

    /// Whether input rows are emitted after their ancestors
    pub fn keep_input(&self) -> bool {
        self.keep_input
    }
}

pub(crate) struct AncestorLookupCursor {
    plan: Arc<AncestorLookup>,
    input: Box<Cursor>,
    pending: VecDeque<Row>,
}

impl AncestorLookupCursor {
    pub(crate) fn new(plan: Arc<AncestorLookup>, input: Cursor) -> Self {
        Self {
            plan,
            input: Box::new(input),
            pending: VecDeque::new(),
        }
    }

    fn expand(&mut self, ctx: &QueryContext, row: Row) -> ExecutorResult<()> {
        let hkey = row.require_hkey()?.clone();
        for ancestor in &self.plan.ancestors {
            let Some(key) = hkey.ancestor(ancestor.depth) else {
                continue;
            };
            if key == hkey {
                continue;
            }
            if let Some(stored) = ctx.store().lookup(self.plan.group, &key)? {
                if stored.table == ancestor.table {
                    let found = Row::new(ancestor.row_type.clone(), stored.fields)?
                        .with_hkey(stored.hkey);
                    self.pending.push_back(found);
                }
            }
        }
        if self.plan.keep_input {
            self.pending.push_back(row);
        }
        Ok(())
    }
}

impl CursorImpl for AncestorLookupCursor {
    fn open(&mut self, ctx: &QueryContext) -> ExecutorResult<()> {
        self.pending.clear();
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &QueryContext) -> ExecutorResult<Option<Row>> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Ok(Some(row));
            }
            match pull(&mut self.input, ctx)? {
                Some(row) => self.expand(ctx, row)?,
                None => return Ok(None),
            }
        }
    }

    fn close(&mut self) {
        self.pending.clear();
        close_child(&mut self.input);
    }

    fn destroy(&mut self) {
        self.pending.clear();
        self.input.destroy();
    }

    fn name(&self) -> &'static str {
        "AncestorLookup"
    }
}
