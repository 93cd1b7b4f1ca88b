//! Ordered intersection
//!
//! Merges two inputs ordered on a shared key prefix and emits the left rows
//! whose prefix also occurs on the right. Whichever side is behind is moved
//! up with `jump`, so long non-matching stretches are skipped in the index
//! rather than read row by row.

use std::cmp::Ordering;
use std::sync::Arc;

use super::cursor::{close_child, pull, Cursor, CursorImpl};
use super::errors::{ExecutorError, ExecutorResult};
use super::operator::Operator;
use crate::context::QueryContext;
use crate::index::SortDirection;
use crate::row::{compare_prefix, ColumnSelector, Row, Value};

/// Intersection of two inputs ordered on their first `key_len` fields.
#[derive(Debug)]
pub struct IntersectOrdered {
    left: Arc<Operator>,
    right: Arc<Operator>,
    key_len: usize,
    direction: SortDirection,
}

impl IntersectOrdered {
    /// Both inputs must support jump and be ordered on `key_len` leading
    /// fields in `direction`
    pub fn new(
        left: Arc<Operator>,
        right: Arc<Operator>,
        key_len: usize,
        direction: SortDirection,
    ) -> ExecutorResult<Self> {
        if key_len == 0 {
            return Err(ExecutorError::plan_invalid(
                "Intersection needs at least one key field",
            ));
        }
        for side in [&left, &right] {
            if !side.supports_jump() {
                return Err(ExecutorError::plan_invalid(format!(
                    "Intersection input {} does not support jump",
                    side.name()
                )));
            }
            if let Some(row_type) = side.row_type() {
                if row_type.n_fields() < key_len {
                    return Err(ExecutorError::plan_invalid(format!(
                        "Intersection on {} fields of row type {} with {} fields",
                        key_len,
                        row_type,
                        row_type.n_fields()
                    )));
                }
            }
        }
        Ok(Self {
            left,
            right,
            key_len,
            direction,
        })
    }

    /// Left input; its rows are emitted
    pub fn left(&self) -> &Arc<Operator> {
        &self.left
    }

    /// Right input
    pub fn right(&self) -> &Arc<Operator> {
        &self.right
    }

    /// Shared key prefix length
    pub fn key_len(&self) -> usize {
        self.key_len
    }

    /// Order of both inputs
    pub fn direction(&self) -> SortDirection {
        self.direction
    }
}

pub(crate) struct IntersectCursor {
    plan: Arc<IntersectOrdered>,
    left: Box<Cursor>,
    right: Box<Cursor>,
    key: ColumnSelector,
    left_row: Option<Row>,
    right_row: Option<Row>,
}

impl IntersectCursor {
    pub(crate) fn new(plan: Arc<IntersectOrdered>, left: Cursor, right: Cursor) -> Self {
        let key = ColumnSelector::from_positions(0..plan.key_len);
        Self {
            plan,
            left: Box::new(left),
            right: Box::new(right),
            key,
            left_row: None,
            right_row: None,
        }
    }

    fn prefix<'a>(&self, row: &'a Row) -> &'a [Value] {
        &row.fields()[..self.plan.key_len.min(row.n_fields())]
    }
}

impl CursorImpl for IntersectCursor {
    fn open(&mut self, ctx: &QueryContext) -> ExecutorResult<()> {
        self.left_row = None;
        self.right_row = None;
        self.left.open(ctx)?;
        self.right.open(ctx)
    }

    fn next(&mut self, ctx: &QueryContext) -> ExecutorResult<Option<Row>> {
        loop {
            if self.left_row.is_none() {
                self.left_row = pull(&mut self.left, ctx)?;
            }
            if self.right_row.is_none() {
                self.right_row = pull(&mut self.right, ctx)?;
            }
            let (Some(left), Some(right)) = (&self.left_row, &self.right_row) else {
                return Ok(None);
            };
            let ordering = self
                .plan
                .direction
                .apply(compare_prefix(self.prefix(left), self.prefix(right)));
            match ordering {
                Ordering::Less => {
                    let target = self.prefix(right).to_vec();
                    self.left.jump(ctx, &target, &self.key)?;
                    self.left_row = None;
                }
                Ordering::Greater => {
                    let target = self.prefix(left).to_vec();
                    self.right.jump(ctx, &target, &self.key)?;
                    self.right_row = None;
                }
                Ordering::Equal => return Ok(self.left_row.take()),
            }
        }
    }

    fn jump(
        &mut self,
        ctx: &QueryContext,
        target: &[Value],
        columns: &ColumnSelector,
    ) -> ExecutorResult<()> {
        self.left.jump(ctx, target, columns)?;
        self.right.jump(ctx, target, columns)?;
        self.left_row = None;
        self.right_row = None;
        Ok(())
    }

    fn close(&mut self) {
        self.left_row = None;
        self.right_row = None;
        close_child(&mut self.left);
        close_child(&mut self.right);
    }

    fn destroy(&mut self) {
        self.left_row = None;
        self.right_row = None;
        self.left.destroy();
        self.right.destroy();
    }

    fn name(&self) -> &'static str {
        "IntersectOrdered"
    }
}
