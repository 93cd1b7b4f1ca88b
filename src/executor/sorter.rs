//! Sort and distinct
//!
//! Sort is stable: rows that compare equal keep their input order, so
//! sorting a sorted stream again is a no-op. With a limit at or below the
//! configured threshold only the best `limit` rows are kept while the input
//! is read; otherwise the whole input is buffered and sorted.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;

use super::cursor::{close_child, pull, Cursor, CursorImpl};
use super::errors::{ExecutorError, ExecutorResult};
use super::operator::Operator;
use crate::context::QueryContext;
use crate::index::OrderBy;
use crate::row::{Row, RowType};

/// Buffers its input and re-emits it in a given order.
#[derive(Debug)]
pub struct Sort {
    input: Arc<Operator>,
    row_type: Arc<RowType>,
    ordering: OrderBy,
    limit: Option<usize>,
    suppress_duplicates: bool,
}

impl Sort {
    /// Sort of `input` rows of `row_type`
    pub fn new(
        input: Arc<Operator>,
        row_type: Arc<RowType>,
        ordering: OrderBy,
        limit: Option<usize>,
        suppress_duplicates: bool,
    ) -> ExecutorResult<Self> {
        if ordering.is_empty() {
            return Err(ExecutorError::plan_invalid("Sort needs at least one field"));
        }
        if let Some(field) = ordering
            .fields()
            .iter()
            .find(|f| f.position >= row_type.n_fields())
        {
            return Err(ExecutorError::plan_invalid(format!(
                "Sort on field {} of row type {} with {} fields",
                field.position,
                row_type,
                row_type.n_fields()
            )));
        }
        Ok(Self {
            input,
            row_type,
            ordering,
            limit,
            suppress_duplicates,
        })
    }

    /// Input operator
    pub fn input(&self) -> &Arc<Operator> {
        &self.input
    }

    /// Sorted row type
    pub fn row_type(&self) -> &Arc<RowType> {
        &self.row_type
    }

    /// Sort order
    pub fn ordering(&self) -> &OrderBy {
        &self.ordering
    }

    /// Maximum rows emitted
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Whether rows equal on every field are emitted once
    pub fn suppress_duplicates(&self) -> bool {
        self.suppress_duplicates
    }

    fn compare(&self, a: &Row, b: &Row) -> Ordering {
        self.ordering.compare(a.fields(), b.fields())
    }
}

pub(crate) struct SortCursor {
    plan: Arc<Sort>,
    input: Box<Cursor>,
    sorted: Option<VecDeque<Row>>,
}

impl SortCursor {
    pub(crate) fn new(plan: Arc<Sort>, input: Cursor) -> Self {
        Self {
            plan,
            input: Box::new(input),
            sorted: None,
        }
    }

    fn load(&mut self, ctx: &QueryContext) -> ExecutorResult<VecDeque<Row>> {
        let plan = self.plan.clone();
        let bounded = plan
            .limit
            .filter(|l| *l <= ctx.config().sort_limit_threshold);

        let mut rows: Vec<Row> = Vec::new();
        while let Some(row) = pull(&mut self.input, ctx)? {
            match bounded {
                Some(limit) => {
                    let at = rows.partition_point(|r| plan.compare(r, &row) != Ordering::Greater);
                    if plan.suppress_duplicates {
                        let run = rows.partition_point(|r| plan.compare(r, &row) == Ordering::Less);
                        if rows[run..at].iter().any(|r| r.fields() == row.fields()) {
                            continue;
                        }
                    }
                    if at < limit {
                        rows.insert(at, row);
                        rows.truncate(limit);
                    }
                }
                None => rows.push(row),
            }
        }

        if bounded.is_none() {
            rows.sort_by(|a, b| plan.compare(a, b));
        }
        if plan.suppress_duplicates {
            rows = drop_duplicates(rows, &plan);
        }
        if let Some(limit) = plan.limit {
            rows.truncate(limit);
        }
        Ok(rows.into())
    }
}

/// Keeps the first of each set of rows equal on every field. Such rows are
/// in the same run of rows that compare equal.
fn drop_duplicates(rows: Vec<Row>, plan: &Sort) -> Vec<Row> {
    let mut kept: Vec<Row> = Vec::with_capacity(rows.len());
    let mut run = 0;
    for row in rows {
        if kept
            .get(run)
            .is_some_and(|first| plan.compare(first, &row) != Ordering::Equal)
        {
            run = kept.len();
        }
        if kept[run..].iter().any(|r| r.fields() == row.fields()) {
            continue;
        }
        kept.push(row);
    }
    kept
}

impl CursorImpl for SortCursor {
    fn open(&mut self, ctx: &QueryContext) -> ExecutorResult<()> {
        self.sorted = None;
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &QueryContext) -> ExecutorResult<Option<Row>> {
        if self.sorted.is_none() {
            let rows = self.load(ctx)?;
            self.sorted = Some(rows);
        }
        Ok(self.sorted.as_mut().and_then(VecDeque::pop_front))
    }

    fn close(&mut self) {
        self.sorted = None;
        close_child(&mut self.input);
    }

    fn destroy(&mut self) {
        self.sorted = None;
        self.input.destroy();
    }

    fn name(&self) -> &'static str {
        "Sort"
    }
}

/// Emits the first row of every run of rows equal on all fields.
///
/// Input must be sorted for the result to be duplicate-free.
#[derive(Debug)]
pub struct Distinct {
    input: Arc<Operator>,
}

impl Distinct {
    /// Distinct over `input`
    pub fn new(input: Arc<Operator>) -> Self {
        Self { input }
    }

    /// Input operator
    pub fn input(&self) -> &Arc<Operator> {
        &self.input
    }
}

pub(crate) struct DistinctCursor {
    input: Box<Cursor>,
    previous: Option<Row>,
}

impl DistinctCursor {
    pub(crate) fn new(input: Cursor) -> Self {
        Self {
            input: Box::new(input),
            previous: None,
        }
    }
}

impl CursorImpl for DistinctCursor {
    fn open(&mut self, ctx: &QueryContext) -> ExecutorResult<()> {
        self.previous = None;
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &QueryContext) -> ExecutorResult<Option<Row>> {
        while let Some(row) = pull(&mut self.input, ctx)? {
            if self.previous.as_ref() == Some(&row) {
                continue;
            }
            self.previous = Some(row.clone());
            return Ok(Some(row));
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.previous = None;
        close_child(&mut self.input);
    }

    fn destroy(&mut self) {
        self.previous = None;
        self.input.destroy();
    }

    fn name(&self) -> &'static str {
        "Distinct"
    }
}
