//! Row-at-a-time operators: selection, projection and limit
//!
//! Select and Project act on rows of one row type and pass rows of any
//! other type through unchanged, so they can sit above a group scan that
//! interleaves several tables.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::cursor::{close_child, pull, Cursor, CursorImpl};
use super::errors::{ExecutorError, ExecutorResult};
use super::operator::Operator;
use crate::context::{Bindings, QueryContext};
use crate::row::{Row, RowType, Value};

/// Comparison operator of a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Constant
    Literal(Value),
    /// Parameter bound in the query context
    Binding(usize),
}

impl Operand {
    fn resolve<'a>(&'a self, bindings: &'a Bindings) -> ExecutorResult<&'a Value> {
        match self {
            Operand::Literal(v) => Ok(v),
            Operand::Binding(position) => bindings.get(*position),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(v) => write!(f, "{}", v),
            Operand::Binding(p) => write!(f, "${}", p),
        }
    }
}

/// Row predicate.
///
/// Comparisons never match a null field or a value of another type; there
/// is no coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Field compared with an operand
    Compare {
        position: usize,
        op: CompareOp,
        operand: Operand,
    },
    /// Field is null
    IsNull(usize),
    /// Every predicate holds
    And(Vec<Predicate>),
    /// Predicate does not hold
    Not(Box<Predicate>),
}

impl Predicate {
    /// Field compared with a constant
    pub fn compare(position: usize, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            position,
            op,
            operand: Operand::Literal(value.into()),
        }
    }

    /// Field compared with a bound parameter
    pub fn compare_binding(position: usize, op: CompareOp, binding: usize) -> Self {
        Predicate::Compare {
            position,
            op,
            operand: Operand::Binding(binding),
        }
    }

    /// Evaluates against a row
    pub fn evaluate(&self, row: &Row, bindings: &Bindings) -> ExecutorResult<bool> {
        match self {
            Predicate::Compare {
                position,
                op,
                operand,
            } => {
                let field = row.field(*position)?;
                let value = operand.resolve(bindings)?;
                if field.is_null() || value.is_null() || field.column_type() != value.column_type()
                {
                    return Ok(false);
                }
                Ok(op.holds(field.cmp(value)))
            }
            Predicate::IsNull(position) => Ok(row.field(*position)?.is_null()),
            Predicate::And(all) => {
                for p in all {
                    if !p.evaluate(row, bindings)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Not(inner) => Ok(!inner.evaluate(row, bindings)?),
        }
    }

    fn max_position(&self) -> Option<usize> {
        match self {
            Predicate::Compare { position, .. } | Predicate::IsNull(position) => Some(*position),
            Predicate::And(all) => all.iter().filter_map(Predicate::max_position).max(),
            Predicate::Not(inner) => inner.max_position(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare {
                position,
                op,
                operand,
            } => write!(f, "field {} {} {}", position, op.symbol(), operand),
            Predicate::IsNull(position) => write!(f, "field {} IS NULL", position),
            Predicate::And(all) => {
                let parts: Vec<String> = all.iter().map(|p| p.to_string()).collect();
                write!(f, "({})", parts.join(" AND "))
            }
            Predicate::Not(inner) => write!(f, "NOT {}", inner),
        }
    }
}

/// Keeps rows of one type that satisfy a predicate.
#[derive(Debug)]
pub struct Select {
    input: Arc<Operator>,
    row_type: Arc<RowType>,
    predicate: Predicate,
}

impl Select {
    /// Filter rows of `row_type` coming from `input`
    pub fn new(
        input: Arc<Operator>,
        row_type: Arc<RowType>,
        predicate: Predicate,
    ) -> ExecutorResult<Self> {
        if let Some(position) = predicate.max_position() {
            if position >= row_type.n_fields() {
                return Err(ExecutorError::plan_invalid(format!(
                    "Predicate reads field {} of row type {} with {} fields",
                    position,
                    row_type,
                    row_type.n_fields()
                )));
            }
        }
        Ok(Self {
            input,
            row_type,
            predicate,
        })
    }

    /// Input operator
    pub fn input(&self) -> &Arc<Operator> {
        &self.input
    }

    /// Filtered row type
    pub fn row_type(&self) -> &Arc<RowType> {
        &self.row_type
    }

    /// Predicate
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

pub(crate) struct SelectCursor {
    plan: Arc<Select>,
    input: Box<Cursor>,
}

impl SelectCursor {
    pub(crate) fn new(plan: Arc<Select>, input: Cursor) -> Self {
        Self {
            plan,
            input: Box::new(input),
        }
    }
}

impl CursorImpl for SelectCursor {
    fn open(&mut self, ctx: &QueryContext) -> ExecutorResult<()> {
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &QueryContext) -> ExecutorResult<Option<Row>> {
        while let Some(row) = pull(&mut self.input, ctx)? {
            if row.row_type() != &self.plan.row_type
                || self.plan.predicate.evaluate(&row, ctx.bindings())?
            {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        close_child(&mut self.input);
    }

    fn destroy(&mut self) {
        self.input.destroy();
    }

    fn name(&self) -> &'static str {
        "Select"
    }
}

/// Copies chosen fields of rows of one type into a new row type.
#[derive(Debug)]
pub struct Project {
    input: Arc<Operator>,
    input_type: Arc<RowType>,
    positions: Vec<usize>,
    row_type: Arc<RowType>,
}

impl Project {
    /// Projection of `positions` of `input_type` rows
    pub fn new(
        input: Arc<Operator>,
        input_type: Arc<RowType>,
        positions: Vec<usize>,
    ) -> ExecutorResult<Self> {
        let mut fields = Vec::with_capacity(positions.len());
        for position in &positions {
            let field = input_type.type_at(*position).ok_or_else(|| {
                ExecutorError::plan_invalid(format!(
                    "Projection of field {} from row type {} with {} fields",
                    position,
                    input_type,
                    input_type.n_fields()
                ))
            })?;
            fields.push(field);
        }
        Ok(Self {
            input,
            input_type,
            positions,
            row_type: RowType::projection(fields),
        })
    }

    /// Input operator
    pub fn input(&self) -> &Arc<Operator> {
        &self.input
    }

    /// Projected positions
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Output row type
    pub fn row_type(&self) -> &Arc<RowType> {
        &self.row_type
    }
}

pub(crate) struct ProjectCursor {
    plan: Arc<Project>,
    input: Box<Cursor>,
}

impl ProjectCursor {
    pub(crate) fn new(plan: Arc<Project>, input: Cursor) -> Self {
        Self {
            plan,
            input: Box::new(input),
        }
    }
}

impl CursorImpl for ProjectCursor {
    fn open(&mut self, ctx: &QueryContext) -> ExecutorResult<()> {
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &QueryContext) -> ExecutorResult<Option<Row>> {
        let Some(row) = pull(&mut self.input, ctx)? else {
            return Ok(None);
        };
        if row.row_type() != &self.plan.input_type {
            return Ok(Some(row));
        }
        Ok(Some(row.project(&self.plan.positions, self.plan.row_type.clone())?))
    }

    fn close(&mut self) {
        close_child(&mut self.input);
    }

    fn destroy(&mut self) {
        self.input.destroy();
    }

    fn name(&self) -> &'static str {
        "Project"
    }
}

/// Skips the first `skip` rows and emits at most `limit` rows.
#[derive(Debug)]
pub struct Limit {
    input: Arc<Operator>,
    skip: usize,
    limit: Option<usize>,
}

impl Limit {
    /// Limit over `input`
    pub fn new(input: Arc<Operator>, skip: usize, limit: Option<usize>) -> Self {
        Self { input, skip, limit }
    }

    /// Input operator
    pub fn input(&self) -> &Arc<Operator> {
        &self.input
    }

    /// Rows skipped
    pub fn skip(&self) -> usize {
        self.skip
    }

    /// Maximum rows emitted
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

pub(crate) struct LimitCursor {
    plan: Arc<Limit>,
    input: Box<Cursor>,
    skipped: usize,
    emitted: usize,
}

impl LimitCursor {
    pub(crate) fn new(plan: Arc<Limit>, input: Cursor) -> Self {
        Self {
            plan,
            input: Box::new(input),
            skipped: 0,
            emitted: 0,
        }
    }
}

impl CursorImpl for LimitCursor {
    fn open(&mut self, ctx: &QueryContext) -> ExecutorResult<()> {
        self.skipped = 0;
        self.emitted = 0;
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &QueryContext) -> ExecutorResult<Option<Row>> {
        if self.plan.limit.is_some_and(|l| self.emitted >= l) {
            return Ok(None);
        }
        while self.skipped < self.plan.skip {
            if pull(&mut self.input, ctx)?.is_none() {
                return Ok(None);
            }
            self.skipped += 1;
        }
        let row = pull(&mut self.input, ctx)?;
        if row.is_some() {
            self.emitted += 1;
        }
        Ok(row)
    }

    fn close(&mut self) {
        close_child(&mut self.input);
    }

    fn destroy(&mut self) {
        self.input.destroy();
    }

    fn name(&self) -> &'static str {
        "Limit"
    }
}
