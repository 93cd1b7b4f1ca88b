//! Operator trees
//!
//! An [`Operator`] is an immutable plan node. Plans are built once, shared
//! through `Arc`, and turned into a fresh [`Cursor`] tree for every
//! execution.

use std::fmt::Write as _;
use std::sync::Arc;

use super::cursor::{Cursor, CursorKind};
use super::errors::ExecutorResult;
use super::index_scan::{IndexScan, IndexScanCursor};
use super::intersect::{IntersectCursor, IntersectOrdered};
use super::lookup::{AncestorLookup, AncestorLookupCursor};
use super::relational::{
    Limit, LimitCursor, Predicate, Project, ProjectCursor, Select, SelectCursor,
};
use super::scans::{GroupScan, GroupScanCursor, ValuesCursor, ValuesScan};
use super::sorter::{Distinct, DistinctCursor, Sort, SortCursor};
use crate::index::{IndexKeyRange, IndexScanSelector, OrderBy, SortDirection};
use crate::row::{HKey, Row, RowSchema, RowType};
use crate::schema::{Catalog, GroupId, IndexId, TableId};

/// One step of a physical plan
#[derive(Debug)]
pub enum Operator {
    ValuesScan(Arc<ValuesScan>),
    GroupScan(Arc<GroupScan>),
    IndexScan(Arc<IndexScan>),
    AncestorLookup(Arc<AncestorLookup>),
    Select(Arc<Select>),
    Project(Arc<Project>),
    Limit(Arc<Limit>),
    Sort(Arc<Sort>),
    Distinct(Arc<Distinct>),
    IntersectOrdered(Arc<IntersectOrdered>),
}

impl Operator {
    /// Literal rows
    pub fn values_scan(row_type: Arc<RowType>, rows: Vec<Row>) -> ExecutorResult<Arc<Self>> {
        Ok(Arc::new(Operator::ValuesScan(Arc::new(ValuesScan::new(
            row_type, rows,
        )?))))
    }

    /// Every row of a group, or of one subtree of it
    pub fn group_scan(
        catalog: &Catalog,
        schema: &RowSchema,
        group: GroupId,
        subtree: Option<HKey>,
    ) -> ExecutorResult<Arc<Self>> {
        Ok(Arc::new(Operator::GroupScan(Arc::new(GroupScan::new(
            catalog, schema, group, subtree,
        )?))))
    }

    /// Range scan of an index
    pub fn index_scan(
        catalog: &Catalog,
        schema: &RowSchema,
        index: IndexId,
        range: IndexKeyRange,
        ordering: &OrderBy,
        selector: IndexScanSelector,
    ) -> ExecutorResult<Arc<Self>> {
        Ok(Arc::new(Operator::IndexScan(Arc::new(IndexScan::new(
            catalog, schema, index, range, ordering, selector,
        )?))))
    }

    /// Ancestor rows of each input row
    pub fn ancestor_lookup(
        catalog: &Catalog,
        schema: &RowSchema,
        input: Arc<Operator>,
        group: GroupId,
        ancestors: &[TableId],
        keep_input: bool,
    ) -> ExecutorResult<Arc<Self>> {
        Ok(Arc::new(Operator::AncestorLookup(Arc::new(
            AncestorLookup::new(catalog, schema, input, group, ancestors, keep_input)?,
        ))))
    }

    /// Filter
    pub fn select(
        input: Arc<Operator>,
        row_type: Arc<RowType>,
        predicate: Predicate,
    ) -> ExecutorResult<Arc<Self>> {
        Ok(Arc::new(Operator::Select(Arc::new(Select::new(
            input, row_type, predicate,
        )?))))
    }

    /// Projection
    pub fn project(
        input: Arc<Operator>,
        input_type: Arc<RowType>,
        positions: Vec<usize>,
    ) -> ExecutorResult<Arc<Self>> {
        Ok(Arc::new(Operator::Project(Arc::new(Project::new(
            input, input_type, positions,
        )?))))
    }

    /// Skip then limit
    pub fn limit(input: Arc<Operator>, skip: usize, limit: Option<usize>) -> Arc<Self> {
        Arc::new(Operator::Limit(Arc::new(Limit::new(input, skip, limit))))
    }

    /// Sort
    pub fn sort(
        input: Arc<Operator>,
        row_type: Arc<RowType>,
        ordering: OrderBy,
        limit: Option<usize>,
        suppress_duplicates: bool,
    ) -> ExecutorResult<Arc<Self>> {
        Ok(Arc::new(Operator::Sort(Arc::new(Sort::new(
            input,
            row_type,
            ordering,
            limit,
            suppress_duplicates,
        )?))))
    }

    /// Adjacent duplicate removal
    pub fn distinct(input: Arc<Operator>) -> Arc<Self> {
        Arc::new(Operator::Distinct(Arc::new(Distinct::new(input))))
    }

    /// Merge intersection on a shared key prefix
    pub fn intersect_ordered(
        left: Arc<Operator>,
        right: Arc<Operator>,
        key_len: usize,
        direction: SortDirection,
    ) -> ExecutorResult<Arc<Self>> {
        Ok(Arc::new(Operator::IntersectOrdered(Arc::new(
            IntersectOrdered::new(left, right, key_len, direction)?,
        ))))
    }

    /// Creates an IDLE cursor tree for one execution
    pub fn cursor(&self) -> ExecutorResult<Cursor> {
        let kind = match self {
            Operator::ValuesScan(p) => CursorKind::Values(ValuesCursor::new(p.clone())),
            Operator::GroupScan(p) => CursorKind::GroupScan(GroupScanCursor::new(p.clone())),
            Operator::IndexScan(p) => CursorKind::IndexScan(IndexScanCursor::new(p.clone())),
            Operator::AncestorLookup(p) => CursorKind::AncestorLookup(AncestorLookupCursor::new(
                p.clone(),
                p.input().cursor()?,
            )),
            Operator::Select(p) => {
                CursorKind::Select(SelectCursor::new(p.clone(), p.input().cursor()?))
            }
            Operator::Project(p) => {
                CursorKind::Project(ProjectCursor::new(p.clone(), p.input().cursor()?))
            }
            Operator::Limit(p) => CursorKind::Limit(LimitCursor::new(p.clone(), p.input().cursor()?)),
            Operator::Sort(p) => CursorKind::Sort(SortCursor::new(p.clone(), p.input().cursor()?)),
            Operator::Distinct(p) => CursorKind::Distinct(DistinctCursor::new(p.input().cursor()?)),
            Operator::IntersectOrdered(p) => CursorKind::Intersect(IntersectCursor::new(
                p.clone(),
                p.left().cursor()?,
                p.right().cursor()?,
            )),
        };
        Ok(Cursor::new(kind))
    }

    /// Operator name
    pub fn name(&self) -> &'static str {
        match self {
            Operator::ValuesScan(_) => "ValuesScan",
            Operator::GroupScan(_) => "GroupScan",
            Operator::IndexScan(_) => "IndexScan",
            Operator::AncestorLookup(_) => "AncestorLookup",
            Operator::Select(_) => "Select",
            Operator::Project(_) => "Project",
            Operator::Limit(_) => "Limit",
            Operator::Sort(_) => "Sort",
            Operator::Distinct(_) => "Distinct",
            Operator::IntersectOrdered(_) => "IntersectOrdered",
        }
    }

    /// Whether this operator's cursors implement `jump`
    pub fn supports_jump(&self) -> bool {
        matches!(self, Operator::IndexScan(_) | Operator::IntersectOrdered(_))
    }

    /// Type of every output row, `None` when rows of several types come out
    pub fn row_type(&self) -> Option<Arc<RowType>> {
        match self {
            Operator::ValuesScan(p) => Some(p.row_type().clone()),
            Operator::GroupScan(_) | Operator::AncestorLookup(_) => None,
            Operator::IndexScan(p) => Some(p.row_type().clone()),
            Operator::Select(p) => p.input().row_type(),
            Operator::Project(p) => p.input().row_type().map(|_| p.row_type().clone()),
            Operator::Limit(p) => p.input().row_type(),
            Operator::Sort(p) => Some(p.row_type().clone()),
            Operator::Distinct(p) => p.input().row_type(),
            Operator::IntersectOrdered(p) => p.left().row_type(),
        }
    }

    fn children(&self) -> Vec<&Arc<Operator>> {
        match self {
            Operator::ValuesScan(_) | Operator::GroupScan(_) | Operator::IndexScan(_) => Vec::new(),
            Operator::AncestorLookup(p) => vec![p.input()],
            Operator::Select(p) => vec![p.input()],
            Operator::Project(p) => vec![p.input()],
            Operator::Limit(p) => vec![p.input()],
            Operator::Sort(p) => vec![p.input()],
            Operator::Distinct(p) => vec![p.input()],
            Operator::IntersectOrdered(p) => vec![p.left(), p.right()],
        }
    }

    fn describe(&self) -> String {
        match self {
            Operator::ValuesScan(p) => format!("ValuesScan({} rows)", p.rows().len()),
            Operator::GroupScan(p) => match p.subtree() {
                Some(hkey) => format!("GroupScan({} under {})", p.name(), hkey),
                None => format!("GroupScan({})", p.name()),
            },
            Operator::IndexScan(p) => format!(
                "IndexScan({} {} ORDER BY {}{})",
                p.index().name,
                p.range(),
                p.ordering(),
                p.selector().describe()
            ),
            Operator::AncestorLookup(p) => {
                let tables: Vec<&str> = p.ancestor_names().collect();
                let keep = if p.keep_input() { ", keep input" } else { "" };
                format!("AncestorLookup([{}]{})", tables.join(", "), keep)
            }
            Operator::Select(p) => format!("Select({})", p.predicate()),
            Operator::Project(p) => {
                let fields: Vec<String> = p.positions().iter().map(|i| i.to_string()).collect();
                format!("Project({})", fields.join(", "))
            }
            Operator::Limit(p) => match p.limit() {
                Some(limit) => format!("Limit(skip {}, limit {})", p.skip(), limit),
                None => format!("Limit(skip {})", p.skip()),
            },
            Operator::Sort(p) => {
                let mut out = format!("Sort({}", p.ordering());
                if let Some(limit) = p.limit() {
                    let _ = write!(out, ", limit {}", limit);
                }
                if p.suppress_duplicates() {
                    out.push_str(", distinct");
                }
                out.push(')');
                out
            }
            Operator::Distinct(_) => "Distinct".to_string(),
            Operator::IntersectOrdered(p) => {
                let dir = match p.direction() {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                format!("IntersectOrdered({} fields {})", p.key_len(), dir)
            }
        }
    }

    /// Plan tree, one operator per line, children indented
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, 0);
        out
    }

    fn explain_into(&self, out: &mut String, depth: usize) {
        let _ = writeln!(out, "{}{}", "  ".repeat(depth), self.describe());
        for child in self.children() {
            child.explain_into(out, depth + 1);
        }
    }
}
