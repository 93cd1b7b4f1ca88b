//! Query executor subsystem for aeroqp
//!
//! Plans are trees of immutable [`Operator`]s. Each execution asks the root
//! for a [`Cursor`] tree of the same shape and pulls rows from it.
//!
//! # Cursor protocol
//!
//! 1. `open` positions before the first row
//! 2. `next` returns rows until `None`, which leaves the cursor IDLE
//! 3. `jump` (index scans and ordered intersections only) repositions
//! 4. `close` ends the scan; the cursor may be reopened
//! 5. `destroy` is final
//!
//! # Invariants
//!
//! - Every cursor checks the query deadline before producing a row
//! - A scan over a table whose definition changed fails with
//!   `AERO_TABLE_DEFINITION_CHANGED` rather than returning stale rows
//! - Rows of types an operator does not handle pass through it unchanged

mod cursor;
mod errors;
mod index_scan;
mod intersect;
mod lookup;
mod operator;
mod relational;
mod scans;
mod sorter;

pub use cursor::{Cursor, CursorState};
pub use errors::{ExecutorError, ExecutorErrorCode, ExecutorResult, Severity};
pub use index_scan::IndexScan;
pub use intersect::IntersectOrdered;
pub use lookup::AncestorLookup;
pub use operator::Operator;
pub use relational::{CompareOp, Limit, Operand, Predicate, Project, Select};
pub use scans::{GroupScan, ValuesScan};
pub use sorter::{Distinct, Sort};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::context::QueryContext;
    use crate::index::{OrderBy, SortDirection};
    use crate::row::{ColumnSelector, RowType, RowsBuilder, Value};
    use crate::schema::{Catalog, ColumnType};
    use crate::storage::MemoryStore;

    fn context() -> QueryContext {
        QueryContext::new(Arc::new(MemoryStore::new(Catalog::new()).unwrap()))
    }

    fn ints(values: &[i64]) -> (Arc<RowType>, Arc<Operator>) {
        let mut builder = RowsBuilder::with_types(vec![ColumnType::Int]);
        for v in values {
            builder = builder.row([*v]).unwrap();
        }
        let (row_type, rows) = builder.build();
        let op = Operator::values_scan(row_type.clone(), rows).unwrap();
        (row_type, op)
    }

    fn first_fields(rows: &[crate::row::Row]) -> Vec<i64> {
        rows.iter()
            .map(|r| r.fields()[0].as_int().unwrap())
            .collect()
    }

    fn run(op: &Operator, ctx: &QueryContext) -> Vec<i64> {
        let mut cursor = op.cursor().unwrap();
        cursor.open(ctx).unwrap();
        let rows = cursor.collect(ctx).unwrap();
        first_fields(&rows)
    }

    #[test]
    fn test_cursor_lifecycle() {
        let ctx = context();
        let (_, op) = ints(&[1, 2]);
        let mut cursor = op.cursor().unwrap();
        assert_eq!(cursor.state(), CursorState::Idle);

        cursor.open(&ctx).unwrap();
        assert_eq!(cursor.state(), CursorState::Active);
        assert!(cursor.next(&ctx).unwrap().is_some());
        assert!(cursor.next(&ctx).unwrap().is_some());
        assert!(cursor.next(&ctx).unwrap().is_none());
        assert_eq!(cursor.state(), CursorState::Idle);

        cursor.open(&ctx).unwrap();
        assert_eq!(cursor.collect(&ctx).unwrap().len(), 2);
    }

    #[test]
    fn test_next_requires_active() {
        let ctx = context();
        let (_, op) = ints(&[1]);
        let mut cursor = op.cursor().unwrap();
        let err = cursor.next(&ctx).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::AeroCursorState);
    }

    #[test]
    fn test_reopen_restarts() {
        let ctx = context();
        let (_, op) = ints(&[7, 8, 9]);
        let mut cursor = op.cursor().unwrap();
        cursor.open(&ctx).unwrap();
        cursor.next(&ctx).unwrap();
        cursor.open(&ctx).unwrap();
        assert_eq!(first_fields(&cursor.collect(&ctx).unwrap()), vec![7, 8, 9]);
    }

    #[test]
    fn test_destroy_is_final() {
        let ctx = context();
        let (_, op) = ints(&[1]);
        let mut cursor = op.cursor().unwrap();
        cursor.open(&ctx).unwrap();
        cursor.destroy();
        cursor.destroy();
        assert_eq!(cursor.state(), CursorState::Destroyed);
        assert_eq!(
            cursor.open(&ctx).unwrap_err().code(),
            ExecutorErrorCode::AeroCursorState
        );
        assert_eq!(
            cursor.close().unwrap_err().code(),
            ExecutorErrorCode::AeroCursorState
        );
    }

    #[test]
    fn test_jump_unsupported_keeps_state() {
        let ctx = context();
        let (_, op) = ints(&[1, 2]);
        let mut cursor = op.cursor().unwrap();
        cursor.open(&ctx).unwrap();
        let err = cursor
            .jump(&ctx, &[Value::Int(2)], &ColumnSelector::from_positions(0..1))
            .unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::AeroJumpUnsupported);
        assert_eq!(cursor.state(), CursorState::Active);
        assert_eq!(first_fields(&cursor.collect(&ctx).unwrap()), vec![1, 2]);
    }

    #[test]
    fn test_timeout_leaves_cursor_idle() {
        let ctx = context().with_timeout(Duration::ZERO);
        let (_, op) = ints(&[1]);
        let mut cursor = op.cursor().unwrap();
        cursor.open(&ctx).unwrap();
        let err = cursor.next(&ctx).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::AeroQueryTimeout);
        assert_eq!(cursor.state(), CursorState::Idle);
    }

    #[test]
    fn test_select_project_limit() {
        let ctx = context();
        let (rt, values) = ints(&[5, 1, 4, 2, 3]);
        let select =
            Operator::select(values, rt.clone(), Predicate::compare(0, CompareOp::Gt, 1i64))
                .unwrap();
        let project = Operator::project(select, rt, vec![0]).unwrap();
        let limit = Operator::limit(project, 1, Some(2));
        assert_eq!(run(&limit, &ctx), vec![4, 2]);
    }

    #[test]
    fn test_sort_with_duplicate_suppression() {
        let ctx = context();
        let (rt, values) = ints(&[2, 1, 3, 2, 1, 2]);
        let sort = Operator::sort(values, rt, OrderBy::asc([0]), None, true).unwrap();
        assert_eq!(run(&sort, &ctx), vec![1, 2, 3]);
    }

    #[test]
    fn test_bounded_sort_keeps_best_rows() {
        let ctx = context();
        let (rt, values) = ints(&[5, 3, 9, 1, 7]);
        let ordering = OrderBy::new().then(0, SortDirection::Desc);
        let sort = Operator::sort(values, rt, ordering, Some(2), false).unwrap();
        assert_eq!(run(&sort, &ctx), vec![9, 7]);
    }

    #[test]
    fn test_distinct_runs() {
        let ctx = context();
        let (_, values) = ints(&[1, 1, 2, 2, 2, 3]);
        assert_eq!(run(&Operator::distinct(values), &ctx), vec![1, 2, 3]);

        let (_, empty) = ints(&[]);
        assert!(run(&Operator::distinct(empty), &ctx).is_empty());
    }

    #[test]
    fn test_sort_rejects_empty_ordering() {
        let (rt, values) = ints(&[1]);
        let err = Operator::sort(values, rt, OrderBy::new(), None, false).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::AeroPlanInvalid);
    }

    #[test]
    fn test_intersect_requires_jump() {
        let (_, left) = ints(&[1]);
        let (_, right) = ints(&[1]);
        let err = Operator::intersect_ordered(left, right, 1, SortDirection::Asc).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::AeroPlanInvalid);
    }

    #[test]
    fn test_explain_renders_tree() {
        let (rt, values) = ints(&[1, 2]);
        let sort = Operator::sort(values, rt, OrderBy::asc([0]), Some(10), true).unwrap();
        let limit = Operator::limit(sort, 0, Some(1));
        assert_eq!(
            limit.explain(),
            "Limit(skip 0, limit 1)\n  Sort(0 ASC, limit 10, distinct)\n    ValuesScan(2 rows)\n"
        );
    }
}
