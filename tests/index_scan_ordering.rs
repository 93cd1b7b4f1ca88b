//! Index Scan Ordering Tests
//!
//! Tests for ordered index scans:
//! - Rows come back in index order, optionally reversed
//! - Inclusive and exclusive bounds include exactly the keys they name
//! - A jump followed by a drain yields the suffix of the plain scan
//! - Ordered intersection skips ahead with jumps

use std::sync::Arc;

use aeroqp::context::QueryContext;
use aeroqp::executor::{CursorState, ExecutorErrorCode, Operator};
use aeroqp::index::{IndexBound, IndexKeyRange, IndexScanSelector, OrderBy, SortDirection};
use aeroqp::row::{ColumnSelector, Row, RowSchema, Value};
use aeroqp::schema::{Catalog, ColumnDef, ColumnType, IndexId, IndexSpec, TableSpec};
use aeroqp::storage::{MemoryStore, StoreAdapter};

// =============================================================================
// Helper Functions
// =============================================================================

fn int(name: &str) -> ColumnDef {
    ColumnDef::new(name, ColumnType::Int)
}

fn key(values: &[i64]) -> Vec<Value> {
    values.iter().map(|v| Value::Int(*v)).collect()
}

/// Six rows keyed `(a, b, c, id)`:
/// `1010..=1015`, `a = 1`, `b` in `11, 11, 12, 12, 13, 13`
fn setup() -> (Arc<MemoryStore>, IndexId) {
    let store = Arc::new(MemoryStore::new(Catalog::new()).unwrap());
    let table = store
        .create_table(&TableSpec::root(
            "t",
            vec![int("id"), int("a"), int("b"), int("c")],
            &["id"],
        ))
        .unwrap();
    let index = store
        .create_index(&IndexSpec::table("t_abc", "t", &["a", "b", "c", "id"]))
        .unwrap();
    let rows = [
        (1010, 11, 111),
        (1011, 11, 112),
        (1012, 12, 121),
        (1013, 12, 122),
        (1014, 13, 131),
        (1015, 13, 132),
    ];
    for (id, b, c) in rows {
        store.write_row(table, key(&[id, 1, b, c])).unwrap();
    }
    (store, index)
}

fn scan(
    store: &MemoryStore,
    index: IndexId,
    range: IndexKeyRange,
    ordering: &OrderBy,
) -> Arc<Operator> {
    let catalog = store.catalog();
    let schema = RowSchema::new(&catalog);
    let def = catalog.index(index).unwrap();
    let selector = IndexScanSelector::inner(&catalog, def).unwrap();
    Operator::index_scan(&catalog, &schema, index, range, ordering, selector).unwrap()
}

fn ids(rows: &[Row]) -> Vec<i64> {
    rows.iter()
        .map(|r| r.field(3).unwrap().as_int().unwrap())
        .collect()
}

fn b_range() -> IndexKeyRange {
    IndexKeyRange::bounded(
        IndexBound::inclusive(key(&[1, 11])),
        IndexBound::inclusive(key(&[1, 13])),
    )
}

fn orderings() -> Vec<(&'static str, OrderBy, Vec<i64>)> {
    vec![
        (
            "ascending",
            OrderBy::asc([0]),
            vec![1010, 1011, 1012, 1013, 1014, 1015],
        ),
        (
            "descending",
            OrderBy::new().then(0, SortDirection::Desc),
            vec![1015, 1014, 1013, 1012, 1011, 1010],
        ),
        (
            "mixed",
            OrderBy::new()
                .then(0, SortDirection::Asc)
                .then(1, SortDirection::Desc),
            vec![1015, 1014, 1013, 1012, 1011, 1010],
        ),
        (
            "mixed leading descending",
            OrderBy::new()
                .then(0, SortDirection::Desc)
                .then(1, SortDirection::Asc),
            vec![1010, 1011, 1012, 1013, 1014, 1015],
        ),
    ]
}

// =============================================================================
// Range Tests
// =============================================================================

/// Bounded range on `(a, b)` returns the rows with `b` in range, in key order.
#[test]
fn test_bounded_range_in_key_order() {
    let (store, index) = setup();
    let ctx = QueryContext::new(store.clone());
    let plan = scan(&store, index, b_range(), &OrderBy::asc([0]));

    let mut cursor = plan.cursor().unwrap();
    cursor.open(&ctx).unwrap();
    let rows = cursor.collect(&ctx).unwrap();
    assert_eq!(ids(&rows), vec![1010, 1011, 1012, 1013, 1014, 1015]);
    assert_eq!(rows[2].fields(), key(&[1, 12, 121, 1012]).as_slice());
    assert_eq!(cursor.state(), CursorState::Idle);
}

/// Each bound flavor includes exactly the keys it names, in both directions.
#[test]
fn test_bound_inclusion_matrix() {
    let (store, index) = setup();
    let ctx = QueryContext::new(store.clone());
    let low = |inclusive: bool| {
        if inclusive {
            IndexBound::inclusive(key(&[1, 11]))
        } else {
            IndexBound::exclusive(key(&[1, 11]))
        }
    };
    let high = |inclusive: bool| {
        if inclusive {
            IndexBound::inclusive(key(&[1, 13]))
        } else {
            IndexBound::exclusive(key(&[1, 13]))
        }
    };

    let cases = vec![
        (IndexKeyRange::bounded(low(true), high(true)), vec![1010, 1011, 1012, 1013, 1014, 1015]),
        (IndexKeyRange::bounded(low(false), high(true)), vec![1012, 1013, 1014, 1015]),
        (IndexKeyRange::bounded(low(true), high(false)), vec![1010, 1011, 1012, 1013]),
        (IndexKeyRange::bounded(low(false), high(false)), vec![1012, 1013]),
        (IndexKeyRange::starting_at(low(false)), vec![1012, 1013, 1014, 1015]),
        (IndexKeyRange::ending_at(high(false)), vec![1010, 1011, 1012, 1013]),
        (IndexKeyRange::exact(key(&[1, 12])), vec![1012, 1013]),
        (IndexKeyRange::exact(key(&[2])), vec![]),
    ];

    for (range, ascending) in cases {
        for direction in [SortDirection::Asc, SortDirection::Desc] {
            let plan = scan(&store, index, range.clone(), &OrderBy::new().then(0, direction));
            let mut cursor = plan.cursor().unwrap();
            cursor.open(&ctx).unwrap();
            let mut expected = ascending.clone();
            if direction == SortDirection::Desc {
                expected.reverse();
            }
            assert_eq!(
                ids(&cursor.collect(&ctx).unwrap()),
                expected,
                "range {} {:?}",
                range,
                direction
            );
        }
    }
}

/// Every ordering yields the same set of rows.
#[test]
fn test_orderings_cover_same_rows() {
    let (store, index) = setup();
    let ctx = QueryContext::new(store.clone());
    for (name, ordering, expected) in orderings() {
        let mut cursor = scan(&store, index, b_range(), &ordering).cursor().unwrap();
        cursor.open(&ctx).unwrap();
        assert_eq!(ids(&cursor.collect(&ctx).unwrap()), expected, "{}", name);
    }
}

// =============================================================================
// Jump Tests
// =============================================================================

/// Jump to the row with id 1013, then resume exactly there.
#[test]
fn test_jump_to_row_resumes_there() {
    let (store, index) = setup();
    let ctx = QueryContext::new(store.clone());
    let mut cursor = scan(&store, index, b_range(), &OrderBy::asc([0]))
        .cursor()
        .unwrap();
    cursor.open(&ctx).unwrap();
    assert_eq!(ids(&[cursor.next(&ctx).unwrap().unwrap()]), vec![1010]);

    cursor
        .jump(&ctx, &key(&[1, 12, 122, 1013]), &ColumnSelector::from_positions(0..4))
        .unwrap();
    assert_eq!(cursor.state(), CursorState::Active);
    assert_eq!(ids(&cursor.collect(&ctx).unwrap()), vec![1013, 1014, 1015]);
}

/// For every ordering and every row, jump then drain equals drop-while on
/// the plain scan.
#[test]
fn test_jump_matrix_matches_drop_while() {
    let (store, index) = setup();
    let ctx = QueryContext::new(store.clone());
    let all_columns = ColumnSelector::from_positions(0..4);

    for (name, ordering, _) in orderings() {
        let plan = scan(&store, index, b_range(), &ordering);
        let mut cursor = plan.cursor().unwrap();
        cursor.open(&ctx).unwrap();
        let full = cursor.collect(&ctx).unwrap();

        for (at, target) in full.iter().enumerate() {
            cursor.open(&ctx).unwrap();
            cursor.jump(&ctx, target.fields(), &all_columns).unwrap();
            assert_eq!(
                ids(&cursor.collect(&ctx).unwrap()),
                ids(&full[at..]),
                "{} jump to {}",
                name,
                target
            );
        }
    }
}

/// A key prefix target lands on the first row at or after it.
#[test]
fn test_jump_on_key_prefix() {
    let (store, index) = setup();
    let ctx = QueryContext::new(store.clone());
    let prefix = ColumnSelector::from_positions(0..2);
    let cases = [
        ("ascending", OrderBy::asc([0]), vec![1012, 1013, 1014, 1015]),
        (
            "descending",
            OrderBy::new().then(0, SortDirection::Desc),
            vec![1013, 1012, 1011, 1010],
        ),
        (
            "mixed",
            OrderBy::new()
                .then(0, SortDirection::Asc)
                .then(1, SortDirection::Desc),
            vec![1013, 1012, 1011, 1010],
        ),
    ];
    for (name, ordering, expected) in cases {
        let mut cursor = scan(&store, index, b_range(), &ordering).cursor().unwrap();
        cursor.open(&ctx).unwrap();
        cursor.jump(&ctx, &key(&[1, 12]), &prefix).unwrap();
        assert_eq!(ids(&cursor.collect(&ctx).unwrap()), expected, "{}", name);
    }
}

/// Targets outside the range clamp to it.
#[test]
fn test_jump_outside_range() {
    let (store, index) = setup();
    let ctx = QueryContext::new(store.clone());
    let prefix = ColumnSelector::from_positions(0..2);
    let mut cursor = scan(&store, index, b_range(), &OrderBy::asc([0]))
        .cursor()
        .unwrap();

    cursor.open(&ctx).unwrap();
    cursor.jump(&ctx, &key(&[1, 5]), &prefix).unwrap();
    assert_eq!(ids(&cursor.collect(&ctx).unwrap()).len(), 6);

    cursor.open(&ctx).unwrap();
    cursor.jump(&ctx, &key(&[1, 14]), &prefix).unwrap();
    assert!(cursor.next(&ctx).unwrap().is_none());
    assert_eq!(cursor.state(), CursorState::Idle);
}

/// Jump columns must be a prefix of the index key.
#[test]
fn test_jump_rejects_non_prefix_columns() {
    let (store, index) = setup();
    let ctx = QueryContext::new(store.clone());
    let mut cursor = scan(&store, index, b_range(), &OrderBy::asc([0]))
        .cursor()
        .unwrap();
    cursor.open(&ctx).unwrap();
    let err = cursor
        .jump(&ctx, &key(&[12]), &ColumnSelector::from_positions([1]))
        .unwrap_err();
    assert_eq!(err.code(), ExecutorErrorCode::AeroPlanInvalid);
    assert_eq!(cursor.state(), CursorState::Idle);
}

/// Jump is rejected before open.
#[test]
fn test_jump_requires_active_cursor() {
    let (store, index) = setup();
    let ctx = QueryContext::new(store.clone());
    let mut cursor = scan(&store, index, b_range(), &OrderBy::asc([0]))
        .cursor()
        .unwrap();
    let err = cursor
        .jump(&ctx, &key(&[1]), &ColumnSelector::from_positions([0]))
        .unwrap_err();
    assert_eq!(err.code(), ExecutorErrorCode::AeroCursorState);
}

// =============================================================================
// Definition Change Tests
// =============================================================================

/// Dropping the scanned index fails the scan on the next fetch.
#[test]
fn test_dropped_index_invalidates_scan() {
    let (store, index) = setup();
    let ctx = QueryContext::new(store.clone());
    let mut cursor = scan(&store, index, b_range(), &OrderBy::asc([0]))
        .cursor()
        .unwrap();
    cursor.open(&ctx).unwrap();
    assert!(cursor.next(&ctx).unwrap().is_some());

    store.drop_index(index).unwrap();
    let err = cursor.next(&ctx).unwrap_err();
    assert_eq!(err.code(), ExecutorErrorCode::AeroTableDefinitionChanged);
    assert_eq!(cursor.state(), CursorState::Idle);
}

// =============================================================================
// Ordered Intersection Tests
// =============================================================================

/// Rows of `t` whose `(a, b)` also occur in `u`.
#[test]
fn test_intersect_ordered_index_scans() {
    let (store, t_index) = setup();
    let u = store
        .create_table(&TableSpec::root("u", vec![int("id"), int("a"), int("b")], &["id"]))
        .unwrap();
    let u_index = store
        .create_index(&IndexSpec::table("u_ab", "u", &["a", "b", "id"]))
        .unwrap();
    for (id, b) in [(1, 11), (2, 13), (3, 14)] {
        store.write_row(u, key(&[id, 1, b])).unwrap();
    }
    let ctx = QueryContext::new(store.clone());

    let left = scan(&store, t_index, IndexKeyRange::unbounded(), &OrderBy::asc([0]));
    let right = scan(&store, u_index, IndexKeyRange::unbounded(), &OrderBy::asc([0]));
    let plan = Operator::intersect_ordered(left, right, 2, SortDirection::Asc).unwrap();
    assert!(plan.supports_jump());

    let mut cursor = plan.cursor().unwrap();
    cursor.open(&ctx).unwrap();
    assert_eq!(ids(&cursor.collect(&ctx).unwrap()), vec![1010, 1011, 1014, 1015]);

    cursor.open(&ctx).unwrap();
    cursor
        .jump(&ctx, &key(&[1, 12]), &ColumnSelector::from_positions(0..2))
        .unwrap();
    assert_eq!(ids(&cursor.collect(&ctx).unwrap()), vec![1014, 1015]);

    cursor.destroy();
    assert_eq!(cursor.state(), CursorState::Destroyed);
}

/// Descending intersection walks both inputs backwards.
#[test]
fn test_intersect_ordered_descending() {
    let (store, t_index) = setup();
    let u = store
        .create_table(&TableSpec::root("u", vec![int("id"), int("a"), int("b")], &["id"]))
        .unwrap();
    let u_index = store
        .create_index(&IndexSpec::table("u_ab", "u", &["a", "b", "id"]))
        .unwrap();
    for (id, b) in [(1, 12), (2, 10)] {
        store.write_row(u, key(&[id, 1, b])).unwrap();
    }
    let ctx = QueryContext::new(store.clone());
    let desc = OrderBy::new().then(0, SortDirection::Desc);

    let left = scan(&store, t_index, IndexKeyRange::unbounded(), &desc);
    let right = scan(&store, u_index, IndexKeyRange::unbounded(), &desc);
    let plan = Operator::intersect_ordered(left, right, 2, SortDirection::Desc).unwrap();
    let mut cursor = plan.cursor().unwrap();
    cursor.open(&ctx).unwrap();
    assert_eq!(ids(&cursor.collect(&ctx).unwrap()), vec![1013, 1012]);
}
