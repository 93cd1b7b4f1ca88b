//! Sort orderings
//!
//! An ordering is a list of (field position, direction) pairs compared
//! lexicographically.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{IndexError, IndexResult};
use crate::row::Value;
use crate::schema::IndexDef;

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order
    #[default]
    Asc,
    /// Descending order
    Desc,
}

impl SortDirection {
    /// Applies the direction to an ascending comparison
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// One ordered field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderField {
    /// Field position
    pub position: usize,
    /// Direction
    pub direction: SortDirection,
}

/// Lexicographic ordering over row fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct OrderBy {
    fields: Vec<OrderField>,
}

impl OrderBy {
    /// Empty ordering; every row compares equal
    pub fn new() -> Self {
        Self::default()
    }

    /// Ascending on each of `positions`
    pub fn asc(positions: impl IntoIterator<Item = usize>) -> Self {
        positions
            .into_iter()
            .fold(Self::new(), |o, p| o.then(p, SortDirection::Asc))
    }

    /// Appends a field
    pub fn then(mut self, position: usize, direction: SortDirection) -> Self {
        self.fields.push(OrderField {
            position,
            direction,
        });
        self
    }

    /// Ordered fields
    pub fn fields(&self) -> &[OrderField] {
        &self.fields
    }

    /// Number of ordered fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if nothing is ordered
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The single direction shared by every field, if there is one
    pub fn uniform_direction(&self) -> Option<SortDirection> {
        let first = self.fields.first().map_or(SortDirection::Asc, |f| f.direction);
        self.fields
            .iter()
            .all(|f| f.direction == first)
            .then_some(first)
    }

    /// Compares two rows' fields
    pub fn compare(&self, a: &[Value], b: &[Value]) -> Ordering {
        self.compare_first(self.fields.len(), a, b)
    }

    /// Compares two rows on the first `n` ordered fields only
    pub fn compare_first(&self, n: usize, a: &[Value], b: &[Value]) -> Ordering {
        for field in self.fields.iter().take(n) {
            let ord = match (a.get(field.position), b.get(field.position)) {
                (Some(x), Some(y)) => x.cmp(y),
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
            };
            let ord = field.direction.apply(ord);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Extends an ordering over a prefix of an index's key columns to all of
    /// them. Trailing columns take the direction of the last ordered column.
    pub fn for_index(&self, index: &IndexDef) -> IndexResult<OrderBy> {
        for (position, field) in self.fields.iter().enumerate() {
            if field.position != position || position >= index.columns.len() {
                return Err(IndexError::OrderingNotIndexPrefix {
                    index: index.name.clone(),
                    position,
                    found: field.position,
                });
            }
        }
        let trailing = self
            .fields
            .last()
            .map_or(SortDirection::Asc, |f| f.direction);
        let mut full = self.clone();
        for position in self.fields.len()..index.columns.len() {
            full = full.then(position, trailing);
        }
        Ok(full)
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|o| {
                let dir = match o.direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                format!("{} {}", o.position, dir)
            })
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{IndexColumn, IndexId, IndexKind, TableId};

    fn index(columns: usize) -> IndexDef {
        IndexDef {
            id: IndexId(0),
            name: "idx".into(),
            kind: IndexKind::Table { table: TableId(0) },
            columns: (0..columns)
                .map(|position| IndexColumn {
                    table: TableId(0),
                    position,
                })
                .collect(),
            unique: false,
        }
    }

    #[test]
    fn test_compare_mixed_directions() {
        let order = OrderBy::new()
            .then(0, SortDirection::Asc)
            .then(1, SortDirection::Desc);
        let a = [Value::Int(1), Value::Int(5)];
        let b = [Value::Int(1), Value::Int(3)];
        assert_eq!(order.compare(&a, &b), Ordering::Less);
        assert_eq!(order.compare_first(1, &a, &b), Ordering::Equal);
    }

    #[test]
    fn test_for_index_fills_trailing_direction() {
        let order = OrderBy::new()
            .then(0, SortDirection::Asc)
            .then(1, SortDirection::Desc);
        let full = order.for_index(&index(4)).unwrap();
        assert_eq!(full.len(), 4);
        assert_eq!(full.fields()[3].direction, SortDirection::Desc);
        assert_eq!(full.uniform_direction(), None);

        let empty = OrderBy::new().for_index(&index(2)).unwrap();
        assert_eq!(empty.uniform_direction(), Some(SortDirection::Asc));
    }

    #[test]
    fn test_for_index_rejects_non_prefix() {
        let order = OrderBy::new().then(1, SortDirection::Asc);
        assert!(matches!(
            order.for_index(&index(3)),
            Err(IndexError::OrderingNotIndexPrefix { .. })
        ));
        assert!(OrderBy::asc(0..4).for_index(&index(3)).is_err());
    }

    #[test]
    fn test_display() {
        let order = OrderBy::new()
            .then(2, SortDirection::Desc)
            .then(0, SortDirection::Asc);
        assert_eq!(order.to_string(), "2 DESC, 0 ASC");
    }
}
