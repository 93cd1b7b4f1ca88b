//! Index key ranges
//!
//! A bound is a key prefix plus an inclusive flag. Keys are compared with
//! the bound on the bound's length only, so `(1)` inclusive as a low bound
//! admits every key starting with `1`.

use std::cmp::Ordering;
use std::fmt;

use super::errors::{IndexError, IndexResult};
use crate::row::{compare_prefix, Value};
use crate::schema::{Catalog, IndexDef};

/// One side of a key range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBound {
    /// Leading key values
    pub key: Vec<Value>,
    /// Whether keys equal to `key` on its length are in range
    pub inclusive: bool,
}

impl IndexBound {
    /// Inclusive bound
    pub fn inclusive(key: Vec<Value>) -> Self {
        Self {
            key,
            inclusive: true,
        }
    }

    /// Exclusive bound
    pub fn exclusive(key: Vec<Value>) -> Self {
        Self {
            key,
            inclusive: false,
        }
    }
}

/// Range of index keys, open on a side without a bound
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexKeyRange {
    low: Option<IndexBound>,
    high: Option<IndexBound>,
}

impl IndexKeyRange {
    /// Every key
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Keys between `low` and `high`
    pub fn bounded(low: IndexBound, high: IndexBound) -> Self {
        Self {
            low: Some(low),
            high: Some(high),
        }
    }

    /// Keys from `low` on
    pub fn starting_at(low: IndexBound) -> Self {
        Self {
            low: Some(low),
            high: None,
        }
    }

    /// Keys up to `high`
    pub fn ending_at(high: IndexBound) -> Self {
        Self {
            low: None,
            high: Some(high),
        }
    }

    /// Keys equal to `key` on its length
    pub fn exact(key: Vec<Value>) -> Self {
        Self::bounded(IndexBound::inclusive(key.clone()), IndexBound::inclusive(key))
    }

    /// Low bound
    pub fn low(&self) -> Option<&IndexBound> {
        self.low.as_ref()
    }

    /// High bound
    pub fn high(&self) -> Option<&IndexBound> {
        self.high.as_ref()
    }

    /// True if `key` sorts below the low bound
    pub fn below_low(&self, key: &[Value]) -> bool {
        match &self.low {
            None => false,
            Some(bound) => match compare_prefix(key, &bound.key) {
                Ordering::Less => true,
                Ordering::Equal => !bound.inclusive,
                Ordering::Greater => false,
            },
        }
    }

    /// True if `key` sorts above the high bound
    pub fn above_high(&self, key: &[Value]) -> bool {
        match &self.high {
            None => false,
            Some(bound) => match compare_prefix(key, &bound.key) {
                Ordering::Greater => true,
                Ordering::Equal => !bound.inclusive,
                Ordering::Less => false,
            },
        }
    }

    /// True if `key` is in range
    pub fn contains(&self, key: &[Value]) -> bool {
        !self.below_low(key) && !self.above_high(key)
    }

    /// Checks bound lengths and value types against the index columns
    pub fn validate(&self, catalog: &Catalog, index: &IndexDef) -> IndexResult<()> {
        for bound in self.low.iter().chain(self.high.iter()) {
            if bound.key.len() > index.columns.len() {
                return Err(IndexError::BoundTooLong {
                    index: index.name.clone(),
                    len: bound.key.len(),
                    columns: index.columns.len(),
                });
            }
            for (position, (value, column)) in bound.key.iter().zip(&index.columns).enumerate() {
                let expected = catalog.require_table(column.table)?.columns[column.position]
                    .column_type;
                if let Some(actual) = value.column_type() {
                    if actual != expected {
                        return Err(IndexError::BoundTypeMismatch {
                            index: index.name.clone(),
                            position,
                            expected: expected.to_string(),
                            actual: actual.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for IndexKeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |key: &[Value]| {
            key.iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        match &self.low {
            None => write!(f, "(-inf")?,
            Some(b) => write!(f, "{}{}", if b.inclusive { "[" } else { "(" }, render(&b.key))?,
        }
        write!(f, " .. ")?;
        match &self.high {
            None => write!(f, "+inf)"),
            Some(b) => write!(f, "{}{}", render(&b.key), if b.inclusive { "]" } else { ")" }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::Int(*v)).collect()
    }

    #[test]
    fn test_inclusive_and_exclusive() {
        let range = IndexKeyRange::bounded(
            IndexBound::inclusive(key(&[1, 11])),
            IndexBound::exclusive(key(&[1, 13])),
        );
        assert!(range.contains(&key(&[1, 11, 111, 1010])));
        assert!(range.contains(&key(&[1, 12, 122, 1013])));
        assert!(!range.contains(&key(&[1, 13, 131, 1014])));
        assert!(range.below_low(&key(&[1, 10, 0, 0])));
        assert!(range.above_high(&key(&[1, 13, 0, 0])));
    }

    #[test]
    fn test_unbounded_contains_everything() {
        let range = IndexKeyRange::unbounded();
        assert!(range.contains(&[Value::Null]));
        assert!(range.contains(&key(&[i64::MAX])));
    }

    #[test]
    fn test_exact_prefix() {
        let range = IndexKeyRange::exact(key(&[1]));
        assert!(range.contains(&key(&[1, 5])));
        assert!(!range.contains(&key(&[2, 0])));
    }

    #[test]
    fn test_display() {
        let range = IndexKeyRange::starting_at(IndexBound::exclusive(key(&[1, 11])));
        assert_eq!(range.to_string(), "(1, 11 .. +inf)");
    }
}
