//! Field values with a total, deterministic ordering
//!
//! Ordering across variants is Null < Bool < Int < Float < Text, so nulls
//! sort first in every index. Floats use the IEEE total order.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::schema::ColumnType;

/// A single typed field value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL null
    Null,
    /// Boolean value (false < true)
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float, totally ordered
    Float(f64),
    /// UTF-8 text
    Text(String),
}

impl Value {
    /// Create a text value
    pub fn text(v: impl Into<String>) -> Self {
        Value::Text(v.into())
    }

    /// Returns true for `Value::Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the integer payload, if any
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text payload, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Column type of this value, `None` for null
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ColumnType::Bool),
            Value::Int(_) => Some(ColumnType::Int),
            Value::Float(_) => Some(ColumnType::Float),
            Value::Text(_) => Some(ColumnType::Text),
        }
    }

    /// Type name for error messages
    pub fn type_name(&self) -> &'static str {
        self.column_type().map_or("null", |t| t.type_name())
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::Text(_) => 4,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Text(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "'{}'", v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Compares the leading `prefix.len()` values of `key` against `prefix`.
///
/// Keys shorter than the prefix compare on their common length.
pub fn compare_prefix(key: &[Value], prefix: &[Value]) -> Ordering {
    let n = prefix.len().min(key.len());
    key[..n].cmp(&prefix[..n])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sorts_first() {
        let mut values = vec![
            Value::Int(3),
            Value::text("a"),
            Value::Null,
            Value::Bool(true),
            Value::Float(-1.5),
        ];
        values.sort();
        assert_eq!(values[0], Value::Null);
        assert_eq!(values[1], Value::Bool(true));
        assert_eq!(values[2], Value::Int(3));
        assert_eq!(values[3], Value::Float(-1.5));
        assert_eq!(values[4], Value::text("a"));
    }

    #[test]
    fn test_float_total_order() {
        assert!(Value::Float(-0.5) < Value::Float(0.0));
        assert!(Value::Float(1.0) < Value::Float(f64::INFINITY));
        assert_eq!(Value::Float(2.0), Value::Float(2.0));
    }

    #[test]
    fn test_compare_prefix() {
        let key = vec![Value::Int(1), Value::Int(12), Value::Int(121)];
        assert_eq!(compare_prefix(&key, &[Value::Int(1)]), Ordering::Equal);
        assert_eq!(
            compare_prefix(&key, &[Value::Int(1), Value::Int(13)]),
            Ordering::Less
        );
        assert_eq!(
            compare_prefix(&key, &[Value::Int(1), Value::Int(11)]),
            Ordering::Greater
        );
    }

    #[test]
    fn test_json_untagged() {
        let v: Vec<Value> = serde_json::from_str(r#"[null, true, 7, 1.5, "x"]"#).unwrap();
        assert_eq!(
            v,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::Int(7),
                Value::Float(1.5),
                Value::text("x")
            ]
        );
    }
}
