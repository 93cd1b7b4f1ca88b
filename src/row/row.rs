//! Rows produced by cursors

use std::fmt;
use std::sync::Arc;

use super::errors::{RowError, RowResult};
use super::hkey::HKey;
use super::row_type::RowType;
use super::value::Value;

/// Ordered, fixed-arity field values plus their row type.
///
/// Rows of a table in a group, and index rows, also carry an HKey.
#[derive(Debug, Clone)]
pub struct Row {
    row_type: Arc<RowType>,
    fields: Vec<Value>,
    hkey: Option<HKey>,
}

impl Row {
    /// Builds a row, checking arity and field types against `row_type`
    pub fn new(row_type: Arc<RowType>, fields: Vec<Value>) -> RowResult<Self> {
        check_fields(&row_type, &fields)?;
        Ok(Self {
            row_type,
            fields,
            hkey: None,
        })
    }

    /// Attaches an HKey
    pub fn with_hkey(mut self, hkey: HKey) -> Self {
        self.hkey = Some(hkey);
        self
    }

    /// Row type
    pub fn row_type(&self) -> &Arc<RowType> {
        &self.row_type
    }

    /// All field values
    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    /// Field `i`
    pub fn field(&self, i: usize) -> RowResult<&Value> {
        self.fields.get(i).ok_or(RowError::FieldOutOfRange {
            position: i,
            n_fields: self.fields.len(),
        })
    }

    /// Number of fields
    pub fn n_fields(&self) -> usize {
        self.fields.len()
    }

    /// HKey, if the row belongs to a group
    pub fn hkey(&self) -> Option<&HKey> {
        self.hkey.as_ref()
    }

    /// HKey or an error naming the row type
    pub fn require_hkey(&self) -> RowResult<&HKey> {
        self.hkey
            .as_ref()
            .ok_or(RowError::NoHKey(self.row_type.id().get()))
    }

    /// Copies the fields at `positions` into a row of `row_type`
    pub fn project(&self, positions: &[usize], row_type: Arc<RowType>) -> RowResult<Row> {
        let fields = positions
            .iter()
            .map(|p| self.field(*p).cloned())
            .collect::<RowResult<Vec<_>>>()?;
        Row::new(row_type, fields)
    }

    /// Consumes the row, returning its fields
    pub fn into_fields(self) -> Vec<Value> {
        self.fields
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.row_type == other.row_type && self.fields == other.fields
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.row_type)?;
        for (i, value) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, "]")
    }
}

pub(crate) fn check_fields(row_type: &RowType, fields: &[Value]) -> RowResult<()> {
    if fields.len() != row_type.n_fields() {
        return Err(RowError::ArityMismatch {
            expected: row_type.n_fields(),
            actual: fields.len(),
        });
    }
    for (position, (value, expected)) in fields.iter().zip(row_type.fields()).enumerate() {
        if let Some(actual) = value.column_type() {
            if *expected != actual {
                return Err(RowError::TypeMismatch {
                    position,
                    expected: *expected,
                    actual: value.type_name(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    #[test]
    fn test_arity_checked() {
        let rt = RowType::values(vec![ColumnType::Int, ColumnType::Int]);
        let err = Row::new(rt, vec![Value::Int(1)]).unwrap_err();
        assert_eq!(
            err,
            RowError::ArityMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_type_checked_but_null_allowed() {
        let rt = RowType::values(vec![ColumnType::Int, ColumnType::Text]);
        assert!(Row::new(rt.clone(), vec![Value::Null, Value::text("a")]).is_ok());
        let err = Row::new(rt, vec![Value::text("a"), Value::Null]).unwrap_err();
        assert!(matches!(err, RowError::TypeMismatch { position: 0, .. }));
    }

    #[test]
    fn test_project() {
        let rt = RowType::values(vec![ColumnType::Int, ColumnType::Text, ColumnType::Int]);
        let row = Row::new(rt, vec![Value::Int(1), Value::text("x"), Value::Int(3)]).unwrap();
        let out = RowType::projection(vec![ColumnType::Int, ColumnType::Int]);
        let projected = row.project(&[2, 0], out).unwrap();
        assert_eq!(projected.fields(), &[Value::Int(3), Value::Int(1)]);
        assert!(row.project(&[5], RowType::projection(vec![ColumnType::Int])).is_err());
    }
}
