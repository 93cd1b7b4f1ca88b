//! Literal row construction

use std::sync::Arc;

use super::errors::RowResult;
use super::row::Row;
use super::row_type::RowType;
use super::value::Value;
use crate::schema::ColumnType;

/// Builds a list of rows of one row type, validating each as it is added.
#[derive(Debug, Clone)]
pub struct RowsBuilder {
    row_type: Arc<RowType>,
    rows: Vec<Row>,
}

impl RowsBuilder {
    /// Builder for rows of an existing type
    pub fn new(row_type: Arc<RowType>) -> Self {
        Self {
            row_type,
            rows: Vec::new(),
        }
    }

    /// Builder for literal rows with the given field types
    pub fn with_types(fields: Vec<ColumnType>) -> Self {
        Self::new(RowType::values(fields))
    }

    /// Adds a row
    pub fn row<I, V>(mut self, fields: I) -> RowResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let fields = fields.into_iter().map(Into::into).collect();
        self.rows.push(Row::new(self.row_type.clone(), fields)?);
        Ok(self)
    }

    /// Row type shared by every row
    pub fn row_type(&self) -> &Arc<RowType> {
        &self.row_type
    }

    /// Rows added so far
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Finishes building
    pub fn build(self) -> (Arc<RowType>, Vec<Row>) {
        (self.row_type, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::RowError;

    #[test]
    fn test_builds_rows() {
        let (rt, rows) = RowsBuilder::with_types(vec![ColumnType::Int, ColumnType::Text])
            .row([Value::Int(1), Value::text("a")])
            .unwrap()
            .row([Value::Int(2), Value::Null])
            .unwrap()
            .build();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.row_type() == &rt));
    }

    #[test]
    fn test_rejects_bad_arity() {
        let err = RowsBuilder::with_types(vec![ColumnType::Int])
            .row([1i64, 2i64])
            .unwrap_err();
        assert!(matches!(err, RowError::ArityMismatch { .. }));
    }
}
