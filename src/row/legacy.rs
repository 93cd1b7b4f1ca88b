//! Two-state legacy row wrapper
//!
//! A legacy row starts either as encoded bytes (read from storage) or as
//! decoded field values (built by a caller). The other form is computed on
//! first access and memoized. Neither form is ever mutated after creation.

use std::cell::OnceCell;
use std::sync::Arc;

use super::codec::RowData;
use super::column_selector::ColumnSelector;
use super::errors::{RowError, RowResult};
use super::row::Row;
use super::row_type::RowType;
use super::value::Value;
use crate::schema::TableId;

/// A row in either its encoded or decoded form.
#[derive(Debug, Clone)]
pub enum LegacyRow {
    /// Created from encoded bytes; fields decoded lazily
    Encoded {
        data: RowData,
        fields: OnceCell<Vec<Value>>,
    },
    /// Created from field values; bytes encoded lazily
    Decoded {
        table: TableId,
        fields: Vec<Value>,
        data: OnceCell<RowData>,
    },
}

impl LegacyRow {
    /// Wraps encoded bytes
    pub fn from_data(data: RowData) -> Self {
        LegacyRow::Encoded {
            data,
            fields: OnceCell::new(),
        }
    }

    /// Wraps decoded fields
    pub fn from_fields(table: TableId, fields: Vec<Value>) -> Self {
        LegacyRow::Decoded {
            table,
            fields,
            data: OnceCell::new(),
        }
    }

    /// Table the row belongs to
    pub fn table_id(&self) -> TableId {
        match self {
            LegacyRow::Encoded { data, .. } => data.table_id(),
            LegacyRow::Decoded { table, .. } => *table,
        }
    }

    /// True once the decoded form is available
    pub fn is_decoded(&self) -> bool {
        match self {
            LegacyRow::Encoded { fields, .. } => fields.get().is_some(),
            LegacyRow::Decoded { .. } => true,
        }
    }

    /// Field values, decoding on first access
    pub fn fields(&self) -> RowResult<&[Value]> {
        match self {
            LegacyRow::Decoded { fields, .. } => Ok(fields),
            LegacyRow::Encoded { data, fields } => {
                if fields.get().is_none() {
                    let decoded = data.decode_fields()?;
                    let _ = fields.set(decoded);
                }
                fields
                    .get()
                    .map(Vec::as_slice)
                    .ok_or_else(|| RowError::Malformed("decoded fields unavailable".into()))
            }
        }
    }

    /// Encoded bytes, encoding on first access
    pub fn data(&self) -> RowResult<&RowData> {
        match self {
            LegacyRow::Encoded { data, .. } => Ok(data),
            LegacyRow::Decoded {
                table,
                fields,
                data,
            } => {
                if data.get().is_none() {
                    let encoded = RowData::encode(*table, fields)?;
                    let _ = data.set(encoded);
                }
                data.get()
                    .ok_or_else(|| RowError::Malformed("encoded row unavailable".into()))
            }
        }
    }

    /// Field `i`
    pub fn field(&self, i: usize) -> RowResult<&Value> {
        let fields = self.fields()?;
        fields.get(i).ok_or(RowError::FieldOutOfRange {
            position: i,
            n_fields: fields.len(),
        })
    }

    /// Copies the selected fields, in position order
    pub fn project(&self, columns: &ColumnSelector) -> RowResult<Vec<Value>> {
        columns.positions().map(|p| self.field(p).cloned()).collect()
    }

    /// Converts into a typed row
    pub fn to_row(&self, row_type: Arc<RowType>) -> RowResult<Row> {
        Row::new(row_type, self.fields()?.to_vec())
    }
}
