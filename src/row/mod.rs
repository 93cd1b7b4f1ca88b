//! Row model
//!
//! Values, row types, rows, hierarchical keys, column selectors and the
//! binary row encoding used by the legacy scan bridge.

mod builder;
mod codec;
mod column_selector;
mod errors;
mod hkey;
mod legacy;
#[allow(clippy::module_inception)]
mod row;
mod row_type;
mod value;

pub use builder::RowsBuilder;
pub use codec::RowData;
pub use column_selector::ColumnSelector;
pub use errors::{RowError, RowResult};
pub use hkey::{HKey, HKeySegment};
pub use legacy::LegacyRow;
pub use row::Row;
pub use row_type::{RowSchema, RowType, RowTypeId, RowTypeKind};
pub use value::{compare_prefix, Value};
