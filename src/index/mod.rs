//! Index usage
//!
//! Everything an index scan needs besides the storage cursor: which entries
//! of a group index qualify ([`IndexScanSelector`]), which keys are in range
//! ([`IndexKeyRange`]) and the order rows come back in ([`OrderBy`]).

mod bounds;
mod errors;
mod ordering;
mod selector;

pub use bounds::{IndexBound, IndexKeyRange};
pub use errors::{IndexError, IndexResult};
pub use ordering::{OrderBy, OrderField, SortDirection};
pub use selector::IndexScanSelector;
