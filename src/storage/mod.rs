//! Storage collaborator
//!
//! The execution layer never touches stored bytes directly. It sees a
//! [`StoreAdapter`]: ordered group traversal, seekable index key cursors,
//! hkey lookups, buffer-oriented row collectors and row DML.
//!
//! [`MemoryStore`] is the in-memory implementation used by the scan bridge
//! and the tests.
//!
//! # Invariants
//!
//! - Group rows are returned in HKey order
//! - Index entries are ordered by key, then HKey
//! - A storage cursor reads the snapshot taken when it was created

mod adapter;
mod collector;
mod entries;
mod errors;
mod memory;

pub use adapter::{
    CollectorRequest, Direction, GroupCursor, GroupRow, KeyCursor, RowCollector, StoreAdapter,
};
pub use collector::{MemoryRowCollector, RowBuffer};
pub use entries::{build_entries, IndexEntry};
pub use errors::{StorageError, StorageResult};
pub use memory::MemoryStore;
