//! aeroqp - pull-based physical query execution for hierarchical group storage
//!
//! An already-planned tree of [`executor::Operator`]s is turned into a tree of
//! [`executor::Cursor`]s per execution. Cursors are driven with
//! open/next/jump/close/destroy and pull rows from the storage collaborator
//! through an explicit [`context::QueryContext`].
//!
//! The [`scan`] module bridges the buffer-oriented legacy scan API
//! (`open_cursor`/`scan_some`/`close_cursor`) onto the storage row collectors.

pub mod config;
pub mod context;
pub mod executor;
pub mod index;
pub mod observability;
pub mod row;
pub mod scan;
pub mod schema;
pub mod storage;
