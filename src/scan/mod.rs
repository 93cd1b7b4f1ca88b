//! Legacy scan bridge
//!
//! Adapts the storage row collectors to the bounded, resumable
//! `scan_some` contract:
//!
//! 1. `open_cursor` registers a scan in a [`Session`] and returns its [`CursorId`]
//! 2. `scan_some` fills a caller output until the scan ends, the limit trips
//!    or the output buffer is full
//! 3. `close_cursor` releases the scan
//!
//! # Invariants
//!
//! - A full buffer is a status, not an error; draining and calling again
//!   resumes at the row that did not fit
//! - A scan whose table definition changed fails once and stays unusable
//! - An update that moves rows within a scan's order invalidates the scan
//! - Pooled converters return to the pool on every exit path

mod cursor_id;
mod dml;
mod output;
mod pool;
mod request;
mod scanner;
mod session;

pub use cursor_id::CursorId;
pub use dml::DmlFunctions;
pub use output::{BufferOutput, LegacyRowOutput, RowDataOutput, RowOutput};
pub use pool::{ConverterPool, ConvertingOutput, PooledConverter, RowConverter};
pub use request::{LimitPredicate, ScanAllRequest, ScanFlags, ScanLimit, ScanRequest};
pub use scanner::{NoHooks, ScanHooks, ScanStatus};
pub use session::{ScanCursorState, ScanData, Session};
