//! Observability events for the execution layer
//!
//! Every log line carries an `event` field taken from this enum, so log
//! consumers can match on a closed set of names.
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration and catalog
    /// Execution configuration loaded
    ConfigLoaded,
    /// Catalog DDL applied
    CatalogChanged,

    // Cursor lifecycle
    /// Cursor opened (or reopened)
    CursorOpened,
    /// Cursor closed
    CursorClosed,
    /// Cursor destroyed
    CursorDestroyed,
    /// Cursor repositioned by jump
    CursorJumped,

    // Legacy scan bridge
    /// Bridge cursor registered for a scan request
    ScanOpened,
    /// Output buffer filled; caller must drain and resume
    ScanBufferFull,
    /// Scan exhausted or limit reached
    ScanFinished,
    /// Scan invalidated by a definition change or a concurrent update
    ScanInvalidated,
    /// Bridge cursor removed
    ScanClosed,
    /// Deadline elapsed during a scan
    QueryTimeout,

    // Converter pool
    /// New row converter allocated
    ConverterAllocated,
    /// Row converter could not be returned to the pool
    ConverterReleaseFailed,

    // Data changes
    /// Row inserted
    RowWritten,
    /// Row deleted
    RowDeleted,
    /// Row updated
    RowUpdated,
    /// Table truncated
    TableTruncated,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::CatalogChanged => "CATALOG_CHANGED",

            Event::CursorOpened => "CURSOR_OPENED",
            Event::CursorClosed => "CURSOR_CLOSED",
            Event::CursorDestroyed => "CURSOR_DESTROYED",
            Event::CursorJumped => "CURSOR_JUMPED",

            Event::ScanOpened => "SCAN_OPENED",
            Event::ScanBufferFull => "SCAN_BUFFER_FULL",
            Event::ScanFinished => "SCAN_FINISHED",
            Event::ScanInvalidated => "SCAN_INVALIDATED",
            Event::ScanClosed => "SCAN_CLOSED",
            Event::QueryTimeout => "QUERY_TIMEOUT",

            Event::ConverterAllocated => "CONVERTER_ALLOCATED",
            Event::ConverterReleaseFailed => "CONVERTER_RELEASE_FAILED",

            Event::RowWritten => "ROW_WRITTEN",
            Event::RowDeleted => "ROW_DELETED",
            Event::RowUpdated => "ROW_UPDATED",
            Event::TableTruncated => "TABLE_TRUNCATED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
