//! Sessions and per-cursor scan state

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use super::cursor_id::CursorId;
use super::request::ScanRequest;
use crate::row::RowType;
use crate::storage::RowCollector;

/// Progress of a bridge scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanCursorState {
    /// Opened, nothing scanned yet
    Fresh,
    /// At least one `scan_some` call made
    Scanning,
    /// Range exhausted or limit reached
    Finished,
    /// Invalidated by a definition change or a conflicting update
    ConcurrentModification,
    /// No such cursor in the session
    UnknownCursor,
}

impl ScanCursorState {
    /// True once further scanning can only fail
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanCursorState::Finished | ScanCursorState::ConcurrentModification
        )
    }
}

impl fmt::Display for ScanCursorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanCursorState::Fresh => "FRESH",
            ScanCursorState::Scanning => "SCANNING",
            ScanCursorState::Finished => "FINISHED",
            ScanCursorState::ConcurrentModification => "CONCURRENT_MODIFICATION",
            ScanCursorState::UnknownCursor => "UNKNOWN_CURSOR",
        };
        write!(f, "{}", name)
    }
}

/// One open scan: the resolved request, its collector and its progress
pub struct ScanData {
    pub(crate) request: ScanRequest,
    pub(crate) table_name: String,
    pub(crate) row_type: Arc<RowType>,
    pub(crate) collector: Box<dyn RowCollector>,
    pub(crate) state: ScanCursorState,
    pub(crate) generation: u64,
    pub(crate) delivered: u64,
    pub(crate) opened_at: Instant,
    pub(crate) deadline: Option<Instant>,
}

impl ScanData {
    /// Resolved request
    pub fn request(&self) -> &ScanRequest {
        &self.request
    }

    /// Name of the scanned table when the scan was opened
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Type of the rows produced by `scan_some_rows`
    pub fn row_type(&self) -> &Arc<RowType> {
        &self.row_type
    }

    /// Scan progress
    pub fn state(&self) -> ScanCursorState {
        self.state
    }

    /// Table generation the scan was opened against
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Rows delivered so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Instant after which `scan_some` times out
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl fmt::Debug for ScanData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanData")
            .field("request", &self.request)
            .field("table", &self.table_name)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("delivered", &self.delivered)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

/// A client session owning bridge cursors.
///
/// Sessions are not shared between threads; each caller drives its own.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    cursors: HashMap<CursorId, ScanData>,
}

impl Session {
    /// New session with a random id
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    /// New session with a given id
    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            cursors: HashMap::new(),
        }
    }

    /// Session id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of open cursors
    pub fn cursor_count(&self) -> usize {
        self.cursors.len()
    }

    /// Open scan behind `cursor`
    pub fn scan(&self, cursor: CursorId) -> Option<&ScanData> {
        self.cursors.get(&cursor)
    }

    pub(crate) fn scan_mut(&mut self, cursor: CursorId) -> Option<&mut ScanData> {
        self.cursors.get_mut(&cursor)
    }

    pub(crate) fn insert(&mut self, cursor: CursorId, scan: ScanData) {
        self.cursors.insert(cursor, scan);
    }

    pub(crate) fn remove(&mut self, cursor: CursorId) -> Option<ScanData> {
        self.cursors.remove(&cursor)
    }

    pub(crate) fn cursor_ids(&self) -> impl Iterator<Item = CursorId> + '_ {
        self.cursors.keys().copied()
    }

    pub(crate) fn scans_mut(&mut self) -> impl Iterator<Item = (&CursorId, &mut ScanData)> {
        self.cursors.iter_mut()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
