//! Cursor state machine
//!
//! A [`Cursor`] is the live execution of one operator. The wrapper enforces
//! the lifecycle; the per-operator cursors behind it only produce rows.
//!
//! | call      | from            | to                                |
//! |-----------|-----------------|-----------------------------------|
//! | `open`    | IDLE, ACTIVE    | ACTIVE (restarts the scan)        |
//! | `next`    | ACTIVE          | ACTIVE with a row, IDLE at end    |
//! | `jump`    | ACTIVE          | ACTIVE                            |
//! | `close`   | IDLE, ACTIVE    | IDLE                              |
//! | `destroy` | any             | DESTROYED                         |
//!
//! Anything else fails with `AERO_CURSOR_STATE`. A failed `next` or `jump`
//! releases the scan and leaves the cursor IDLE.

use std::fmt;

use tracing::trace;

use super::errors::{ExecutorError, ExecutorErrorCode, ExecutorResult};
use super::index_scan::IndexScanCursor;
use super::intersect::IntersectCursor;
use super::lookup::AncestorLookupCursor;
use super::relational::{LimitCursor, ProjectCursor, SelectCursor};
use super::scans::{GroupScanCursor, ValuesCursor};
use super::sorter::{DistinctCursor, SortCursor};
use crate::context::QueryContext;
use crate::observability::Event;
use crate::row::{ColumnSelector, Row, Value};

/// Lifecycle state of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorState {
    /// No scan in progress
    Idle,
    /// Scan in progress
    Active,
    /// Terminal
    Destroyed,
}

impl fmt::Display for CursorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorState::Idle => write!(f, "IDLE"),
            CursorState::Active => write!(f, "ACTIVE"),
            CursorState::Destroyed => write!(f, "DESTROYED"),
        }
    }
}

/// Row production behind the state machine.
///
/// Implementors may assume the wrapper already checked the state.
pub(crate) trait CursorImpl: Send {
    /// Positions before the first row, restarting any scan in progress
    fn open(&mut self, ctx: &QueryContext) -> ExecutorResult<()>;

    /// Next row, `None` at the end
    fn next(&mut self, ctx: &QueryContext) -> ExecutorResult<Option<Row>>;

    /// Repositions to the first row at or after `target` on `columns`
    fn jump(
        &mut self,
        _ctx: &QueryContext,
        _target: &[Value],
        _columns: &ColumnSelector,
    ) -> ExecutorResult<()> {
        Err(ExecutorError::jump_unsupported(self.name()))
    }

    /// Releases scan resources
    fn close(&mut self);

    /// Releases everything; children are destroyed too
    fn destroy(&mut self) {
        self.close();
    }

    /// Operator name, for errors and logs
    fn name(&self) -> &'static str;
}

pub(crate) enum CursorKind {
    Values(ValuesCursor),
    GroupScan(GroupScanCursor),
    IndexScan(IndexScanCursor),
    AncestorLookup(AncestorLookupCursor),
    Select(SelectCursor),
    Project(ProjectCursor),
    Limit(LimitCursor),
    Sort(SortCursor),
    Distinct(DistinctCursor),
    Intersect(IntersectCursor),
}

impl CursorKind {
    fn inner(&mut self) -> &mut dyn CursorImpl {
        match self {
            CursorKind::Values(c) => c,
            CursorKind::GroupScan(c) => c,
            CursorKind::IndexScan(c) => c,
            CursorKind::AncestorLookup(c) => c,
            CursorKind::Select(c) => c,
            CursorKind::Project(c) => c,
            CursorKind::Limit(c) => c,
            CursorKind::Sort(c) => c,
            CursorKind::Distinct(c) => c,
            CursorKind::Intersect(c) => c,
        }
    }
}

/// Stateful execution of one operator against one query context.
pub struct Cursor {
    state: CursorState,
    name: &'static str,
    kind: CursorKind,
}

impl Cursor {
    pub(crate) fn new(mut kind: CursorKind) -> Self {
        Self {
            state: CursorState::Idle,
            name: kind.inner().name(),
            kind,
        }
    }

    /// Current state
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Operator name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Starts (or restarts) the scan
    pub fn open(&mut self, ctx: &QueryContext) -> ExecutorResult<()> {
        if self.state == CursorState::Destroyed {
            return Err(ExecutorError::cursor_state("open", self.state));
        }
        let inner = self.kind.inner();
        if let Err(err) = inner.open(ctx) {
            inner.close();
            self.state = CursorState::Idle;
            return Err(err);
        }
        trace!(
            event = Event::CursorOpened.as_str(),
            operator = self.name,
            "cursor opened"
        );
        self.state = CursorState::Active;
        Ok(())
    }

    /// Next row; `None` ends the scan and leaves the cursor IDLE
    pub fn next(&mut self, ctx: &QueryContext) -> ExecutorResult<Option<Row>> {
        if self.state != CursorState::Active {
            return Err(ExecutorError::cursor_state("fetch from", self.state));
        }
        let result = ctx.check_deadline().and_then(|_| self.kind.inner().next(ctx));
        match result {
            Ok(Some(row)) => Ok(Some(row)),
            Ok(None) => {
                self.kind.inner().close();
                self.state = CursorState::Idle;
                Ok(None)
            }
            Err(err) => {
                self.fail();
                Err(err)
            }
        }
    }

    /// Repositions so the next row is the first one whose `columns` compare
    /// at or after `target` in this cursor's order
    pub fn jump(
        &mut self,
        ctx: &QueryContext,
        target: &[Value],
        columns: &ColumnSelector,
    ) -> ExecutorResult<()> {
        if self.state != CursorState::Active {
            return Err(ExecutorError::cursor_state("jump", self.state));
        }
        let result = ctx
            .check_deadline()
            .and_then(|_| self.kind.inner().jump(ctx, target, columns));
        match result {
            Ok(()) => {
                trace!(
                    event = Event::CursorJumped.as_str(),
                    operator = self.name,
                    columns = %columns,
                    "cursor jumped"
                );
                Ok(())
            }
            Err(err) if err.code() == ExecutorErrorCode::AeroJumpUnsupported => Err(err),
            Err(err) => {
                self.fail();
                Err(err)
            }
        }
    }

    /// Ends the scan; the cursor can be reopened
    pub fn close(&mut self) -> ExecutorResult<()> {
        if self.state == CursorState::Destroyed {
            return Err(ExecutorError::cursor_state("close", self.state));
        }
        let inner = self.kind.inner();
        inner.close();
        trace!(
            event = Event::CursorClosed.as_str(),
            operator = self.name,
            "cursor closed"
        );
        self.state = CursorState::Idle;
        Ok(())
    }

    /// Releases the cursor for good
    pub fn destroy(&mut self) {
        if self.state == CursorState::Destroyed {
            return;
        }
        let inner = self.kind.inner();
        inner.destroy();
        trace!(
            event = Event::CursorDestroyed.as_str(),
            operator = self.name,
            "cursor destroyed"
        );
        self.state = CursorState::Destroyed;
    }

    /// Drains the remaining rows
    pub fn collect(&mut self, ctx: &QueryContext) -> ExecutorResult<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next(ctx)? {
            rows.push(row);
        }
        Ok(rows)
    }

    fn fail(&mut self) {
        self.kind.inner().close();
        self.state = CursorState::Idle;
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("operator", &self.name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Next row of a child, or `None` once the child went IDLE.
pub(crate) fn pull(child: &mut Cursor, ctx: &QueryContext) -> ExecutorResult<Option<Row>> {
    if child.state() != CursorState::Active {
        return Ok(None);
    }
    child.next(ctx)
}

/// Closes a child unless it is already destroyed.
pub(crate) fn close_child(child: &mut Cursor) {
    if child.state() != CursorState::Destroyed {
        let _ = child.close();
    }
}
