//! Session-level scan and DML entry points
//!
//! `DmlFunctions` opens bridge cursors against the store, drives them in
//! bounded `scan_some` steps and applies row changes. An update that moves
//! a row within the order an open cursor scans in invalidates that cursor:
//! it may otherwise return the row twice or skip it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace, warn};

use super::cursor_id::CursorId;
use super::output::{LegacyRowOutput, RowDataOutput, RowOutput};
use super::pool::ConverterPool;
use super::request::{ScanAllRequest, ScanRequest};
use super::scanner::{NoHooks, ScanHooks, ScanStatus, Scanner};
use super::session::{ScanCursorState, ScanData, Session};
use crate::config::ExecutionConfig;
use crate::executor::{ExecutorError, ExecutorResult};
use crate::observability::{Event, MetricsRegistry};
use crate::row::{ColumnSelector, RowType, Value};
use crate::schema::{Catalog, IndexKind, TableDef, TableId};
use crate::storage::{CollectorRequest, StoreAdapter};

/// Bridge between sessions and the store
pub struct DmlFunctions {
    store: Arc<dyn StoreAdapter>,
    config: Arc<ExecutionConfig>,
    metrics: Arc<MetricsRegistry>,
    pool: ConverterPool,
    scanner: Scanner,
    next_id: AtomicU64,
}

impl DmlFunctions {
    /// Create with a validated configuration
    pub fn new(store: Arc<dyn StoreAdapter>, config: Arc<ExecutionConfig>) -> ExecutorResult<Self> {
        Self::with_hooks(store, config, Arc::new(NoHooks))
    }

    /// Create with scan loop hooks
    pub fn with_hooks(
        store: Arc<dyn StoreAdapter>,
        config: Arc<ExecutionConfig>,
        hooks: Arc<dyn ScanHooks>,
    ) -> ExecutorResult<Self> {
        config.validate()?;
        let metrics = Arc::new(MetricsRegistry::new());
        let pool = ConverterPool::new(
            config.converter_pool_capacity,
            config.converter_buffer_bytes,
            metrics.clone(),
        );
        Ok(Self {
            store,
            scanner: Scanner::new(hooks, metrics.clone()),
            config,
            metrics,
            pool,
            next_id: AtomicU64::new(1),
        })
    }

    /// Storage collaborator
    pub fn store(&self) -> &Arc<dyn StoreAdapter> {
        &self.store
    }

    /// Configuration
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Counters
    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Converter pool
    pub fn pool(&self) -> &ConverterPool {
        &self.pool
    }

    /// Opens a scan and registers it in `session`
    pub fn open_cursor(
        &self,
        session: &mut Session,
        request: impl Into<ScanRequest>,
    ) -> ExecutorResult<CursorId> {
        let catalog = self.store.catalog();
        let request: ScanRequest = request.into();
        let table = catalog.require_table(request.table_id())?;
        let request = request.resolve_scan_all(table.columns.len());
        check_request(&catalog, table, &request)?;

        let collector = self.store.row_collector(&CollectorRequest {
            table: table.id,
            index: request.index_id(),
            range: request.range(),
            columns: request.columns().clone(),
            descending: request.is_descending(),
        })?;

        let cursor = CursorId::new(self.next_id.fetch_add(1, Ordering::Relaxed), table.id);
        let opened_at = Instant::now();
        session.insert(
            cursor,
            ScanData {
                request,
                table_name: table.name.clone(),
                row_type: RowType::table(table.id, table.column_types()),
                collector,
                state: ScanCursorState::Fresh,
                generation: table.generation,
                delivered: 0,
                opened_at,
                deadline: self.config.query_timeout().map(|t| opened_at + t),
            },
        );
        self.metrics.increment_cursors_opened();
        trace!(
            event = Event::ScanOpened.as_str(),
            session = %session.id(),
            cursor = %cursor,
            table = %table.name,
            "scan opened"
        );
        Ok(cursor)
    }

    /// Scans the next batch of rows into `output`.
    ///
    /// `BufferFull` means the output buffer must be drained before calling
    /// again; `Finished` means the scan is over. Past the configured query
    /// timeout, counted from `open_cursor`, the call fails and the cursor is
    /// finished.
    pub fn scan_some(
        &self,
        session: &mut Session,
        cursor: CursorId,
        output: &mut dyn LegacyRowOutput,
    ) -> ExecutorResult<ScanStatus> {
        let scan = session
            .scan_mut(cursor)
            .ok_or_else(|| ExecutorError::cursor_unknown(cursor))?;
        match scan.state {
            ScanCursorState::ConcurrentModification => {
                return Err(ExecutorError::concurrent_scan_and_update(cursor))
            }
            ScanCursorState::Finished => return Err(ExecutorError::cursor_finished(cursor)),
            _ => {}
        }
        self.scanner.scan(self.store.as_ref(), cursor, scan, output)
    }

    /// Scans the rest of the cursor as typed rows into `sink`, returning the
    /// number of rows delivered
    pub fn scan_some_rows(
        &self,
        session: &mut Session,
        cursor: CursorId,
        sink: &mut dyn RowOutput,
    ) -> ExecutorResult<usize> {
        let row_type = session
            .scan(cursor)
            .map(|s| s.row_type().clone())
            .ok_or_else(|| ExecutorError::cursor_unknown(cursor))?;
        let mut converter = self.pool.checkout();
        let mut output = converter.output(row_type, sink);
        match self.scan_some(session, cursor, &mut output)? {
            ScanStatus::Finished => Ok(output.rows_count()),
            ScanStatus::BufferFull => Err(ExecutorError::row_output(format!(
                "{} overflowed the row converter buffer",
                cursor
            ))),
        }
    }

    /// Closes a cursor and releases its collector
    pub fn close_cursor(&self, session: &mut Session, cursor: CursorId) -> ExecutorResult<()> {
        let mut scan = session
            .remove(cursor)
            .ok_or_else(|| ExecutorError::cursor_unknown(cursor))?;
        scan.collector.close();
        self.metrics.increment_cursors_closed();
        trace!(
            event = Event::ScanClosed.as_str(),
            session = %session.id(),
            cursor = %cursor,
            rows = scan.delivered,
            "scan closed"
        );
        Ok(())
    }

    /// State of a cursor, `UnknownCursor` when the session has no such cursor
    pub fn get_cursor_state(&self, session: &Session, cursor: CursorId) -> ScanCursorState {
        session
            .scan(cursor)
            .map_or(ScanCursorState::UnknownCursor, ScanData::state)
    }

    /// Open cursors of a session, in opening order
    pub fn get_cursors(&self, session: &Session) -> Vec<CursorId> {
        let mut cursors: Vec<CursorId> = session.cursor_ids().collect();
        cursors.sort();
        cursors
    }

    /// Inserts a row
    pub fn write_row(&self, table: TableId, fields: Vec<Value>) -> ExecutorResult<()> {
        Ok(self.store.write_row(table, fields)?)
    }

    /// Deletes the row with the primary key of `fields`
    pub fn delete_row(&self, table: TableId, fields: &[Value]) -> ExecutorResult<()> {
        Ok(self.store.delete_row(table, fields)?)
    }

    /// Replaces the `columns` of `old` with those of `new`.
    ///
    /// Open cursors of `session` on the table are invalidated when the
    /// primary key changes, or when a column of the index they scan (the
    /// primary key without one) changes.
    pub fn update_row(
        &self,
        session: &mut Session,
        table: TableId,
        old: &[Value],
        new: &[Value],
        columns: &ColumnSelector,
    ) -> ExecutorResult<()> {
        let catalog = self.store.catalog();
        let def = catalog.require_table(table)?;
        let n = def.columns.len();
        if old.len() != n || new.len() != n {
            return Err(ExecutorError::plan_invalid(format!(
                "Update of table {} with {} columns given rows of {} and {} fields",
                def.name,
                n,
                old.len(),
                new.len()
            )));
        }

        let changed = |i: usize| columns.includes(i) && old[i] != new[i];
        let merged: Vec<Value> = (0..n)
            .map(|i| if columns.includes(i) { &new[i] } else { &old[i] })
            .cloned()
            .collect();
        self.store.update_row(table, old, merged)?;

        let pk_changed = def.primary_key.iter().any(|p| changed(*p));
        for (cursor, scan) in session.scans_mut() {
            if cursor.table != table || scan.state.is_terminal() {
                continue;
            }
            let scanned = scanned_columns(&catalog, def, &scan.request);
            if pk_changed || scanned.iter().any(|p| changed(*p)) {
                scan.state = ScanCursorState::ConcurrentModification;
                self.metrics.increment_scans_invalidated();
                warn!(
                    event = Event::ScanInvalidated.as_str(),
                    cursor = %cursor,
                    table = %def.name,
                    "update changed scanned columns"
                );
            }
        }
        Ok(())
    }

    /// Removes every row of a table.
    ///
    /// When every other table of the group is empty the whole group is
    /// cleared at once; otherwise the table's rows are scanned and deleted.
    pub fn truncate_table(&self, session: &mut Session, table: TableId) -> ExecutorResult<()> {
        let catalog = self.store.catalog();
        let def = catalog.require_table(table)?;
        let group_empty = catalog
            .group_tables(def.group)
            .iter()
            .filter(|t| t.id != table)
            .all(|t| self.store.row_count(t.id) == 0);

        if group_empty {
            self.store.truncate_group(def.group)?;
        } else {
            let cursor = self.open_cursor(session, ScanAllRequest::new(table))?;
            let deleted = self.delete_scanned(session, cursor, table);
            let closed = self.close_cursor(session, cursor);
            deleted.and(closed)?;
        }
        debug!(
            event = Event::TableTruncated.as_str(),
            table = %def.name,
            whole_group = group_empty,
            "table truncated"
        );
        Ok(())
    }

    fn delete_scanned(
        &self,
        session: &mut Session,
        cursor: CursorId,
        table: TableId,
    ) -> ExecutorResult<()> {
        loop {
            let mut output = RowDataOutput::new();
            let status = self.scan_some(session, cursor, &mut output)?;
            for row in output.take_rows() {
                self.store.delete_row(table, row.fields()?)?;
            }
            if !status.has_more() {
                return Ok(());
            }
        }
    }
}

fn check_request(catalog: &Catalog, table: &TableDef, request: &ScanRequest) -> ExecutorResult<()> {
    if let Some(position) = request.columns().positions().find(|p| *p >= table.columns.len()) {
        return Err(ExecutorError::plan_invalid(format!(
            "Scan of column {} of table {} with {} columns",
            position,
            table.name,
            table.columns.len()
        )));
    }
    let range = request.range();
    match request.index_id() {
        Some(id) => {
            let index = catalog.require_index(id)?;
            if index.kind != (IndexKind::Table { table: table.id }) {
                return Err(ExecutorError::plan_invalid(format!(
                    "Index {} is not a table index on {}",
                    index.name, table.name
                )));
            }
            range.validate(catalog, index)?;
        }
        None => {
            let longest = range
                .low()
                .into_iter()
                .chain(range.high())
                .map(|b| b.key.len())
                .max()
                .unwrap_or(0);
            if longest > table.primary_key.len() {
                return Err(ExecutorError::plan_invalid(format!(
                    "Bound of {} values on the {} column primary key of {}",
                    longest,
                    table.primary_key.len(),
                    table.name
                )));
            }
        }
    }
    Ok(())
}

/// Column positions whose values order the scan
fn scanned_columns(catalog: &Catalog, table: &TableDef, request: &ScanRequest) -> Vec<usize> {
    match request.index_id().and_then(|id| catalog.index(id)) {
        Some(index) => index
            .columns
            .iter()
            .filter(|c| c.table == table.id)
            .map(|c| c.position)
            .collect(),
        None => table.primary_key.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorErrorCode;
    use crate::row::Row;
    use crate::scan::{BufferOutput, ScanLimit};
    use crate::schema::{ColumnDef, ColumnType, TableSpec};
    use crate::storage::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, DmlFunctions, TableId) {
        let store = Arc::new(MemoryStore::new(Catalog::new()).unwrap());
        let table = store
            .create_table(&TableSpec::root(
                "items",
                vec![
                    ColumnDef::new("id", ColumnType::Int),
                    ColumnDef::new("name", ColumnType::Text),
                ],
                &["id"],
            ))
            .unwrap();
        for id in 1..=4i64 {
            store
                .write_row(table, vec![Value::Int(id), Value::text(format!("item{}", id))])
                .unwrap();
        }
        let dml = DmlFunctions::new(store.clone(), Arc::new(ExecutionConfig::default())).unwrap();
        (store, dml, table)
    }

    fn ids(rows: &[crate::row::LegacyRow]) -> Vec<i64> {
        rows.iter()
            .map(|r| r.field(0).unwrap().as_int().unwrap())
            .collect()
    }

    #[test]
    fn test_object_scan_then_finished() {
        let (_, dml, table) = setup();
        let mut session = Session::new();
        let cursor = dml.open_cursor(&mut session, ScanAllRequest::new(table)).unwrap();
        assert_eq!(dml.get_cursor_state(&session, cursor), ScanCursorState::Fresh);

        let mut output = RowDataOutput::new();
        let status = dml.scan_some(&mut session, cursor, &mut output).unwrap();
        assert_eq!(status, ScanStatus::Finished);
        assert_eq!(ids(output.rows()), vec![1, 2, 3, 4]);
        assert_eq!(dml.get_cursor_state(&session, cursor), ScanCursorState::Finished);

        let err = dml.scan_some(&mut session, cursor, &mut output).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::AeroCursorFinished);
    }

    #[test]
    fn test_row_limit_stops_scan() {
        let (_, dml, table) = setup();
        let mut session = Session::new();
        let request = ScanRequest::new(table, ColumnSelector::all(2)).limit(ScanLimit::Rows(2));
        let cursor = dml.open_cursor(&mut session, request).unwrap();
        let mut output = BufferOutput::new(4096);
        let status = dml.scan_some(&mut session, cursor, &mut output).unwrap();
        assert_eq!(status, ScanStatus::Finished);
        assert_eq!(output.rows_count(), 2);
        assert_eq!(output.drain().unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_cursor() {
        let (_, dml, table) = setup();
        let mut session = Session::new();
        let bogus = CursorId::new(99, table);
        let mut output = RowDataOutput::new();
        let err = dml.scan_some(&mut session, bogus, &mut output).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::AeroCursorUnknown);
        assert_eq!(
            dml.get_cursor_state(&session, bogus),
            ScanCursorState::UnknownCursor
        );
        assert_eq!(
            dml.close_cursor(&mut session, bogus).unwrap_err().code(),
            ExecutorErrorCode::AeroCursorUnknown
        );
    }

    #[test]
    fn test_cursors_listed_in_open_order() {
        let (_, dml, table) = setup();
        let mut session = Session::new();
        let a = dml.open_cursor(&mut session, ScanAllRequest::new(table)).unwrap();
        let b = dml.open_cursor(&mut session, ScanAllRequest::new(table)).unwrap();
        assert_eq!(dml.get_cursors(&session), vec![a, b]);
        dml.close_cursor(&mut session, a).unwrap();
        assert_eq!(dml.get_cursors(&session), vec![b]);
        assert_eq!(dml.metrics().snapshot().cursors_closed, 1);
    }

    #[test]
    fn test_primary_key_update_invalidates_cursor() {
        let (_, dml, table) = setup();
        let mut session = Session::new();
        let cursor = dml.open_cursor(&mut session, ScanAllRequest::new(table)).unwrap();
        let old = [Value::Int(1), Value::text("item1")];
        let new = [Value::Int(10), Value::text("item1")];
        dml.update_row(&mut session, table, &old, &new, &ColumnSelector::all(2))
            .unwrap();
        assert_eq!(
            dml.get_cursor_state(&session, cursor),
            ScanCursorState::ConcurrentModification
        );
        let mut output = RowDataOutput::new();
        let err = dml.scan_some(&mut session, cursor, &mut output).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::AeroConcurrentScanAndUpdate);
    }

    #[test]
    fn test_non_key_update_keeps_cursor() {
        let (store, dml, table) = setup();
        let mut session = Session::new();
        let cursor = dml.open_cursor(&mut session, ScanAllRequest::new(table)).unwrap();
        let old = [Value::Int(2), Value::text("item2")];
        let new = [Value::Int(99), Value::text("renamed")];
        dml.update_row(&mut session, table, &old, &new, &ColumnSelector::from_positions([1]))
            .unwrap();
        assert_eq!(dml.get_cursor_state(&session, cursor), ScanCursorState::Fresh);
        assert_eq!(store.row_count(table), 4);
    }

    #[test]
    fn test_scan_some_rows_decodes_selected_columns() {
        let (_, dml, table) = setup();
        let mut session = Session::new();
        let request = ScanRequest::new(table, ColumnSelector::from_positions([0]))
            .start(vec![Value::Int(3)]);
        let cursor = dml.open_cursor(&mut session, request).unwrap();
        let mut rows: Vec<Row> = Vec::new();
        assert_eq!(dml.scan_some_rows(&mut session, cursor, &mut rows).unwrap(), 2);
        assert_eq!(rows[0].fields(), &[Value::Int(3), Value::Null]);
        assert_eq!(dml.pool().idle(), 1);
    }

    #[test]
    fn test_truncate_whole_group() {
        let (store, dml, table) = setup();
        let mut session = Session::new();
        dml.truncate_table(&mut session, table).unwrap();
        assert_eq!(store.row_count(table), 0);
        assert_eq!(session.cursor_count(), 0);
    }

    #[test]
    fn test_open_rejects_bad_columns() {
        let (_, dml, table) = setup();
        let mut session = Session::new();
        let request = ScanRequest::new(table, ColumnSelector::from_positions([5]));
        let err = dml.open_cursor(&mut session, request).unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::AeroPlanInvalid);
    }
}
