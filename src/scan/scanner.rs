//! Scan loops
//!
//! Binary mode appends encoded rows to the output's buffer until the
//! collector is exhausted, the limit trips or the next row does not fit.
//! A row that does not fit stays in the collector and is returned by the
//! next call. Object mode hands rows over one at a time until the collector
//! is exhausted or the limit trips.
//!
//! Every iteration first checks the cursor's deadline and that the scanned
//! table's generation still matches the one the scan was opened against.

use std::sync::Arc;
use std::time::Instant;

use tracing::{trace, warn};

use super::cursor_id::CursorId;
use super::output::LegacyRowOutput;
use super::session::{ScanCursorState, ScanData};
use crate::executor::{ExecutorError, ExecutorErrorCode, ExecutorResult};
use crate::observability::{Event, MetricsRegistry};
use crate::row::RowData;
use crate::storage::StoreAdapter;

/// Callbacks at fixed points of the scan loop.
///
/// Used to interleave definition changes or updates with a scan at an exact
/// row, deterministically.
pub trait ScanHooks: Send + Sync {
    /// Top of every loop iteration, before the generation check
    fn loop_start(&self) {}

    /// After a row is accepted, before the output is told about it
    fn pre_wrote_row(&self) {}
}

/// Hooks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl ScanHooks for NoHooks {}

/// Outcome of one `scan_some` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    /// The scan ended; no further rows
    Finished,
    /// The output buffer is full; drain it and call again
    BufferFull,
}

impl ScanStatus {
    /// True if further calls may produce rows
    pub fn has_more(&self) -> bool {
        matches!(self, ScanStatus::BufferFull)
    }
}

pub(crate) struct Scanner {
    hooks: Arc<dyn ScanHooks>,
    metrics: Arc<MetricsRegistry>,
}

impl Scanner {
    pub(crate) fn new(hooks: Arc<dyn ScanHooks>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { hooks, metrics }
    }

    pub(crate) fn scan(
        &self,
        store: &dyn StoreAdapter,
        cursor: CursorId,
        scan: &mut ScanData,
        output: &mut dyn LegacyRowOutput,
    ) -> ExecutorResult<ScanStatus> {
        let to_message = output.output_to_message();
        scan.collector.output_to_message(to_message);
        scan.state = ScanCursorState::Scanning;

        let result = self
            .check_deadline(cursor, scan)
            .and_then(|_| self.check_generation(store, scan))
            .and_then(|_| {
                if !scan.collector.has_more() {
                    Ok(ScanStatus::Finished)
                } else if to_message {
                    self.scan_binary(store, cursor, scan, output)
                } else {
                    self.scan_objects(store, cursor, scan, output)
                }
            });

        match result {
            Ok(ScanStatus::Finished) => {
                scan.state = ScanCursorState::Finished;
                trace!(
                    event = Event::ScanFinished.as_str(),
                    cursor = %cursor,
                    rows = scan.delivered,
                    "scan finished"
                );
                Ok(ScanStatus::Finished)
            }
            Ok(ScanStatus::BufferFull) => Ok(ScanStatus::BufferFull),
            Err(err) if err.code() == ExecutorErrorCode::AeroTableDefinitionChanged => {
                scan.state = ScanCursorState::ConcurrentModification;
                self.metrics.increment_scans_invalidated();
                warn!(
                    event = Event::ScanInvalidated.as_str(),
                    cursor = %cursor,
                    error = %err,
                    "scan invalidated"
                );
                Err(err.with_context(cursor.to_string()))
            }
            Err(err) => {
                scan.state = ScanCursorState::Finished;
                Err(err)
            }
        }
    }

    fn check_deadline(&self, cursor: CursorId, scan: &ScanData) -> ExecutorResult<()> {
        match scan.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                let elapsed_ms = scan.opened_at.elapsed().as_millis();
                self.metrics.increment_timeouts();
                warn!(
                    event = Event::QueryTimeout.as_str(),
                    cursor = %cursor,
                    elapsed_ms = elapsed_ms as u64,
                    "scan deadline exceeded"
                );
                Err(ExecutorError::query_timeout(elapsed_ms))
            }
            _ => Ok(()),
        }
    }

    fn check_generation(&self, store: &dyn StoreAdapter, scan: &ScanData) -> ExecutorResult<()> {
        let current = store.catalog().table_generation(scan.request.table_id());
        if current != Some(scan.generation) {
            return Err(ExecutorError::table_definition_changed(
                scan.table_name.clone(),
            ));
        }
        Ok(())
    }

    fn scan_binary(
        &self,
        store: &dyn StoreAdapter,
        cursor: CursorId,
        scan: &mut ScanData,
        output: &mut dyn LegacyRowOutput,
    ) -> ExecutorResult<ScanStatus> {
        loop {
            self.hooks.loop_start();
            self.check_deadline(cursor, scan)?;
            self.check_generation(store, scan)?;

            let buffer = output.buffer().ok_or_else(|| {
                ExecutorError::row_output("binary scan output has no buffer")
            })?;
            let start = buffer.len();
            if !scan.collector.collect_next_row_into(buffer)? {
                if !scan.collector.has_more() {
                    return Ok(ScanStatus::Finished);
                }
                if start == 0 {
                    return Err(ExecutorError::row_output(format!(
                        "row does not fit in an empty {} byte buffer",
                        buffer.capacity()
                    )));
                }
                self.metrics.increment_buffer_full();
                trace!(
                    event = Event::ScanBufferFull.as_str(),
                    cursor = %cursor,
                    bytes = start,
                    "output buffer full"
                );
                return Ok(ScanStatus::BufferFull);
            }

            let (row, _) = RowData::from_bytes(&buffer.as_bytes()[start..])?;
            if scan.request.scan_limit().reached(&row, scan.delivered) {
                buffer.truncate(start);
                return Ok(ScanStatus::Finished);
            }

            self.hooks.pre_wrote_row();
            output.wrote_row()?;
            scan.delivered += 1;
            self.metrics.add_rows_scanned(1);

            if !scan.collector.has_more() {
                return Ok(ScanStatus::Finished);
            }
        }
    }

    fn scan_objects(
        &self,
        store: &dyn StoreAdapter,
        cursor: CursorId,
        scan: &mut ScanData,
        output: &mut dyn LegacyRowOutput,
    ) -> ExecutorResult<ScanStatus> {
        loop {
            self.hooks.loop_start();
            self.check_deadline(cursor, scan)?;
            self.check_generation(store, scan)?;

            let Some(row) = scan.collector.collect_next_row()? else {
                return Ok(ScanStatus::Finished);
            };
            if scan.request.scan_limit().reached(row.data()?, scan.delivered) {
                return Ok(ScanStatus::Finished);
            }

            self.hooks.pre_wrote_row();
            output.add_row(row)?;
            scan.delivered += 1;
            self.metrics.add_rows_scanned(1);
        }
    }
}
