//! Row collectors and output buffers
//!
//! Binary-mode scans write encoded rows back to back into a fixed-capacity
//! [`RowBuffer`]. A row that does not fit is left in the collector for the
//! next call.

use tracing::trace;

use super::adapter::RowCollector;
use super::errors::{StorageError, StorageResult};
use crate::observability::Event;
use crate::row::{ColumnSelector, LegacyRow, RowData, RowResult, Value};
use crate::schema::{IndexId, TableId};

/// Fixed-capacity buffer of encoded rows
#[derive(Debug, Clone)]
pub struct RowBuffer {
    bytes: Vec<u8>,
    capacity: usize,
}

impl RowBuffer {
    /// Empty buffer holding at most `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes written
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if nothing is written
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes still free
    pub fn remaining(&self) -> usize {
        self.capacity - self.bytes.len()
    }

    /// Appends `data` if it fits
    pub fn try_append(&mut self, data: &[u8]) -> bool {
        if data.len() > self.remaining() {
            return false;
        }
        self.bytes.extend_from_slice(data);
        true
    }

    /// Drops everything written after `len` bytes
    pub fn truncate(&mut self, len: usize) {
        self.bytes.truncate(len);
    }

    /// Written bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Empties the buffer
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Decodes every row written so far
    pub fn rows(&self) -> RowResult<Vec<RowData>> {
        let mut rows = Vec::new();
        let mut offset = 0;
        while offset < self.bytes.len() {
            let (row, used) = RowData::from_bytes(&self.bytes[offset..])?;
            rows.push(row);
            offset += used;
        }
        Ok(rows)
    }

    /// Decodes and removes every row written so far
    pub fn drain(&mut self) -> RowResult<Vec<RowData>> {
        let rows = self.rows()?;
        self.clear();
        Ok(rows)
    }
}

/// Collector over rows materialized when the scan was opened
pub struct MemoryRowCollector {
    table: TableId,
    index: Option<IndexId>,
    columns: ColumnSelector,
    rows: Vec<Vec<Value>>,
    position: usize,
    to_message: bool,
    closed: bool,
}

impl MemoryRowCollector {
    /// Collector over `rows`, already in scan order
    pub fn new(
        table: TableId,
        index: Option<IndexId>,
        columns: ColumnSelector,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        Self {
            table,
            index,
            columns,
            rows,
            position: 0,
            to_message: false,
            closed: false,
        }
    }

    fn check_mode(&self, to_message: bool) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::CollectorClosed);
        }
        match (self.to_message, to_message) {
            (true, false) => Err(StorageError::WrongOutputMode("binary")),
            (false, true) => Err(StorageError::WrongOutputMode("object")),
            _ => Ok(()),
        }
    }

    fn encode_current(&self) -> StorageResult<Option<RowData>> {
        let Some(fields) = self.rows.get(self.position) else {
            return Ok(None);
        };
        let masked: Vec<Value> = fields
            .iter()
            .enumerate()
            .map(|(i, v)| {
                if self.columns.is_empty() || self.columns.includes(i) {
                    v.clone()
                } else {
                    Value::Null
                }
            })
            .collect();
        Ok(Some(RowData::encode(self.table, &masked)?))
    }
}

impl RowCollector for MemoryRowCollector {
    fn table_id(&self) -> TableId {
        self.table
    }

    fn index_id(&self) -> Option<IndexId> {
        self.index
    }

    fn has_more(&self) -> bool {
        !self.closed && self.position < self.rows.len()
    }

    fn output_to_message(&mut self, to_message: bool) {
        self.to_message = to_message;
    }

    fn collect_next_row(&mut self) -> StorageResult<Option<LegacyRow>> {
        self.check_mode(false)?;
        let Some(data) = self.encode_current()? else {
            return Ok(None);
        };
        self.position += 1;
        Ok(Some(LegacyRow::from_data(data)))
    }

    fn collect_next_row_into(&mut self, buffer: &mut RowBuffer) -> StorageResult<bool> {
        self.check_mode(true)?;
        let Some(data) = self.encode_current()? else {
            return Ok(false);
        };
        if !buffer.try_append(data.as_bytes()) {
            trace!(
                event = Event::ScanBufferFull.as_str(),
                table = %self.table,
                needed = data.len(),
                remaining = buffer.remaining(),
                "row does not fit"
            );
            return Ok(false);
        }
        self.position += 1;
        Ok(true)
    }

    fn close(&mut self) {
        self.closed = true;
        self.rows.clear();
    }
}
