//! Scan output destinations
//!
//! A bridge scan writes either into a fixed-capacity [`RowBuffer`] (binary
//! mode) or hands over one [`LegacyRow`] at a time (object mode). The
//! destination decides the mode.

use crate::executor::{ExecutorError, ExecutorResult};
use crate::row::{LegacyRow, Row, RowData};
use crate::storage::RowBuffer;

/// Where a bridge scan delivers rows.
pub trait LegacyRowOutput {
    /// True for binary mode
    fn output_to_message(&self) -> bool;

    /// Binary mode: the buffer rows are appended to
    fn buffer(&mut self) -> Option<&mut RowBuffer> {
        None
    }

    /// Binary mode: the row just appended to the buffer is final
    fn wrote_row(&mut self) -> ExecutorResult<()> {
        Ok(())
    }

    /// Object mode: takes one row
    fn add_row(&mut self, _row: LegacyRow) -> ExecutorResult<()> {
        Err(ExecutorError::row_output(
            "binary output takes rows through its buffer",
        ))
    }

    /// Rows delivered so far
    fn rows_count(&self) -> usize;
}

/// Binary-mode output over an owned buffer
#[derive(Debug, Clone)]
pub struct BufferOutput {
    buffer: RowBuffer,
    rows: usize,
}

impl BufferOutput {
    /// Output holding at most `capacity` bytes of rows
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RowBuffer::new(capacity),
            rows: 0,
        }
    }

    /// Written bytes
    pub fn bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    /// Decodes and removes the buffered rows
    pub fn drain(&mut self) -> ExecutorResult<Vec<RowData>> {
        Ok(self.buffer.drain()?)
    }
}

impl LegacyRowOutput for BufferOutput {
    fn output_to_message(&self) -> bool {
        true
    }

    fn buffer(&mut self) -> Option<&mut RowBuffer> {
        Some(&mut self.buffer)
    }

    fn wrote_row(&mut self) -> ExecutorResult<()> {
        self.rows += 1;
        Ok(())
    }

    fn rows_count(&self) -> usize {
        self.rows
    }
}

/// Object-mode output collecting rows
#[derive(Debug, Clone, Default)]
pub struct RowDataOutput {
    rows: Vec<LegacyRow>,
}

impl RowDataOutput {
    /// Empty output
    pub fn new() -> Self {
        Self::default()
    }

    /// Collected rows
    pub fn rows(&self) -> &[LegacyRow] {
        &self.rows
    }

    /// Takes the collected rows
    pub fn take_rows(&mut self) -> Vec<LegacyRow> {
        std::mem::take(&mut self.rows)
    }
}

impl LegacyRowOutput for RowDataOutput {
    fn output_to_message(&self) -> bool {
        false
    }

    fn add_row(&mut self, row: LegacyRow) -> ExecutorResult<()> {
        self.rows.push(row);
        Ok(())
    }

    fn rows_count(&self) -> usize {
        self.rows.len()
    }
}

/// Sink for typed rows produced by `DmlFunctions::scan_some_rows`
pub trait RowOutput {
    /// Takes one row
    fn output(&mut self, row: Row) -> ExecutorResult<()>;
}

impl RowOutput for Vec<Row> {
    fn output(&mut self, row: Row) -> ExecutorResult<()> {
        self.push(row);
        Ok(())
    }
}
