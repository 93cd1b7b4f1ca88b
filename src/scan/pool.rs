//! Row converter pool
//!
//! `scan_some_rows` decodes rows through a converter that owns a large
//! scratch buffer. Converters are kept on a bounded free list and checked
//! out for one call. The guard puts the converter back when dropped, so it
//! is returned on every exit path.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::output::{LegacyRowOutput, RowOutput};
use crate::executor::ExecutorResult;
use crate::observability::{Event, MetricsRegistry};
use crate::row::{Row, RowType};
use crate::storage::RowBuffer;

/// Scratch state for decoding binary rows into typed rows
#[derive(Debug)]
pub struct RowConverter {
    buffer: RowBuffer,
}

impl RowConverter {
    fn new(buffer_bytes: usize) -> Self {
        Self {
            buffer: RowBuffer::new(buffer_bytes),
        }
    }

    /// Scratch buffer capacity
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Binary output that converts each written row and hands it to `sink`
    pub fn output<'a>(
        &'a mut self,
        row_type: Arc<RowType>,
        sink: &'a mut dyn RowOutput,
    ) -> ConvertingOutput<'a> {
        self.buffer.clear();
        ConvertingOutput {
            buffer: &mut self.buffer,
            row_type,
            sink,
            rows: 0,
        }
    }
}

/// Binary output feeding a typed-row sink
pub struct ConvertingOutput<'a> {
    buffer: &'a mut RowBuffer,
    row_type: Arc<RowType>,
    sink: &'a mut dyn RowOutput,
    rows: usize,
}

impl LegacyRowOutput for ConvertingOutput<'_> {
    fn output_to_message(&self) -> bool {
        true
    }

    fn buffer(&mut self) -> Option<&mut RowBuffer> {
        Some(&mut *self.buffer)
    }

    fn wrote_row(&mut self) -> ExecutorResult<()> {
        for data in self.buffer.drain()? {
            let row = Row::new(self.row_type.clone(), data.decode_fields()?)?;
            self.sink.output(row)?;
            self.rows += 1;
        }
        Ok(())
    }

    fn rows_count(&self) -> usize {
        self.rows
    }
}

/// Bounded free list of [`RowConverter`]s
#[derive(Debug)]
pub struct ConverterPool {
    free: Mutex<Vec<RowConverter>>,
    capacity: usize,
    buffer_bytes: usize,
    metrics: Arc<MetricsRegistry>,
}

impl ConverterPool {
    /// Pool keeping at most `capacity` idle converters of `buffer_bytes` each
    pub fn new(capacity: usize, buffer_bytes: usize, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            buffer_bytes,
            metrics,
        }
    }

    /// Idle converters
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    /// Checks out a converter, allocating one when none is idle
    pub fn checkout(&self) -> PooledConverter<'_> {
        let reused = self.free.lock().pop();
        let converter = match reused {
            Some(converter) => converter,
            None => {
                self.metrics.increment_converters_allocated();
                debug!(
                    event = Event::ConverterAllocated.as_str(),
                    buffer_bytes = self.buffer_bytes,
                    "row converter allocated"
                );
                RowConverter::new(self.buffer_bytes)
            }
        };
        PooledConverter {
            pool: self,
            converter,
        }
    }

    fn release(&self, mut converter: RowConverter) {
        converter.buffer.clear();
        let mut free = self.free.lock();
        if free.len() >= self.capacity {
            warn!(
                event = Event::ConverterReleaseFailed.as_str(),
                capacity = self.capacity,
                "converter pool full, dropping converter"
            );
            return;
        }
        free.push(converter);
    }
}

/// A checked-out converter, returned to its pool on drop
pub struct PooledConverter<'a> {
    pool: &'a ConverterPool,
    converter: RowConverter,
}

impl Deref for PooledConverter<'_> {
    type Target = RowConverter;

    fn deref(&self) -> &RowConverter {
        &self.converter
    }
}

impl DerefMut for PooledConverter<'_> {
    fn deref_mut(&mut self) -> &mut RowConverter {
        &mut self.converter
    }
}

impl Drop for PooledConverter<'_> {
    fn drop(&mut self) {
        let converter = std::mem::replace(&mut self.converter, RowConverter::new(0));
        self.pool.release(converter);
    }
}
