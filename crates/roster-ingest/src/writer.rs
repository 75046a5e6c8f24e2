//! Fixed-threshold buffering of accepted rows into atomic bulk inserts.

use roster_core::NewEmployee;
use roster_storage::{RosterStore, StoreError};
use tracing::debug;

pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// An accepted row waiting for its batch to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedRow {
    pub line: u64,
    pub employee: NewEmployee,
}

#[derive(Debug)]
pub enum FlushOutcome {
    Committed {
        batch: usize,
        rows: usize,
    },
    /// Nothing from the batch was committed.
    Failed {
        batch: usize,
        rows: Vec<BufferedRow>,
        error: StoreError,
    },
}

#[derive(Debug)]
pub struct BatchWriter {
    threshold: usize,
    lines: Vec<u64>,
    buffer: Vec<NewEmployee>,
    flushes: usize,
}

impl BatchWriter {
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            threshold,
            lines: Vec::with_capacity(threshold),
            buffer: Vec::with_capacity(threshold),
            flushes: 0,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Buffers a row and flushes once the buffer reaches the threshold.
    pub async fn push(
        &mut self,
        store: &dyn RosterStore,
        line: u64,
        employee: NewEmployee,
    ) -> Option<FlushOutcome> {
        self.lines.push(line);
        self.buffer.push(employee);
        if self.buffer.len() >= self.threshold {
            self.flush(store).await
        } else {
            None
        }
    }

    /// Writes whatever is buffered as one batch. `None` when the buffer is empty.
    pub async fn flush(&mut self, store: &dyn RosterStore) -> Option<FlushOutcome> {
        if self.buffer.is_empty() {
            return None;
        }
        self.flushes += 1;
        let batch = self.flushes;
        let lines = std::mem::replace(&mut self.lines, Vec::with_capacity(self.threshold));
        let employees = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.threshold));

        match store.bulk_create_employees(&employees).await {
            Ok(_) => {
                debug!(batch, rows = employees.len(), "batch committed");
                Some(FlushOutcome::Committed {
                    batch,
                    rows: employees.len(),
                })
            }
            Err(error) => {
                debug!(batch, rows = employees.len(), %error, "batch rejected");
                let rows = lines
                    .into_iter()
                    .zip(employees)
                    .map(|(line, employee)| BufferedRow { line, employee })
                    .collect();
                Some(FlushOutcome::Failed { batch, rows, error })
            }
        }
    }
}
