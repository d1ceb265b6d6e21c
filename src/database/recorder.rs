//! Background batched writer for asset records.
//!
//! Records are handed to a single writer thread over an unbounded channel.
//! The writer owns the SQLite connection exclusively and commits one
//! transaction per `threshold` records. Closing the channel is the stop
//! signal: the writer drains what is queued, flushes the partial batch and
//! exits.

use std::path::Path;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Receiver, Sender};
use tracing::{error, info, warn};

use crate::database::repo::{AssetRecord, BatchOutcome, TransactionManager};
use crate::{RecorderError, Result};

pub const DEFAULT_BATCH_THRESHOLD: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Running,
    Draining,
    Closed,
}

/// What the writer did between `initialize` and `shutdown`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecorderReport {
    /// Records pulled off the queue.
    pub received: usize,
    /// Size of each committed batch, in commit order.
    pub committed: Vec<usize>,
    /// Size of each batch whose transaction failed.
    pub dropped: Vec<usize>,
    /// Rows actually inserted; duplicates are not counted.
    pub rows_inserted: usize,
}

impl RecorderReport {
    fn record(&mut self, outcome: BatchOutcome) {
        match outcome {
            BatchOutcome::Committed { records, inserted } => {
                self.committed.push(records);
                self.rows_inserted += inserted;
            }
            BatchOutcome::Dropped { records } => self.dropped.push(records),
        }
    }

    pub fn transactions(&self) -> usize {
        self.committed.len()
    }

    pub fn records_dropped(&self) -> usize {
        self.dropped.iter().sum()
    }
}

pub struct Recorder {
    sender: Option<Sender<AssetRecord>>,
    writer: Option<JoinHandle<RecorderReport>>,
    state: RecorderState,
}

impl Recorder {
    /// Opens the store at `path`, recreates the asset table and starts the
    /// writer with the default batch threshold.
    pub fn initialize(path: &Path) -> Result<Self> {
        Self::with_threshold(path, DEFAULT_BATCH_THRESHOLD)
    }

    /// Like [`Recorder::initialize`]. A threshold of 0 behaves as 1.
    pub fn with_threshold(path: &Path, threshold: usize) -> Result<Self> {
        info!("Initializing DB at: {:?}", path);
        // Opened here so a bad location fails before any thread exists.
        let tm = TransactionManager::open(path, threshold)?;
        let (tx, rx) = unbounded::<AssetRecord>();

        let writer = thread::Builder::new()
            .name("db-writer".to_string())
            .spawn(move || run_writer(tm, rx))?;

        Ok(Self {
            sender: Some(tx),
            writer: Some(writer),
            state: RecorderState::Running,
        })
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Queues a record for the writer. Never blocks.
    pub fn submit(&self, record: AssetRecord) {
        let Some(tx) = &self.sender else {
            warn!("Recorder closed, discarding {}", record.ue_file_path);
            return;
        };
        if let Err(e) = tx.send(record) {
            // Only reachable if the writer thread died.
            warn!("DB writer gone, discarding {}", e.into_inner().ue_file_path);
        }
    }

    /// Stops accepting work, waits for every queued record to be written and
    /// closes the store.
    pub fn shutdown(&mut self) -> Result<RecorderReport> {
        let writer = self.writer.take().ok_or(RecorderError::Closed)?;
        self.state = RecorderState::Draining;
        drop(self.sender.take());

        let joined = writer.join();
        self.state = RecorderState::Closed;
        let report = joined.map_err(|_| RecorderError::WriterPanicked)?;

        info!(
            "DB closed: {} records in {} batches, {} rows inserted, {} dropped",
            report.received,
            report.transactions(),
            report.rows_inserted,
            report.records_dropped()
        );
        Ok(report)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.writer.is_some() {
            warn!("Recorder dropped without shutdown, draining");
            if let Err(e) = self.shutdown() {
                error!("Failed to drain recorder: {}", e);
            }
        }
    }
}

fn run_writer(mut tm: TransactionManager, rx: Receiver<AssetRecord>) -> RecorderReport {
    info!("DB writer started (batch threshold {})", tm.buffer_limit());
    let mut report = RecorderReport::default();

    // Ends once the sender is dropped and the queue is empty.
    for record in rx {
        report.received += 1;
        if let Some(outcome) = tm.add(record) {
            report.record(outcome);
        }
    }

    if let Some(outcome) = tm.flush() {
        report.record(outcome);
    }
    if let Err(e) = tm.close() {
        error!("Failed to close DB: {}", e);
    }

    info!("DB writer finished");
    report
}
