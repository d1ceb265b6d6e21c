//! Incremental scanning driven by a host event loop.
//!
//! Each call processes a bounded slice of the asset list so the host's
//! frame (or whatever loop calls `tick`) never waits on the database.

use anyhow::Result;
use tracing::{error, info};

use crate::database::recorder::{Recorder, RecorderReport};
use crate::database::repo::AssetRecord;
use crate::ingest::source::AssetSource;

/// Position within a fixed list of asset paths.
#[derive(Debug, Clone, Default)]
pub struct ScanCursor {
    paths: Vec<String>,
    index: usize,
}

impl ScanCursor {
    pub fn new(paths: Vec<String>) -> Self {
        Self { paths, index: 0 }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn position(&self) -> usize {
        self.index
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.paths.len()
    }

    /// Extracts metadata for the next `slice_size` paths and advances past
    /// them. Paths the source cannot describe are skipped.
    pub fn next_slice<S>(&mut self, source: &S, slice_size: usize) -> Vec<(String, AssetRecord)>
    where
        S: AssetSource + ?Sized,
    {
        let end = (self.index + slice_size.max(1)).min(self.paths.len());
        let mut slice = Vec::with_capacity(end.saturating_sub(self.index));

        for path in &self.paths[self.index.min(end)..end] {
            match source.metadata(path) {
                Ok(Some(record)) => slice.push((path.clone(), record)),
                Ok(None) => info!("No asset data for: {}", path),
                Err(e) => error!("Failed to read metadata for {}: {}", path, e),
            }
        }

        self.index = end;
        slice
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Progress { processed: usize, total: usize },
    Finished,
}

/// A source, the paths it listed and the recorder they flow into.
pub struct ScanSession<S> {
    source: S,
    cursor: ScanCursor,
    recorder: Recorder,
    slice_size: usize,
}

impl<S: AssetSource> ScanSession<S> {
    /// Lists every asset under `root` up front.
    pub fn start(source: S, root: &str, recorder: Recorder, slice_size: usize) -> Result<Self> {
        info!("Starting scanning: {}", root);
        let paths = source.list_asset_paths(root)?;
        info!("Found {} assets", paths.len());

        Ok(Self {
            source,
            cursor: ScanCursor::new(paths),
            recorder,
            slice_size: slice_size.max(1),
        })
    }

    pub fn cursor(&self) -> &ScanCursor {
        &self.cursor
    }

    /// Processes one slice and hands its records to the recorder.
    pub fn tick(&mut self) -> TickOutcome {
        if self.cursor.is_finished() {
            return TickOutcome::Finished;
        }

        for (_, record) in self.cursor.next_slice(&self.source, self.slice_size) {
            self.recorder.submit(record);
        }

        let processed = self.cursor.position();
        let total = self.cursor.len();
        info!("Processed {}/{} assets", processed, total);
        TickOutcome::Progress { processed, total }
    }

    /// Waits for every submitted record to be written and closes the store.
    pub fn finish(mut self) -> Result<RecorderReport> {
        let report = self.recorder.shutdown()?;
        info!("Finished scanning ({} assets)", self.cursor.len());
        Ok(report)
    }
}

/// Ticks until the cursor is exhausted, then finishes the session.
/// `on_tick` receives `(processed, total)` after every slice.
pub fn run_to_completion<S, F>(mut session: ScanSession<S>, mut on_tick: F) -> Result<RecorderReport>
where
    S: AssetSource,
    F: FnMut(usize, usize),
{
    while let TickOutcome::Progress { processed, total } = session.tick() {
        on_tick(processed, total);
    }
    session.finish()
}
