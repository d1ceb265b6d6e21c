//! # game-content-recorder
//!
//! Scans an Unreal project's content into SQLite.
//!
//! - `ingest` enumerates assets and extracts their metadata through an
//!   [`AssetSource`](ingest::source::AssetSource)
//! - `database` batches records on a background writer thread and persists
//!   them with insert-or-ignore semantics keyed on the package path

pub mod database;
pub mod ingest;
pub mod utils;

use std::path::PathBuf;

pub use database::recorder::{Recorder, RecorderReport, RecorderState, DEFAULT_BATCH_THRESHOLD};
pub use database::repo::AssetRecord;
pub use ingest::source::{AssetSource, StaticSource};
pub use ingest::content_dir::ContentDirSource;
pub use ingest::scheduler::{ScanCursor, ScanSession, TickOutcome};

pub type Result<T> = std::result::Result<T, RecorderError>;

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("Failed to initialize asset store at {path:?}: {source}")]
    StorageInit {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Failed to encode record field: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Recorder is closed")]
    Closed,

    #[error("DB writer thread panicked")]
    WriterPanicked,
}
