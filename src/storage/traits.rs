//! Record sink trait and error types

use crate::extract::ExtractionRecord;
use thiserror::Error;
use url::Url;

/// Errors that can occur while persisting records
///
/// Both variants are per-task failures for the orchestrator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage conflict: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => Self::Conflict(e.to_string()),
            _ => Self::Unavailable(e.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// What a `store` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// First record for this URL
    Inserted,
    /// The URL had a record with different content; it was replaced
    Updated,
    /// An identical record already exists; nothing changed
    Duplicate,
}

/// Final bookkeeping for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub status: String,
    pub pages_visited: u64,
    pub records_stored: u64,
    pub error_message: Option<String>,
}

/// Destination for extracted records
///
/// Records are keyed by canonical (normalized) URL; storing the same content
/// twice is a `Duplicate`, not an error.
pub trait RecordSink: Send + Sync {
    fn store(
        &self,
        url: &Url,
        record: &ExtractionRecord,
        run_id: Option<i64>,
    ) -> StorageResult<StoreOutcome>;

    /// Returns true if a record for `url` exists
    fn contains(&self, url: &Url) -> StorageResult<bool>;

    /// Opens a run record and returns its id
    fn begin_run(&self, config_hash: &str) -> StorageResult<i64>;

    /// Closes a run record
    fn finish_run(&self, run_id: i64, summary: &RunSummary) -> StorageResult<()>;
}
