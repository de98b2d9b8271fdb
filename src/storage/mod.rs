//! Storage module for persisting extracted records
//!
//! This module handles:
//! - SQLite database initialization and schema management
//! - Record upserts keyed by canonical URL (insert / update / duplicate)
//! - Run bookkeeping and the read-side statistics queries

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteRecordStore;
pub use traits::{RecordSink, RunSummary, StorageError, StorageResult, StoreOutcome};

use crate::extract::{EntityKind, ResearchEntity};
use std::path::Path;

/// Opens the record store at `path`
pub fn open_storage(path: &Path) -> StorageResult<SqliteRecordStore> {
    SqliteRecordStore::new(path)
}

/// A record as held by the store
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub url: String,
    pub domain: String,
    pub kind: EntityKind,
    pub quality: u8,
    pub entity: ResearchEntity,
    pub first_run: Option<i64>,
    pub last_run: Option<i64>,
    pub updated_at: String,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: String,
    pub pages_visited: i64,
    pub records_stored: i64,
    pub error_message: Option<String>,
}
