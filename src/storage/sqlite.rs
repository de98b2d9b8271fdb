//! SQLite record store
//!
//! This module provides a SQLite-backed implementation of the RecordSink trait
//! plus the read-side queries used by `--stats`.

use crate::extract::{EntityKind, ExtractionRecord, ResearchEntity};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordSink, RunSummary, StorageError, StorageResult, StoreOutcome};
use crate::storage::{RunRecord, StoredRecord};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use url::Url;

/// SQLite storage backend
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Opens (or creates) the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Unavailable(format!("{}: {}", parent.display(), e)))?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("connection lock poisoned".to_string()))
    }

    /// Loads the stored record for a URL
    pub fn get_record(&self, url: &Url) -> StorageResult<Option<StoredRecord>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT url, domain, kind, quality, payload, first_run, last_run, updated_at
                 FROM entities WHERE url = ?1",
                params![url.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, u8>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<i64>>(5)?,
                        row.get::<_, Option<i64>>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((url, domain, kind, quality, payload, first_run, last_run, updated_at)) = row
        else {
            return Ok(None);
        };

        let entity: ResearchEntity = serde_json::from_str(&payload)
            .map_err(|e| StorageError::Conflict(format!("corrupt payload for {}: {}", url, e)))?;

        Ok(Some(StoredRecord {
            url,
            domain,
            kind: EntityKind::from_db_string(&kind).unwrap_or(EntityKind::Institution),
            quality,
            entity,
            first_run,
            last_run,
            updated_at,
        }))
    }

    /// Gets the most recent run
    pub fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let conn = self.conn()?;
        let run = conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status,
                        pages_visited, records_stored, error_message
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(RunRecord {
                        id: row.get(0)?,
                        started_at: row.get(1)?,
                        finished_at: row.get(2)?,
                        config_hash: row.get(3)?,
                        status: row.get(4)?,
                        pages_visited: row.get(5)?,
                        records_stored: row.get(6)?,
                        error_message: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(run)
    }

    pub fn count_records(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn count_domains(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT domain) FROM entities",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn count_runs(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Record count per entity kind
    pub fn count_by_kind(&self) -> StorageResult<HashMap<EntityKind, u64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT kind, COUNT(*) FROM entities GROUP BY kind")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (kind, count) = row?;
            if let Some(kind) = EntityKind::from_db_string(&kind) {
                counts.insert(kind, count as u64);
            }
        }
        Ok(counts)
    }

    /// Record count per quality value, ascending
    pub fn quality_breakdown(&self) -> StorageResult<Vec<(u8, u64)>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT quality, COUNT(*) FROM entities GROUP BY quality ORDER BY quality")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, u8>(0)?, row.get::<_, i64>(1)?)))?;

        rows.map(|row| row.map(|(q, c)| (q, c as u64)).map_err(StorageError::from))
            .collect()
    }

    /// Domains with the most records
    pub fn top_domains(&self, limit: usize) -> StorageResult<Vec<(String, u64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT domain, COUNT(*) AS n FROM entities GROUP BY domain
             ORDER BY n DESC, domain ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        rows.map(|row| row.map_err(StorageError::from)).collect()
    }
}

fn content_hash(kind: EntityKind, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

impl RecordSink for SqliteRecordStore {
    fn store(
        &self,
        url: &Url,
        record: &ExtractionRecord,
        run_id: Option<i64>,
    ) -> StorageResult<StoreOutcome> {
        let payload = serde_json::to_string(&record.entity)
            .map_err(|e| StorageError::Unavailable(format!("encode entity: {}", e)))?;
        let hash = content_hash(record.kind, &payload);
        let domain = url.host_str().unwrap_or_default().to_lowercase();
        let now = Utc::now().to_rfc3339();

        let conn = self.conn()?;
        let existing: Option<String> = conn
            .query_row(
                "SELECT content_hash FROM entities WHERE url = ?1",
                params![url.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            None => {
                conn.execute(
                    "INSERT INTO entities
                        (url, domain, kind, quality, payload, content_hash,
                         first_run, last_run, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?8, ?8)",
                    params![
                        url.as_str(),
                        domain,
                        record.kind.as_str(),
                        record.quality,
                        payload,
                        hash,
                        run_id,
                        now
                    ],
                )?;
                Ok(StoreOutcome::Inserted)
            }
            Some(existing_hash) if existing_hash == hash => Ok(StoreOutcome::Duplicate),
            Some(_) => {
                conn.execute(
                    "UPDATE entities
                     SET kind = ?2, quality = ?3, payload = ?4, content_hash = ?5,
                         last_run = ?6, updated_at = ?7
                     WHERE url = ?1",
                    params![
                        url.as_str(),
                        record.kind.as_str(),
                        record.quality,
                        payload,
                        hash,
                        run_id,
                        now
                    ],
                )?;
                Ok(StoreOutcome::Updated)
            }
        }
    }

    fn contains(&self, url: &Url) -> StorageResult<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM entities WHERE url = ?1",
                params![url.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn begin_run(&self, config_hash: &str) -> StorageResult<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, 'running')",
            params![Utc::now().to_rfc3339(), config_hash],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn finish_run(&self, run_id: i64, summary: &RunSummary) -> StorageResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE runs SET status = ?2, finished_at = ?3, pages_visited = ?4,
                             records_stored = ?5, error_message = ?6
             WHERE id = ?1",
            params![
                run_id,
                summary.status,
                Utc::now().to_rfc3339(),
                summary.pages_visited as i64,
                summary.records_stored as i64,
                summary.error_message
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::Conflict(format!("run {} not found", run_id)));
        }
        Ok(())
    }
}
