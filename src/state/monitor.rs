//! Shared run status
//!
//! The orchestrator owns the live frontier, visited set and model. Readers on
//! other tasks only ever see the cloned `StatusSnapshot` published here.

use super::run_state::{RunOutcome, RunStatus, Stage};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Per-run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub pages_fetched: u64,
    pub fetch_failures: u64,
    pub extraction_failures: u64,
    pub storage_failures: u64,
    pub records_inserted: u64,
    pub records_updated: u64,
    pub duplicates: u64,
    pub skipped: u64,
    pub escalations: u64,
    pub links_enqueued: u64,
    pub model_updates: u64,
    pub persist_failures: u64,
}

impl RunCounters {
    /// Records the sink now holds because of this run
    pub fn records_stored(&self) -> u64 {
        self.records_inserted + self.records_updated
    }

    pub fn failures(&self) -> u64 {
        self.fetch_failures + self.extraction_failures + self.storage_failures
    }
}

/// Immutable view of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub status: RunStatus,
    pub stage: Stage,
    pub visited: u64,
    pub frontier_size: usize,
    pub current_url: Option<String>,
    pub run_id: Option<i64>,
    pub counters: RunCounters,
    #[serde(skip)]
    pub outcome: Option<RunOutcome>,
}

/// Publishes status snapshots for concurrent readers
#[derive(Debug, Clone, Default)]
pub struct RunMonitor {
    inner: Arc<Mutex<StatusSnapshot>>,
}

impl RunMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StatusSnapshot> {
        // Writers replace whole fields, so a poisoned snapshot is still coherent
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns a copy of the current snapshot
    pub fn snapshot(&self) -> StatusSnapshot {
        self.lock().clone()
    }

    /// Applies `f` to the published snapshot
    pub fn update<F: FnOnce(&mut StatusSnapshot)>(&self, f: F) {
        f(&mut self.lock());
    }

    /// Replaces the published snapshot
    pub fn publish(&self, snapshot: StatusSnapshot) {
        *self.lock() = snapshot;
    }

    pub fn status(&self) -> RunStatus {
        self.lock().status
    }
}

/// Cooperative stop flag, polled at the `Selecting` boundary
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop; returns false if one was already requested
    pub fn request(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
