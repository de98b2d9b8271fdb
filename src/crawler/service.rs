//! Run service
//!
//! Hosts at most one crawl run at a time. `start` returns as soon as the run
//! is spawned; status and events are read from shared snapshots while the
//! orchestrator task owns the live state.

use crate::config::{Config, SeedEntry};
use crate::crawler::orchestrator::{Collaborators, Orchestrator, RunReport};
use crate::model::RelevanceModel;
use crate::state::{EventLog, LogBatch, RunMonitor, RunStatus, StatusSnapshot, StopSignal};
use crate::{ConfigError, ScoutError};
use std::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;

/// Parameters of a run
#[derive(Debug, Clone, Default)]
pub struct StartRequest {
    pub seeds: Vec<SeedEntry>,

    /// Restore frontier and visited set from the configured checkpoint
    pub resume: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartAck {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopAck {
    /// A stop was requested (or already pending)
    Stopping,

    /// No run is active
    NotRunning,
}

/// Starts, stops and observes crawl runs
pub struct CrawlService {
    config: Config,
    config_hash: String,
    collaborators: Collaborators,
    initial_model: Option<RelevanceModel>,
    monitor: RunMonitor,
    events: EventLog,
    stop: StopSignal,
    handle: Mutex<Option<JoinHandle<crate::Result<RunReport>>>>,
}

impl CrawlService {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        Self {
            config,
            config_hash: String::new(),
            collaborators,
            initial_model: None,
            monitor: RunMonitor::new(),
            events: EventLog::new(),
            stop: StopSignal::new(),
            handle: Mutex::new(None),
        }
    }

    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    /// Model used by runs when no snapshot path is configured
    pub fn with_model(mut self, model: RelevanceModel) -> Self {
        self.initial_model = Some(model);
        self
    }

    fn handle_slot(&self) -> MutexGuard<'_, Option<JoinHandle<crate::Result<RunReport>>>> {
        self.handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawns a run and returns immediately
    ///
    /// Fails if no seed is given and the run is not a resume.
    pub fn start(&self, request: StartRequest) -> crate::Result<StartAck> {
        if request.seeds.is_empty() && !request.resume {
            return Err(ScoutError::Config(ConfigError::Validation(
                "at least one seed URL is required".to_string(),
            )));
        }

        let mut slot = self.handle_slot();
        if self.monitor.status().is_active() {
            return Ok(StartAck::AlreadyRunning);
        }

        self.stop.reset();
        self.monitor.publish(StatusSnapshot {
            status: RunStatus::Running,
            ..StatusSnapshot::default()
        });

        let mut orchestrator = Orchestrator::new(self.config.clone(), self.collaborators.clone())
            .with_config_hash(self.config_hash.clone())
            .with_channels(self.monitor.clone(), self.events.clone(), self.stop.clone());
        if let Some(model) = &self.initial_model {
            orchestrator = orchestrator.with_model(model.clone());
        }

        let StartRequest { seeds, resume } = request;
        self.events
            .push(format!("Starting crawl run with {} seeds", seeds.len()));

        *slot = Some(tokio::spawn(async move {
            orchestrator.run_with_seeds(&seeds, resume).await
        }));

        Ok(StartAck::Started)
    }

    /// Requests a graceful stop; idempotent
    ///
    /// The task in flight finishes its pipeline before the run stops.
    pub fn stop(&self) -> StopAck {
        if !self.monitor.status().is_active() {
            return StopAck::NotRunning;
        }

        if self.stop.request() {
            self.events.push("Stop requested, finishing current task");
        }
        self.monitor.update(|s| {
            if s.status == RunStatus::Running {
                s.status = RunStatus::Stopping;
            }
        });
        StopAck::Stopping
    }

    pub fn status(&self) -> StatusSnapshot {
        self.monitor.snapshot()
    }

    /// Events with sequence number `>= cursor`
    pub fn logs_since(&self, cursor: u64) -> LogBatch {
        self.events.since(cursor)
    }

    pub fn is_running(&self) -> bool {
        self.monitor.status().is_active()
    }

    /// Waits for the current run to finish and returns its report
    pub async fn wait(&self) -> crate::Result<RunReport> {
        let handle = self.handle_slot().take();
        let Some(handle) = handle else {
            return Err(ScoutError::Internal("no crawl run was started".to_string()));
        };

        handle
            .await
            .map_err(|e| ScoutError::Internal(format!("crawl task panicked: {}", e)))?
    }
}
