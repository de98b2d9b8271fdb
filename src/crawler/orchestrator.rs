//! Crawl orchestrator - the sequential crawl state machine
//!
//! This module contains the crawl loop. One task is carried through
//! `Detecting → Scraping → Extracting → Storing → Updating` before the next one
//! is selected, so the relevance model observes every outcome in order and the
//! frontier is re-ranked before each selection.
//!
//! All mutable run state (frontier, visited set, model, counters) is owned by
//! the `Orchestrator` value; concurrent readers only see the snapshots
//! published through its `RunMonitor` and `EventLog`.

use crate::config::{Config, SeedEntry};
use crate::crawler::detector::Detector;
use crate::crawler::fetcher::{FetchError, FetchMode, Fetcher, PageContent};
use crate::crawler::frontier::{CrawlTask, Frontier, FrontierEntry, VisitedSet};
use crate::crawler::parser::{parse_html, DiscoveredLink, ParsedPage};
use crate::extract::{ExtractionError, Extractor, PageDocument, SchemaHint};
use crate::model::{link_features, RelevanceModel};
use crate::state::{
    EventLog, RunCheckpoint, RunCounters, RunMonitor, RunOutcome, RunStatus, Severity, Stage,
    StatusSnapshot, StopSignal,
};
use crate::storage::{RecordSink, RunSummary, StorageError, StoreOutcome};
use crate::url::{is_followable_url, normalize_url, DomainScope};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// Parent relevance assigned to seed URLs
const SEED_PARENT_RELEVANCE: f64 = 1.0;

/// The collaborators a run talks to
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<dyn Extractor>,
    pub sink: Arc<dyn RecordSink>,
}

/// Summary returned when a run reaches `Stopped`
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub run_id: Option<i64>,
    pub visited: usize,
    pub frontier_remaining: usize,
    pub counters: RunCounters,
}

/// Why a single task produced a zero label
#[derive(Debug, Error)]
enum TaskFailure {
    #[error("fetch: {0}")]
    Fetch(#[from] FetchError),

    #[error("extraction: {0}")]
    Extract(#[from] ExtractionError),

    #[error("storage: {0}")]
    Store(#[from] StorageError),
}

type StageResult<T> = Result<T, TaskFailure>;

/// Fetched content with its parse
struct Scraped {
    content: PageContent,
    page: ParsedPage,
}

impl Scraped {
    fn parse(content: PageContent) -> Self {
        let page = parse_html(&content.body, &content.url);
        Self { content, page }
    }

    /// The structural check only applies to HTML documents
    fn needs_rendering(&self) -> bool {
        let content_type = self.content.content_type.to_ascii_lowercase();
        let is_html = content_type.is_empty() || content_type.contains("html");
        is_html && !self.page.structure.is_complete()
    }
}

/// Main crawl state machine
pub struct Orchestrator {
    config: Config,
    config_hash: String,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    sink: Arc<dyn RecordSink>,
    detector: Detector,
    scope: DomainScope,
    hint: SchemaHint,
    model: RelevanceModel,
    frontier: Frontier,
    visited: VisitedSet,
    /// Tasks selected by this run; resumed visits do not count
    selected: u64,
    stage: Stage,
    counters: RunCounters,
    run_id: Option<i64>,
    started_at: Option<Instant>,
    outcome: Option<RunOutcome>,
    monitor: RunMonitor,
    events: EventLog,
    stop: StopSignal,
}

impl Orchestrator {
    /// Creates an orchestrator with a fresh default model
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        let model = RelevanceModel::with_learning_rate(config.model.learning_rate);
        let hint = SchemaHint {
            expected_kind: None,
            max_content_chars: config.extraction.max_content_chars,
        };

        Self {
            detector: Detector::from_config(&config.rendering),
            scope: DomainScope::from_config(&config.domains),
            config_hash: String::new(),
            fetcher: collaborators.fetcher,
            extractor: collaborators.extractor,
            sink: collaborators.sink,
            hint,
            model,
            frontier: Frontier::new(),
            visited: VisitedSet::new(),
            selected: 0,
            stage: Stage::Initializing,
            counters: RunCounters::default(),
            run_id: None,
            started_at: None,
            outcome: None,
            monitor: RunMonitor::new(),
            events: EventLog::new(),
            stop: StopSignal::new(),
            config,
        }
    }

    /// Hash recorded with the run
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    /// Starts from `model` instead of the default parameters
    ///
    /// A readable snapshot with the same feature layout still takes precedence
    /// at initialization.
    pub fn with_model(mut self, model: RelevanceModel) -> Self {
        self.model = model;
        self
    }

    /// Shares status, events and stop signal with an outside observer
    pub fn with_channels(mut self, monitor: RunMonitor, events: EventLog, stop: StopSignal) -> Self {
        self.monitor = monitor;
        self.events = events;
        self.stop = stop;
        self
    }

    pub fn monitor(&self) -> &RunMonitor {
        &self.monitor
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub fn model(&self) -> &RelevanceModel {
        &self.model
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn visited(&self) -> &VisitedSet {
        &self.visited
    }

    pub fn counters(&self) -> RunCounters {
        self.counters
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    pub fn run_id(&self) -> Option<i64> {
        self.run_id
    }

    /// Initializes and runs to completion
    pub async fn run_with_seeds(
        &mut self,
        seeds: &[SeedEntry],
        resume: bool,
    ) -> crate::Result<RunReport> {
        if let Err(e) = self.initialize(seeds, resume) {
            self.stop_with(RunOutcome::Failed(e.to_string()));
            return Err(e);
        }
        self.run().await
    }

    /// The `Initializing` stage
    ///
    /// Loads the model snapshot, restores the resume checkpoint when asked to,
    /// scores the seeds into the frontier and opens a run record.
    pub fn initialize(&mut self, seeds: &[SeedEntry], resume: bool) -> crate::Result<()> {
        self.started_at = Some(Instant::now());
        self.selected = 0;
        self.outcome = None;
        self.enter(Stage::Initializing, None);

        if let Some(path) = &self.config.model.snapshot_path {
            let fallback = self.model.clone();
            self.model = RelevanceModel::load_or(Path::new(path), fallback);
            self.model.set_learning_rate(self.config.model.learning_rate);
        }

        if resume {
            self.restore_checkpoint();
        }

        let mut queued = 0usize;
        for seed in seeds {
            let url = match normalize_url(&seed.url) {
                Ok(url) => url,
                Err(e) => {
                    self.emit_with(
                        Severity::Warning,
                        format!("Skipping invalid seed {}: {}", seed.url, e),
                    );
                    continue;
                }
            };

            if self.visited.contains(&url) {
                tracing::debug!("Seed {} already visited in resumed run", url);
                continue;
            }

            let features = link_features(url.as_str(), &seed.anchor, SEED_PARENT_RELEVANCE);
            let score = self.model.score(&features);
            if self
                .frontier
                .push(CrawlTask::seed(url, seed.anchor.clone()), score, features)
            {
                queued += 1;
            }
        }

        match self.sink.begin_run(&self.config_hash) {
            Ok(run_id) => self.run_id = Some(run_id),
            Err(e) => self.emit_with(
                Severity::Warning,
                format!("Run bookkeeping unavailable, continuing without a run id: {}", e),
            ),
        }

        self.emit(format!(
            "Run started: {} seeds queued, {} URLs in frontier",
            queued,
            self.frontier.len()
        ));
        self.publish(None);
        Ok(())
    }

    fn restore_checkpoint(&mut self) {
        let Some(path) = self.config.output.checkpoint_path.clone() else {
            self.emit_with(
                Severity::Warning,
                "Resume requested but no checkpoint-path is configured",
            );
            return;
        };

        let checkpoint = match RunCheckpoint::load(Path::new(&path)) {
            Ok(Some(checkpoint)) => checkpoint,
            Ok(None) => {
                tracing::info!("No checkpoint at {}, starting from seeds", path);
                return;
            }
            Err(e) => {
                self.emit_with(Severity::Warning, format!("Ignoring checkpoint: {}", e));
                return;
            }
        };

        for url in checkpoint.visited.iter().filter_map(|u| normalize_url(u).ok()) {
            self.visited.insert(&url);
            self.frontier.mark_seen(&url);
        }

        for entry in checkpoint.frontier {
            let Ok(url) = normalize_url(&entry.url) else {
                continue;
            };
            if self.visited.contains(&url) {
                continue;
            }

            let task = CrawlTask {
                url,
                parent_url: entry.parent_url.as_deref().and_then(|u| Url::parse(u).ok()),
                anchor_text: entry.anchor_text,
                depth: entry.depth,
            };
            let score = self.model.score(&entry.features);
            self.frontier.push(task, score, entry.features);
        }

        self.emit(format!(
            "Resumed from checkpoint: {} visited, {} queued",
            self.visited.len(),
            self.frontier.len()
        ));
    }

    /// Runs until the state machine reaches `Stopped`
    pub async fn run(&mut self) -> crate::Result<RunReport> {
        loop {
            if let Some(outcome) = self.step().await? {
                return Ok(self.report(outcome));
            }
        }
    }

    /// One pass through `Selecting` and, if a task was selected, its pipeline
    ///
    /// Returns the outcome once the run has stopped. A fatal error stops the
    /// run with `RunOutcome::Failed` and is returned.
    pub async fn step(&mut self) -> crate::Result<Option<RunOutcome>> {
        if let Some(outcome) = &self.outcome {
            return Ok(Some(outcome.clone()));
        }

        self.enter(Stage::Selecting, None);

        if let Some(outcome) = self.stop_condition() {
            self.stop_with(outcome.clone());
            return Ok(Some(outcome));
        }

        let Some(entry) = self.frontier.pop() else {
            self.stop_with(RunOutcome::Completed);
            return Ok(Some(RunOutcome::Completed));
        };

        self.visited.insert(&entry.task.url);
        self.selected += 1;
        self.publish(Some(&entry.task.url));

        if self.config.crawler.skip_stored {
            match self.sink.contains(&entry.task.url) {
                Ok(true) => {
                    self.counters.skipped += 1;
                    self.emit(format!("Skipping {} (already stored)", entry.task.url));
                    return Ok(None);
                }
                Ok(false) => {}
                Err(e) => self.emit_with(
                    Severity::Warning,
                    format!("Could not check stored records for {}: {}", entry.task.url, e),
                ),
            }
        }

        if let Err(e) = self.process(entry).await {
            self.stop_with(RunOutcome::Failed(e.to_string()));
            return Err(e);
        }

        Ok(None)
    }

    fn stop_condition(&self) -> Option<RunOutcome> {
        if self.stop.is_requested() {
            return Some(RunOutcome::Halted);
        }

        if self.selected >= u64::from(self.config.crawler.max_pages) {
            return Some(RunOutcome::LimitReached);
        }

        let budget = self.config.crawler.run_timeout_secs;
        if budget > 0 {
            let elapsed = self.started_at.map(|t| t.elapsed()).unwrap_or_default();
            if elapsed >= Duration::from_secs(budget) {
                return Some(RunOutcome::LimitReached);
            }
        }

        None
    }

    /// Carries one task through the pipeline
    ///
    /// Per-task failures end in a zero label; only model errors escape.
    async fn process(&mut self, entry: FrontierEntry) -> crate::Result<()> {
        let url = entry.task.url.clone();

        self.enter(Stage::Detecting, Some(&url));
        let mode = self.detector.detect(&url);
        tracing::debug!("Selected {} fetch for {}", mode, url);

        self.enter(Stage::Scraping, Some(&url));
        let politeness = self.config.crawler.politeness_delay_ms;
        if politeness > 0 {
            tokio::time::sleep(Duration::from_millis(politeness)).await;
        }

        let (result, links) = match self.scrape(&url, mode).await {
            Ok(scraped) => {
                self.counters.pages_fetched += 1;
                let result = self.extract_and_store(&entry.task, &scraped).await;
                (result, scraped.page.links)
            }
            Err(e) => {
                self.counters.fetch_failures += 1;
                self.emit(format!("Fetch failed for {}: {}", url, e));
                (Err(TaskFailure::from(e)), Vec::new())
            }
        };

        let label = match &result {
            Ok(quality) => self.label_for(*quality),
            Err(failure) => {
                tracing::debug!("Task {} ended with {}", url, failure);
                0.0
            }
        };

        self.enter(Stage::Updating, Some(&url));
        self.learn(&entry, label)?;
        self.enqueue_children(&entry, links);
        self.checkpoint_if_due();
        self.publish(Some(&url));
        Ok(())
    }

    /// Training label for an extraction of the given quality
    fn label_for(&self, quality: u8) -> f64 {
        let needed = f64::from(self.config.extraction.min_populated_fields.max(1));
        (f64::from(quality) / needed).min(1.0)
    }

    async fn fetch_bounded(&self, url: &Url, mode: FetchMode) -> Result<PageContent, FetchError> {
        let limit = Duration::from_millis(self.config.crawler.request_timeout_ms);
        match tokio::time::timeout(limit, self.fetcher.fetch(url, mode)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }

    /// The `Scraping` stage, including escalation and fallback
    async fn scrape(&mut self, url: &Url, mode: FetchMode) -> Result<Scraped, FetchError> {
        if mode == FetchMode::Dynamic {
            match self.fetch_bounded(url, FetchMode::Dynamic).await {
                Ok(content) => return Ok(Scraped::parse(content)),
                Err(e) => self.emit_with(
                    Severity::Warning,
                    format!("Dynamic fetch of {} unavailable ({}), using static fetch", url, e),
                ),
            }
            let content = self.fetch_bounded(url, FetchMode::Static).await?;
            return Ok(Scraped::parse(content));
        }

        let scraped = Scraped::parse(self.fetch_bounded(url, FetchMode::Static).await?);
        if !scraped.needs_rendering() {
            return Ok(scraped);
        }

        self.counters.escalations += 1;
        self.detector.record_structural_failure(url);
        self.emit_with(
            Severity::Warning,
            format!(
                "Static content of {} looks incomplete ({:?}), escalating to dynamic rendering",
                url, scraped.page.structure
            ),
        );

        match self.fetch_bounded(url, FetchMode::Dynamic).await {
            Ok(content) => Ok(Scraped::parse(content)),
            Err(e) => {
                self.emit_with(
                    Severity::Warning,
                    format!("Rendering {} unavailable ({}), keeping static content", url, e),
                );
                Ok(scraped)
            }
        }
    }

    /// The `Extracting` and `Storing` stages; returns the record quality
    async fn extract_and_store(&mut self, task: &CrawlTask, scraped: &Scraped) -> StageResult<u8> {
        self.enter(Stage::Extracting, Some(&task.url));

        let document = PageDocument {
            url: scraped.content.url.clone(),
            html: scraped.content.body.clone(),
            title: scraped.page.title.clone(),
            text: scraped.page.text.clone(),
        };

        let record = match self.extractor.extract(&document, &self.hint).await {
            Ok(record) => record,
            Err(ExtractionError::NoData) => {
                self.counters.extraction_failures += 1;
                self.emit(format!("No record extracted from {}", task.url));
                return Err(ExtractionError::NoData.into());
            }
            Err(e) => {
                self.counters.extraction_failures += 1;
                self.emit(format!(
                    "Extraction failed for {} ({}): {}",
                    task.url,
                    self.extractor.name(),
                    e
                ));
                return Err(e.into());
            }
        };

        self.enter(Stage::Storing, Some(&task.url));
        match self.sink.store(&task.url, &record, self.run_id) {
            Ok(outcome) => {
                match outcome {
                    StoreOutcome::Inserted => {
                        self.counters.records_inserted += 1;
                        self.emit(format!(
                            "Stored {} record for {} (quality {}/4)",
                            record.kind.as_str(),
                            task.url,
                            record.quality
                        ));
                    }
                    StoreOutcome::Updated => {
                        self.counters.records_updated += 1;
                        self.emit(format!(
                            "Stored updated {} record for {}",
                            record.kind.as_str(),
                            task.url
                        ));
                    }
                    StoreOutcome::Duplicate => {
                        self.counters.duplicates += 1;
                        self.emit(format!("Record for {} unchanged", task.url));
                    }
                }
                Ok(record.quality)
            }
            Err(e) => {
                self.counters.storage_failures += 1;
                self.emit(format!("Storage failed for {}: {}", task.url, e));
                Err(e.into())
            }
        }
    }

    /// The model half of `Updating`
    fn learn(&mut self, entry: &FrontierEntry, label: f64) -> crate::Result<()> {
        let before = self.model.score(&entry.features);
        self.model.update(&entry.features, label)?;
        self.counters.model_updates += 1;
        tracing::debug!(
            "Updated model on {} with label {:.2}: {:.4} -> {:.4}",
            entry.task.url,
            label,
            before,
            self.model.score(&entry.features)
        );

        let model = &self.model;
        self.frontier.rescore(|features| model.score(features));
        Ok(())
    }

    /// Periodic checkpoint, taken once the task's children are queued
    fn checkpoint_if_due(&mut self) {
        let every = u64::from(self.config.model.checkpoint_every);
        if every > 0 && self.counters.model_updates % every == 0 {
            self.persist_model();
            self.save_checkpoint();
        }
    }

    /// The frontier half of `Updating`
    fn enqueue_children(&mut self, parent: &FrontierEntry, links: Vec<DiscoveredLink>) {
        if parent.task.depth >= self.config.crawler.max_depth {
            return;
        }

        let limit = self.config.crawler.max_links_per_page;
        let mut added = 0usize;
        for link in links {
            if added >= limit {
                break;
            }

            let Ok(url) = normalize_url(link.url.as_str()) else {
                continue;
            };
            if !is_followable_url(&url) || !self.scope.allows(&url) || self.frontier.is_seen(&url)
            {
                continue;
            }

            let features = link_features(url.as_str(), &link.anchor_text, parent.score);
            let score = self.model.score(&features);
            let task = CrawlTask::child(&parent.task, url, link.anchor_text);
            if self.frontier.push(task, score, features) {
                added += 1;
            }
        }

        self.counters.links_enqueued += added as u64;
        tracing::debug!("Queued {} links from {}", added, parent.task.url);
    }

    fn persist_model(&mut self) {
        let Some(path) = self.config.model.snapshot_path.clone() else {
            return;
        };
        match self.model.persist(Path::new(&path)) {
            Ok(()) => tracing::debug!("Model snapshot written to {}", path),
            Err(e) => {
                self.counters.persist_failures += 1;
                self.emit(format!("Model checkpoint failed: {}", e));
            }
        }
    }

    fn save_checkpoint(&mut self) {
        let Some(path) = self.config.output.checkpoint_path.clone() else {
            return;
        };
        let checkpoint = RunCheckpoint::new(
            self.frontier.entries().map(FrontierEntry::to_checkpoint).collect(),
            self.visited.iter().map(String::from).collect(),
        );
        if let Err(e) = checkpoint.save(Path::new(&path)) {
            self.counters.persist_failures += 1;
            self.emit(format!("Run checkpoint failed: {}", e));
        }
    }

    /// Moves to `Stopped`, writing the final checkpoints and run record
    fn stop_with(&mut self, outcome: RunOutcome) {
        match &outcome {
            // Parameters may be half-updated after a fatal model error
            RunOutcome::Failed(_) => self.save_checkpoint(),
            RunOutcome::Completed => {
                self.persist_model();
                if let Some(path) = &self.config.output.checkpoint_path {
                    if let Err(e) = RunCheckpoint::clear(Path::new(path)) {
                        tracing::warn!("Could not remove checkpoint {}: {}", path, e);
                    }
                }
            }
            RunOutcome::Halted | RunOutcome::LimitReached => {
                self.persist_model();
                self.save_checkpoint();
            }
        }

        if let Some(run_id) = self.run_id {
            let summary = RunSummary {
                status: outcome.to_db_string().to_string(),
                pages_visited: self.visited.len() as u64,
                records_stored: self.counters.records_stored(),
                error_message: outcome.error_message().map(String::from),
            };
            if let Err(e) = self.sink.finish_run(run_id, &summary) {
                tracing::warn!("Could not close run {}: {}", run_id, e);
            }
        }

        let message = match &outcome {
            RunOutcome::Completed => format!(
                "Run completed: {} pages visited, {} records stored",
                self.visited.len(),
                self.counters.records_stored()
            ),
            RunOutcome::Halted => format!(
                "Run halted on request after {} pages, {} URLs left in frontier",
                self.visited.len(),
                self.frontier.len()
            ),
            RunOutcome::LimitReached => format!(
                "Run finished at its limit: {} pages visited, {} URLs left in frontier",
                self.visited.len(),
                self.frontier.len()
            ),
            RunOutcome::Failed(e) => format!("Run failed: {}", e),
        };

        self.stage = Stage::Stopped;
        self.outcome = Some(outcome);
        self.emit(message);
        self.publish(None);
    }

    fn report(&self, outcome: RunOutcome) -> RunReport {
        RunReport {
            outcome,
            run_id: self.run_id,
            visited: self.visited.len(),
            frontier_remaining: self.frontier.len(),
            counters: self.counters,
        }
    }

    /// Records a stage transition
    fn enter(&mut self, stage: Stage, url: Option<&Url>) {
        self.stage = stage;
        match url {
            Some(url) if stage.is_task_stage() => {
                self.events.push_with(Severity::Info, format!("{}: {}", stage, url));
                tracing::trace!("{} {}", stage, url);
            }
            _ => tracing::trace!("{}", stage),
        }
        self.publish(url);
    }

    fn publish(&self, current: Option<&Url>) {
        let status = if self.outcome.is_some() {
            RunStatus::Stopped
        } else if self.stop.is_requested() {
            RunStatus::Stopping
        } else {
            RunStatus::Running
        };

        self.monitor.publish(StatusSnapshot {
            status,
            stage: self.stage,
            visited: self.visited.len() as u64,
            frontier_size: self.frontier.len(),
            current_url: current.map(Url::to_string),
            run_id: self.run_id,
            counters: self.counters,
            outcome: self.outcome.clone(),
        });
    }

    /// Logs a message with inferred severity
    fn emit(&self, message: impl Into<String>) {
        let message = message.into();
        let severity = Severity::infer(&message);
        self.emit_with(severity, message);
    }

    fn emit_with(&self, severity: Severity, message: impl Into<String>) {
        let event = self.events.push_with(severity, message);
        match event.severity {
            Severity::Error => tracing::error!("{}", event.message),
            Severity::Warning => tracing::warn!("{}", event.message),
            Severity::Info | Severity::Success => tracing::info!("{}", event.message),
        }
    }
}
