//! Crawler module for the crawl engine
//!
//! This module contains the core crawling logic, including:
//! - Page fetching (static and rendered) behind the `Fetcher` trait
//! - Render-mode detection
//! - HTML parsing, link and text extraction
//! - The relevance-ranked frontier
//! - The orchestrator state machine and the run service around it

mod detector;
mod fetcher;
mod frontier;
mod orchestrator;
mod parser;
mod service;

pub use detector::{Detector, STATIC_EXTENSIONS};
pub use fetcher::{build_http_client, FetchError, FetchMode, Fetcher, HttpFetcher, PageContent};
pub use frontier::{CrawlTask, Frontier, FrontierEntry, VisitedSet};
pub use orchestrator::{Collaborators, Orchestrator, RunReport};
pub use parser::{parse_html, visible_text, DiscoveredLink, PageStructure, ParsedPage};
pub use service::{CrawlService, StartAck, StartRequest, StopAck};

use crate::config::{Config, ExtractionMode};
use crate::extract::{Extractor, HeuristicExtractor, LlmExtractor};
use crate::storage::SqliteRecordStore;
use std::path::Path;
use std::sync::Arc;

/// Builds the default collaborators described by `config`
///
/// 1. An `HttpFetcher`, with the rendering service if one is configured
/// 2. The configured extractor; LLM mode without a usable provider falls
///    back to heuristic extraction
/// 3. The SQLite record store at `output.database-path`
pub fn build_collaborators(config: &Config) -> crate::Result<Collaborators> {
    let fetcher = HttpFetcher::from_config(config)?;

    let extractor: Arc<dyn Extractor> = match config.extraction.mode {
        ExtractionMode::Heuristic => Arc::new(HeuristicExtractor::new()),
        ExtractionMode::Llm => {
            let llm = LlmExtractor::from_config(fetcher.client().clone(), &config.extraction);
            if llm.provider_count() == 0 {
                tracing::warn!("No LLM provider has an API key, using heuristic extraction");
                Arc::new(HeuristicExtractor::new())
            } else {
                tracing::info!("Using {} LLM provider(s)", llm.provider_count());
                Arc::new(llm)
            }
        }
    };

    let sink = SqliteRecordStore::new(Path::new(&config.output.database_path))?;

    Ok(Collaborators {
        fetcher: Arc::new(fetcher),
        extractor,
        sink: Arc::new(sink),
    })
}
