//! Content extraction
//!
//! Turns fetched page content into an [`ExtractionRecord`] or a typed
//! failure. Two implementations ship with the crate: a deterministic
//! heuristic extractor and an LLM-backed extractor that builds on it.

mod heuristic;
mod llm;
mod record;

pub use heuristic::{pre_extract, HeuristicExtractor};
pub use llm::{LlmExtractor, LlmProvider};
pub use record::{
    Department, Edurank, EntityKind, ExtractionRecord, LabEquipment, Location, PointOfContact,
    Publications, ResearchEntity, Teams,
};

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Extraction failures; all of them are per-task and non-fatal
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("No structured data found")]
    NoData,

    #[error("Malformed extraction output: {0}")]
    Malformed(String),

    #[error("Extraction service unavailable: {0}")]
    UpstreamUnavailable(String),
}

/// Fetched page handed to an extractor
#[derive(Debug, Clone)]
pub struct PageDocument {
    pub url: Url,
    pub html: String,
    pub title: Option<String>,
    /// Visible text of the main content sections
    pub text: String,
}

/// Guidance for the extractor
#[derive(Debug, Clone)]
pub struct SchemaHint {
    /// Force the record kind instead of deriving it from populated fields
    pub expected_kind: Option<EntityKind>,

    /// Upper bound on page text forwarded to remote services
    pub max_content_chars: usize,
}

impl Default for SchemaHint {
    fn default() -> Self {
        Self {
            expected_kind: None,
            max_content_chars: 12_000,
        }
    }
}

/// Extraction capability
///
/// Implementations must return the same record for identical content, up to
/// provider non-determinism.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        page: &PageDocument,
        hint: &SchemaHint,
    ) -> Result<ExtractionRecord, ExtractionError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Wraps an entity as a record, rejecting entities without content
pub(crate) fn finish_record(
    entity: ResearchEntity,
    hint: &SchemaHint,
) -> Result<ExtractionRecord, ExtractionError> {
    if !entity.has_content() {
        return Err(ExtractionError::NoData);
    }
    Ok(ExtractionRecord::new(entity, hint.expected_kind))
}
