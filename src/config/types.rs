use serde::Deserialize;

/// Main configuration structure for Lab-Scout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub model: ModelConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub rendering: RenderingConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub domains: DomainsConfig,
    #[serde(default, rename = "seed")]
    pub seeds: Vec<SeedEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum link depth from the seed URLs
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum number of URLs selected in one run
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Timeout applied to every fetch (milliseconds)
    #[serde(rename = "request-timeout-ms", default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Delay inserted before each fetch (milliseconds)
    #[serde(rename = "politeness-delay-ms", default)]
    pub politeness_delay_ms: u64,

    /// Maximum number of child links taken from one page
    #[serde(rename = "max-links-per-page", default = "default_max_links_per_page")]
    pub max_links_per_page: usize,

    /// Wall-clock budget for a whole run (seconds, 0 = unbounded)
    #[serde(rename = "run-timeout-secs", default)]
    pub run_timeout_secs: u64,

    /// Skip URLs that already have a stored record from an earlier run
    #[serde(rename = "skip-stored", default)]
    pub skip_stored: bool,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the user agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Relevance model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Snapshot file holding model parameters and scaler state
    #[serde(rename = "snapshot-path", default)]
    pub snapshot_path: Option<String>,

    /// SGD step size
    #[serde(rename = "learning-rate", default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Persist the snapshot every N updates (0 = only at end of run)
    #[serde(rename = "checkpoint-every", default = "default_checkpoint_every")]
    pub checkpoint_every: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            learning_rate: default_learning_rate(),
            checkpoint_every: default_checkpoint_every(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite record database
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the resume checkpoint (frontier + visited set)
    #[serde(rename = "checkpoint-path", default)]
    pub checkpoint_path: Option<String>,
}

/// Dynamic rendering configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderingConfig {
    /// Rendering service endpoint (Splash-style `render.html`)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// How long the renderer may wait for the page to become ready (milliseconds)
    #[serde(rename = "page-ready-timeout-ms", default)]
    pub page_ready_timeout_ms: u64,

    /// Domain patterns that always require dynamic rendering
    #[serde(rename = "dynamic-hosts", default)]
    pub dynamic_hosts: Vec<String>,
}

/// Which extraction capability to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    #[default]
    Heuristic,
    Llm,
}

/// Content extraction configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub mode: ExtractionMode,

    /// Populated key fields needed for a fully positive training label
    #[serde(rename = "min-populated-fields", default = "default_min_populated_fields")]
    pub min_populated_fields: u8,

    /// Maximum characters of page text handed to the LLM
    #[serde(rename = "max-content-chars", default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// OpenAI-compatible providers, tried in order
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::Heuristic,
            min_populated_fields: default_min_populated_fields(),
            max_content_chars: default_max_content_chars(),
            providers: Vec::new(),
        }
    }
}

/// One LLM provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    pub name: String,

    /// Base URL of the OpenAI-compatible API (e.g. "https://api.groq.com/openai/v1")
    #[serde(rename = "base-url")]
    pub base_url: String,

    pub model: String,

    /// Environment variable holding the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,
}

/// Domain scope configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DomainsConfig {
    /// Domain patterns that may be crawled (empty = everything not blocked)
    #[serde(default)]
    pub allow: Vec<String>,

    /// Domain patterns that are never crawled
    #[serde(default)]
    pub block: Vec<String>,
}

/// Seed URL with optional anchor text
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedEntry {
    pub url: String,
    #[serde(default)]
    pub anchor: String,
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_max_links_per_page() -> usize {
    64
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_checkpoint_every() -> u32 {
    10
}

fn default_min_populated_fields() -> u8 {
    1
}

fn default_max_content_chars() -> usize {
    12_000
}
