//! Shared fixtures for the integration tests

use async_trait::async_trait;
use lab_scout::config::{parse_config, Config, SeedEntry};
use lab_scout::crawler::{Collaborators, FetchError, FetchMode, Fetcher, Orchestrator, PageContent};
use lab_scout::extract::HeuristicExtractor;
use lab_scout::state::StopSignal;
use lab_scout::storage::SqliteRecordStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// A page with enough structure for the heuristic extractor to yield a
/// quality-4 lab record
pub const LAB_PAGE: &str = r#"
<html>
<head><title>Photonics Lab | University of Example</title></head>
<body>
  <main>
    <p>The Photonics Lab carries out research on integrated optics, quantum light sources
       and machine learning for physics experiments across three buildings.</p>
    <h3>Equipment and Facilities</h3>
    <ul><li>Femtosecond laser</li><li>Cleanroom</li></ul>
    <a href="https://scholar.google.com/citations?user=abc">Google Scholar</a>
  </main>
</body>
</html>
"#;

/// `[crawler]` keys used unless the test sets them itself
const CRAWLER_DEFAULTS: &[(&str, &str)] = &[
    ("max-depth", "2"),
    ("max-pages", "20"),
    ("request-timeout-ms", "1000"),
];

/// Minimal valid configuration with a few overridable keys
pub fn config_toml(extra_crawler: &str, extra_sections: &str) -> String {
    full_config_toml(extra_crawler, "", extra_sections)
}

/// `[crawler]` body: the caller's keys plus every default it leaves unset
fn crawler_section(extra_crawler: &str) -> String {
    let overridden: Vec<&str> = extra_crawler
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, _)| key.trim())
        .collect();

    let mut lines: Vec<String> = CRAWLER_DEFAULTS
        .iter()
        .filter(|(key, _)| !overridden.contains(key))
        .map(|(key, value)| format!("{} = {}", key, value))
        .collect();
    lines.push(extra_crawler.to_string());
    lines.join("\n")
}

pub fn full_config_toml(extra_crawler: &str, extra_output: &str, extra_sections: &str) -> String {
    let crawler = crawler_section(extra_crawler);
    format!(
        r#"
[crawler]
{crawler}

[user-agent]
crawler-name = "TestScout"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "unused.db"
{extra_output}

{extra_sections}
"#
    )
}

pub fn config(extra_crawler: &str, extra_sections: &str) -> Config {
    parse_config(&config_toml(extra_crawler, extra_sections)).expect("valid test config")
}

/// Configuration with extra `[output]` keys
pub fn config_with_output(extra_crawler: &str, extra_output: &str, extra_sections: &str) -> Config {
    parse_config(&full_config_toml(extra_crawler, extra_output, extra_sections))
        .expect("valid test config")
}

pub fn seed(url: &str) -> SeedEntry {
    SeedEntry {
        url: url.to_string(),
        anchor: String::new(),
    }
}

pub fn url(s: &str) -> Url {
    Url::parse(s).expect("valid test URL")
}

/// Scripted response of the mock fetcher
#[derive(Clone)]
pub enum Scripted {
    Html(String),
    Fail(FetchError),
    Slow(Duration, String),
}

/// Fetcher serving scripted responses and recording every call
#[derive(Default)]
pub struct MockFetcher {
    static_pages: HashMap<String, Scripted>,
    dynamic_pages: HashMap<String, Scripted>,
    calls: Mutex<Vec<(String, FetchMode)>>,
    stop_on: Option<(String, StopSignal)>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.static_pages
            .insert(url.to_string(), Scripted::Html(html.to_string()));
        self
    }

    pub fn respond(mut self, url: &str, response: Scripted) -> Self {
        self.static_pages.insert(url.to_string(), response);
        self
    }

    pub fn rendered(mut self, url: &str, html: &str) -> Self {
        self.dynamic_pages
            .insert(url.to_string(), Scripted::Html(html.to_string()));
        self
    }

    /// Requests a stop while `url` is being fetched
    pub fn stop_during(mut self, url: &str, signal: StopSignal) -> Self {
        self.stop_on = Some((url.to_string(), signal));
        self
    }

    pub fn calls(&self) -> Vec<(String, FetchMode)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &Url, mode: FetchMode) -> Result<PageContent, FetchError> {
        self.calls.lock().unwrap().push((url.to_string(), mode));

        if let Some((target, signal)) = &self.stop_on {
            if target == url.as_str() {
                signal.request();
            }
        }

        let pages = match mode {
            FetchMode::Static => &self.static_pages,
            FetchMode::Dynamic => &self.dynamic_pages,
        };

        let body = match pages.get(url.as_str()) {
            Some(Scripted::Html(body)) => body.clone(),
            Some(Scripted::Fail(e)) => return Err(e.clone()),
            Some(Scripted::Slow(delay, body)) => {
                tokio::time::sleep(*delay).await;
                body.clone()
            }
            None if mode == FetchMode::Dynamic => {
                return Err(FetchError::Network("renderer unavailable".to_string()))
            }
            None => return Err(FetchError::HttpStatus(404)),
        };

        Ok(PageContent {
            url: url.clone(),
            status_code: 200,
            content_type: "text/html; charset=utf-8".to_string(),
            body,
            mode,
        })
    }
}

/// Orchestrator over a mock fetcher, the heuristic extractor and an
/// in-memory store
pub fn orchestrator(
    config: Config,
    fetcher: Arc<MockFetcher>,
) -> (Orchestrator, Arc<SqliteRecordStore>) {
    let store = Arc::new(SqliteRecordStore::new_in_memory().expect("in-memory store"));
    let orchestrator = orchestrator_with_store(config, fetcher, store.clone());
    (orchestrator, store)
}

pub fn orchestrator_with_store(
    config: Config,
    fetcher: Arc<MockFetcher>,
    store: Arc<SqliteRecordStore>,
) -> Orchestrator {
    Orchestrator::new(config, collaborators(fetcher, store))
}

pub fn collaborators(fetcher: Arc<MockFetcher>, store: Arc<SqliteRecordStore>) -> Collaborators {
    Collaborators {
        fetcher,
        extractor: Arc::new(HeuristicExtractor::new()),
        sink: store,
    }
}
