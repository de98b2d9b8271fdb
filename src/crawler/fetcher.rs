//! Fetcher adapter
//!
//! This module handles all page retrieval for the crawler:
//! - Building HTTP clients with proper user agent strings
//! - Static fetches (plain GET)
//! - Dynamic fetches through a Splash-style rendering service
//! - Error classification into `FetchError`

use crate::config::{Config, RenderingConfig, UserAgentConfig};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// How a page is retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMode {
    /// Plain HTTP GET of the document
    Static,

    /// DOM after client-side rendering
    Dynamic,
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// Fetch failures; all of them are per-task and non-fatal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timeout")]
    Timeout,

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if let Some(status) = e.status() {
            Self::HttpStatus(status.as_u16())
        } else if e.is_connect() {
            Self::Network(format!("connection failed: {}", e))
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// A fetched document
#[derive(Debug, Clone)]
pub struct PageContent {
    /// Final URL after redirects
    pub url: Url,
    pub status_code: u16,
    pub content_type: String,
    pub body: String,
    pub mode: FetchMode,
}

/// Page retrieval capability
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, mode: FetchMode) -> Result<PageContent, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use lab_scout::config::UserAgentConfig;
/// use lab_scout::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "LabScout".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(15)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher over reqwest with an optional rendering service
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    render_endpoint: Option<Url>,
    page_ready_timeout: Duration,
    request_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(client: Client, request_timeout: Duration) -> Self {
        Self {
            client,
            render_endpoint: None,
            page_ready_timeout: Duration::ZERO,
            request_timeout,
        }
    }

    /// Enables dynamic fetches through `endpoint`
    pub fn with_renderer(mut self, endpoint: Url, page_ready_timeout: Duration) -> Self {
        self.render_endpoint = Some(endpoint);
        self.page_ready_timeout = page_ready_timeout;
        self
    }

    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let request_timeout = Duration::from_millis(config.crawler.request_timeout_ms);
        let client = build_http_client(&config.user_agent, request_timeout)?;
        let fetcher = Self::new(client, request_timeout);
        Self::configure_renderer(fetcher, &config.rendering)
    }

    fn configure_renderer(fetcher: Self, rendering: &RenderingConfig) -> crate::Result<Self> {
        match &rendering.endpoint {
            Some(endpoint) => {
                let endpoint = Url::parse(endpoint)?;
                Ok(fetcher.with_renderer(
                    endpoint,
                    Duration::from_millis(rendering.page_ready_timeout_ms),
                ))
            }
            None => Ok(fetcher),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn has_renderer(&self) -> bool {
        self.render_endpoint.is_some()
    }

    async fn fetch_static(&self, url: &Url) -> Result<PageContent, FetchError> {
        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await?;

        Ok(PageContent {
            url: final_url,
            status_code: status.as_u16(),
            content_type,
            body,
            mode: FetchMode::Static,
        })
    }

    /// Asks the rendering service for the rendered DOM of `url`
    ///
    /// The service receives `url`, `wait` (page-ready wait in seconds) and
    /// `timeout` (overall budget in seconds), as Splash's `render.html` does.
    async fn fetch_dynamic(&self, url: &Url) -> Result<PageContent, FetchError> {
        let Some(endpoint) = &self.render_endpoint else {
            return Err(FetchError::Network(
                "no rendering endpoint configured".to_string(),
            ));
        };

        let wait = self.page_ready_timeout.as_secs_f64();
        let timeout = self.request_timeout.as_secs_f64().max(1.0);
        let response = self
            .client
            .get(endpoint.as_str())
            .query(&[
                ("url", url.as_str().to_string()),
                ("wait", format!("{:.1}", wait)),
                ("timeout", format!("{:.1}", timeout)),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await?;
        Ok(PageContent {
            url: url.clone(),
            status_code: status.as_u16(),
            content_type: "text/html".to_string(),
            body,
            mode: FetchMode::Dynamic,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, mode: FetchMode) -> Result<PageContent, FetchError> {
        match mode {
            FetchMode::Static => self.fetch_static(url).await,
            FetchMode::Dynamic => self.fetch_dynamic(url).await,
        }
    }
}
