//! Render-mode detection
//!
//! Picks `FetchMode::Static` or `FetchMode::Dynamic` for a URL before it is
//! fetched. The rule set is deterministic; the only learned input is the set of
//! hosts whose static pages already failed the structural check in this run.

use super::fetcher::FetchMode;
use crate::config::RenderingConfig;
use crate::url::{extract_domain, is_route_fragment, matches_wildcard};
use std::collections::HashSet;
use url::Url;

/// Path extensions that are always fetched statically
pub const STATIC_EXTENSIONS: [&str; 5] = [".html", ".htm", ".txt", ".xml", ".pdf"];

#[derive(Debug, Clone, Default)]
pub struct Detector {
    dynamic_hosts: Vec<String>,
    failed_hosts: HashSet<String>,
}

impl Detector {
    pub fn new(dynamic_hosts: Vec<String>) -> Self {
        Self {
            dynamic_hosts: dynamic_hosts.into_iter().map(|p| p.to_lowercase()).collect(),
            failed_hosts: HashSet::new(),
        }
    }

    pub fn from_config(config: &RenderingConfig) -> Self {
        Self::new(config.dynamic_hosts.clone())
    }

    /// Selects the fetch mode for `url`
    ///
    /// 1. Known static extension → `Static`
    /// 2. Hash-bang or `#/` route fragment → `Dynamic`
    /// 3. Host listed as dynamic, or with a recorded structural failure → `Dynamic`
    /// 4. Otherwise → `Static`
    pub fn detect(&self, url: &Url) -> FetchMode {
        let path = url.path().to_ascii_lowercase();
        if STATIC_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            return FetchMode::Static;
        }

        if url.fragment().is_some_and(is_route_fragment) {
            return FetchMode::Dynamic;
        }

        let Some(host) = extract_domain(url) else {
            return FetchMode::Static;
        };

        if self.failed_hosts.contains(&host)
            || self
                .dynamic_hosts
                .iter()
                .any(|pattern| matches_wildcard(pattern, &host))
        {
            return FetchMode::Dynamic;
        }

        FetchMode::Static
    }

    /// Remembers that a static page from this host needed rendering
    ///
    /// Returns true if the host was not already recorded.
    pub fn record_structural_failure(&mut self, url: &Url) -> bool {
        match extract_domain(url) {
            Some(host) => self.failed_hosts.insert(host),
            None => false,
        }
    }

    pub fn failed_host_count(&self) -> usize {
        self.failed_hosts.len()
    }
}
