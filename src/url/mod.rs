//! URL handling module for Lab-Scout
//!
//! This module provides URL normalization, domain extraction, wildcard matching,
//! crawl scope checks and the link filter applied to discovered children.

mod domain;
mod matcher;
mod normalize;

use crate::config::DomainsConfig;

// Re-export main functions
pub use domain::{extract_domain, url_depth};
pub use matcher::matches_wildcard;
pub use normalize::{is_route_fragment, normalize_url};

use url::Url;

/// Path fragments that mark account pages never worth crawling
const BLOCKED_PATH_MARKERS: &[&str] = &["login", "signup", "sign-up", "auth"];

/// Document extensions that are not followed as child links
const BLOCKED_EXTENSIONS: &[&str] = &[".pdf", ".doc", ".docx"];

/// Allow/block lists deciding which domains a run may visit
///
/// The block list wins over the allow list. An empty allow list admits every
/// domain that is not blocked.
#[derive(Debug, Clone, Default)]
pub struct DomainScope {
    allow: Vec<String>,
    block: Vec<String>,
}

impl DomainScope {
    pub fn new(allow: Vec<String>, block: Vec<String>) -> Self {
        Self { allow, block }
    }

    pub fn from_config(config: &DomainsConfig) -> Self {
        Self::new(config.allow.clone(), config.block.clone())
    }

    /// Returns true if the domain (lowercase) may be crawled
    ///
    /// # Examples
    ///
    /// ```
    /// use lab_scout::url::DomainScope;
    ///
    /// let scope = DomainScope::new(
    ///     vec!["*.univ.example".to_string()],
    ///     vec!["mail.univ.example".to_string()],
    /// );
    /// assert!(scope.allows_domain("labs.univ.example"));
    /// assert!(!scope.allows_domain("mail.univ.example"));
    /// assert!(!scope.allows_domain("other.example"));
    /// ```
    pub fn allows_domain(&self, domain: &str) -> bool {
        if self.block.iter().any(|p| matches_wildcard(p, domain)) {
            return false;
        }

        self.allow.is_empty() || self.allow.iter().any(|p| matches_wildcard(p, domain))
    }

    /// Returns true if the URL's host is in scope
    pub fn allows(&self, url: &Url) -> bool {
        extract_domain(url)
            .map(|domain| self.allows_domain(&domain))
            .unwrap_or(false)
    }
}

/// Returns true if a discovered link is worth queueing
///
/// Account pages (login, signup, auth) and document downloads are rejected.
pub fn is_followable_url(url: &Url) -> bool {
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }

    let path = url.path().to_lowercase();

    if BLOCKED_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return false;
    }

    !path
        .split('/')
        .any(|segment| BLOCKED_PATH_MARKERS.iter().any(|m| segment.contains(m)))
}
