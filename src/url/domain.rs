use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use lab_scout::url::extract_domain;
///
/// let url = Url::parse("https://Labs.Univ.Example/robotics").unwrap();
/// assert_eq!(extract_domain(&url), Some("labs.univ.example".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Structural depth of a URL: slashes after the `scheme://` prefix
///
/// `https://univ.example/a/b` has depth 2, a bare host has depth 0.
pub fn url_depth(url: &str) -> usize {
    url.matches('/').count().saturating_sub(2)
}
