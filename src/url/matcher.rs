/// Checks if a domain matches a scope pattern
///
/// `"univ.example"` matches only itself; `"*.univ.example"` matches the bare
/// domain and any subdomain at any depth.
///
/// # Examples
///
/// ```
/// use lab_scout::url::matches_wildcard;
///
/// assert!(matches_wildcard("univ.example", "univ.example"));
/// assert!(matches_wildcard("*.univ.example", "univ.example"));
/// assert!(matches_wildcard("*.univ.example", "chem.labs.univ.example"));
/// assert!(!matches_wildcard("*.univ.example", "notuniv.example"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .map(|prefix| prefix.ends_with('.'))
                    .unwrap_or(false)
        }
        None => candidate == pattern,
    }
}
