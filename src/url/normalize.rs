use crate::UrlError;
use url::Url;

/// Query parameters that only carry tracking information
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "ref", "source"];

/// Normalizes a URL into the canonical form used for dedup
///
/// # Normalization Steps
///
/// 1. Parse; only `http` and `https` are accepted (the scheme is kept as-is)
/// 2. Lowercase the host and drop a leading `www.`
/// 3. Remove dot segments, empty segments and the trailing slash (root stays `/`)
/// 4. Drop the fragment, unless it is a client-side route (`#!/...` or `#/...`)
/// 5. Drop tracking parameters (`utm_*`, `fbclid`, ...) and sort the rest by key
///
/// Two links that differ only in these respects map to the same frontier entry.
///
/// # Examples
///
/// ```
/// use lab_scout::url::normalize_url;
///
/// let url = normalize_url("https://WWW.Univ.Example/labs/?utm_source=x#team").unwrap();
/// assert_eq!(url.as_str(), "https://univ.example/labs");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or(UrlError::MissingDomain)?
        .to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let path = normalize_path(url.path());
    url.set_path(&path);
    if !url.fragment().is_some_and(is_route_fragment) {
        url.set_fragment(None);
    }

    if url.query().is_some() {
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        params.sort();

        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Collapses dot segments, repeated slashes and the trailing slash
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    format!("/{}", segments.join("/"))
}

/// Hash-bang and `#/` fragments address distinct pages of a single-page app
pub fn is_route_fragment(fragment: &str) -> bool {
    fragment.starts_with('!') || fragment.starts_with('/')
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
