//! HTML parser for links, visible text and page structure
//!
//! This module handles parsing fetched HTML to extract:
//! - Outgoing links together with their anchor text
//! - The page title and the visible body text
//! - A structural verdict used to decide whether a static fetch needs to be
//!   re-done through the rendering service
//!
//! `scraper::Html` is not `Send`, so everything here is synchronous and the
//! parsed document never outlives the call.

use crate::url::is_route_fragment;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use url::Url;

/// Visible text below this many characters counts as "little text"
const MIN_SHELL_TEXT_CHARS: usize = 200;

/// Mount points used by client-side frameworks
const MOUNT_POINTS: [&str; 5] = ["#root", "#app", "#__next", "#__nuxt", "[ng-app]"];

/// Script sources that indicate a client-side framework bundle
const FRAMEWORK_HINTS: [&str; 5] = ["react", "vue", "angular", "next", "nuxt"];

/// A link found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    /// Absolute URL (not yet normalized)
    pub url: Url,

    /// Whitespace-collapsed anchor text, possibly empty
    pub anchor_text: String,
}

/// Outcome of the structural check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStructure {
    /// The document carries real content
    Complete,

    /// A client-side framework mount point or bundle with almost no text
    ScriptShell,

    /// No visible text and no links
    Empty,
}

impl PageStructure {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Links in document order, one per distinct URL
    pub links: Vec<DiscoveredLink>,

    /// Visible body text, whitespace-collapsed
    pub text: String,

    pub structure: PageStructure,
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Parses HTML content and extracts links, text and structure
///
/// # Link Extraction Rules
///
/// **Include:** `<a href="...">` anywhere in the document; `rel="nofollow"`
/// links are kept.
///
/// **Exclude:** `<a download>`, `javascript:`, `mailto:`, `tel:` and `data:`
/// hrefs, fragment-only links and anything that does not resolve to HTTP(S).
///
/// When the same URL appears more than once the first non-empty anchor text
/// wins.
///
/// # Example
///
/// ```no_run
/// use lab_scout::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/lab">Lab</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].anchor_text, "Lab");
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let links = extract_links(&document, base_url);
    let text = visible_text(&document);
    let structure = check_structure(&document, &text, links.len());

    ParsedPage {
        title,
        links,
        text,
        structure,
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = selector("title")?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn anchor_text(element: &ElementRef) -> String {
    let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
    if !text.is_empty() {
        return text;
    }

    // Icon links often carry their label in an attribute
    ["aria-label", "title"]
        .iter()
        .filter_map(|attr| element.value().attr(attr))
        .map(collapse_whitespace)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

/// Extracts all followable links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<DiscoveredLink> {
    let Some(a_selector) = selector("a[href]") else {
        return Vec::new();
    };

    let mut links: Vec<DiscoveredLink> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(url) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, base_url))
        else {
            continue;
        };

        let text = anchor_text(&element);
        match positions.get(url.as_str()) {
            Some(&index) => {
                if links[index].anchor_text.is_empty() && !text.is_empty() {
                    links[index].anchor_text = text;
                }
            }
            None => {
                positions.insert(url.to_string(), links.len());
                links.push(DiscoveredLink {
                    url,
                    anchor_text: text,
                });
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links, except client-side routes (`#!/...`, `#/...`)
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }
    if let Some(fragment) = href.strip_prefix('#') {
        if !is_route_fragment(fragment) {
            return None;
        }
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url),
        _ => None,
    }
}

/// Collects the text of the body, skipping script-like elements
pub fn visible_text(document: &Html) -> String {
    let Some(body) = selector("body").and_then(|s| document.select(&s).next()) else {
        return String::new();
    };

    let mut parts: Vec<&str> = Vec::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor.value().as_element().is_some_and(|element| {
                matches!(
                    element.name(),
                    "script" | "style" | "noscript" | "template"
                )
            })
        });
        if hidden {
            continue;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    collapse_whitespace(&parts.join(" "))
}

/// Decides whether a document looks fully rendered
fn check_structure(document: &Html, text: &str, link_count: usize) -> PageStructure {
    let text_chars = text.chars().count();

    if text_chars >= MIN_SHELL_TEXT_CHARS {
        return PageStructure::Complete;
    }

    let has_mount_point = MOUNT_POINTS
        .iter()
        .filter_map(|css| selector(css))
        .any(|s| document.select(&s).next().is_some());

    let has_framework_bundle = selector("script[src]").is_some_and(|s| {
        document.select(&s).any(|script| {
            script.value().attr("src").is_some_and(|src| {
                let src = src.to_ascii_lowercase();
                FRAMEWORK_HINTS.iter().any(|hint| src.contains(hint))
            })
        })
    });

    if has_mount_point || has_framework_bundle {
        PageStructure::ScriptShell
    } else if text_chars == 0 && link_count == 0 {
        PageStructure::Empty
    } else {
        PageStructure::Complete
    }
}
