//! Deterministic HTML heuristics for research pages

use super::{finish_record, ExtractionError, ExtractionRecord, Extractor, PageDocument, ResearchEntity, SchemaHint};
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
static PHONE: OnceLock<Option<Regex>> = OnceLock::new();
static TITLED_NAME: OnceLock<Option<Regex>> = OnceLock::new();
static SCOPES: OnceLock<Option<Regex>> = OnceLock::new();
static DEPARTMENT: OnceLock<Option<Regex>> = OnceLock::new();
static EQUIPMENT: OnceLock<Option<Regex>> = OnceLock::new();
static ADDRESS_CLASS: OnceLock<Option<Regex>> = OnceLock::new();

const FOCUS_KEYWORDS: &[&str] = &["research", "focus", "specialize", "study"];
const PUBLICATION_PREFIXES: &[&str] = &["Paper:", "Article:", "Publication:"];

/// Minimum length of the paragraph taken as research abstract
const ABSTRACT_MIN_CHARS: usize = 100;

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn select<'a>(root: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => root.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Whitespace-collapsed text of an element
fn element_text(element: &ElementRef) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Runs every heuristic over the page and returns what it found
///
/// The page URL always lands in `website`; the result may otherwise be empty.
pub fn pre_extract(html: &str, url: &Url) -> ResearchEntity {
    let document = Html::parse_document(html);
    let mut entity = ResearchEntity {
        website: url.to_string(),
        ..ResearchEntity::default()
    };

    extract_university(&document, &mut entity);
    extract_location(&document, &mut entity);
    extract_department(&document, url, &mut entity);

    let paragraphs: Vec<String> = select(&document, "p")
        .iter()
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();
    extract_focus_and_scopes(&paragraphs, &mut entity);
    extract_publications(&document, url, &mut entity);
    extract_contact(&document, &mut entity);

    entity.research_abstract = paragraphs
        .iter()
        .find(|p| p.chars().count() > ABSTRACT_MIN_CHARS)
        .cloned()
        .unwrap_or_default();

    extract_equipment(&document, &mut entity);
    entity
}

fn extract_university(document: &Html, entity: &mut ResearchEntity) {
    let title = select(document, "title")
        .first()
        .map(element_text)
        .unwrap_or_default();

    entity.university = title.split('|').next().unwrap_or("").trim().to_string();

    if entity.university.is_empty() {
        entity.university = select(document, "h1")
            .first()
            .map(element_text)
            .unwrap_or_default();
    }
}

fn extract_location(document: &Html, entity: &mut ResearchEntity) {
    let Some(class_re) = cached(&ADDRESS_CLASS, r"(?i)location|address|contact") else {
        return;
    };

    for element in select(document, "address, div, p") {
        let is_address = element.value().name() == "address"
            || element
                .value()
                .attr("class")
                .map(|c| class_re.is_match(c))
                .unwrap_or(false);
        if !is_address {
            continue;
        }

        let text = element_text(&element);
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        if parts.len() >= 2 {
            entity.location.city = parts[parts.len() - 2].to_string();
            entity.location.country = parts[parts.len() - 1].to_string();
            return;
        }
    }
}

fn extract_department(document: &Html, url: &Url, entity: &mut ResearchEntity) {
    let Some(dept_re) = cached(&DEPARTMENT, r"(?i)\b(department|faculty|school)\b") else {
        return;
    };

    let Some(heading) = select(document, "h1, h2, h3")
        .into_iter()
        .find(|h| dept_re.is_match(&element_text(h)))
    else {
        return;
    };

    entity.department.name = element_text(&heading);

    let link = heading
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "a")
        .or_else(|| {
            Selector::parse("a[href]")
                .ok()
                .and_then(|s| heading.select(&s).next())
        });

    if let Some(href) = link.and_then(|a| a.value().attr("href")) {
        if let Ok(resolved) = url.join(href) {
            entity.department.url = resolved.to_string();
        }
    }
}

fn extract_focus_and_scopes(paragraphs: &[String], entity: &mut ResearchEntity) {
    let content = paragraphs.join(" ");
    // ASCII lowercasing keeps byte offsets aligned with `content`
    let lower = content.to_ascii_lowercase();

    if let Some(start) = FOCUS_KEYWORDS.iter().find_map(|kw| lower.find(kw)) {
        entity.department.focus = truncate_chars(&content[start..], 100).trim().to_string();
    }

    let Some(scope_re) = cached(
        &SCOPES,
        r"(?i)\b(?:AI|machine learning|robotics|biology|physics|chemistry)\b",
    ) else {
        return;
    };

    let mut seen = HashSet::new();
    for m in scope_re.find_iter(&content) {
        if seen.insert(m.as_str().to_lowercase()) {
            entity.scopes.push(m.as_str().to_string());
        }
    }
}

fn extract_publications(document: &Html, url: &Url, entity: &mut ResearchEntity) {
    for anchor in select(document, "a[href]") {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = url.join(href) else {
            continue;
        };
        let lower = resolved.as_str().to_lowercase();

        if lower.contains("scholar.google") {
            if entity.publications.google_scholar_url.is_empty() {
                entity.publications.google_scholar_url = resolved.to_string();
            }
        } else if (lower.contains("publication") || lower.contains("research"))
            && entity.publications.other_url.is_empty()
        {
            entity.publications.other_url = resolved.to_string();
        }

        let text = element_text(&anchor);
        if PUBLICATION_PREFIXES.iter().any(|p| text.starts_with(p)) {
            entity.publications.contents.push(text);
        }
    }
}

fn extract_contact(document: &Html, entity: &mut ResearchEntity) {
    let (Some(email_re), Some(phone_re), Some(name_re)) = (
        cached(&EMAIL, r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"),
        cached(&PHONE, r"\+?\d[\d -]{8,}\d"),
        cached(
            &TITLED_NAME,
            r"\b(Dr|Prof)\.\s+([A-Z][\w'-]+(?:\s+[A-Z][\w'-]+)+)",
        ),
    ) else {
        return;
    };

    let contact = &mut entity.point_of_contact;

    if let Some(mailto) = select(document, "a[href^='mailto:']")
        .first()
        .and_then(|a| a.value().attr("href"))
    {
        contact.email = mailto.trim_start_matches("mailto:").trim().to_string();
    }

    for element in select(document, "p, li, span, address") {
        let text = element_text(&element);

        if contact.email.is_empty() {
            if let Some(m) = email_re.find(&text) {
                contact.email = m.as_str().to_string();
            }
        }

        if contact.phone_number.is_empty() {
            if let Some(m) = phone_re.find(&text) {
                contact.phone_number = m.as_str().trim().to_string();
            }
        }

        if contact.name.is_empty() {
            if let Some(caps) = name_re.captures(&text) {
                let full = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                let parts: Vec<&str> = full.split_whitespace().collect();
                contact.name = caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default();
                contact.first_name = parts.first().map(|s| s.to_string()).unwrap_or_default();
                contact.last_name = parts.last().map(|s| s.to_string()).unwrap_or_default();
            }
        }
    }
}

fn extract_equipment(document: &Html, entity: &mut ResearchEntity) {
    let Some(equip_re) = cached(&EQUIPMENT, r"(?i)equipment|facilit|instrument") else {
        return;
    };

    for heading in select(document, "h2, h3, h4") {
        let title = element_text(&heading);
        if !equip_re.is_match(&title) {
            continue;
        }

        let list: Vec<String> = heading
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|e| matches!(e.value().name(), "ul" | "ol"))
            .map(|list| {
                Selector::parse("li")
                    .map(|li| {
                        list.select(&li)
                            .map(|item| element_text(&item))
                            .filter(|t| !t.is_empty())
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .unwrap_or_default();

        if !list.is_empty() {
            entity.lab_equipment.overview = truncate_chars(&title, 200);
            entity.lab_equipment.list = list;
            return;
        }
    }
}

/// Extractor that relies only on HTML heuristics
#[derive(Debug, Clone, Default)]
pub struct HeuristicExtractor;

impl HeuristicExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Extractor for HeuristicExtractor {
    async fn extract(
        &self,
        page: &PageDocument,
        hint: &SchemaHint,
    ) -> Result<ExtractionRecord, ExtractionError> {
        finish_record(pre_extract(&page.html, &page.url), hint)
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}
