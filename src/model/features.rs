use serde::{Deserialize, Serialize};

/// Default feature layout, in scoring order
pub const FEATURE_NAMES: [&str; 9] = [
    "general_url_keywords",
    "general_anchor_keywords",
    "priority_url_keywords",
    "priority_anchor_keywords",
    "parent_relevance",
    "url_depth",
    "url_length",
    "query_params",
    "is_pdf",
];

const GENERAL_KEYWORDS: &[&str] = &[
    "energy",
    "centre",
    "center",
    "startup",
    "programme",
    "institute",
    "academic",
    "calendar",
    "education",
    "faculty",
    "department",
    "project",
    "course",
    "study",
    "scholarship",
    "conference",
    "seminar",
    "workshop",
    "development",
    "training",
    "graduate",
    "undergraduate",
    "admissions",
    "curriculum",
    "technology",
    "science",
    "clean",
    "funds",
    "funding",
];

const PRIORITY_KEYWORDS: &[&str] = &[
    "research",
    "laboratory",
    "lab",
    "innovation",
    "publications",
    "research-centre",
];

/// Multiplier applied to priority keyword hits
const PRIORITY_WEIGHT: f64 = 5.0;

/// Ordered list of named numeric signals describing one candidate link
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    signals: Vec<(String, f64)>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a signal; order is significant
    pub fn push(&mut self, name: impl Into<String>, value: f64) {
        self.signals.push((name.into(), value));
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.push(name, value);
        self
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.signals
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.signals.iter().map(|(n, _)| n.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.signals.iter().map(|(_, v)| *v)
    }

    /// Returns true if the signal names match `layout` exactly, in order
    pub fn has_layout<S: AsRef<str>>(&self, layout: &[S]) -> bool {
        self.len() == layout.len() && self.names().zip(layout).all(|(a, b)| a == b.as_ref())
    }
}

fn count_keywords(haystack: &str, keywords: &[&str]) -> f64 {
    keywords.iter().filter(|kw| haystack.contains(*kw)).count() as f64
}

/// Computes the default feature vector for a link
///
/// Keyword signals count distinct keywords occurring as substrings of the
/// lowercased URL or anchor text. `parent_relevance` is the score of the page
/// the link was found on (1.0 for seeds).
///
/// # Examples
///
/// ```
/// use lab_scout::model::link_features;
///
/// let f = link_features("https://univ.example/dept", "Research Lab", 1.0);
/// assert_eq!(f.get("priority_anchor_keywords"), Some(10.0));
/// assert_eq!(f.get("url_depth"), Some(1.0));
/// ```
pub fn link_features(url: &str, anchor_text: &str, parent_relevance: f64) -> FeatureVector {
    let url_lower = url.to_lowercase();
    let anchor_lower = anchor_text.to_lowercase();

    let values = [
        count_keywords(&url_lower, GENERAL_KEYWORDS),
        count_keywords(&anchor_lower, GENERAL_KEYWORDS),
        PRIORITY_WEIGHT * count_keywords(&url_lower, PRIORITY_KEYWORDS),
        PRIORITY_WEIGHT * count_keywords(&anchor_lower, PRIORITY_KEYWORDS),
        parent_relevance,
        crate::url::url_depth(url) as f64,
        url.chars().count() as f64,
        url.matches('?').count() as f64,
        if url_lower.ends_with(".pdf") { 1.0 } else { 0.0 },
    ];

    FEATURE_NAMES
        .iter()
        .zip(values)
        .fold(FeatureVector::new(), |fv, (name, value)| fv.with(*name, value))
}
