//! Crawl frontier and visited set
//!
//! This module handles:
//! - The priority queue of candidate URLs, best relevance score first
//! - URL-level dedup across queued, in-flight and completed tasks
//! - The insert-only set of URLs whose processing completed

use crate::model::FeatureVector;
use crate::state::CheckpointEntry;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use url::Url;

/// A unit of crawl work
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlTask {
    /// Normalized URL
    pub url: Url,

    /// Page the link was discovered on (`None` for seeds)
    pub parent_url: Option<Url>,

    pub anchor_text: String,

    /// Link distance from the seeds
    pub depth: u32,
}

impl CrawlTask {
    pub fn seed(url: Url, anchor_text: impl Into<String>) -> Self {
        Self {
            url,
            parent_url: None,
            anchor_text: anchor_text.into(),
            depth: 0,
        }
    }

    pub fn child(parent: &CrawlTask, url: Url, anchor_text: impl Into<String>) -> Self {
        Self {
            url,
            parent_url: Some(parent.url.clone()),
            anchor_text: anchor_text.into(),
            depth: parent.depth + 1,
        }
    }
}

/// A task queued with its relevance score
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub task: CrawlTask,

    /// Score computed by the relevance model
    pub score: f64,

    /// Features the score was computed from; reused as the training example
    pub features: FeatureVector,

    /// Insertion order, breaks remaining ties
    pub seq: u64,
}

// Max-heap order: higher score first, then shallower depth, then earlier insertion
impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.task.depth.cmp(&self.task.depth))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierEntry {}

impl FrontierEntry {
    pub fn to_checkpoint(&self) -> CheckpointEntry {
        CheckpointEntry {
            url: self.task.url.to_string(),
            parent_url: self.task.parent_url.as_ref().map(Url::to_string),
            anchor_text: self.task.anchor_text.clone(),
            depth: self.task.depth,
            score: self.score,
            features: self.features.clone(),
        }
    }
}

/// Prioritized set of not-yet-processed URLs
///
/// Every URL ever pushed stays in `seen`, so a URL is queued at most once per
/// run no matter how many pages link to it.
#[derive(Debug, Default)]
pub struct Frontier {
    heap: BinaryHeap<FrontierEntry>,
    seen: HashSet<String>,
    next_seq: u64,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a task; returns false if its URL was already seen
    pub fn push(&mut self, task: CrawlTask, score: f64, features: FeatureVector) -> bool {
        if !self.seen.insert(task.url.to_string()) {
            return false;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(FrontierEntry {
            task,
            score,
            features,
            seq,
        });
        true
    }

    /// Removes and returns the best entry
    pub fn pop(&mut self) -> Option<FrontierEntry> {
        self.heap.pop()
    }

    pub fn peek(&self) -> Option<&FrontierEntry> {
        self.heap.peek()
    }

    /// Marks a URL as seen without queueing it
    pub fn mark_seen(&mut self, url: &Url) {
        self.seen.insert(url.to_string());
    }

    pub fn is_seen(&self, url: &Url) -> bool {
        self.seen.contains(url.as_str())
    }

    /// Score of a queued URL
    pub fn score_of(&self, url: &Url) -> Option<f64> {
        self.heap
            .iter()
            .find(|entry| entry.task.url == *url)
            .map(|entry| entry.score)
    }

    /// Recomputes every queued score and restores heap order
    pub fn rescore<F: Fn(&FeatureVector) -> f64>(&mut self, score: F) {
        let mut entries = std::mem::take(&mut self.heap).into_vec();
        for entry in &mut entries {
            entry.score = score(&entry.features);
        }
        self.heap = BinaryHeap::from(entries);
    }

    /// Queued entries in no particular order
    pub fn entries(&self) -> impl Iterator<Item = &FrontierEntry> {
        self.heap.iter()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// URLs whose processing completed (success, terminal failure or skip)
#[derive(Debug, Default, Clone)]
pub struct VisitedSet {
    urls: HashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a URL; returns false if it was already present
    pub fn insert(&mut self, url: &Url) -> bool {
        self.urls.insert(url.to_string())
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.urls.contains(url.as_str())
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }
}
