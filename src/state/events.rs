//! Run event log
//!
//! A bounded ring buffer of human-readable events that pollers read with a
//! cursor. Severity is inferred from the message text.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Default number of retained events
pub const DEFAULT_EVENT_CAPACITY: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Success,
}

impl Severity {
    /// Infers the severity of a message
    ///
    /// Error words win over warning words, which win over success words.
    /// URLs in the message are ignored so a path like `/failed-lab` does not
    /// change the severity.
    pub fn infer(message: &str) -> Self {
        let lower = message
            .split_whitespace()
            .filter(|word| !word.contains("://"))
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if has(&["error", "failed", "fatal"]) {
            Self::Error
        } else if has(&["warn", "skipping", "timeout", "timed out"]) {
            Self::Warning
        } else if has(&["success", "stored", "completed", "finished"]) {
            Self::Success
        } else {
            Self::Info
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Success => "success",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEvent {
    /// Monotonic sequence number, starting at 0
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
}

/// Events returned by one poll
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogBatch {
    pub events: Vec<LogEvent>,

    /// Cursor to pass to the next poll
    pub next_cursor: u64,

    /// Events that fell out of the buffer before this poll saw them
    pub missed: u64,
}

#[derive(Debug)]
struct Ring {
    events: VecDeque<LogEvent>,
    next_seq: u64,
    capacity: usize,
}

/// Shared, bounded event log
#[derive(Debug, Clone)]
pub struct EventLog {
    ring: Arc<Mutex<Ring>>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: Arc::new(Mutex::new(Ring {
                events: VecDeque::with_capacity(capacity),
                next_seq: 0,
                capacity,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends a message with inferred severity and returns it
    pub fn push(&self, message: impl Into<String>) -> LogEvent {
        let message = message.into();
        let severity = Severity::infer(&message);
        self.push_with(severity, message)
    }

    /// Appends a message with an explicit severity
    pub fn push_with(&self, severity: Severity, message: impl Into<String>) -> LogEvent {
        let mut ring = self.lock();
        let event = LogEvent {
            seq: ring.next_seq,
            timestamp: Utc::now(),
            severity,
            message: message.into(),
        };
        ring.next_seq += 1;
        if ring.events.len() == ring.capacity {
            ring.events.pop_front();
        }
        ring.events.push_back(event.clone());
        event
    }

    /// Returns the events with `seq >= cursor`
    pub fn since(&self, cursor: u64) -> LogBatch {
        let ring = self.lock();
        let oldest = ring.events.front().map(|e| e.seq).unwrap_or(ring.next_seq);

        LogBatch {
            events: ring
                .events
                .iter()
                .filter(|e| e.seq >= cursor)
                .cloned()
                .collect(),
            next_cursor: ring.next_seq,
            missed: oldest.saturating_sub(cursor),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
