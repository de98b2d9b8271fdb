//! State module for tracking crawl runs
//!
//! # Components
//!
//! - `RunStatus`, `Stage`, `RunOutcome`: lifecycle of a run and its tasks
//! - `RunMonitor` / `StatusSnapshot`: status published for concurrent readers
//! - `StopSignal`: cooperative stop flag
//! - `EventLog`: bounded log of run events with inferred severity
//! - `RunCheckpoint`: frontier and visited set saved for `--resume`

mod checkpoint;
mod events;
mod monitor;
mod run_state;

pub use checkpoint::{CheckpointEntry, RunCheckpoint};
pub use events::{EventLog, LogBatch, LogEvent, Severity, DEFAULT_EVENT_CAPACITY};
pub use monitor::{RunCounters, RunMonitor, StatusSnapshot, StopSignal};
pub use run_state::{RunOutcome, RunStatus, Stage};
