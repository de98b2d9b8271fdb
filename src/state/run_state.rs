/// Run lifecycle definitions
///
/// This module defines the run status, the orchestrator stages and the final
/// outcome of a crawl run.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the single crawl run a service may host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RunStatus {
    /// No run has been started yet
    #[default]
    Idle,

    /// The orchestrator loop is processing tasks
    Running,

    /// A stop was requested; the current task is being finished
    Stopping,

    /// The run ended (see `RunOutcome`)
    Stopped,
}

impl RunStatus {
    /// Returns true while a run occupies the service
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Stopping)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Orchestrator stage
///
/// A task moves through `Selecting → Detecting → Scraping → Extracting →
/// Storing → Updating` and the loop returns to `Selecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Stage {
    #[default]
    Initializing,
    Selecting,
    Detecting,
    Scraping,
    Extracting,
    Storing,
    Updating,
    Stopped,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Selecting => "selecting",
            Self::Detecting => "detecting",
            Self::Scraping => "scraping",
            Self::Extracting => "extracting",
            Self::Storing => "storing",
            Self::Updating => "updating",
            Self::Stopped => "stopped",
        }
    }

    /// Returns true for the stages that belong to a single task's pipeline
    pub fn is_task_stage(&self) -> bool {
        matches!(
            self,
            Self::Detecting | Self::Scraping | Self::Extracting | Self::Storing | Self::Updating
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a run reached `Stopped`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// The frontier ran empty
    Completed,

    /// A stop was requested
    Halted,

    /// The page limit or the run deadline was reached
    LimitReached,

    /// A fatal error ended the run
    Failed(String),
}

impl RunOutcome {
    /// Returns true unless the run ended on a fatal error
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    /// Status string recorded in the run table
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Halted => "halted",
            Self::LimitReached => "limit_reached",
            Self::Failed(_) => "failed",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(message) => write!(f, "failed: {}", message),
            other => write!(f, "{}", other.to_db_string()),
        }
    }
}
