//! Resume checkpoint
//!
//! Holds the frontier entries and the visited set of an interrupted run so the
//! next run can pick up where it stopped. URLs are stored as strings and are
//! re-normalized on restore.

use crate::model::{write_atomic, FeatureVector};
use crate::ScoutError;
use serde::{Deserialize, Serialize};
use std::path::Path;

const CHECKPOINT_VERSION: u32 = 1;

/// One queued task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub url: String,
    pub parent_url: Option<String>,
    pub anchor_text: String,
    pub depth: u32,
    pub score: f64,
    pub features: FeatureVector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCheckpoint {
    pub version: u32,
    pub frontier: Vec<CheckpointEntry>,
    pub visited: Vec<String>,
}

impl RunCheckpoint {
    pub fn new(frontier: Vec<CheckpointEntry>, visited: Vec<String>) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            frontier,
            visited,
        }
    }

    /// Writes the checkpoint atomically
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let bytes = rmp_serde::to_vec_named(self)
            .map_err(|e| ScoutError::Checkpoint(format!("encode: {}", e)))?;
        write_atomic(path, &bytes)
            .map_err(|e| ScoutError::Checkpoint(format!("{}: {}", path.display(), e)))
    }

    /// Reads a checkpoint; `Ok(None)` if the file does not exist
    pub fn load(path: &Path) -> crate::Result<Option<Self>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ScoutError::Checkpoint(format!("{}: {}", path.display(), e))),
        };

        let checkpoint: Self = rmp_serde::from_slice(&bytes)
            .map_err(|e| ScoutError::Checkpoint(format!("decode {}: {}", path.display(), e)))?;

        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(ScoutError::Checkpoint(format!(
                "unsupported checkpoint version {}",
                checkpoint.version
            )));
        }

        Ok(Some(checkpoint))
    }

    /// Removes a checkpoint file; a missing file is not an error
    pub fn clear(path: &Path) -> crate::Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
