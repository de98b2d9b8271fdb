//! Versioned, checksummed model snapshot files
//!
//! The file is one MessagePack envelope `{format, version, checksum, payload}`
//! where `payload` is the MessagePack-encoded model and `checksum` the hex
//! SHA-256 of the payload bytes.

use super::{ModelError, RelevanceModel};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::Path;

/// Magic string identifying a relevance snapshot
pub const SNAPSHOT_FORMAT: &str = "lab-scout/relevance-model";

/// Current snapshot layout version
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format: String,
    version: u32,
    checksum: String,
    payload: Vec<u8>,
}

fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Writes `bytes` to a sibling temporary file, then renames it over `path`
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)
}

pub(super) fn save(model: &RelevanceModel, path: &Path) -> Result<(), ModelError> {
    let payload = rmp_serde::to_vec_named(model)
        .map_err(|e| ModelError::PersistFailed(format!("encode model: {}", e)))?;

    let envelope = Envelope {
        format: SNAPSHOT_FORMAT.to_string(),
        version: SNAPSHOT_VERSION,
        checksum: checksum(&payload),
        payload,
    };
    let encoded = rmp_serde::to_vec_named(&envelope)
        .map_err(|e| ModelError::PersistFailed(format!("encode envelope: {}", e)))?;

    write_atomic(path, &encoded)
        .map_err(|e| ModelError::PersistFailed(format!("{}: {}", path.display(), e)))?;

    tracing::debug!(
        "Model snapshot written to {} ({} updates)",
        path.display(),
        model.updates()
    );
    Ok(())
}

pub(super) fn load(path: &Path) -> Result<RelevanceModel, ModelError> {
    let bytes = fs::read(path)
        .map_err(|e| ModelError::LoadFailed(format!("{}: {}", path.display(), e)))?;

    let envelope: Envelope = rmp_serde::from_slice(&bytes)
        .map_err(|e| ModelError::LoadFailed(format!("unreadable envelope: {}", e)))?;

    if envelope.format != SNAPSHOT_FORMAT {
        return Err(ModelError::LoadFailed(format!(
            "unexpected snapshot format '{}'",
            envelope.format
        )));
    }

    if envelope.version != SNAPSHOT_VERSION {
        return Err(ModelError::LoadFailed(format!(
            "unsupported snapshot version {} (expected {})",
            envelope.version, SNAPSHOT_VERSION
        )));
    }

    if checksum(&envelope.payload) != envelope.checksum {
        return Err(ModelError::LoadFailed("checksum mismatch".to_string()));
    }

    rmp_serde::from_slice(&envelope.payload)
        .map_err(|e| ModelError::LoadFailed(format!("unreadable payload: {}", e)))
}
