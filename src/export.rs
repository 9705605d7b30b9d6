//! Snapshot export
//!
//! Serializes a full snapshot (counters, pause history, per-file stats and
//! pattern counts) as a 2-space-indented JSON document.

use crate::error::PulseError;
use crate::types::BehaviorSnapshot;
use std::fs;
use std::path::Path;
use tracing::info;

/// Render `snapshot` as pretty JSON
pub fn to_document(snapshot: &BehaviorSnapshot) -> Result<String, PulseError> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

/// Write `snapshot` to `path`, replacing any existing file
pub fn write_snapshot(snapshot: &BehaviorSnapshot, path: &Path) -> Result<(), PulseError> {
    let document = to_document(snapshot)?;
    fs::write(path, document).map_err(|source| PulseError::Export {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "snapshot exported");
    Ok(())
}
