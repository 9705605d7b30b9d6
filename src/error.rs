//! Error types for codepulse

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to callers of the engine
#[derive(Debug, Error)]
pub enum PulseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Failed to export snapshot to {}: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input event: {0}")]
    InvalidEvent(String),
}

/// Reasons a pattern scan produced no result. Never leaves the scanner.
#[derive(Debug, Error)]
pub(crate) enum ScanError {
    #[error("cannot read {label}: {source}")]
    Read {
        label: String,
        #[source]
        source: std::io::Error,
    },
}
