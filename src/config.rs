//! Engine configuration

use crate::error::PulseError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Inter-key gap (seconds) above which a new burst starts
pub const DEFAULT_PAUSE_THRESHOLD_SEC: f64 = 3.0;

/// Aggregator and active-file polling cadence
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// Tunables for the tracking engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Gaps strictly greater than this are recorded as pauses
    pub pause_threshold_sec: f64,
    /// Period of the aggregator loop
    pub tick_interval_ms: u64,
    /// Period of the active-file poll loop
    pub poll_interval_ms: u64,
    /// File label to report before the first active-file signal
    pub initial_file: Option<String>,
    /// Directory that relative file labels are resolved against
    pub workspace_root: Option<PathBuf>,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            pause_threshold_sec: DEFAULT_PAUSE_THRESHOLD_SEC,
            tick_interval_ms: DEFAULT_INTERVAL_MS,
            poll_interval_ms: DEFAULT_INTERVAL_MS,
            initial_file: None,
            workspace_root: None,
        }
    }
}

impl PulseConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml(text: &str) -> Result<Self, PulseError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, PulseError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = PulseConfig::default();
        assert_eq!(config.pause_threshold_sec, 3.0);
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.initial_file, None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PulseConfig::from_toml(
            r#"
            initial_file = "app.js"
            tick_interval_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(
            config,
            PulseConfig {
                initial_file: Some("app.js".to_string()),
                tick_interval_ms: 250,
                ..PulseConfig::default()
            }
        );
    }

    #[test]
    fn test_invalid_toml() {
        let result = PulseConfig::from_toml("pause_threshold_sec = \"soon\"");
        assert!(matches!(result, Err(PulseError::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = PulseConfig::load(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(PulseError::Io(_))));
    }
}
