//! Core data types
//!
//! This module defines the input events consumed by the engine and the
//! aggregate snapshot it maintains and exports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Label used for `current_file` when no file is known
pub const NO_FILE: &str = "NoFile";

/// Named code-shape counts from the most recent scan
pub type PatternCounts = BTreeMap<String, u64>;

/// A single key-press notification from the input feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// When the key was pressed
    pub timestamp: DateTime<Utc>,
    /// Printable character carried by the key, if it was classified as one
    #[serde(default, rename = "char", skip_serializing_if = "Option::is_none")]
    pub character: Option<char>,
    /// Whether the key was identified as backspace
    #[serde(default)]
    pub backspace: bool,
}

impl KeyEvent {
    /// A printable character key
    pub fn char_key(timestamp: DateTime<Utc>, c: char) -> Self {
        Self {
            timestamp,
            character: Some(c),
            backspace: false,
        }
    }

    /// The backspace key
    pub fn backspace(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            character: None,
            backspace: true,
        }
    }

    /// A key with no recognizable identity (navigation, modifiers, ...)
    pub fn unclassified(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            character: None,
            backspace: false,
        }
    }

    /// Whether this event counts toward `keystrokes`
    pub fn is_printable(&self) -> bool {
        self.character.is_some_and(|c| !c.is_control())
    }
}

/// Per-file counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    pub keystrokes: u64,
    pub backspace: u64,
}

/// Aggregate behavioral state for one tracking session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSnapshot {
    /// Identifier of this tracking session
    pub session_id: Uuid,
    /// When tracking started
    pub started_at: DateTime<Utc>,
    /// Label of the file currently being edited
    pub current_file: String,
    /// Printable keys pressed
    pub keystrokes: u64,
    /// Backspace presses
    pub backspace: u64,
    /// Bursts started after a pause; always equals `pauses.len()`
    #[serde(rename = "typing_bursts")]
    pub burst_count: u64,
    /// Inter-key gaps above the pause threshold, in seconds, oldest first
    #[serde(rename = "typing_pauses")]
    pub pauses: Vec<f64>,
    pub chars_per_minute: f64,
    /// Total line count of the most recently scanned file
    pub lines_added: u64,
    pub file_switches: u64,
    /// Seconds since the last input activity
    pub idle_time: f64,
    /// Seconds since start minus the current idle stretch
    pub active_time: f64,
    /// `backspace / max(1, keystrokes)`
    pub error_ratio: f64,
    /// Population standard deviation of `pauses`
    pub typing_consistency: f64,
    #[serde(rename = "file_stats")]
    pub per_file_stats: BTreeMap<String, FileStats>,
    pub patterns: PatternCounts,
}

impl BehaviorSnapshot {
    /// Fresh snapshot for a session starting at `started_at`
    pub fn new(started_at: DateTime<Utc>, current_file: Option<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at,
            current_file: current_file.unwrap_or_else(|| NO_FILE.to_string()),
            keystrokes: 0,
            backspace: 0,
            burst_count: 0,
            pauses: Vec::new(),
            chars_per_minute: 0.0,
            lines_added: 0,
            file_switches: 0,
            idle_time: 0.0,
            active_time: 0.0,
            error_ratio: 0.0,
            typing_consistency: 0.0,
            per_file_stats: BTreeMap::new(),
            patterns: PatternCounts::new(),
        }
    }

    /// Mean recorded pause, 0.0 when there are none
    pub fn average_pause(&self) -> f64 {
        self.pauses.iter().sum::<f64>() / self.pauses.len().max(1) as f64
    }
}

/// Signed number of seconds from `from` to `to`
pub(crate) fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1000.0,
    }
}
