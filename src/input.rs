//! NDJSON input feed
//!
//! One JSON object per line, tagged by `kind`:
//!
//! ```text
//! {"kind":"key","timestamp":"2024-01-15T14:00:00Z","char":"a"}
//! {"kind":"key","timestamp":"2024-01-15T14:00:01Z","backspace":true}
//! {"kind":"active_file","label":"src/main.js"}
//! ```
//!
//! Capture and the aggregator must agree on one clock. A live feed stamps
//! each key when it is read and ticks against the wall clock. A replay keeps
//! the recorded timestamps and ticks against the latest one seen.

use crate::config::PulseConfig;
use crate::engine::BehaviorEngine;
use crate::error::PulseError;
use crate::reader::FileReader;
use crate::types::KeyEvent;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::BufRead;
use tracing::{debug, warn};

/// One line of input
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputRecord {
    Key(KeyEvent),
    /// A sample of the active-file signal; a missing label means no file
    ActiveFile {
        #[serde(default)]
        label: Option<String>,
    },
}

/// Parse one input line
pub fn parse_record(line: &str) -> Result<InputRecord, PulseError> {
    serde_json::from_str(line.trim()).map_err(|e| PulseError::InvalidEvent(e.to_string()))
}

/// Counts reported after a feed ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub keys: u64,
    pub active_file_samples: u64,
    pub skipped: u64,
}

/// Parse one raw line, logging and counting it if it is malformed
fn parse_line(index: usize, line: &str, stats: &mut FeedStats) -> Option<InputRecord> {
    if line.trim().is_empty() {
        return None;
    }
    match parse_record(line) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(line = index + 1, error = %e, "skipping input record");
            stats.skipped += 1;
            None
        }
    }
}

fn apply(
    engine: &BehaviorEngine,
    record: InputRecord,
    reader: &dyn FileReader,
    stats: &mut FeedStats,
) -> Option<DateTime<Utc>> {
    match record {
        InputRecord::Key(event) => {
            stats.keys += 1;
            engine.on_key_event(&event);
            Some(event.timestamp)
        }
        InputRecord::ActiveFile { label } => {
            stats.active_file_samples += 1;
            engine.observe_active_file(label, reader);
            None
        }
    }
}

/// Drive `engine` from a live feed until `input` ends.
///
/// Recorded key timestamps are replaced by the time each line is read, so
/// capture shares the wall clock used by [`BehaviorEngine::tick`]. The
/// engine is ticked once more when input ends.
pub fn feed_live<R: BufRead>(
    engine: &BehaviorEngine,
    input: R,
    reader: &dyn FileReader,
) -> Result<FeedStats, PulseError> {
    let mut stats = FeedStats::default();
    for (index, line) in input.lines().enumerate() {
        let line = line?;
        let record = match parse_line(index, &line, &mut stats) {
            Some(InputRecord::Key(event)) => InputRecord::Key(KeyEvent {
                timestamp: Utc::now(),
                ..event
            }),
            Some(other) => other,
            None => continue,
        };
        apply(engine, record, reader, &mut stats);
    }

    engine.tick();
    debug!(?stats, "live input ended");
    Ok(stats)
}

/// Replay a recorded feed on a fresh engine.
///
/// The session starts at the first recorded key and every tick is taken at
/// the latest key timestamp seen so far, so old recordings produce the same
/// idle/active split they had when captured.
pub fn replay<R: BufRead>(
    config: PulseConfig,
    input: R,
    reader: &dyn FileReader,
) -> Result<(BehaviorEngine, FeedStats), PulseError> {
    let mut stats = FeedStats::default();
    let mut all = Vec::new();
    for (index, line) in input.lines().enumerate() {
        all.extend(parse_line(index, &line?, &mut stats));
    }

    let started_at = all
        .iter()
        .find_map(|record| match record {
            InputRecord::Key(event) => Some(event.timestamp),
            InputRecord::ActiveFile { .. } => None,
        })
        .unwrap_or_else(Utc::now);
    let engine = BehaviorEngine::started_at(config, started_at);

    let mut clock = started_at;
    for record in all {
        if let Some(timestamp) = apply(&engine, record, reader, &mut stats) {
            clock = clock.max(timestamp);
            engine.tick_at(clock);
        }
    }
    engine.tick_at(clock);

    debug!(?stats, "replay ended");
    Ok((engine, stats))
}
