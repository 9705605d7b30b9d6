//! Key event capture
//!
//! Applies raw key-press notifications to the aggregate counters and runs the
//! burst/pause detector over inter-key gaps.

use crate::types::{seconds_between, BehaviorSnapshot, KeyEvent};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Timing state shared by capture and the aggregator
#[derive(Debug, Clone)]
pub(crate) struct KeyTiming {
    /// Last moment any input activity was seen
    pub last_active: DateTime<Utc>,
    /// Timestamp of the previous key press of any kind
    pub previous_key_at: Option<DateTime<Utc>>,
    /// Gaps strictly greater than this many seconds are pauses
    pub pause_threshold_sec: f64,
}

impl KeyTiming {
    pub fn new(started_at: DateTime<Utc>, pause_threshold_sec: f64) -> Self {
        Self {
            last_active: started_at,
            previous_key_at: None,
            pause_threshold_sec,
        }
    }

    /// Advance the detector to `timestamp`, returning the gap if it ended a
    /// burst. Late or duplicate timestamps never move the timing backwards.
    fn observe_key(&mut self, timestamp: DateTime<Utc>) -> Option<f64> {
        let now = self
            .previous_key_at
            .map_or(timestamp, |prev| prev.max(timestamp));
        self.last_active = self.last_active.max(now);
        let pause = self
            .previous_key_at
            .map(|prev| seconds_between(prev, now))
            .filter(|gap| *gap > self.pause_threshold_sec);
        self.previous_key_at = Some(now);
        pause
    }
}

/// Apply one key event. Timing is updated for every event, classified or not.
pub(crate) fn record_key_event(
    snapshot: &mut BehaviorSnapshot,
    timing: &mut KeyTiming,
    event: &KeyEvent,
) {
    if let Some(gap) = timing.observe_key(event.timestamp) {
        snapshot.burst_count += 1;
        snapshot.pauses.push(gap);
        debug!(gap_sec = gap, bursts = snapshot.burst_count, "typing pause recorded");
    }

    if event.is_printable() {
        snapshot.keystrokes += 1;
    }
    if event.backspace {
        snapshot.backspace += 1;
    }
}
