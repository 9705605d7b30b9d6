//! Temporal aggregation
//!
//! Recomputes the derived fields of the snapshot (idle/active split, error
//! ratio, typing speed, typing consistency) on a fixed cadence.

use crate::engine::BehaviorEngine;
use crate::types::{seconds_between, BehaviorSnapshot};
use chrono::{DateTime, Utc};
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::info;

/// Recompute every derived field of `snapshot` as of `now`
pub(crate) fn recompute(
    snapshot: &mut BehaviorSnapshot,
    last_active: DateTime<Utc>,
    now: DateTime<Utc>,
) {
    let idle_time = seconds_between(last_active, now);
    let active_time = seconds_between(snapshot.started_at, now) - idle_time;

    snapshot.idle_time = idle_time;
    snapshot.active_time = active_time;
    snapshot.error_ratio = compute_error_ratio(snapshot.backspace, snapshot.keystrokes);
    snapshot.chars_per_minute = compute_chars_per_minute(snapshot.keystrokes, active_time);
    snapshot.typing_consistency = compute_typing_consistency(&snapshot.pauses);
}

/// Formula: `backspace / max(1, keystrokes)`
pub fn compute_error_ratio(backspace: u64, keystrokes: u64) -> f64 {
    backspace as f64 / keystrokes.max(1) as f64
}

/// Formula: `keystrokes / max(1, active_time) * 60`
///
/// Any active time below one second is treated as one second.
pub fn compute_chars_per_minute(keystrokes: u64, active_time_sec: f64) -> f64 {
    keystrokes as f64 / active_time_sec.max(1.0) * 60.0
}

/// Population standard deviation of the recorded pauses, 0.0 when empty
pub fn compute_typing_consistency(pauses: &[f64]) -> f64 {
    if pauses.is_empty() {
        return 0.0;
    }

    let n = pauses.len() as f64;
    let mean = pauses.iter().sum::<f64>() / n;
    let variance = pauses.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Start the aggregator loop on its own thread. The loop never exits.
pub fn spawn(engine: BehaviorEngine, interval: Duration) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("pulse-aggregator".to_string())
        .spawn(move || {
            info!(interval_ms = interval.as_millis() as u64, "aggregator started");
            loop {
                engine.tick();
                thread::sleep(interval);
            }
        })
}
