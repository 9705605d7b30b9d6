//! Behavior engine
//!
//! The engine owns the single shared [`BehaviorSnapshot`] behind one mutex.
//! Key capture, the aggregator loop and the active-file tracker all mutate it
//! through this handle; readers get a consistent point-in-time copy.
//!
//! Derived fields lag the counters by at most one aggregator tick.

use crate::active_file::{self, ActiveFileSource, ActiveFileTracker};
use crate::aggregator;
use crate::capture::{self, KeyTiming};
use crate::config::PulseConfig;
use crate::error::PulseError;
use crate::export;
use crate::reader::FileReader;
use crate::scanner::{self, ScanReport};
use crate::types::{BehaviorSnapshot, KeyEvent};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, warn};

struct EngineState {
    snapshot: BehaviorSnapshot,
    timing: KeyTiming,
    tracker: ActiveFileTracker,
}

/// Cloneable handle to the shared tracking state
#[derive(Clone)]
pub struct BehaviorEngine {
    state: Arc<Mutex<EngineState>>,
    config: Arc<PulseConfig>,
}

impl BehaviorEngine {
    /// Create an engine whose session starts now
    pub fn new(config: PulseConfig) -> Self {
        Self::started_at(config, Utc::now())
    }

    /// Create an engine whose session started at `started_at`
    pub fn started_at(config: PulseConfig, started_at: DateTime<Utc>) -> Self {
        let snapshot = BehaviorSnapshot::new(started_at, config.initial_file.clone());
        let timing = KeyTiming::new(started_at, config.pause_threshold_sec);
        Self {
            state: Arc::new(Mutex::new(EngineState {
                snapshot,
                timing,
                tracker: ActiveFileTracker::new(),
            })),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    /// Record one key press. Holds the lock only for a constant-time update.
    pub fn on_key_event(&self, event: &KeyEvent) {
        let mut state = self.state.lock();
        let EngineState { snapshot, timing, .. } = &mut *state;
        capture::record_key_event(snapshot, timing, event);
    }

    /// Recompute derived fields against the wall clock
    pub fn tick(&self) {
        self.tick_at(Utc::now());
    }

    /// Recompute derived fields as of `now`
    pub fn tick_at(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock();
        let last_active = state.timing.last_active;
        aggregator::recompute(&mut state.snapshot, last_active, now);
    }

    /// Consistent copy of the current state
    pub fn snapshot(&self) -> BehaviorSnapshot {
        self.state.lock().snapshot.clone()
    }

    /// Export the current state to `path`. In-memory state is never touched.
    pub fn export_to(&self, path: &Path) -> Result<(), PulseError> {
        let snapshot = self.snapshot();
        export::write_snapshot(&snapshot, path)
    }

    /// Feed one sample of the active-file signal from any source.
    ///
    /// Every source shares the engine's edge detector, so a change reported
    /// by two sources counts once. On a switch the new file is read and
    /// scanned without holding the lock; the result is dropped if another
    /// switch happened meanwhile. A failed scan clears `patterns` and keeps
    /// the previous line count. Returns whether the signal was a switch.
    pub fn observe_active_file(&self, signal: Option<String>, reader: &dyn FileReader) -> bool {
        let (label, generation) = {
            let mut state = self.state.lock();
            let Some(label) = state.tracker.observe(signal) else {
                return false;
            };
            state.snapshot.current_file = label.clone();
            state.snapshot.file_switches += 1;
            (label, state.snapshot.file_switches)
        };
        debug!(file = %label, switches = generation, "active file changed");

        let scan = scanner::scan_file(reader, &label);
        if let Err(e) = &scan {
            warn!(error = %e, "pattern scan failed");
        }
        self.install_scan(&label, generation, scan.ok());
        true
    }

    /// Install a finished scan unless the file changed while it ran
    fn install_scan(&self, label: &str, generation: u64, report: Option<ScanReport>) {
        let mut state = self.state.lock();
        if state.snapshot.file_switches != generation || state.snapshot.current_file != label {
            debug!(file = label, "discarding stale scan");
            return;
        }
        match report {
            Some(report) => {
                state.snapshot.patterns = report.patterns;
                state.snapshot.lines_added = report.line_count;
            }
            None => state.snapshot.patterns.clear(),
        }
    }

    /// Start the aggregator loop at the configured tick interval
    pub fn spawn_aggregator(&self) -> io::Result<JoinHandle<()>> {
        aggregator::spawn(self.clone(), self.config.tick_interval())
    }

    /// Start polling `source` at the configured interval
    pub fn spawn_active_file_tracker(
        &self,
        source: Box<dyn ActiveFileSource>,
        reader: Box<dyn FileReader>,
    ) -> io::Result<JoinHandle<()>> {
        active_file::spawn(self.clone(), source, reader, self.config.poll_interval())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::HashMap;
    use std::sync::mpsc;
    use std::thread;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    fn at_ms(ms: i64) -> DateTime<Utc> {
        t0() + Duration::milliseconds(ms)
    }

    fn engine() -> BehaviorEngine {
        BehaviorEngine::started_at(PulseConfig::default(), t0())
    }

    struct MapReader(HashMap<String, String>);

    impl MapReader {
        fn with(label: &str, text: &str) -> Self {
            Self(HashMap::from([(label.to_string(), text.to_string())]))
        }
    }

    impl FileReader for MapReader {
        fn read_text(&self, label: &str) -> io::Result<String> {
            self.0
                .get(label)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, label.to_string()))
        }
    }

    fn switch_to(engine: &BehaviorEngine, label: &str, reader: &dyn FileReader) -> bool {
        engine.observe_active_file(Some(label.to_string()), reader)
    }

    /// Blocks reads of `slow.js` until the gate opens
    struct GatedReader {
        started: Mutex<mpsc::Sender<()>>,
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl FileReader for GatedReader {
        fn read_text(&self, label: &str) -> io::Result<String> {
            match label {
                "slow.js" => {
                    let _ = self.started.lock().send(());
                    let _ = self.gate.lock().recv();
                    Ok("class Slow {}\nclass Slower {}\n// a\n// b\n".to_string())
                }
                "fast.js" => Ok("function fast() {}\n".to_string()),
                _ => Err(io::Error::new(io::ErrorKind::NotFound, label.to_string())),
            }
        }
    }

    #[test]
    fn test_error_ratio_holds_after_every_tick() {
        let engine = engine();
        engine.tick_at(at_ms(500));
        assert_eq!(engine.snapshot().error_ratio, 0.0);

        engine.on_key_event(&KeyEvent::backspace(at_ms(1000)));
        engine.tick_at(at_ms(1500));
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.keystrokes, 0);
        assert_eq!(snapshot.error_ratio, 1.0);

        for i in 0..7 {
            engine.on_key_event(&KeyEvent::char_key(at_ms(2000 + i * 100), 'k'));
        }
        engine.tick_at(at_ms(3000));
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.error_ratio, snapshot.backspace as f64 / snapshot.keystrokes as f64);
    }

    #[test]
    fn test_derived_fields_wait_for_tick() {
        let engine = engine();
        engine.on_key_event(&KeyEvent::char_key(at_ms(100), 'a'));
        engine.on_key_event(&KeyEvent::backspace(at_ms(200)));

        let before = engine.snapshot();
        assert_eq!(before.keystrokes, 1);
        assert_eq!(before.error_ratio, 0.0);

        engine.tick_at(at_ms(10_200));
        let after = engine.snapshot();
        assert_eq!(after.error_ratio, 1.0);
        assert_eq!(after.idle_time, 10.0);
        assert!((after.active_time - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_initial_file_label() {
        let config = PulseConfig {
            initial_file: Some("start.js".to_string()),
            ..PulseConfig::default()
        };
        let engine = BehaviorEngine::started_at(config, t0());
        assert_eq!(engine.snapshot().current_file, "start.js");
        assert_eq!(engine.snapshot().file_switches, 0);
    }

    #[test]
    fn test_switch_scans_content() {
        let engine = engine();
        let reader = MapReader::with("app.js", "function go(){}\n// note\nif (a) {}\n");
        assert!(switch_to(&engine, "app.js", &reader));

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.current_file, "app.js");
        assert_eq!(snapshot.file_switches, 1);
        assert_eq!(snapshot.lines_added, 3);
        assert_eq!(snapshot.patterns["functions"], 1);
        assert_eq!(snapshot.patterns["if_statements"], 1);
    }

    #[test]
    fn test_failed_scan_clears_patterns_only() {
        let engine = engine();
        let reader = MapReader::with("app.js", "console.log(1)\nconsole.log(2)\n");
        switch_to(&engine, "app.js", &reader);
        engine.on_key_event(&KeyEvent::char_key(at_ms(100), 'z'));

        switch_to(&engine, "gone.js", &reader);
        let snapshot = engine.snapshot();
        assert!(snapshot.patterns.is_empty());
        assert_eq!(snapshot.current_file, "gone.js");
        assert_eq!(snapshot.file_switches, 2);
        assert_eq!(snapshot.lines_added, 2);
        assert_eq!(snapshot.keystrokes, 1);

        // Scanning resumes on the next switch
        switch_to(&engine, "app.js", &reader);
        assert_eq!(engine.snapshot().patterns["console_logs"], 2);
    }

    #[test]
    fn test_repeated_signal_is_one_switch() {
        let engine = engine();
        let reader = MapReader::with("app.js", "class A {}\n");
        assert!(switch_to(&engine, "app.js", &reader));
        assert!(!switch_to(&engine, "app.js", &reader));
        assert!(!engine.observe_active_file(None, &reader));
        assert!(!switch_to(&engine, "app.js", &reader));

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.file_switches, 1);
        assert_eq!(snapshot.patterns["classes"], 1);
    }

    #[test]
    fn test_concurrent_sources_count_one_switch() {
        let engine = engine();
        let reader = Arc::new(MapReader::with("app.js", "if (x) {}\n"));
        let sources: Vec<_> = (0..2)
            .map(|_| {
                let engine = engine.clone();
                let reader = Arc::clone(&reader);
                thread::spawn(move || {
                    (0..100)
                        .filter(|_| switch_to(&engine, "app.js", reader.as_ref()))
                        .count()
                })
            })
            .collect();

        let switched: usize = sources.into_iter().map(|s| s.join().unwrap()).sum();
        assert_eq!(switched, 1);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.file_switches, 1);
        assert_eq!(snapshot.current_file, "app.js");
        assert_eq!(snapshot.patterns["if_statements"], 1);
    }

    #[test]
    fn test_stale_scan_is_discarded() {
        let engine = engine();
        let (started_tx, started_rx) = mpsc::channel();
        let (gate_tx, gate_rx) = mpsc::channel();
        let reader = Arc::new(GatedReader {
            started: Mutex::new(started_tx),
            gate: Mutex::new(gate_rx),
        });

        let slow = {
            let engine = engine.clone();
            let reader = Arc::clone(&reader);
            thread::spawn(move || switch_to(&engine, "slow.js", reader.as_ref()))
        };
        started_rx.recv().unwrap();

        // The user moves on while slow.js is still being read
        assert!(switch_to(&engine, "fast.js", reader.as_ref()));
        gate_tx.send(()).unwrap();
        assert!(slow.join().unwrap());

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.current_file, "fast.js");
        assert_eq!(snapshot.file_switches, 2);
        assert_eq!(snapshot.lines_added, 1);
        assert_eq!(snapshot.patterns["functions"], 1);
        assert_eq!(snapshot.patterns["classes"], 0);
        assert_eq!(snapshot.patterns["comments"], 0);
    }

    #[test]
    fn test_failed_export_leaves_state_untouched() {
        let engine = engine();
        engine.on_key_event(&KeyEvent::char_key(at_ms(0), 'a'));
        engine.on_key_event(&KeyEvent::char_key(at_ms(5000), 'b'));
        engine.tick_at(at_ms(6000));

        let before = export::to_document(&engine.snapshot()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let result = engine.export_to(&dir.path().join("no-such-dir").join("out.json"));
        assert!(matches!(result, Err(PulseError::Export { .. })));

        let after = export::to_document(&engine.snapshot()).unwrap();
        assert_eq!(before, after);

        // Ticks keep working after the failure
        engine.tick_at(at_ms(7000));
        assert_eq!(engine.snapshot().idle_time, 2.0);
    }

    #[test]
    fn test_export_writes_current_state() {
        let engine = engine();
        engine.on_key_event(&KeyEvent::char_key(at_ms(0), 'a'));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        engine.export_to(&path).unwrap();
        let written: BehaviorSnapshot =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, engine.snapshot());
    }

    #[test]
    fn test_concurrent_capture_and_ticks() {
        let engine = engine();
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let engine = engine.clone();
                thread::spawn(move || {
                    for i in 0..500 {
                        let ts = at_ms(i * 10);
                        if i % 5 == 0 {
                            engine.on_key_event(&KeyEvent::backspace(ts));
                        } else if w == 0 && i % 7 == 0 {
                            engine.on_key_event(&KeyEvent::unclassified(ts));
                        } else {
                            engine.on_key_event(&KeyEvent::char_key(ts, 'q'));
                        }
                    }
                })
            })
            .collect();

        let ticker = {
            let engine = engine.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    engine.tick_at(at_ms(i * 25));
                    let s = engine.snapshot();
                    assert_eq!(s.burst_count as usize, s.pauses.len());
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        ticker.join().unwrap();

        // 100 backspaces per writer; writer 0 also sends unclassified keys
        let unclassified = (0..500).filter(|i| i % 5 != 0 && i % 7 == 0).count() as u64;
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.backspace, 400);
        assert_eq!(snapshot.keystrokes, 1600 - unclassified);
        // Writers interleave out of order but no writer ever pauses
        assert!(snapshot.pauses.is_empty());

        engine.tick_at(at_ms(10_000));
        let snapshot = engine.snapshot();
        assert_eq!(
            snapshot.error_ratio,
            snapshot.backspace as f64 / snapshot.keystrokes as f64
        );
    }

    #[test]
    fn test_spawned_aggregator_updates_snapshot() {
        let config = PulseConfig {
            tick_interval_ms: 10,
            ..PulseConfig::default()
        };
        let engine = BehaviorEngine::started_at(config, Utc::now() - Duration::seconds(5));
        engine.on_key_event(&KeyEvent::backspace(Utc::now()));
        engine.spawn_aggregator().unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while engine.snapshot().error_ratio != 1.0 {
            assert!(std::time::Instant::now() < deadline, "aggregator never ticked");
            thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(engine.snapshot().active_time > 4.0);
    }
}
