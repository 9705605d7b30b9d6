//! Active-file tracking
//!
//! Polls an [`ActiveFileSource`] and reports edges of the signal to the
//! engine: every change to a new present label counts as a file switch and
//! triggers a rescan of that file. Unchanged or absent signals do nothing.

use crate::engine::BehaviorEngine;
use crate::reader::FileReader;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::info;

/// Editor window-title markers recognized by [`parse_editor_title`]
const EDITOR_MARKERS: &[&str] = &["Visual Studio Code", "Code::Blocks"];

/// Separator between file name and application in editor titles
const TITLE_SEPARATOR: &str = " - ";

/// Capability that reports which file the user is editing, if any
pub trait ActiveFileSource: Send {
    fn active_file(&self) -> Option<String>;
}

/// Source that never reports a file
#[derive(Debug, Clone, Copy, Default)]
pub struct NoActiveFile;

impl ActiveFileSource for NoActiveFile {
    fn active_file(&self) -> Option<String> {
        None
    }
}

/// Source whose label is set by the embedding program
#[derive(Debug, Clone, Default)]
pub struct ManualActiveFile {
    label: Arc<Mutex<Option<String>>>,
}

impl ManualActiveFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, label: Option<String>) {
        *self.label.lock() = label;
    }
}

impl ActiveFileSource for ManualActiveFile {
    fn active_file(&self) -> Option<String> {
        self.label.lock().clone()
    }
}

/// Something that can read the title of the focused window
pub trait WindowTitleProbe: Send {
    fn active_window_title(&self) -> Option<String>;
}

impl<F> WindowTitleProbe for F
where
    F: Fn() -> Option<String> + Send,
{
    fn active_window_title(&self) -> Option<String> {
        self()
    }
}

/// Derives the active file from the focused editor's window title
pub struct WindowTitleSource<P> {
    probe: P,
}

impl<P: WindowTitleProbe> WindowTitleSource<P> {
    pub fn new(probe: P) -> Self {
        Self { probe }
    }
}

impl<P: WindowTitleProbe> ActiveFileSource for WindowTitleSource<P> {
    fn active_file(&self) -> Option<String> {
        self.probe
            .active_window_title()
            .and_then(|title| parse_editor_title(&title))
    }
}

/// Extract the file label from an editor title such as
/// `"main.js - project - Visual Studio Code"`.
///
/// Titles from other applications yield `None`.
pub fn parse_editor_title(title: &str) -> Option<String> {
    if !EDITOR_MARKERS.iter().any(|marker| title.contains(marker)) {
        return None;
    }
    title
        .split(TITLE_SEPARATOR)
        .next()
        .filter(|label| !label.is_empty())
        .map(str::to_string)
}

/// Queries the focused X11 window title through `xdotool`
#[cfg(target_os = "linux")]
#[derive(Debug, Clone, Copy, Default)]
pub struct XdotoolProbe;

#[cfg(target_os = "linux")]
impl WindowTitleProbe for XdotoolProbe {
    fn active_window_title(&self) -> Option<String> {
        let output = std::process::Command::new("xdotool")
            .args(["getactivewindow", "getwindowname"])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let title = String::from_utf8(output.stdout).ok()?;
        Some(title.trim_end().to_string())
    }
}

/// Edge detector over successive active-file signals.
///
/// The engine keeps one of these under its lock, so every source feeding
/// the same engine shares a single notion of the last observed file.
#[derive(Debug, Default)]
pub struct ActiveFileTracker {
    last_seen: Option<String>,
}

impl ActiveFileTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample of the signal. Returns the new label on a switch.
    pub fn observe(&mut self, signal: Option<String>) -> Option<String> {
        let label = signal?;
        if self.last_seen.as_deref() == Some(label.as_str()) {
            return None;
        }
        self.last_seen = Some(label.clone());
        Some(label)
    }
}

/// Start the poll loop on its own thread. The loop never exits.
pub(crate) fn spawn(
    engine: BehaviorEngine,
    source: Box<dyn ActiveFileSource>,
    reader: Box<dyn FileReader>,
    interval: Duration,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("pulse-active-file".to_string())
        .spawn(move || {
            info!(interval_ms = interval.as_millis() as u64, "active-file tracker started");
            loop {
                engine.observe_active_file(source.active_file(), reader.as_ref());
                thread::sleep(interval);
            }
        })
}
