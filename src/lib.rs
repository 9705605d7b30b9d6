//! Codepulse - live behavioral metrics for programmers
//!
//! Codepulse watches editing activity and keeps a running picture of how the
//! user types and what they are editing: typing cadence, pauses, error
//! ratio, idle/active split and code-shape statistics of the active file.
//!
//! ## Components
//!
//! - **Capture**: key events update counters and the burst/pause detector
//! - **Aggregator**: a fixed-cadence loop recomputes derived statistics
//! - **Active-file tracker**: edges of the active-file signal trigger a rescan
//! - **Scanner**: lexical counting of code patterns in file text
//! - **Export**: the full snapshot as a pretty-printed JSON document
//! - **Input**: NDJSON records driven live or replayed on their own clock
//!
//! All of them share one [`BehaviorEngine`].

pub mod active_file;
pub mod aggregator;
mod capture;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod input;
pub mod reader;
pub mod scanner;
pub mod types;

pub use active_file::{
    ActiveFileSource, ActiveFileTracker, ManualActiveFile, NoActiveFile, WindowTitleSource,
};
pub use config::PulseConfig;
pub use engine::BehaviorEngine;
pub use error::PulseError;
pub use input::{parse_record, FeedStats, InputRecord};
pub use reader::{FileReader, FsFileReader};
pub use scanner::{analyze, ScanReport};
pub use types::{BehaviorSnapshot, FileStats, KeyEvent, PatternCounts, NO_FILE};

/// Crate version embedded in reports
pub const PULSE_VERSION: &str = env!("CARGO_PKG_VERSION");
