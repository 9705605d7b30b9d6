//! Pulse CLI - Command-line driver for the codepulse engine
//!
//! Commands:
//! - run: Track a live NDJSON stream of key and active-file records from stdin,
//!   or replay a recorded one on its own timestamps
//! - analyze: Count code patterns in a single file
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};
#[cfg(not(target_os = "linux"))]
use tracing::warn;
use tracing_subscriber::EnvFilter;

use codepulse::input::{feed_live, replay};
use codepulse::{
    analyze, BehaviorEngine, BehaviorSnapshot, FileReader, FsFileReader, PulseConfig, PulseError,
    PULSE_VERSION,
};
#[cfg(target_os = "linux")]
use codepulse::WindowTitleSource;

/// Pulse - live behavioral metrics for programmers
#[derive(Parser)]
#[command(name = "pulse")]
#[command(version = PULSE_VERSION)]
#[command(about = "Track typing cadence and code-shape signals", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track a live stream of input records from stdin
    Run {
        /// Initial file label (defaults to "NoFile")
        #[arg(long)]
        file: Option<String>,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory that file labels are resolved against
        #[arg(long)]
        workspace: Option<PathBuf>,

        /// Write the final snapshot to this file when input ends
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Print a status line to stderr once per second
        #[arg(long)]
        status: bool,

        /// Detect the active file from the focused editor window (xdotool, Linux only)
        #[arg(long)]
        detect_window: bool,

        /// Replay recorded input using its own timestamps instead of the wall clock
        #[arg(long, conflicts_with_all = ["detect_window", "status"])]
        replay: bool,
    },

    /// Count code patterns in a single file
    Analyze {
        /// File to scan
        path: PathBuf,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check this configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PulseCliError> {
    match cli.command {
        Commands::Run {
            file,
            config,
            workspace,
            export,
            status,
            detect_window,
            replay,
        } => cmd_run(RunOptions {
            file,
            config,
            workspace,
            export,
            status,
            detect_window,
            replay,
        }),

        Commands::Analyze { path } => cmd_analyze(&path),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

struct RunOptions {
    file: Option<String>,
    config: Option<PathBuf>,
    workspace: Option<PathBuf>,
    export: Option<PathBuf>,
    status: bool,
    detect_window: bool,
    replay: bool,
}

fn cmd_run(options: RunOptions) -> Result<(), PulseCliError> {
    let mut config = match &options.config {
        Some(path) => PulseConfig::load(path)?,
        None => PulseConfig::default(),
    };
    if options.file.is_some() {
        config.initial_file = options.file;
    }
    if options.workspace.is_some() {
        config.workspace_root = options.workspace;
    }

    let reader = match &config.workspace_root {
        Some(root) => FsFileReader::with_root(root),
        None => FsFileReader::new(),
    };

    let stdin = io::stdin();
    let engine = if options.replay {
        let (engine, stats) = replay(config, stdin.lock(), &reader)?;
        info!(keys = stats.keys, skipped = stats.skipped, "replay finished");
        engine
    } else {
        let engine = BehaviorEngine::new(config);
        engine.spawn_aggregator()?;
        if options.detect_window {
            spawn_window_tracker(&engine, reader.clone())?;
        }
        if options.status {
            spawn_status_printer(engine.clone())?;
        }
        info!(file = %engine.snapshot().current_file, "tracking started");

        // Window polling and stdin records share the engine's edge detector
        let stats = feed_live(&engine, stdin.lock(), &reader)?;
        info!(keys = stats.keys, skipped = stats.skipped, "input ended");
        engine
    };

    debug!(status = %render_status(&engine.snapshot()), "final snapshot");

    if let Some(path) = &options.export {
        engine.export_to(path)?;
    }

    Ok(())
}

#[cfg(target_os = "linux")]
fn spawn_window_tracker(engine: &BehaviorEngine, reader: FsFileReader) -> io::Result<()> {
    use codepulse::active_file::XdotoolProbe;

    let source = WindowTitleSource::new(XdotoolProbe);
    engine.spawn_active_file_tracker(Box::new(source), Box::new(reader))?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn spawn_window_tracker(_engine: &BehaviorEngine, _reader: FsFileReader) -> io::Result<()> {
    warn!("window detection is only available on Linux; using stdin records only");
    Ok(())
}

fn spawn_status_printer(engine: BehaviorEngine) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("pulse-status".to_string())
        .spawn(move || loop {
            eprintln!("{}", render_status(&engine.snapshot()));
            thread::sleep(Duration::from_secs(1));
        })
}

/// One-line summary of the dashboard fields
fn render_status(s: &BehaviorSnapshot) -> String {
    format!(
        "file={} keys={} backspace={} bursts={} avg_pause={:.2}s cpm={:.2} lines={} \
         switches={} idle={:.1}s active={:.1}s error_ratio={:.2} consistency={:.2} patterns={:?}",
        s.current_file,
        s.keystrokes,
        s.backspace,
        s.burst_count,
        s.average_pause(),
        s.chars_per_minute,
        s.lines_added,
        s.file_switches,
        s.idle_time,
        s.active_time,
        s.error_ratio,
        s.typing_consistency,
        s.patterns,
    )
}

fn cmd_analyze(path: &Path) -> Result<(), PulseCliError> {
    let label = path.to_string_lossy();
    let text = FsFileReader::new().read_text(&label)?;
    let report = analyze(&text);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), PulseCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "pulse_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Pulse version {}", PULSE_VERSION),
    });

    if let Some(config_path) = config {
        let check = if !config_path.exists() {
            DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist".to_string(),
            }
        } else {
            match PulseConfig::load(config_path) {
                Ok(config) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Config valid (pause threshold {:.1}s, tick {}ms)",
                        config.pause_threshold_sec, config.tick_interval_ms
                    ),
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                },
            }
        };
        checks.push(check);
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Warning,
            message: "stdin is a TTY; `pulse run` expects piped NDJSON records".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        version: PULSE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pulse Doctor Report");
        println!("===================");
        println!("Version: {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PulseCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum PulseCliError {
    Io(io::Error),
    Engine(PulseError),
    Json(serde_json::Error),
    DoctorFailed,
}

impl From<io::Error> for PulseCliError {
    fn from(e: io::Error) -> Self {
        PulseCliError::Io(e)
    }
}

impl From<PulseError> for PulseCliError {
    fn from(e: PulseError) -> Self {
        PulseCliError::Engine(e)
    }
}

impl From<serde_json::Error> for PulseCliError {
    fn from(e: serde_json::Error) -> Self {
        PulseCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PulseCliError> for CliError {
    fn from(e: PulseCliError) -> Self {
        match e {
            PulseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PulseCliError::Engine(e @ PulseError::Export { .. }) => CliError {
                code: "EXPORT_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check that the export directory exists and is writable".to_string()),
            },
            PulseCliError::Engine(e @ PulseError::Config(_)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'pulse doctor --config <path>' for details".to_string()),
            },
            PulseCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            PulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            PulseCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
