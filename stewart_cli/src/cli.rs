//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "stewart", version, about = "Stewart platform controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/stewart_config.toml")]
    pub config: PathBuf,

    /// Restore bounds from a CSV (actuator,min,max) instead of the calibration store
    #[arg(long, value_name = "FILE")]
    pub bounds: Option<PathBuf>,

    /// Calibration store file (overrides persistence.path)
    #[arg(long, value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// Print results and errors as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); falls back to logging.level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Restore bounds from the store (or measure them) and persist the result
    Calibrate {
        /// Always run the physical end-stop calibration
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
        /// Write the resulting bounds to this CSV
        #[arg(long, value_name = "FILE")]
        export: Option<PathBuf>,
        /// Override runner.max_run_ms
        #[arg(long, value_name = "MS")]
        max_run_ms: Option<u64>,
    },
    /// Drive all six actuators to relative lengths in [0, 1] and wait until they hold
    Move {
        /// Six comma-separated lengths, leg order A1,A2,B1,B2,C1,C2
        #[arg(
            long,
            value_delimiter = ',',
            required = true,
            allow_negative_numbers = true
        )]
        lengths: Vec<f64>,
        /// Override runner.max_run_ms
        #[arg(long, value_name = "MS")]
        max_run_ms: Option<u64>,
    },
    /// Inspect or erase the calibration store
    Store {
        #[command(subcommand)]
        action: StoreCmd,
    },
    /// Read every feedback channel once (hardware presence / sim ok)
    SelfCheck,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum StoreCmd {
    /// Decode the stored record and report whether it would be used
    Show,
    /// Erase the record so the next start calibrates physically
    Clear,
}
