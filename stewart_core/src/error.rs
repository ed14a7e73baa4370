use thiserror::Error;

use crate::calibration::CalibrationStage;

#[derive(Debug, Error, Clone)]
pub enum PlatformError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for feedback")]
    Timeout,
    #[error("invalid state: {0}")]
    State(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("actuator {index} calibration failed: {fault}")]
    Calibration {
        index: usize,
        fault: CalibrationFault,
    },
    #[error("run exceeded max_run_ms ({max_run_ms} ms)")]
    RunTimeout { max_run_ms: u64 },
    #[error("interrupted")]
    Interrupted,
    #[error("command rejected: {0}")]
    Command(#[from] CommandError),
}

/// A motion command that was refused. Refusal is atomic: no actuator target
/// changes when one of these is returned.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum CommandError {
    #[error("actuator index {0} out of range")]
    InvalidActuator(usize),
    #[error("length for actuator {index} is not a finite number")]
    NonFinite { index: usize },
    #[error("length {length} for actuator {index} is outside [0, 1]")]
    OutOfRange { index: usize, length: f64 },
    #[error("actuator {index} is not ready")]
    NotReady { index: usize },
    #[error("bounds {min}..{max} for actuator {index} are invalid")]
    InvalidBounds { index: usize, min: u16, max: u16 },
}

/// Why a physical calibration stopped. The actuator stays uncalibrated with
/// its motor off until a new calibration is requested.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationFault {
    #[error("no end-stop reached within {timeout_ms} ms during {stage:?}")]
    MoveTimeout {
        stage: CalibrationStage,
        timeout_ms: u64,
    },
    #[error("measured range {min}..{max} is narrower than {min_span}")]
    RangeTooNarrow { min: u16, max: u16, min_span: u16 },
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing actuator io")]
    MissingActuators,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
