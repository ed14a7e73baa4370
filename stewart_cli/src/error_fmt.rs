//! Human-readable error descriptions and structured JSON error formatting.

use stewart_core::error::{BuildError, CalibrationFault, CommandError, PlatformError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingActuators => {
                "What happened: No actuator I/O was provided to the platform.\nLikely causes: The backend failed to initialize or was not wired into the builder.\nHow to fix: Ensure all six actuators are created and passed via with_actuators(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/stewart_config.toml for a sample."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<PlatformError>() {
        match pe {
            PlatformError::Calibration { index, fault } => {
                return match fault {
                    CalibrationFault::MoveTimeout { stage, timeout_ms } => format!(
                        "What happened: Actuator {index} did not reach an end-stop within {timeout_ms} ms ({stage:?}).\nLikely causes: Motor not powered, H-bridge miswired, or feedback wiper disconnected.\nHow to fix: Check motor supply and driver pins, verify the feedback channel moves when the rod moves, then rerun `stewart calibrate --force`."
                    ),
                    CalibrationFault::RangeTooNarrow { min, max, min_span } => format!(
                        "What happened: Actuator {index} measured a travel range of {min}..{max}, narrower than {min_span}.\nLikely causes: Feedback sensor stuck or disconnected, or the rod is mechanically blocked.\nHow to fix: Check the potentiometer wiring on this leg, free the mechanism, then rerun `stewart calibrate --force`."
                    ),
                };
            }
            PlatformError::RunTimeout { max_run_ms } => {
                return format!(
                    "What happened: max run time was exceeded ({max_run_ms} ms).\nLikely causes: Calibration or move slower than expected, or a leg that never settles.\nHow to fix: Increase runner.max_run_ms (or --max-run-ms) or check tolerance/slow_zone tuning."
                );
            }
            PlatformError::Timeout => {
                return "What happened: Feedback read timed out.\nLikely causes: ADC not wired correctly, no power/ground.\nHow to fix: Verify the feedback channels in [[actuators]] and the sensor supply.".to_string();
            }
            PlatformError::Command(ce) => {
                let hint = match ce {
                    CommandError::NotReady { .. } => {
                        "How to fix: Calibrate first (`stewart calibrate`) or pass --bounds."
                    }
                    CommandError::NonFinite { .. } | CommandError::OutOfRange { .. } => {
                        "How to fix: Pass six numbers in [0, 1], e.g. --lengths 0.5,0.5,0.5,0.5,0.5,0.5."
                    }
                    CommandError::InvalidBounds { .. } => {
                        "How to fix: Every bounds row must satisfy min < max <= control.adc_max."
                    }
                    CommandError::InvalidActuator(_) => "How to fix: Use an index in 0..6.",
                };
                return format!(
                    "What happened: Command rejected ({ce}).\nLikely causes: Invalid input or the platform is not ready; nothing was moved.\n{hint}"
                );
            }
            PlatformError::Interrupted => {
                return "What happened: Interrupted; all motors were stopped.\nLikely causes: Ctrl-C or a termination signal.\nHow to fix: Rerun the command when ready.".to_string();
            }
            _ => {}
        }
        return format!(
            "What happened: {pe}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("bounds csv must have headers") {
        return "Invalid headers in bounds CSV. Expected 'actuator,min,max'.".to_string();
    }

    if lower.contains("invalid configuration") || lower.contains("parse config") {
        let cause = err.root_cause();
        return format!(
            "What happened: Configuration is invalid or incomplete ({cause}).\nLikely causes: Wrong [[actuators]] count, duplicate pins, or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 calibration fault, 4 run timeout, 5 command rejected,
/// 130 interrupted, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<PlatformError>() {
        Some(PlatformError::Calibration { .. }) => 3,
        Some(PlatformError::RunTimeout { .. }) => 4,
        Some(PlatformError::Command(_)) => 5,
        Some(PlatformError::Interrupted) => 130,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<PlatformError>() {
        Some(PlatformError::Calibration { .. }) => "CalibrationFault",
        Some(PlatformError::RunTimeout { .. }) => "RunTimeout",
        Some(PlatformError::Command(_)) => "CommandRejected",
        Some(PlatformError::Interrupted) => "Interrupted",
        _ => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let details = match err.downcast_ref::<PlatformError>() {
        Some(PlatformError::Calibration { index, fault }) => {
            Some(json!({ "actuator": index, "fault": fault.to_string() }))
        }
        Some(PlatformError::RunTimeout { max_run_ms }) => Some(json!({ "max_run_ms": max_run_ms })),
        Some(PlatformError::Command(ce)) => Some(json!({ "error": ce.to_string() })),
        _ => None,
    };

    let obj = match details {
        Some(d) => json!({ "reason": reason_name(err), "details": d, "message": humanize(err) }),
        None => json!({ "reason": reason_name(err), "message": humanize(err) }),
    };
    obj.to_string()
}
