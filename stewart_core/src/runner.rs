//! Blocking drive loops on top of the non-blocking `Platform::tick()`.
//!
//! Each loop paces ticks with the platform clock and is bounded by
//! `max_run_ms`. On timeout, interruption or a calibration fault the motors
//! are halted before returning.

use std::time::Duration;

use stewart_traits::{ActuatorIo, PersistentStore};

use crate::error::{PlatformError, Result};
use crate::persist::{self, CalibrationRecord, LoadOutcome, StaleReason};
use crate::platform::Platform;
use crate::status::PlatformStatus;

/// Loop pacing and limits.
pub struct RunParams {
    pub tick_period: Duration,
    pub max_run_ms: u64,
    /// Polled once per tick; returning true halts the loop.
    pub abort_check: Option<Box<dyn Fn() -> bool>>,
}

impl core::fmt::Debug for RunParams {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RunParams")
            .field("tick_period", &self.tick_period)
            .field("max_run_ms", &self.max_run_ms)
            .field("abort_check", &self.abort_check.is_some())
            .finish()
    }
}

impl RunParams {
    pub fn new(tick_rate_hz: u32, max_run_ms: u64) -> Self {
        Self {
            tick_period: tick_period(tick_rate_hz),
            max_run_ms,
            abort_check: None,
        }
    }

    pub fn with_abort_check(mut self, check: Box<dyn Fn() -> bool>) -> Self {
        self.abort_check = Some(check);
        self
    }
}

/// How a loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub ticks: u64,
    pub elapsed_ms: u64,
    pub status: PlatformStatus,
}

/// How `startup` obtained the bounds it saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupSource {
    Restored { cycle_count: u8 },
    Calibrated { reason: StaleReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupReport {
    pub source: StartupSource,
    pub record: CalibrationRecord,
    pub ticks: u64,
}

/// Loop period for `hz`; a zero rate is treated as 1 Hz and the period never
/// drops below 1 µs.
fn tick_period(hz: u32) -> Duration {
    Duration::from_micros((1_000_000 / u64::from(hz.max(1))).max(1))
}

fn halt_best_effort<A: ActuatorIo>(platform: &mut Platform<A>, context: &str) {
    if let Err(e) = platform.halt() {
        tracing::warn!(error = %e, "halt failed: {context}");
    }
}

/// Tick until `done` returns true for the latest status.
pub fn run_until<A, F>(platform: &mut Platform<A>, params: &RunParams, mut done: F) -> Result<RunReport>
where
    A: ActuatorIo,
    F: FnMut(&PlatformStatus) -> Result<bool>,
{
    let clock = platform.clock();
    let start = clock.now();
    let mut ticks = 0u64;
    loop {
        if params.abort_check.as_ref().is_some_and(|f| f()) {
            halt_best_effort(platform, "interrupted");
            return Err(eyre::Report::new(PlatformError::Interrupted));
        }
        let status = match platform.tick() {
            Ok(s) => s,
            Err(e) => {
                halt_best_effort(platform, "tick error");
                return Err(e);
            }
        };
        ticks += 1;
        let finished = match done(&status) {
            Ok(f) => f,
            Err(e) => {
                halt_best_effort(platform, "loop condition failed");
                return Err(e);
            }
        };
        let elapsed_ms = clock.ms_since(start);
        if finished {
            return Ok(RunReport {
                ticks,
                elapsed_ms,
                status,
            });
        }
        if elapsed_ms >= params.max_run_ms {
            halt_best_effort(platform, "max run time");
            return Err(eyre::Report::new(PlatformError::RunTimeout {
                max_run_ms: params.max_run_ms,
            }));
        }
        clock.sleep(params.tick_period);
    }
}

/// Tick until every unit is calibrated and primed. A calibration fault on
/// any unit ends the loop with `PlatformError::Calibration`.
pub fn run_until_calibrated<A: ActuatorIo>(
    platform: &mut Platform<A>,
    params: &RunParams,
) -> Result<RunReport> {
    let report = run_until(platform, params, |s| {
        if let Some((index, fault)) = s.first_fault() {
            return Err(eyre::Report::new(PlatformError::Calibration { index, fault }));
        }
        Ok(s.ready)
    })?;
    tracing::info!(
        ticks = report.ticks,
        elapsed_ms = report.elapsed_ms,
        "all actuators calibrated"
    );
    Ok(report)
}

/// Tick until every unit is ready and holding (or idle).
pub fn run_until_settled<A: ActuatorIo>(
    platform: &mut Platform<A>,
    params: &RunParams,
) -> Result<RunReport> {
    run_until(platform, params, |s| Ok(s.settled()))
}

/// Boot sequence: restore from the store when the record is valid, otherwise
/// calibrate physically; then persist the result.
pub fn startup<A, S>(platform: &mut Platform<A>, store: &mut S, params: &RunParams) -> Result<StartupReport>
where
    A: ActuatorIo,
    S: PersistentStore,
{
    platform.setup()?;
    let loaded = persist::load_config(store, platform).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "calibration store unreadable");
        LoadOutcome::Stale(StaleReason::Unreadable)
    });

    let source = match loaded {
        LoadOutcome::Restored { cycle_count } => StartupSource::Restored { cycle_count },
        LoadOutcome::Stale(reason) => {
            tracing::info!(%reason, "running physical calibration");
            platform.calibrate();
            StartupSource::Calibrated { reason }
        }
    };
    let report = run_until_calibrated(platform, params)?;
    let record = persist::save_config(store, platform)?;
    Ok(StartupReport {
        source,
        record,
        ticks: report.ticks,
    })
}
