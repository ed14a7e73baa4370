#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and bounds CSV handling for the Stewart platform controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Bounds CSV holds one `(min, max)` pair per actuator and lets a known
//!   calibration be restored without touching the persistent store.
use serde::{Deserialize, Serialize};

/// Number of actuators on the platform.
pub const NUM_ACTUATORS: usize = 6;

/// Smallest and largest accepted smoothing window.
pub const SMOOTH_RANGE: std::ops::RangeInclusive<usize> = 5..=50;

/// Pin assignment of one actuator. `feedback_pin` is the analog channel
/// (A0 = 0, A1 = 1, ...).
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorPins {
    pub extend_pin: u8,
    pub retract_pin: u8,
    pub enable_pin: u8,
    pub feedback_pin: u8,
}

/// Wiring of the reference rig, in leg order A1, A2, B1, B2, C1, C2.
pub const DEFAULT_PINS: [ActuatorPins; NUM_ACTUATORS] = [
    ActuatorPins { extend_pin: 32, retract_pin: 33, enable_pin: 8, feedback_pin: 0 },
    ActuatorPins { extend_pin: 30, retract_pin: 31, enable_pin: 9, feedback_pin: 1 },
    ActuatorPins { extend_pin: 28, retract_pin: 29, enable_pin: 10, feedback_pin: 2 },
    ActuatorPins { extend_pin: 26, retract_pin: 27, enable_pin: 11, feedback_pin: 3 },
    ActuatorPins { extend_pin: 24, retract_pin: 25, enable_pin: 12, feedback_pin: 4 },
    ActuatorPins { extend_pin: 22, retract_pin: 23, enable_pin: 13, feedback_pin: 5 },
];

fn default_actuators() -> Vec<ActuatorPins> {
    DEFAULT_PINS.to_vec()
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FilterCfg {
    /// Moving-average window (5..=50 samples).
    pub smooth: usize,
    /// Control loop rate the driver paces ticks at.
    pub tick_rate_hz: u32,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self {
            smooth: 5,
            tick_rate_hz: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlCfg {
    /// Deadband around the target, in raw feedback units.
    pub tolerance: u16,
    /// Full-scale ADC reading.
    pub adc_max: u16,
    /// Distance to target below which the drive speed tapers off.
    pub slow_zone: u16,
    /// Fraction of full speed used right at the edge of the deadband.
    pub min_speed_ratio: f32,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            tolerance: 30,
            adc_max: 1023,
            slow_zone: 120,
            min_speed_ratio: 0.2,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Calibration speed as a fraction of full speed.
    pub speed_ratio: f32,
    /// Mechanical stroke of one actuator (inches).
    pub stroke_length_in: f32,
    /// Full-speed travel rate (inches per second).
    pub speed_in_per_s: f32,
    /// Feedback must stay within `stall_epsilon` this long to count as a stall.
    pub stall_window_ms: u64,
    pub stall_epsilon: u16,
    /// Margin added to the nominal stroke time before a move is declared hung.
    pub extra_seconds: u32,
    /// Back-off distance for the re-approach probe; 0 disables probing.
    pub probe_distance: u16,
    /// Smallest acceptable `max - min` after calibration.
    pub min_span: u16,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            speed_ratio: 0.25,
            stroke_length_in: 12.0,
            speed_in_per_s: 0.5,
            stall_window_ms: 500,
            stall_epsilon: 2,
            extra_seconds: 5,
            probe_distance: 40,
            min_span: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Persistence {
    /// Backing file of the calibration store.
    pub path: String,
    pub format_version: u8,
    /// Restored boots allowed before a physical re-calibration is forced.
    pub max_cycles: u8,
}

impl Default for Persistence {
    fn default() -> Self {
        Self {
            path: "stewart_calibration.bin".to_string(),
            format_version: 1,
            max_cycles: 10,
        }
    }
}

/// Parameters of the simulated backend (ignored on real hardware).
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Simulation {
    pub units_per_tick: f32,
    pub noise: u16,
    pub lower_stop: f32,
    pub upper_stop: f32,
    /// Each successive actuator's end-stops move inward by this much.
    pub spread: f32,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            units_per_tick: 8.0,
            noise: 1,
            lower_stop: 40.0,
            upper_stop: 990.0,
            spread: 4.0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunnerCfg {
    /// Upper bound on any blocking drive loop (calibrate, move).
    pub max_run_ms: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            max_run_ms: 300_000,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_actuators")]
    pub actuators: Vec<ActuatorPins>,
    #[serde(default)]
    pub filter: FilterCfg,
    #[serde(default)]
    pub control: ControlCfg,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub persistence: Persistence,
    #[serde(default)]
    pub simulation: Simulation,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub runner: RunnerCfg,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            actuators: default_actuators(),
            filter: FilterCfg::default(),
            control: ControlCfg::default(),
            calibration: CalibrationCfg::default(),
            persistence: Persistence::default(),
            simulation: Simulation::default(),
            logging: Logging::default(),
            runner: RunnerCfg::default(),
        }
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    /// Pin table as a fixed array; only meaningful after `validate()`.
    pub fn pins(&self) -> eyre::Result<[ActuatorPins; NUM_ACTUATORS]> {
        <[ActuatorPins; NUM_ACTUATORS]>::try_from(self.actuators.as_slice()).map_err(|_| {
            eyre::eyre!(
                "actuators: expected {NUM_ACTUATORS} entries, got {}",
                self.actuators.len()
            )
        })
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Actuators
        if self.actuators.len() != NUM_ACTUATORS {
            eyre::bail!(
                "actuators: expected {NUM_ACTUATORS} entries, got {}",
                self.actuators.len()
            );
        }
        let mut digital: Vec<u8> = Vec::with_capacity(NUM_ACTUATORS * 3);
        let mut analog: Vec<u8> = Vec::with_capacity(NUM_ACTUATORS);
        for (i, a) in self.actuators.iter().enumerate() {
            for pin in [a.extend_pin, a.retract_pin, a.enable_pin] {
                if digital.contains(&pin) {
                    eyre::bail!("actuators[{i}]: digital pin {pin} assigned twice");
                }
                digital.push(pin);
            }
            if analog.contains(&a.feedback_pin) {
                eyre::bail!(
                    "actuators[{i}]: feedback channel {} assigned twice",
                    a.feedback_pin
                );
            }
            analog.push(a.feedback_pin);
        }

        // Filter
        if !SMOOTH_RANGE.contains(&self.filter.smooth) {
            eyre::bail!("filter.smooth must be in [5, 50]");
        }
        if self.filter.tick_rate_hz == 0 {
            eyre::bail!("filter.tick_rate_hz must be > 0");
        }
        if self.filter.tick_rate_hz > 10_000 {
            eyre::bail!("filter.tick_rate_hz is unreasonably large (>10kHz)");
        }

        // Control
        if self.control.adc_max == 0 {
            eyre::bail!("control.adc_max must be > 0");
        }
        if self.control.tolerance == 0 || self.control.tolerance >= self.control.adc_max / 2 {
            eyre::bail!("control.tolerance must be in [1, adc_max/2)");
        }
        if self.control.slow_zone < self.control.tolerance {
            eyre::bail!("control.slow_zone must be >= control.tolerance");
        }
        if !(self.control.min_speed_ratio > 0.0 && self.control.min_speed_ratio <= 1.0) {
            eyre::bail!("control.min_speed_ratio must be in (0.0, 1.0]");
        }

        // Calibration
        let c = &self.calibration;
        if !(c.speed_ratio > 0.0 && c.speed_ratio <= 1.0) {
            eyre::bail!("calibration.speed_ratio must be in (0.0, 1.0]");
        }
        if !(c.stroke_length_in.is_finite() && c.stroke_length_in > 0.0) {
            eyre::bail!("calibration.stroke_length_in must be > 0");
        }
        if !(c.speed_in_per_s.is_finite() && c.speed_in_per_s > 0.0) {
            eyre::bail!("calibration.speed_in_per_s must be > 0");
        }
        if c.stall_window_ms == 0 {
            eyre::bail!("calibration.stall_window_ms must be >= 1");
        }
        if c.stall_window_ms > 60_000 {
            eyre::bail!("calibration.stall_window_ms is unreasonably large (>60s)");
        }
        if c.stall_epsilon >= self.control.adc_max {
            eyre::bail!("calibration.stall_epsilon must be < control.adc_max");
        }
        if c.probe_distance >= self.control.adc_max / 2 {
            eyre::bail!("calibration.probe_distance must be < adc_max/2");
        }
        if c.min_span == 0 || c.min_span >= self.control.adc_max {
            eyre::bail!("calibration.min_span must be in [1, adc_max)");
        }

        // Persistence
        if self.persistence.path.trim().is_empty() {
            eyre::bail!("persistence.path must not be empty");
        }
        if self.persistence.format_version == 0xFF {
            eyre::bail!("persistence.format_version 255 is reserved (erased cell)");
        }
        if self.persistence.max_cycles == 0 {
            eyre::bail!("persistence.max_cycles must be >= 1");
        }

        // Simulation
        let s = &self.simulation;
        if !(s.units_per_tick.is_finite() && s.units_per_tick > 0.0) {
            eyre::bail!("simulation.units_per_tick must be > 0");
        }
        if !(s.lower_stop.is_finite() && s.upper_stop.is_finite() && s.lower_stop < s.upper_stop)
        {
            eyre::bail!("simulation.lower_stop must be < simulation.upper_stop");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Runner
        if self.runner.max_run_ms == 0 {
            eyre::bail!("runner.max_run_ms must be >= 1");
        }

        Ok(())
    }
}

/// Bounds CSV schema.
///
/// Expected headers:
/// actuator,min,max
///
/// Example:
/// actuator,min,max
/// 0,48,987
/// 1,51,979
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct BoundsRow {
    pub actuator: usize,
    pub min: u16,
    pub max: u16,
}

/// Fold rows into the per-actuator `[min, max]` table. Every actuator must
/// appear exactly once with `min < max`.
pub fn bounds_from_rows(rows: &[BoundsRow]) -> eyre::Result<[[u16; 2]; NUM_ACTUATORS]> {
    if rows.len() != NUM_ACTUATORS {
        eyre::bail!(
            "bounds require exactly {NUM_ACTUATORS} rows, got {}",
            rows.len()
        );
    }
    let mut out = [[0u16; 2]; NUM_ACTUATORS];
    let mut seen = [false; NUM_ACTUATORS];
    for r in rows {
        let Some(slot) = seen.get_mut(r.actuator) else {
            eyre::bail!("bounds row has actuator index {} out of range", r.actuator);
        };
        if *slot {
            eyre::bail!("bounds rows have duplicate actuator {}", r.actuator);
        }
        if r.min >= r.max {
            eyre::bail!(
                "bounds for actuator {} must satisfy min < max (got {} >= {})",
                r.actuator,
                r.min,
                r.max
            );
        }
        *slot = true;
        out[r.actuator] = [r.min, r.max];
    }
    Ok(out)
}

pub fn load_bounds_csv(path: &std::path::Path) -> eyre::Result<[[u16; 2]; NUM_ACTUATORS]> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open bounds CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["actuator", "min", "max"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "bounds CSV must have headers 'actuator,min,max', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::with_capacity(NUM_ACTUATORS);
    for (idx, rec) in rdr.deserialize::<BoundsRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    bounds_from_rows(&rows)
}

pub fn write_bounds_csv(
    path: &std::path::Path,
    bounds: &[[u16; 2]; NUM_ACTUATORS],
) -> eyre::Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| eyre::eyre!("create bounds CSV {:?}: {}", path, e))?;
    for (actuator, [min, max]) in bounds.iter().copied().enumerate() {
        wtr.serialize(BoundsRow { actuator, min, max })
            .map_err(|e| eyre::eyre!("write bounds CSV {:?}: {}", path, e))?;
    }
    wtr.flush()
        .map_err(|e| eyre::eyre!("flush bounds CSV {:?}: {}", path, e))?;
    Ok(())
}
