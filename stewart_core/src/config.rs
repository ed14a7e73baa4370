//! Runtime configuration for the platform controller.
//!
//! These are the structs handed to `Platform` at construction. They are
//! separate from the TOML-deserialized config in `stewart_config`; see
//! `conversions` for the mapping.

/// Number of actuators on the platform.
pub const NUM_ACTUATORS: usize = 6;
/// Smallest accepted smoothing window.
pub const MIN_SMOOTH: usize = 5;
/// Capacity of the smoothing ring buffer.
pub const MAX_SMOOTH: usize = 50;
/// PWM duty for full speed.
pub const FULL_PWM: u8 = 255;

/// Pin identity of one actuator; fixed for the unit's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorPins {
    pub extend: u8,
    pub retract: u8,
    pub enable: u8,
    /// Analog channel of the feedback wiper.
    pub feedback: u8,
}

/// Feedback smoothing and loop rate.
#[derive(Debug, Clone, Copy)]
pub struct FilterCfg {
    /// Moving-average window, `MIN_SMOOTH..=MAX_SMOOTH` samples.
    pub smooth: usize,
    /// Rate the driver is expected to call `tick()` at (informational for the
    /// core; drives the runner's pacing).
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

/// Closed-loop position control.
#[derive(Debug, Clone, Copy)]
pub struct ControlCfg {
    /// Deadband half-width around the target (raw units). Inside it the motor
    /// brakes instead of hunting.
    pub tolerance: u16,
    /// Full-scale feedback reading.
    pub adc_max: u16,
    /// Below this distance to target the drive speed tapers.
    pub slow_zone: u16,
    /// Fraction of full PWM used at the edge of the deadband.
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

/// Physical calibration sequence tunables.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationCfg {
    /// Calibration PWM as a fraction of full speed.
    pub speed_ratio: f32,
    pub stroke_length_in: f32,
    pub speed_in_per_s: f32,
    pub stall_window_ms: u64,
    pub stall_epsilon: u16,
    pub extra_seconds: u32,
    /// 0 disables the back-off/re-approach probe stages.
    pub probe_distance: u16,
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

impl CalibrationCfg {
    /// Longest a single calibration move may run before it is declared hung:
    /// one full stroke at calibration speed plus the extra margin.
    pub fn move_timeout_ms(&self) -> u64 {
        let speed = f64::from(self.speed_in_per_s) * f64::from(self.speed_ratio);
        let stroke_ms = if speed > 0.0 {
            (f64::from(self.stroke_length_in) / speed * 1000.0).ceil()
        } else {
            0.0
        };
        let stroke_ms = if stroke_ms.is_finite() {
            stroke_ms.clamp(0.0, u64::MAX as f64) as u64
        } else {
            0
        };
        stroke_ms.saturating_add(u64::from(self.extra_seconds) * 1000)
    }

    /// PWM duty used for every calibration move.
    pub fn pwm(&self) -> u8 {
        crate::fixed_point::pwm_fraction(self.speed_ratio)
    }

    pub fn probing(&self) -> bool {
        self.probe_distance > 0
    }
}

/// Persistent record bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct PersistCfg {
    pub format_version: u8,
    pub max_cycles: u8,
}

impl Default for PersistCfg {
    fn default() -> Self {
        Self {
            format_version: 1,
            max_cycles: 10,
        }
    }
}

/// Everything the Platform Coordinator needs at construction.
#[derive(Debug, Clone, Copy)]
pub struct PlatformCfg {
    pub pins: [ActuatorPins; NUM_ACTUATORS],
    pub filter: FilterCfg,
    pub control: ControlCfg,
    pub calibration: CalibrationCfg,
    pub persist: PersistCfg,
}

impl Default for PlatformCfg {
    fn default() -> Self {
        Self {
            pins: stewart_config::DEFAULT_PINS.map(|p| ActuatorPins::from(&p)),
            filter: FilterCfg::default(),
            control: ControlCfg::default(),
            calibration: CalibrationCfg::default(),
            persist: PersistCfg::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_move_timeout_covers_slow_stroke() {
        // 12 in at 0.5 in/s * 0.25 = 96 s, plus 5 s margin
        assert_eq!(CalibrationCfg::default().move_timeout_ms(), 101_000);
    }

    #[test]
    fn calibration_pwm_is_quarter_speed() {
        assert_eq!(CalibrationCfg::default().pwm(), 64);
    }
}
