//! `From` implementations bridging `stewart_config` types to `stewart_core` types.

use crate::config::{ActuatorPins, CalibrationCfg, ControlCfg, FilterCfg, PersistCfg, PlatformCfg};

impl From<&stewart_config::ActuatorPins> for ActuatorPins {
    fn from(p: &stewart_config::ActuatorPins) -> Self {
        Self {
            extend: p.extend_pin,
            retract: p.retract_pin,
            enable: p.enable_pin,
            feedback: p.feedback_pin,
        }
    }
}

impl From<&stewart_config::FilterCfg> for FilterCfg {
    fn from(c: &stewart_config::FilterCfg) -> Self {
        Self {
            smooth: c.smooth,
            tick_rate_hz: c.tick_rate_hz,
        }
    }
}

impl From<&stewart_config::ControlCfg> for ControlCfg {
    fn from(c: &stewart_config::ControlCfg) -> Self {
        Self {
            tolerance: c.tolerance,
            adc_max: c.adc_max,
            slow_zone: c.slow_zone,
            min_speed_ratio: c.min_speed_ratio,
        }
    }
}

impl From<&stewart_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &stewart_config::CalibrationCfg) -> Self {
        Self {
            speed_ratio: c.speed_ratio,
            stroke_length_in: c.stroke_length_in,
            speed_in_per_s: c.speed_in_per_s,
            stall_window_ms: c.stall_window_ms,
            stall_epsilon: c.stall_epsilon,
            extra_seconds: c.extra_seconds,
            probe_distance: c.probe_distance,
            min_span: c.min_span,
        }
    }
}

impl From<&stewart_config::Persistence> for PersistCfg {
    fn from(c: &stewart_config::Persistence) -> Self {
        Self {
            format_version: c.format_version,
            max_cycles: c.max_cycles,
        }
    }
}

impl TryFrom<&stewart_config::Config> for PlatformCfg {
    type Error = eyre::Report;

    fn try_from(c: &stewart_config::Config) -> Result<Self, Self::Error> {
        let pins = c.pins()?;
        Ok(Self {
            pins: pins.map(|p| ActuatorPins::from(&p)),
            filter: FilterCfg::from(&c.filter),
            control: ControlCfg::from(&c.control),
            calibration: CalibrationCfg::from(&c.calibration),
            persist: PersistCfg::from(&c.persistence),
        })
    }
}
