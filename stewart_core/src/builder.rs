//! Type-state builder for `Platform`.
//!
//! The builder enforces at compile time that the six actuator I/O handles are
//! provided before `build()` is available. `try_build()` is always available
//! for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use stewart_traits::ActuatorIo;
use stewart_traits::clock::{Clock, MonotonicClock};

use crate::actuator::Actuator;
use crate::config::{MAX_SMOOTH, MIN_SMOOTH, NUM_ACTUATORS, PlatformCfg};
use crate::error::{BuildError, Result};
use crate::platform::Platform;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Platform`. The config is validated on `build()`.
pub struct PlatformBuilder<A, S> {
    io: Option<[A; NUM_ACTUATORS]>,
    cfg: Option<PlatformCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _s: PhantomData<S>,
}

impl<A: ActuatorIo> Default for PlatformBuilder<A, Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ActuatorIo> PlatformBuilder<A, Missing> {
    pub fn new() -> Self {
        Self {
            io: None,
            cfg: None,
            clock: None,
            _s: PhantomData,
        }
    }
}

impl<A: ActuatorIo, S> PlatformBuilder<A, S> {
    /// Provide the six actuator I/O handles, in leg order.
    pub fn with_actuators(self, io: [A; NUM_ACTUATORS]) -> PlatformBuilder<A, Set> {
        PlatformBuilder {
            io: Some(io),
            cfg: self.cfg,
            clock: self.clock,
            _s: PhantomData,
        }
    }

    /// Full controller config; defaults apply when omitted.
    pub fn with_config(mut self, cfg: PlatformCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }

    /// Clock used for stall and timeout detection (defaults to monotonic).
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build without the compile-time guarantee.
    pub fn try_build(self) -> Result<Platform<A>> {
        let io = self
            .io
            .ok_or_else(|| eyre::Report::new(BuildError::MissingActuators))?;
        validate_and_build(io, self.cfg.unwrap_or_default(), self.clock)
    }
}

impl<A: ActuatorIo> PlatformBuilder<A, Set> {
    pub fn build(self) -> Result<Platform<A>> {
        self.try_build()
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

/// Validate configuration and construct the Platform. Single source of
/// truth for both `build()` and `try_build()`.
fn validate_and_build<A: ActuatorIo>(
    io: [A; NUM_ACTUATORS],
    cfg: PlatformCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<Platform<A>> {
    // ── Validation ───────────────────────────────────────────────────────────
    if !(MIN_SMOOTH..=MAX_SMOOTH).contains(&cfg.filter.smooth) {
        return Err(invalid("smooth must be in [5, 50]"));
    }
    if cfg.control.adc_max == 0 {
        return Err(invalid("adc_max must be > 0"));
    }
    if cfg.control.tolerance == 0 || cfg.control.tolerance >= cfg.control.adc_max / 2 {
        return Err(invalid("tolerance must be in [1, adc_max/2)"));
    }
    if cfg.control.slow_zone < cfg.control.tolerance {
        return Err(invalid("slow_zone must be >= tolerance"));
    }
    if !(cfg.control.min_speed_ratio > 0.0 && cfg.control.min_speed_ratio <= 1.0) {
        return Err(invalid("min_speed_ratio must be in (0, 1]"));
    }
    let cal = &cfg.calibration;
    if !(cal.speed_ratio > 0.0 && cal.speed_ratio <= 1.0) {
        return Err(invalid("calibration speed_ratio must be in (0, 1]"));
    }
    if !(cal.speed_in_per_s.is_finite() && cal.speed_in_per_s > 0.0) {
        return Err(invalid("speed_in_per_s must be > 0"));
    }
    if !(cal.stroke_length_in.is_finite() && cal.stroke_length_in > 0.0) {
        return Err(invalid("stroke_length_in must be > 0"));
    }
    if cal.stall_window_ms == 0 {
        return Err(invalid("stall_window_ms must be >= 1"));
    }
    if cal.min_span == 0 {
        return Err(invalid("min_span must be >= 1"));
    }
    if cfg.persist.max_cycles == 0 {
        return Err(invalid("max_cycles must be >= 1"));
    }
    for (i, a) in cfg.pins.iter().enumerate() {
        let clash = cfg.pins[i + 1..].iter().any(|b| {
            [b.extend, b.retract, b.enable]
                .iter()
                .any(|p| [a.extend, a.retract, a.enable].contains(p))
                || b.feedback == a.feedback
        });
        if clash || a.extend == a.retract || a.extend == a.enable || a.retract == a.enable {
            return Err(invalid("pin assigned to more than one function"));
        }
    }

    // ── Construction ─────────────────────────────────────────────────────────
    let mut index = 0;
    let actuators = io.map(|io| {
        let a = Actuator::new(
            index,
            cfg.pins[index],
            io,
            cfg.filter,
            cfg.control,
            cfg.calibration,
        );
        index += 1;
        a
    });
    let clock = clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));
    let epoch = clock.now();

    Ok(Platform {
        actuators,
        clock,
        epoch,
        cfg,
    })
}
