//! Platform Coordinator: the six actuators of the Stewart platform.

use std::sync::Arc;
use std::time::Instant;

use eyre::WrapErr;
use stewart_traits::{ActuatorIo, Clock};

use crate::actuator::Actuator;
use crate::builder::{Missing, PlatformBuilder};
use crate::calibration::{CalibrationOrigin, CalibrationStage};
use crate::config::{NUM_ACTUATORS, PersistCfg, PlatformCfg};
use crate::error::{CommandError, Result};
use crate::status::{ActuatorStatus, PlatformStatus};

pub struct Platform<A: ActuatorIo> {
    pub(crate) actuators: [Actuator<A>; NUM_ACTUATORS],
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) epoch: Instant,
    pub(crate) cfg: PlatformCfg,
}

impl<A: ActuatorIo> core::fmt::Debug for Platform<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Platform")
            .field("actuators", &self.actuators)
            .field("calibrated", &self.is_calibrated())
            .finish()
    }
}

/// Unlike `Actuator::set_length`, a pose command does not clamp: a length
/// outside `[0, 1]` refuses the whole pose.
fn check_platform_length<A: ActuatorIo>(
    a: &Actuator<A>,
    len: f64,
) -> core::result::Result<u16, CommandError> {
    if len.is_finite() && !(0.0..=1.0).contains(&len) {
        return Err(CommandError::OutOfRange {
            index: a.index(),
            length: len,
        });
    }
    a.check_length(len)
}

impl<A: ActuatorIo> Platform<A> {
    /// Start building a Platform.
    pub fn builder() -> PlatformBuilder<A, Missing> {
        PlatformBuilder::new()
    }

    /// Initialize every unit: motors off.
    pub fn setup(&mut self) -> Result<()> {
        for a in &mut self.actuators {
            let i = a.index();
            a.setup().wrap_err_with(|| format!("setup actuator {i}"))?;
        }
        tracing::debug!("platform setup complete");
        Ok(())
    }

    /// Tick every unit once, in index order. A failing unit does not keep the
    /// others from being ticked; the first error is returned afterwards.
    pub fn tick(&mut self) -> Result<PlatformStatus> {
        let now_ms = self.now_ms();
        let mut statuses = [ActuatorStatus::Uncalibrated; NUM_ACTUATORS];
        let mut first_err = None;
        for (slot, a) in statuses.iter_mut().zip(self.actuators.iter_mut()) {
            match a.tick(now_ms) {
                Ok(s) => *slot = s,
                Err(e) => {
                    tracing::warn!(actuator = a.index(), error = %e, "tick failed");
                    *slot = ActuatorStatus::Offline;
                    if first_err.is_none() {
                        let i = a.index();
                        first_err = Some(e.wrap_err(format!("actuator {i}")));
                    }
                }
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }
        Ok(PlatformStatus {
            actuators: statuses,
            calibrated: self.is_calibrated(),
            ready: self.is_ready(),
        })
    }

    /// Start a physical calibration on every unit.
    pub fn calibrate(&mut self) {
        tracing::info!("physical calibration of all actuators");
        for a in &mut self.actuators {
            a.calibrate();
        }
    }

    /// Restore every unit from `[min, max]` pairs without moving any motor.
    /// All pairs are checked first; on error nothing changes.
    pub fn calibrate_with(
        &mut self,
        settings: &[[u16; 2]; NUM_ACTUATORS],
    ) -> core::result::Result<(), CommandError> {
        for (a, [min, max]) in self.actuators.iter().zip(settings) {
            a.check_bounds(*min, *max).inspect_err(|e| {
                tracing::warn!(error = %e, "bounds restore rejected");
            })?;
        }
        for (a, [min, max]) in self.actuators.iter_mut().zip(settings) {
            a.calibrate_with(*min, *max)?;
        }
        tracing::info!("bounds restored for all actuators");
        Ok(())
    }

    /// Set all six targets at once as fractions of travel. If any unit is not
    /// ready or any length is not finite or lies outside `[0, 1]`, the whole
    /// command is refused and no target changes.
    pub fn set_platform_lengths(
        &mut self,
        lengths: &[f64; NUM_ACTUATORS],
    ) -> core::result::Result<[u16; NUM_ACTUATORS], CommandError> {
        let mut targets = [0u16; NUM_ACTUATORS];
        for ((t, a), len) in targets.iter_mut().zip(&self.actuators).zip(lengths) {
            *t = check_platform_length(a, *len).inspect_err(|e| {
                tracing::warn!(error = %e, "platform lengths rejected");
            })?;
        }
        for (a, t) in self.actuators.iter_mut().zip(targets) {
            a.apply_target(t);
        }
        tracing::debug!(?targets, "platform lengths set");
        Ok(targets)
    }

    /// Set one unit's target; see `Actuator::set_length`.
    pub fn set_length(&mut self, index: usize, rel_length: f64) -> core::result::Result<u16, CommandError> {
        self.actuators
            .get_mut(index)
            .ok_or(CommandError::InvalidActuator(index))?
            .set_length(rel_length)
    }

    /// Drop every target and switch all motors off, best-effort: every unit
    /// is attempted and the first error returned.
    pub fn halt(&mut self) -> Result<()> {
        let mut first_err = None;
        for a in &mut self.actuators {
            if let Err(e) = a.halt() {
                tracing::warn!(actuator = a.index(), error = %e, "motor stop failed on halt");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    // ── accessors ────────────────────────────────────────────────────────────

    pub fn actuator_is_valid(&self, index: usize) -> bool {
        index < NUM_ACTUATORS
    }

    pub fn actuator(&self, index: usize) -> Option<&Actuator<A>> {
        self.actuators.get(index)
    }

    pub fn actuators(&self) -> &[Actuator<A>; NUM_ACTUATORS] {
        &self.actuators
    }

    pub fn raw_position(&self, index: usize) -> Option<u16> {
        self.actuator(index).map(Actuator::raw_position)
    }

    pub fn position(&self, index: usize) -> Option<u16> {
        self.actuator(index).map(Actuator::position)
    }

    pub fn target_position(&self, index: usize) -> Option<u16> {
        self.actuator(index)?.target_position()
    }

    pub fn min_position(&self, index: usize) -> Option<u16> {
        self.actuator(index)?.min_position()
    }

    pub fn max_position(&self, index: usize) -> Option<u16> {
        self.actuator(index)?.max_position()
    }

    pub fn calibration_stage(&self, index: usize) -> Option<CalibrationStage> {
        self.actuator(index).map(Actuator::stage)
    }

    /// False for an invalid index.
    pub fn actuator_ready(&self, index: usize) -> bool {
        self.actuator(index).is_some_and(Actuator::is_ready)
    }

    /// Every unit has valid bounds.
    pub fn is_calibrated(&self) -> bool {
        self.actuators.iter().all(Actuator::is_calibrated)
    }

    /// Every unit is calibrated and primed.
    pub fn is_ready(&self) -> bool {
        self.actuators.iter().all(Actuator::is_ready)
    }

    /// All six `[min, max]` pairs, once every unit is calibrated.
    pub fn bounds(&self) -> Option<[[u16; 2]; NUM_ACTUATORS]> {
        let mut out = [[0u16; 2]; NUM_ACTUATORS];
        for (slot, a) in out.iter_mut().zip(&self.actuators) {
            *slot = a.bounds()?;
        }
        Some(out)
    }

    /// True when any unit measured its bounds in this session.
    pub fn any_physical(&self) -> bool {
        self.actuators
            .iter()
            .any(|a| a.origin() == Some(CalibrationOrigin::Physical))
    }

    pub fn persist_cfg(&self) -> PersistCfg {
        self.cfg.persist
    }

    pub fn config(&self) -> &PlatformCfg {
        &self.cfg
    }

    pub fn clock(&self) -> Arc<dyn Clock + Send + Sync> {
        Arc::clone(&self.clock)
    }

    /// Milliseconds since construction, as seen by the platform clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }
}
