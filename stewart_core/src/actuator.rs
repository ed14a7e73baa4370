//! Actuator Control Unit: one linear actuator with potentiometer feedback.
//!
//! Each unit owns its motor/feedback I/O, a smoothing filter, its learned
//! travel bounds and the calibration stage machine. Everything advances from
//! `tick()`; no method blocks.

use eyre::WrapErr;
use stewart_traits::{ActuatorIo, Direction};

use crate::calibration::{CalibrationOrigin, CalibrationStage, StallDetector};
use crate::config::{ActuatorPins, CalibrationCfg, ControlCfg, FULL_PWM, FilterCfg};
use crate::error::{CalibrationFault, CommandError, Result};
use crate::filter::SmoothingFilter;
use crate::fixed_point::{lerp_u16, pwm_fraction};
use crate::hw_error::map_hw_error;
use crate::status::ActuatorStatus;

pub struct Actuator<A: ActuatorIo> {
    index: usize,
    pins: ActuatorPins,
    io: A,
    filter: SmoothingFilter,
    control: ControlCfg,
    calibration: CalibrationCfg,

    raw_position: u16,
    filt_position: u16,
    target_position: Option<u16>,
    min_position: Option<u16>,
    max_position: Option<u16>,
    is_calibrated: bool,

    stage: CalibrationStage,
    calibration_requested: bool,
    fault: Option<CalibrationFault>,
    origin: Option<CalibrationOrigin>,
    stall: StallDetector,

    // last command that reached the driver
    output: Option<(Direction, u8)>,
}

impl<A: ActuatorIo> core::fmt::Debug for Actuator<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Actuator")
            .field("index", &self.index)
            .field("position", &self.filt_position)
            .field("target", &self.target_position)
            .field("bounds", &self.bounds())
            .field("stage", &self.stage)
            .field("fault", &self.fault)
            .finish()
    }
}

impl<A: ActuatorIo> Actuator<A> {
    pub fn new(
        index: usize,
        pins: ActuatorPins,
        io: A,
        filter: FilterCfg,
        control: ControlCfg,
        calibration: CalibrationCfg,
    ) -> Self {
        Self {
            index,
            pins,
            io,
            filter: SmoothingFilter::new(filter.smooth),
            control,
            calibration,
            raw_position: 0,
            filt_position: 0,
            target_position: None,
            min_position: None,
            max_position: None,
            is_calibrated: false,
            stage: CalibrationStage::NotStarted,
            calibration_requested: false,
            fault: None,
            origin: None,
            stall: StallDetector::start(0, 0),
            output: None,
        }
    }

    /// Put the driver in a known state: motor off.
    pub fn setup(&mut self) -> Result<()> {
        self.output = None;
        self.stop()
    }

    /// One control step: sample feedback, then advance calibration or hold
    /// the target.
    pub fn tick(&mut self, now_ms: u64) -> Result<ActuatorStatus> {
        let raw = match self.io.read_feedback() {
            Ok(v) => v.min(self.control.adc_max),
            Err(e) => {
                let err = map_hw_error(&*e);
                self.stop_best_effort("feedback read failed");
                return Err(eyre::Report::new(err)).wrap_err("reading feedback");
            }
        };
        self.raw_position = raw;
        self.filt_position = self.filter.push(raw);

        if let Some(fault) = self.fault {
            return Ok(ActuatorStatus::Faulted(fault));
        }
        if self.calibration_requested || self.stage.is_active() {
            return self.step_calibration(now_ms);
        }
        if !self.is_calibrated {
            self.stop()?;
            return Ok(ActuatorStatus::Uncalibrated);
        }
        if !self.filter.is_primed() {
            self.stop()?;
            return Ok(ActuatorStatus::Priming);
        }
        self.step_control()
    }

    /// Forget the current bounds and start a physical calibration on the next
    /// tick.
    pub fn calibrate(&mut self) {
        tracing::info!(actuator = self.index, "physical calibration requested");
        self.is_calibrated = false;
        self.min_position = None;
        self.max_position = None;
        self.target_position = None;
        self.fault = None;
        self.origin = None;
        self.stage = CalibrationStage::NotStarted;
        self.calibration_requested = true;
    }

    /// Adopt known bounds without moving the motor.
    pub fn calibrate_with(&mut self, min: u16, max: u16) -> core::result::Result<(), CommandError> {
        self.check_bounds(min, max)?;
        self.min_position = Some(min);
        self.max_position = Some(max);
        self.is_calibrated = true;
        self.stage = CalibrationStage::Complete;
        self.calibration_requested = false;
        self.fault = None;
        self.origin = Some(CalibrationOrigin::Restored);
        self.target_position = None;
        tracing::debug!(actuator = self.index, min, max, "bounds restored");
        Ok(())
    }

    /// Set the target as a fraction of travel. Values outside `[0, 1]` are
    /// clamped; non-finite values and units that are not ready are refused.
    /// Returns the target in raw units.
    pub fn set_length(&mut self, rel_length: f64) -> core::result::Result<u16, CommandError> {
        let target = self.check_length(rel_length)?;
        self.apply_target(target);
        Ok(target)
    }

    /// Drop the target and switch the motor off. An active calibration
    /// resumes on the next tick.
    pub fn halt(&mut self) -> Result<()> {
        self.target_position = None;
        self.stop()
    }

    pub(crate) fn check_bounds(&self, min: u16, max: u16) -> core::result::Result<(), CommandError> {
        if min >= max || max > self.control.adc_max {
            return Err(CommandError::InvalidBounds {
                index: self.index,
                min,
                max,
            });
        }
        Ok(())
    }

    pub(crate) fn check_length(&self, rel_length: f64) -> core::result::Result<u16, CommandError> {
        if !rel_length.is_finite() {
            return Err(CommandError::NonFinite { index: self.index });
        }
        match (self.min_position, self.max_position) {
            (Some(min), Some(max)) if self.is_ready() => Ok(lerp_u16(min, max, rel_length)),
            _ => Err(CommandError::NotReady { index: self.index }),
        }
    }

    pub(crate) fn apply_target(&mut self, target: u16) {
        tracing::trace!(actuator = self.index, target, "target set");
        self.target_position = Some(target);
    }

    // ── accessors ────────────────────────────────────────────────────────────

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pins(&self) -> ActuatorPins {
        self.pins
    }

    /// Latest unfiltered feedback reading.
    pub fn raw_position(&self) -> u16 {
        self.raw_position
    }

    /// Filtered feedback; this is what control decisions use.
    pub fn position(&self) -> u16 {
        self.filt_position
    }

    pub fn target_position(&self) -> Option<u16> {
        self.target_position
    }

    pub fn min_position(&self) -> Option<u16> {
        self.min_position
    }

    pub fn max_position(&self) -> Option<u16> {
        self.max_position
    }

    /// `[min, max]` once calibrated.
    pub fn bounds(&self) -> Option<[u16; 2]> {
        if !self.is_calibrated {
            return None;
        }
        Some([self.min_position?, self.max_position?])
    }

    pub fn is_calibrated(&self) -> bool {
        self.is_calibrated
    }

    /// Calibrated and the smoothing window has filled.
    pub fn is_ready(&self) -> bool {
        self.is_calibrated && self.filter.is_primed()
    }

    pub fn stage(&self) -> CalibrationStage {
        self.stage
    }

    pub fn fault(&self) -> Option<CalibrationFault> {
        self.fault
    }

    pub fn origin(&self) -> Option<CalibrationOrigin> {
        self.origin
    }

    /// Last direction and duty sent to the driver.
    pub fn output(&self) -> Option<(Direction, u8)> {
        self.output
    }

    // ── calibration ──────────────────────────────────────────────────────────

    fn step_calibration(&mut self, now_ms: u64) -> Result<ActuatorStatus> {
        if self.calibration_requested {
            self.calibration_requested = false;
            self.enter_stage(CalibrationStage::RetractToLimit, now_ms);
        }

        let cal = self.calibration;
        let pos = self.filt_position;
        let stage = self.stage;

        let done = if stage.ends_on_stall() {
            self.stall
                .observe(pos, now_ms, cal.stall_epsilon, cal.stall_window_ms)
        } else {
            match stage {
                CalibrationStage::RecordMin => {
                    self.min_position = Some(pos);
                    true
                }
                CalibrationStage::RecordMax => {
                    self.max_position = Some(pos);
                    true
                }
                CalibrationStage::BackoffFromMin => {
                    let base = self.min_position.unwrap_or(pos);
                    pos >= base.saturating_add(cal.probe_distance)
                }
                CalibrationStage::BackoffFromMax => {
                    let base = self.max_position.unwrap_or(pos);
                    pos <= base.saturating_sub(cal.probe_distance)
                }
                _ => true,
            }
        };

        if done {
            self.stop()?;
            match stage {
                CalibrationStage::ReapproachMin => self.min_position = Some(pos),
                CalibrationStage::ReapproachMax => self.max_position = Some(pos),
                _ => {}
            }
            return self.advance(now_ms);
        }

        let timeout_ms = cal.move_timeout_ms();
        if self.stall.elapsed_ms(now_ms) > timeout_ms {
            return self.fail(CalibrationFault::MoveTimeout { stage, timeout_ms });
        }

        self.drive(stage.drive(), cal.pwm())?;
        Ok(ActuatorStatus::Calibrating(stage))
    }

    fn enter_stage(&mut self, stage: CalibrationStage, now_ms: u64) {
        debug_assert!(
            stage > self.stage || self.stage == CalibrationStage::NotStarted,
            "calibration stage went backwards"
        );
        tracing::debug!(
            actuator = self.index,
            stage = stage.number(),
            position = self.filt_position,
            "calibration stage"
        );
        self.stage = stage;
        self.stall = StallDetector::start(self.filt_position, now_ms);
    }

    fn advance(&mut self, now_ms: u64) -> Result<ActuatorStatus> {
        let next = self.stage.next(self.calibration.probing());
        if next != CalibrationStage::Complete {
            self.enter_stage(next, now_ms);
            return Ok(ActuatorStatus::Calibrating(next));
        }

        let min_span = self.calibration.min_span;
        match (self.min_position, self.max_position) {
            (Some(min), Some(max)) if max > min && max - min >= min_span => {
                self.stage = CalibrationStage::Complete;
                self.is_calibrated = true;
                self.origin = Some(CalibrationOrigin::Physical);
                tracing::info!(actuator = self.index, min, max, "calibration complete");
                Ok(if self.filter.is_primed() {
                    ActuatorStatus::Idle
                } else {
                    ActuatorStatus::Priming
                })
            }
            (min, max) => self.fail(CalibrationFault::RangeTooNarrow {
                min: min.unwrap_or(0),
                max: max.unwrap_or(0),
                min_span,
            }),
        }
    }

    fn fail(&mut self, fault: CalibrationFault) -> Result<ActuatorStatus> {
        tracing::warn!(actuator = self.index, stage = self.stage.number(), %fault, "calibration aborted");
        self.fault = Some(fault);
        self.is_calibrated = false;
        self.min_position = None;
        self.max_position = None;
        self.stop()?;
        Ok(ActuatorStatus::Faulted(fault))
    }

    // ── position hold ────────────────────────────────────────────────────────

    fn step_control(&mut self) -> Result<ActuatorStatus> {
        let Some(target) = self.target_position else {
            self.stop()?;
            return Ok(ActuatorStatus::Idle);
        };
        let pos = self.filt_position;
        let distance = target.abs_diff(pos);
        if distance <= self.control.tolerance {
            self.drive(Direction::Brake, FULL_PWM)?;
            return Ok(ActuatorStatus::Holding);
        }
        let direction = if target > pos {
            Direction::Extend
        } else {
            Direction::Retract
        };
        let pwm = self.select_pwm(distance);
        self.drive(direction, pwm)?;
        Ok(ActuatorStatus::Moving)
    }

    /// Full speed outside the slow zone, tapering toward `min_speed_ratio`
    /// as the distance shrinks.
    fn select_pwm(&self, distance: u16) -> u8 {
        let c = &self.control;
        if c.slow_zone == 0 || distance >= c.slow_zone {
            return FULL_PWM;
        }
        let ratio = f32::from(distance) / f32::from(c.slow_zone);
        pwm_fraction(c.min_speed_ratio + (1.0 - c.min_speed_ratio) * ratio)
    }

    // ── driver output ────────────────────────────────────────────────────────

    fn drive(&mut self, direction: Direction, pwm: u8) -> Result<()> {
        if self.output == Some((direction, pwm)) {
            return Ok(());
        }
        self.io
            .set_direction(direction)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("set_direction")?;
        self.io
            .set_speed(pwm)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("set_speed")?;
        self.output = Some((direction, pwm));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.drive(Direction::Off, 0)
    }

    fn stop_best_effort(&mut self, context: &str) {
        // force the write even if the cached output already says off
        self.output = None;
        if let Err(e) = self.stop() {
            tracing::warn!(actuator = self.index, error = %e, "motor stop failed: {context}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use stewart_traits::HwResult;

    #[derive(Clone, Default)]
    struct Probe {
        reading: Rc<Cell<u16>>,
        fail: Rc<Cell<bool>>,
        log: Rc<RefCell<Vec<(Direction, u8)>>>,
    }

    struct ProbeIo {
        probe: Probe,
        direction: Direction,
    }

    impl ActuatorIo for ProbeIo {
        fn set_direction(&mut self, direction: Direction) -> HwResult<()> {
            self.direction = direction;
            Ok(())
        }
        fn set_speed(&mut self, pwm: u8) -> HwResult<()> {
            self.probe.log.borrow_mut().push((self.direction, pwm));
            Ok(())
        }
        fn read_feedback(&mut self) -> HwResult<u16> {
            if self.probe.fail.get() {
                return Err("adc went away".into());
            }
            Ok(self.probe.reading.get())
        }
    }

    fn unit() -> (Actuator<ProbeIo>, Probe) {
        let probe = Probe::default();
        let io = ProbeIo {
            probe: probe.clone(),
            direction: Direction::Off,
        };
        let a = Actuator::new(
            0,
            crate::config::PlatformCfg::default().pins[0],
            io,
            FilterCfg::default(),
            ControlCfg::default(),
            CalibrationCfg::default(),
        );
        (a, probe)
    }

    fn prime(a: &mut Actuator<ProbeIo>, probe: &Probe, reading: u16) -> ActuatorStatus {
        probe.reading.set(reading);
        let mut last = ActuatorStatus::Uncalibrated;
        for t in 0..5 {
            last = a.tick(t * 10).unwrap();
        }
        last
    }

    #[test]
    fn half_length_maps_to_midpoint_and_brakes_within_tolerance() {
        let (mut a, probe) = unit();
        a.calibrate_with(50, 950).unwrap();
        assert_eq!(prime(&mut a, &probe, 505), ActuatorStatus::Idle);
        assert_eq!(a.set_length(0.5), Ok(500));
        assert_eq!(a.tick(60).unwrap(), ActuatorStatus::Holding);
        assert_eq!(a.output(), Some((Direction::Brake, FULL_PWM)));
    }

    #[test]
    fn restoring_bounds_never_touches_the_motor() {
        let (mut a, probe) = unit();
        a.calibrate_with(50, 950).unwrap();
        assert!(a.is_calibrated());
        assert_eq!(a.stage(), CalibrationStage::Complete);
        assert_eq!(a.origin(), Some(CalibrationOrigin::Restored));
        assert!(probe.log.borrow().is_empty());
    }

    #[test]
    fn rejects_inverted_bounds() {
        let (mut a, _) = unit();
        assert_eq!(
            a.calibrate_with(600, 600),
            Err(CommandError::InvalidBounds {
                index: 0,
                min: 600,
                max: 600
            })
        );
        assert!(!a.is_calibrated());
    }

    #[test]
    fn set_length_requires_ready_and_finite() {
        let (mut a, probe) = unit();
        assert_eq!(a.set_length(0.5), Err(CommandError::NotReady { index: 0 }));
        a.calibrate_with(50, 950).unwrap();
        // calibrated but filter not primed
        assert_eq!(a.set_length(0.5), Err(CommandError::NotReady { index: 0 }));
        prime(&mut a, &probe, 500);
        assert_eq!(
            a.set_length(f64::NAN),
            Err(CommandError::NonFinite { index: 0 })
        );
        assert_eq!(a.set_length(1.7), Ok(950));
        assert_eq!(a.set_length(-0.2), Ok(50));
    }

    #[test]
    fn far_from_target_drives_full_speed_then_tapers() {
        let (mut a, probe) = unit();
        a.calibrate_with(50, 950).unwrap();
        prime(&mut a, &probe, 100);
        a.set_length(1.0).unwrap();
        assert_eq!(a.tick(60).unwrap(), ActuatorStatus::Moving);
        assert_eq!(a.output(), Some((Direction::Extend, FULL_PWM)));

        // 60 units short of 950 is inside the slow zone
        for t in 0..5 {
            probe.reading.set(890);
            a.tick(70 + t * 10).unwrap();
        }
        let (dir, pwm) = a.output().unwrap();
        assert_eq!(dir, Direction::Extend);
        assert!(pwm < FULL_PWM && pwm > 0, "pwm {pwm} should be tapered");
    }

    #[test]
    fn retracts_when_above_target() {
        let (mut a, probe) = unit();
        a.calibrate_with(50, 950).unwrap();
        prime(&mut a, &probe, 900);
        a.set_length(0.0).unwrap();
        a.tick(60).unwrap();
        assert_eq!(a.output(), Some((Direction::Retract, FULL_PWM)));
    }

    #[test]
    fn feedback_error_stops_motor_and_propagates() {
        let (mut a, probe) = unit();
        a.calibrate_with(50, 950).unwrap();
        prime(&mut a, &probe, 100);
        a.set_length(1.0).unwrap();
        a.tick(60).unwrap();
        probe.fail.set(true);
        let err = a.tick(70).unwrap_err();
        assert!(format!("{err:#}").contains("reading feedback"));
        assert_eq!(probe.log.borrow().last(), Some(&(Direction::Off, 0)));
    }

    #[test]
    fn repeated_commands_are_not_rewritten() {
        let (mut a, probe) = unit();
        a.calibrate_with(50, 950).unwrap();
        prime(&mut a, &probe, 500);
        a.set_length(0.5).unwrap();
        for t in 0..10 {
            a.tick(100 + t).unwrap();
        }
        let brakes = probe
            .log
            .borrow()
            .iter()
            .filter(|c| c.0 == Direction::Brake)
            .count();
        assert_eq!(brakes, 1);
    }

    #[test]
    fn calibrate_clears_bounds_and_target() {
        let (mut a, probe) = unit();
        a.calibrate_with(50, 950).unwrap();
        prime(&mut a, &probe, 500);
        a.set_length(0.3).unwrap();
        a.calibrate();
        assert!(!a.is_calibrated());
        assert_eq!(a.bounds(), None);
        assert_eq!(a.target_position(), None);
        assert_eq!(a.stage(), CalibrationStage::NotStarted);
        assert_eq!(
            a.tick(100).unwrap(),
            ActuatorStatus::Calibrating(CalibrationStage::RetractToLimit)
        );
        assert_eq!(a.output(), Some((Direction::Retract, 64)));
    }

    #[test]
    fn calibration_times_out_when_feedback_keeps_moving() {
        let (mut a, probe) = unit();
        a.calibrate();
        let timeout = CalibrationCfg::default().move_timeout_ms();
        let mut t = 0;
        let mut reading = 1000u16;
        let status = loop {
            // sensor keeps sliding so no stall is ever seen
            reading = if reading <= 10 { 1000 } else { reading - 5 };
            probe.reading.set(reading);
            let s = a.tick(t).unwrap();
            if matches!(s, ActuatorStatus::Faulted(_)) {
                break s;
            }
            t += 100;
            assert!(t <= timeout + 1000, "never timed out");
        };
        assert!(matches!(
            status,
            ActuatorStatus::Faulted(CalibrationFault::MoveTimeout {
                stage: CalibrationStage::RetractToLimit,
                ..
            })
        ));
        assert_eq!(a.output(), Some((Direction::Off, 0)));
        assert!(!a.is_calibrated());
        // frozen until re-requested
        assert_eq!(a.stage(), CalibrationStage::RetractToLimit);
    }
}
