//! Status reported from each control tick.

use crate::calibration::CalibrationStage;
use crate::config::NUM_ACTUATORS;
use crate::error::CalibrationFault;

/// What one actuator did during the last tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorStatus {
    /// Never calibrated; motor off.
    Uncalibrated,
    /// Physical calibration in progress.
    Calibrating(CalibrationStage),
    /// Bounds known but the smoothing window has not filled yet.
    Priming,
    /// Ready with no target set; motor off.
    Idle,
    /// Driving toward the target.
    Moving,
    /// Within tolerance of the target; motor braked.
    Holding,
    /// Calibration aborted; motor off.
    Faulted(CalibrationFault),
    /// Feedback read failed this tick.
    Offline,
}

impl ActuatorStatus {
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Holding | Self::Idle)
    }
}

/// Aggregate view of one `Platform::tick()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformStatus {
    pub actuators: [ActuatorStatus; NUM_ACTUATORS],
    /// Every unit has valid bounds.
    pub calibrated: bool,
    /// Every unit is calibrated and has a primed filter.
    pub ready: bool,
}

impl PlatformStatus {
    /// Every unit is ready and none is moving.
    pub fn settled(&self) -> bool {
        self.ready && self.actuators.iter().all(|s| s.is_settled())
    }

    /// First faulted unit, if any.
    pub fn first_fault(&self) -> Option<(usize, CalibrationFault)> {
        self.actuators.iter().enumerate().find_map(|(i, s)| match s {
            ActuatorStatus::Faulted(f) => Some((i, *f)),
            _ => None,
        })
    }
}
