//! Calibration stage machine and end-stop (stall) detection.
//!
//! A physical calibration drives the rod into each mechanical end-stop at
//! reduced speed and records the filtered feedback there. With probing
//! enabled it backs off by `probe_distance` and re-approaches, and the
//! re-approach reading replaces the first one.

use stewart_traits::Direction;

/// Number of stages in a physical calibration (1..=9).
pub const NUM_CALIB_STAGES: u8 = 9;

/// Calibration progress. Discriminants are the externally visible stage
/// numbers; progression is monotonic within one calibration.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CalibrationStage {
    NotStarted = 0,
    RetractToLimit = 1,
    RecordMin = 2,
    BackoffFromMin = 3,
    ReapproachMin = 4,
    ExtendToLimit = 5,
    RecordMax = 6,
    BackoffFromMax = 7,
    ReapproachMax = 8,
    Complete = 9,
}

impl CalibrationStage {
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Stage that follows this one. Probe stages are skipped when `probing`
    /// is off.
    pub fn next(self, probing: bool) -> Self {
        use CalibrationStage::*;
        match self {
            NotStarted => RetractToLimit,
            RetractToLimit => RecordMin,
            RecordMin if probing => BackoffFromMin,
            RecordMin => ExtendToLimit,
            BackoffFromMin => ReapproachMin,
            ReapproachMin => ExtendToLimit,
            ExtendToLimit => RecordMax,
            RecordMax if probing => BackoffFromMax,
            RecordMax => Complete,
            BackoffFromMax => ReapproachMax,
            ReapproachMax | Complete => Complete,
        }
    }

    /// Motor direction while in this stage.
    pub fn drive(self) -> Direction {
        use CalibrationStage::*;
        match self {
            RetractToLimit | ReapproachMin | BackoffFromMax => Direction::Retract,
            ExtendToLimit | ReapproachMax | BackoffFromMin => Direction::Extend,
            NotStarted | RecordMin | RecordMax | Complete => Direction::Off,
        }
    }

    /// Stage ends when the rod stops against an end-stop.
    pub fn ends_on_stall(self) -> bool {
        use CalibrationStage::*;
        matches!(
            self,
            RetractToLimit | ReapproachMin | ExtendToLimit | ReapproachMax
        )
    }

    pub fn is_active(self) -> bool {
        !matches!(self, Self::NotStarted | Self::Complete)
    }
}

/// How an actuator obtained its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationOrigin {
    /// Measured by driving into the end-stops.
    Physical,
    /// Supplied from the store or a bounds file.
    Restored,
}

/// Declares a stall when the filtered position stays within `epsilon` of an
/// anchor for `window_ms`. The anchor follows the position whenever it moves
/// further than `epsilon`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StallDetector {
    anchor: u16,
    anchor_ms: u64,
    started_ms: u64,
}

impl StallDetector {
    pub(crate) fn start(position: u16, now_ms: u64) -> Self {
        Self {
            anchor: position,
            anchor_ms: now_ms,
            started_ms: now_ms,
        }
    }

    pub(crate) fn observe(&mut self, position: u16, now_ms: u64, epsilon: u16, window_ms: u64) -> bool {
        if position.abs_diff(self.anchor) > epsilon {
            self.anchor = position;
            self.anchor_ms = now_ms;
            return false;
        }
        now_ms.saturating_sub(self.anchor_ms) >= window_ms
    }

    /// Time spent in the current stage.
    pub(crate) fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(true, &[1, 2, 3, 4, 5, 6, 7, 8, 9])]
    #[case(false, &[1, 2, 5, 6, 9])]
    fn stage_sequence(#[case] probing: bool, #[case] expected: &[u8]) {
        let mut stage = CalibrationStage::NotStarted;
        let mut seen = Vec::new();
        while stage != CalibrationStage::Complete {
            let next = stage.next(probing);
            assert!(next > stage, "stages must be monotonic");
            stage = next;
            seen.push(stage.number());
        }
        assert_eq!(seen, expected);
    }

    #[test]
    fn complete_is_terminal() {
        assert_eq!(
            CalibrationStage::Complete.next(true),
            CalibrationStage::Complete
        );
        assert_eq!(CalibrationStage::Complete.number(), NUM_CALIB_STAGES);
    }

    #[test]
    fn stall_needs_full_window_without_motion() {
        let mut d = StallDetector::start(500, 0);
        assert!(!d.observe(501, 100, 2, 300));
        assert!(!d.observe(499, 299, 2, 300));
        assert!(d.observe(500, 300, 2, 300));
    }

    #[test]
    fn motion_resets_the_window() {
        let mut d = StallDetector::start(500, 0);
        assert!(!d.observe(510, 250, 2, 300));
        assert!(!d.observe(510, 500, 2, 300));
        assert!(d.observe(511, 550, 2, 300));
        assert_eq!(d.elapsed_ms(550), 550);
    }
}
