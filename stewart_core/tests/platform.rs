mod common;

use common::{params, ready_rig, rig};
use rstest::rstest;
use stewart_core::runner::run_until_settled;
use stewart_core::{ActuatorStatus, CommandError, NUM_ACTUATORS, PlatformError};
use stewart_traits::Direction;

const BOUNDS: [[u16; 2]; NUM_ACTUATORS] = [[100, 900]; NUM_ACTUATORS];

#[test]
fn lengths_map_linearly_onto_bounds() {
    let mut r = ready_rig(BOUNDS);
    let targets = r
        .platform
        .set_platform_lengths(&[0.0, 0.25, 0.5, 0.75, 1.0, 0.5])
        .unwrap();
    assert_eq!(targets, [100, 300, 500, 700, 900, 500]);
    assert_eq!(r.platform.target_position(2), Some(500));
}

#[test]
fn out_of_range_length_rejects_whole_command() {
    let mut r = ready_rig(BOUNDS);
    r.platform.set_platform_lengths(&[0.5; NUM_ACTUATORS]).unwrap();
    let err = r
        .platform
        .set_platform_lengths(&[0.1, 0.1, 0.1, 0.1, 1.5, 0.1])
        .unwrap_err();
    assert_eq!(err, CommandError::OutOfRange { index: 4, length: 1.5 });
    let err = r
        .platform
        .set_platform_lengths(&[-0.01, 0.1, 0.1, 0.1, 0.1, 0.1])
        .unwrap_err();
    assert!(matches!(err, CommandError::OutOfRange { index: 0, .. }));
    for i in 0..NUM_ACTUATORS {
        assert_eq!(r.platform.target_position(i), Some(500), "actuator {i} changed");
    }
}

#[test]
fn pose_accepts_the_closed_unit_interval() {
    let mut r = ready_rig(BOUNDS);
    let targets = r
        .platform
        .set_platform_lengths(&[0.0, 1.0, 0.5, 0.5, 0.5, 0.5])
        .unwrap();
    assert_eq!(targets[0], 100);
    assert_eq!(targets[1], 900);
}

#[test]
fn single_unit_length_still_clamps() {
    let mut r = ready_rig(BOUNDS);
    assert_eq!(r.platform.set_length(0, -1.0), Ok(100));
    assert_eq!(r.platform.set_length(1, 2.0), Ok(900));
}

#[test]
fn non_finite_length_rejects_whole_command() {
    let mut r = ready_rig(BOUNDS);
    r.platform.set_platform_lengths(&[0.5; NUM_ACTUATORS]).unwrap();
    let err = r
        .platform
        .set_platform_lengths(&[0.1, 0.1, 0.1, 0.1, f64::NAN, 0.1])
        .unwrap_err();
    assert_eq!(err, CommandError::NonFinite { index: 4 });
    for i in 0..NUM_ACTUATORS {
        assert_eq!(r.platform.target_position(i), Some(500), "actuator {i} changed");
    }
}

#[test]
fn commands_before_ready_are_refused() {
    let mut r = rig();
    assert_eq!(
        r.platform.set_platform_lengths(&[0.5; NUM_ACTUATORS]),
        Err(CommandError::NotReady { index: 0 })
    );

    // restored but filters still empty
    r.platform.calibrate_with(&BOUNDS).unwrap();
    assert!(r.platform.is_calibrated());
    assert!(!r.platform.is_ready());
    assert!(r.platform.set_platform_lengths(&[0.5; NUM_ACTUATORS]).is_err());
    for i in 0..NUM_ACTUATORS {
        assert_eq!(r.platform.target_position(i), None);
    }
}

#[test]
fn invalid_restore_pair_changes_nothing() {
    let mut r = rig();
    let mut bounds = BOUNDS;
    bounds[5] = [800, 200];
    assert_eq!(
        r.platform.calibrate_with(&bounds),
        Err(CommandError::InvalidBounds {
            index: 5,
            min: 800,
            max: 200
        })
    );
    assert!(!r.platform.is_calibrated());
    assert_eq!(r.platform.min_position(0), None);
}

#[test]
fn restore_does_not_move_any_motor() {
    let r = ready_rig(BOUNDS);
    assert_eq!(r.total_drive_commands(), 0);
    assert_eq!(r.platform.bounds(), Some(BOUNDS));
}

#[rstest]
#[case(6)]
#[case(7)]
#[case(usize::MAX)]
fn invalid_index_accessors_fail_cleanly(#[case] index: usize) {
    let mut r = ready_rig(BOUNDS);
    assert!(!r.platform.actuator_is_valid(index));
    assert!(r.platform.actuator(index).is_none());
    assert_eq!(r.platform.raw_position(index), None);
    assert_eq!(r.platform.position(index), None);
    assert_eq!(r.platform.target_position(index), None);
    assert_eq!(r.platform.min_position(index), None);
    assert_eq!(r.platform.max_position(index), None);
    assert!(!r.platform.actuator_ready(index));
    assert_eq!(
        r.platform.set_length(index, 0.5),
        Err(CommandError::InvalidActuator(index))
    );
}

#[test]
fn valid_index_accessors_report_state() {
    let r = ready_rig(BOUNDS);
    assert!(r.platform.actuator_is_valid(5));
    assert_eq!(r.platform.min_position(5), Some(100));
    assert_eq!(r.platform.max_position(5), Some(900));
    // sim rods start at 512
    assert_eq!(r.platform.raw_position(0), Some(512));
    assert_eq!(r.platform.position(0), Some(512));
    assert!(r.platform.actuator_ready(0));
}

#[test]
fn platform_settles_on_commanded_lengths() {
    let mut r = ready_rig(BOUNDS);
    r.platform
        .set_platform_lengths(&[0.0, 0.2, 0.4, 0.6, 0.8, 1.0])
        .unwrap();
    let report = run_until_settled(&mut r.platform, &params()).expect("settles");
    let tol = r.platform.config().control.tolerance;
    for i in 0..NUM_ACTUATORS {
        let target = r.platform.target_position(i).unwrap();
        let pos = r.platform.position(i).unwrap();
        assert!(pos.abs_diff(target) <= tol, "actuator {i}: {pos} vs {target}");
        assert_eq!(report.status.actuators[i], ActuatorStatus::Holding);
        assert_eq!(r.sims[i].snapshot().direction, Direction::Brake);
    }
}

#[test]
fn rod_never_leaves_bounds_while_tracking() {
    let mut r = ready_rig(BOUNDS);
    let tol = f32::from(r.platform.config().control.tolerance);
    for lengths in [[1.0; NUM_ACTUATORS], [0.0; NUM_ACTUATORS], [1.0; NUM_ACTUATORS]] {
        r.platform.set_platform_lengths(&lengths).unwrap();
        for _ in 0..600 {
            r.step().unwrap();
            for s in &r.sims {
                let p = s.snapshot().position;
                assert!((100.0 - tol..=900.0 + tol).contains(&p), "rod at {p}");
            }
        }
    }
}

#[test]
fn disturbance_is_corrected() {
    let mut r = ready_rig(BOUNDS);
    r.platform.set_platform_lengths(&[0.5; NUM_ACTUATORS]).unwrap();
    run_until_settled(&mut r.platform, &params()).unwrap();

    r.sims[2].set_position(200.0);
    for _ in 0..10 {
        r.step().unwrap();
    }
    assert_eq!(
        r.sims[2].snapshot().direction,
        Direction::Extend,
        "pushed-in rod should be driven back out"
    );
    run_until_settled(&mut r.platform, &params()).unwrap();
    assert!(r.platform.position(2).unwrap().abs_diff(500) <= 30);
}

#[test]
fn failing_unit_does_not_starve_the_others() {
    let mut r = ready_rig(BOUNDS);
    let before: Vec<u64> = r.sims.iter().map(|s| s.snapshot().reads).collect();
    r.sims[2].fail_reads(true);

    let err = r.step().unwrap_err();
    assert!(format!("{err:#}").contains("actuator 2"));
    assert!(matches!(
        err.root_cause().downcast_ref::<PlatformError>(),
        Some(PlatformError::HardwareFault(_))
    ));
    for (i, s) in r.sims.iter().enumerate() {
        if i != 2 {
            assert_eq!(s.snapshot().reads, before[i] + 1, "actuator {i} not ticked");
        }
    }
}

#[test]
fn halt_drops_targets_and_stops() {
    let mut r = ready_rig(BOUNDS);
    r.platform.set_platform_lengths(&[1.0; NUM_ACTUATORS]).unwrap();
    r.step().unwrap();
    r.platform.halt().unwrap();
    for (i, s) in r.sims.iter().enumerate() {
        assert_eq!(s.snapshot().pwm, 0);
        assert_eq!(r.platform.target_position(i), None);
    }
    let status = r.step().unwrap();
    assert!(status.actuators.iter().all(|s| *s == ActuatorStatus::Idle));
}
