use stewart_core::error::BuildError;
use stewart_core::{Missing, NUM_ACTUATORS, Platform, PlatformBuilder, PlatformCfg};
use stewart_hardware::SimulatedActuator;
use rstest::rstest;

fn sims() -> [SimulatedActuator; NUM_ACTUATORS] {
    std::array::from_fn(|_| SimulatedActuator::default())
}

#[rstest]
fn builder_missing_actuators_yields_typed_build_error() {
    let err = PlatformBuilder::<SimulatedActuator, Missing>::new()
        .with_config(PlatformCfg::default())
        .try_build()
        .expect_err("should fail with MissingActuators");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingActuators) => {}
        other => panic!("expected MissingActuators, got: {other:?}"),
    }
}

#[rstest]
#[case::smooth_too_small(|c: &mut PlatformCfg| c.filter.smooth = 4, "smooth")]
#[case::smooth_too_large(|c: &mut PlatformCfg| c.filter.smooth = 51, "smooth")]
#[case::zero_tolerance(|c: &mut PlatformCfg| c.control.tolerance = 0, "tolerance")]
#[case::slow_zone_inside_deadband(|c: &mut PlatformCfg| c.control.slow_zone = 10, "slow_zone")]
#[case::zero_calibration_speed(|c: &mut PlatformCfg| c.calibration.speed_ratio = 0.0, "speed_ratio")]
#[case::zero_stall_window(|c: &mut PlatformCfg| c.calibration.stall_window_ms = 0, "stall_window_ms")]
#[case::zero_cycles(|c: &mut PlatformCfg| c.persist.max_cycles = 0, "max_cycles")]
#[case::shared_pin(|c: &mut PlatformCfg| c.pins[4].extend = c.pins[1].retract, "pin")]
#[case::shared_feedback(|c: &mut PlatformCfg| c.pins[0].feedback = 5, "pin")]
fn invalid_config_is_rejected(#[case] mutate: fn(&mut PlatformCfg), #[case] needle: &str) {
    let mut cfg = PlatformCfg::default();
    mutate(&mut cfg);
    let err = Platform::builder()
        .with_actuators(sims())
        .with_config(cfg)
        .build()
        .expect_err("invalid config must not build");
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::InvalidConfig(msg)) => assert!(msg.contains(needle), "{msg}"),
        other => panic!("expected InvalidConfig, got: {other:?}"),
    }
}

#[test]
fn default_config_builds_uncalibrated_platform() {
    let p = Platform::builder()
        .with_actuators(sims())
        .build()
        .expect("defaults are valid");
    assert!(!p.is_calibrated());
    assert!(!p.is_ready());
    assert_eq!(p.bounds(), None);
    for i in 0..NUM_ACTUATORS {
        assert_eq!(p.actuator(i).unwrap().index(), i);
        assert_eq!(p.actuator(i).unwrap().pins(), PlatformCfg::default().pins[i]);
    }
}
