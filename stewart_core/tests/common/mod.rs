#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use stewart_core::runner::RunParams;
use stewart_core::{NUM_ACTUATORS, Platform, PlatformCfg};
use stewart_hardware::{SimHandle, SimParams, SimulatedActuator};
use stewart_traits::clock::test_clock::TestClock;

pub const TICK: Duration = Duration::from_millis(10);

pub struct Rig {
    pub platform: Platform<SimulatedActuator>,
    pub sims: [SimHandle; NUM_ACTUATORS],
    pub clock: TestClock,
}

impl Rig {
    /// Advance time by one tick period and tick the platform.
    pub fn step(&mut self) -> stewart_core::Result<stewart_core::PlatformStatus> {
        self.clock.advance(TICK);
        self.platform.tick()
    }

    pub fn total_drive_commands(&self) -> u64 {
        self.sims.iter().map(|s| s.snapshot().drive_commands).sum()
    }
}

/// 100 Hz pacing with the default run cap.
pub fn params() -> RunParams {
    RunParams::new(100, 300_000)
}

/// End-stops 40..990, each successive leg 4 units narrower on both sides.
pub fn stops(i: usize) -> (f32, f32) {
    let inset = 4.0 * i as f32;
    (40.0 + inset, 990.0 - inset)
}

pub fn rig_with(cfg: PlatformCfg) -> Rig {
    let actuators: [SimulatedActuator; NUM_ACTUATORS] = std::array::from_fn(|i| {
        let (lower_stop, upper_stop) = stops(i);
        SimulatedActuator::new(SimParams {
            lower_stop,
            upper_stop,
            ..SimParams::default()
        })
    });
    let sims = std::array::from_fn(|i| actuators[i].handle());
    let clock = TestClock::new();
    let mut platform = Platform::builder()
        .with_actuators(actuators)
        .with_config(cfg)
        .with_clock(Arc::new(clock.clone()))
        .build()
        .expect("valid rig");
    platform.setup().expect("setup");
    Rig {
        platform,
        sims,
        clock,
    }
}

pub fn rig() -> Rig {
    rig_with(PlatformCfg::default())
}

/// A rig restored to `bounds` and ticked until every filter is primed.
pub fn ready_rig(bounds: [[u16; 2]; NUM_ACTUATORS]) -> Rig {
    let mut r = rig();
    r.platform.calibrate_with(&bounds).expect("bounds");
    for _ in 0..stewart_core::FilterCfg::default().smooth {
        r.step().expect("tick");
    }
    assert!(r.platform.is_ready());
    r
}
