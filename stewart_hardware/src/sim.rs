//! Simulated linear actuator: a potentiometer-feedback plant with hard
//! mechanical end-stops, optional noise and injectable sensor faults.

use std::cell::RefCell;
use std::rc::Rc;

use stewart_traits::{ActuatorIo, Direction, HwResult};

use crate::error::HwError;

/// Highest value a 10-bit ADC returns.
pub const ADC_MAX: u16 = 1023;

#[derive(Debug, Clone, Copy)]
pub struct SimParams {
    /// Feedback reading at the retracted end-stop.
    pub lower_stop: f32,
    /// Feedback reading at the extended end-stop.
    pub upper_stop: f32,
    /// Initial rod position in feedback units.
    pub start: f32,
    /// Travel per feedback read at full PWM.
    pub units_per_tick: f32,
    /// Uniform noise amplitude added to every sample.
    pub noise: u16,
    pub seed: u32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            lower_stop: 40.0,
            upper_stop: 990.0,
            start: 512.0,
            units_per_tick: 8.0,
            noise: 0,
            seed: 1,
        }
    }
}

#[derive(Debug)]
struct Plant {
    params: SimParams,
    position: f32,
    direction: Direction,
    pwm: u8,
    stuck_at: Option<u16>,
    fail_reads: bool,
    rng: u32,
    reads: u64,
    drive_commands: u64,
}

impl Plant {
    fn step(&mut self) {
        let v = self.params.units_per_tick * f32::from(self.pwm) / 255.0;
        match self.direction {
            Direction::Extend => self.position += v,
            Direction::Retract => self.position -= v,
            Direction::Off | Direction::Brake => {}
        }
        self.position = self
            .position
            .clamp(self.params.lower_stop, self.params.upper_stop);
    }

    // xorshift32
    fn next_noise(&mut self) -> i32 {
        let amp = i32::from(self.params.noise);
        if amp == 0 {
            return 0;
        }
        let mut x = self.rng.max(1);
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        (x % (2 * amp as u32 + 1)) as i32 - amp
    }

    fn sample(&mut self) -> u16 {
        let noisy = self.position.round() as i32 + self.next_noise();
        noisy.clamp(0, i32::from(ADC_MAX)) as u16
    }
}

/// Point-in-time view of the plant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimSnapshot {
    pub position: f32,
    pub direction: Direction,
    pub pwm: u8,
    pub reads: u64,
    /// Number of Extend/Retract commands received.
    pub drive_commands: u64,
}

/// `ActuatorIo` implementation over a simulated plant. Physics advance by one
/// step on every feedback read, so the plant moves in lockstep with ticks.
pub struct SimulatedActuator {
    plant: Rc<RefCell<Plant>>,
}

/// Shared handle for inspecting the plant and injecting faults after the
/// actuator has been moved into a platform.
#[derive(Clone)]
pub struct SimHandle {
    plant: Rc<RefCell<Plant>>,
}

impl Default for SimulatedActuator {
    fn default() -> Self {
        Self::new(SimParams::default())
    }
}

impl SimulatedActuator {
    pub fn new(params: SimParams) -> Self {
        let plant = Plant {
            position: params
                .start
                .clamp(params.lower_stop, params.upper_stop),
            direction: Direction::Off,
            pwm: 0,
            stuck_at: None,
            fail_reads: false,
            rng: params.seed,
            reads: 0,
            drive_commands: 0,
            params,
        };
        Self {
            plant: Rc::new(RefCell::new(plant)),
        }
    }

    pub fn handle(&self) -> SimHandle {
        SimHandle {
            plant: Rc::clone(&self.plant),
        }
    }
}

impl SimHandle {
    pub fn snapshot(&self) -> SimSnapshot {
        let p = self.plant.borrow();
        SimSnapshot {
            position: p.position,
            direction: p.direction,
            pwm: p.pwm,
            reads: p.reads,
            drive_commands: p.drive_commands,
        }
    }

    /// Freeze the feedback line at `value` (dead or disconnected wiper).
    pub fn stick_sensor(&self, value: Option<u16>) {
        self.plant.borrow_mut().stuck_at = value;
    }

    /// Make every subsequent read fail.
    pub fn fail_reads(&self, fail: bool) {
        self.plant.borrow_mut().fail_reads = fail;
    }

    /// Teleport the rod, e.g. to emulate an external disturbance.
    pub fn set_position(&self, position: f32) {
        let mut p = self.plant.borrow_mut();
        p.position = position.clamp(p.params.lower_stop, p.params.upper_stop);
    }
}

impl ActuatorIo for SimulatedActuator {
    fn set_direction(&mut self, direction: Direction) -> HwResult<()> {
        let mut p = self.plant.borrow_mut();
        if matches!(direction, Direction::Extend | Direction::Retract) {
            p.drive_commands += 1;
        }
        p.direction = direction;
        Ok(())
    }

    fn set_speed(&mut self, pwm: u8) -> HwResult<()> {
        self.plant.borrow_mut().pwm = pwm;
        Ok(())
    }

    fn read_feedback(&mut self) -> HwResult<u16> {
        let mut p = self.plant.borrow_mut();
        if p.fail_reads {
            return Err(Box::new(HwError::Feedback("simulated open circuit".into())));
        }
        p.step();
        p.reads += 1;
        let sample = match p.stuck_at {
            Some(v) => v,
            None => p.sample(),
        };
        tracing::trace!(position = p.position, sample, "sim feedback");
        Ok(sample)
    }
}
