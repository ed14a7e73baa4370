pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Boxed error used at every hardware boundary.
pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Drive state of an H-bridge direction pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// IN1 high, IN2 low.
    Extend,
    /// IN1 low, IN2 high.
    Retract,
    /// Both lines low; the motor coasts.
    Off,
    /// Both lines high; the motor terminals are shorted.
    Brake,
}

/// Minimal capability interface of one linear actuator: two direction lines,
/// a PWM enable line and an analog feedback input.
pub trait ActuatorIo {
    fn set_direction(&mut self, direction: Direction) -> HwResult<()>;
    /// Duty on the enable line, 0..=255.
    fn set_speed(&mut self, pwm: u8) -> HwResult<()>;
    /// One raw sample of the position feedback in native ADC units.
    fn read_feedback(&mut self) -> HwResult<u16>;
}

impl<T: ActuatorIo + ?Sized> ActuatorIo for Box<T> {
    fn set_direction(&mut self, direction: Direction) -> HwResult<()> {
        (**self).set_direction(direction)
    }
    fn set_speed(&mut self, pwm: u8) -> HwResult<()> {
        (**self).set_speed(pwm)
    }
    fn read_feedback(&mut self) -> HwResult<u16> {
        (**self).read_feedback()
    }
}

/// Byte-addressable persistent region (EEPROM-like) with single-byte and
/// 32-bit word access at fixed offsets.
pub trait PersistentStore {
    /// Number of addressable bytes.
    fn capacity(&self) -> usize;
    fn read_byte(&mut self, offset: usize) -> HwResult<u8>;
    fn write_byte(&mut self, offset: usize, value: u8) -> HwResult<()>;
    /// Little-endian 32-bit word starting at `offset`.
    fn read_word(&mut self, offset: usize) -> HwResult<u32>;
    fn write_word(&mut self, offset: usize, value: u32) -> HwResult<()>;

    /// Flush buffered writes to the medium. Stores that write through may keep
    /// the default no-op.
    fn commit(&mut self) -> HwResult<()> {
        Ok(())
    }
}

impl<T: PersistentStore + ?Sized> PersistentStore for Box<T> {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }
    fn read_byte(&mut self, offset: usize) -> HwResult<u8> {
        (**self).read_byte(offset)
    }
    fn write_byte(&mut self, offset: usize, value: u8) -> HwResult<()> {
        (**self).write_byte(offset, value)
    }
    fn read_word(&mut self, offset: usize) -> HwResult<u32> {
        (**self).read_word(offset)
    }
    fn write_word(&mut self, offset: usize, value: u32) -> HwResult<()> {
        (**self).write_word(offset, value)
    }
    fn commit(&mut self) -> HwResult<()> {
        (**self).commit()
    }
}
