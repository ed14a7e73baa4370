//! H-bridge actuator driver on Raspberry Pi GPIO.
//!
//! IN1/IN2 select the direction, ENA carries software PWM. The Pi has no
//! analog inputs, so position feedback comes from a caller-provided reader
//! (typically an external I2C/SPI ADC).

use rppal::gpio::{Gpio, OutputPin};
use stewart_traits::{ActuatorIo, Direction, HwResult};

use crate::error::HwError;

/// Software PWM carrier on the enable line.
pub const PWM_HZ: f64 = 1_000.0;

pub struct GpioActuator<F> {
    in1: OutputPin,
    in2: OutputPin,
    ena: OutputPin,
    read_position: F,
}

impl<F> GpioActuator<F>
where
    F: FnMut() -> Result<u16, HwError>,
{
    pub fn new(
        extend_pin: u8,
        retract_pin: u8,
        enable_pin: u8,
        read_position: F,
    ) -> Result<Self, HwError> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let out = |pin: u8| -> Result<OutputPin, HwError> {
            gpio.get(pin)
                .map(|p| p.into_output_low())
                .map_err(|e| HwError::Gpio(format!("pin {pin}: {e}")))
        };
        let in1 = out(extend_pin)?;
        let in2 = out(retract_pin)?;
        let ena = out(enable_pin)?;
        tracing::info!(extend_pin, retract_pin, enable_pin, "gpio actuator ready");
        Ok(Self {
            in1,
            in2,
            ena,
            read_position,
        })
    }
}

impl<F> ActuatorIo for GpioActuator<F>
where
    F: FnMut() -> Result<u16, HwError>,
{
    fn set_direction(&mut self, direction: Direction) -> HwResult<()> {
        match direction {
            Direction::Extend => {
                self.in1.set_high();
                self.in2.set_low();
            }
            Direction::Retract => {
                self.in1.set_low();
                self.in2.set_high();
            }
            Direction::Off => {
                self.in1.set_low();
                self.in2.set_low();
            }
            Direction::Brake => {
                self.in1.set_high();
                self.in2.set_high();
            }
        }
        Ok(())
    }

    fn set_speed(&mut self, pwm: u8) -> HwResult<()> {
        if pwm == 0 {
            self.ena
                .clear_pwm()
                .map_err(|e| HwError::Gpio(e.to_string()))?;
            self.ena.set_low();
            return Ok(());
        }
        let duty = f64::from(pwm) / 255.0;
        self.ena
            .set_pwm_frequency(PWM_HZ, duty)
            .map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(())
    }

    fn read_feedback(&mut self) -> HwResult<u16> {
        (self.read_position)().map_err(|e| {
            tracing::error!("feedback read error: {}", e);
            Box::new(e) as Box<dyn std::error::Error + Send + Sync>
        })
    }
}
