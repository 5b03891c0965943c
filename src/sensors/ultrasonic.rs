//! HC-SR04 ultrasonic range finder.
//!
//! Protocol: hold TRIG high for 10 µs, then ECHO goes high for the round-trip
//! time of the ping. Sound covers 1 cm and back in ~58 µs, so
//! `distance_cm = echo_us / 58`.
//!
//! The driver is generic over `embedded-hal` 1.0 pin and delay traits plus a
//! microsecond clock, so it runs against `esp-idf-hal` `PinDriver`s on the
//! device and against scripted pins in tests. Both waits are busy-polls
//! bounded by the clock; one read blocks for at most ~30 ms.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::debug;

use crate::app::ports::DistanceSensor;
use crate::error::SensorError;

/// Microseconds of echo per centimetre of range.
pub const US_PER_CM: f32 = 58.0;
/// Trigger pulse width.
pub const TRIGGER_PULSE_US: u32 = 10;
/// Maximum wait for the echo line to rise after the trigger.
pub const ECHO_START_TIMEOUT_US: u64 = 5_000;
/// Maximum echo width accepted (~4 m, past the rated range).
pub const ECHO_MAX_US: u64 = 25_000;

/// Monotonic microsecond clock.
pub trait MonotonicClock {
    fn now_us(&self) -> u64;
}

pub struct Hcsr04<T, E, D, C> {
    trigger: T,
    echo: E,
    delay: D,
    clock: C,
}

impl<T, E, D, C> Hcsr04<T, E, D, C>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
    C: MonotonicClock,
{
    pub fn new(trigger: T, echo: E, delay: D, clock: C) -> Self {
        Self {
            trigger,
            echo,
            delay,
            clock,
        }
    }

    /// Fire one ping and return the echo width in microseconds.
    pub fn ping_us(&mut self) -> Result<u64, SensorError> {
        self.trigger.set_low().map_err(|_| SensorError::GpioFailed)?;
        self.delay.delay_us(2);
        self.trigger.set_high().map_err(|_| SensorError::GpioFailed)?;
        self.delay.delay_us(TRIGGER_PULSE_US);
        self.trigger.set_low().map_err(|_| SensorError::GpioFailed)?;

        let armed = self.clock.now_us();
        while !self.echo_high()? {
            if self.clock.now_us().saturating_sub(armed) > ECHO_START_TIMEOUT_US {
                return Err(SensorError::NoEcho);
            }
        }

        let rise = self.clock.now_us();
        while self.echo_high()? {
            if self.clock.now_us().saturating_sub(rise) > ECHO_MAX_US {
                return Err(SensorError::EchoTimeout);
            }
        }
        Ok(self.clock.now_us().saturating_sub(rise))
    }

    fn echo_high(&mut self) -> Result<bool, SensorError> {
        self.echo.is_high().map_err(|_| SensorError::GpioFailed)
    }
}

impl<T, E, D, C> DistanceSensor for Hcsr04<T, E, D, C>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
    C: MonotonicClock,
{
    fn read_distance_cm(&mut self) -> Result<f32, SensorError> {
        let echo_us = self.ping_us()?;
        let cm = echo_us as f32 / US_PER_CM;
        debug!("HC-SR04: echo {} us -> {:.1} cm", echo_us, cm);
        Ok(cm)
    }
}
