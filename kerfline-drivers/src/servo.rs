//! Hobby servo over PWM
//!
//! The PWM channel must already run at the servo frame rate (50 Hz). The
//! commanded angle maps linearly onto the pulse width.

use embedded_hal::pwm::SetDutyCycle;
use kerfline_core::traits::RotaryActuator;

/// Servo frame period in microseconds (50 Hz)
pub const FRAME_US: u16 = 20_000;

/// Pulse width range and travel of a servo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServoConfig {
    /// Pulse width at 0°
    pub min_pulse_us: u16,
    /// Pulse width at `max_angle`
    pub max_pulse_us: u16,
    pub max_angle: u16,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            min_pulse_us: 500,
            max_pulse_us: 2500,
            max_angle: 180,
        }
    }
}

impl ServoConfig {
    /// Pulse width for an angle, clamped to the servo's travel
    pub fn pulse_us(&self, degrees: u16) -> u16 {
        let degrees = degrees.min(self.max_angle) as u32;
        let span = self.max_pulse_us.saturating_sub(self.min_pulse_us) as u32;
        if self.max_angle == 0 {
            return self.min_pulse_us;
        }
        self.min_pulse_us + (degrees * span / self.max_angle as u32) as u16
    }
}

/// Servo driven from a PWM channel
pub struct Servo<P> {
    pwm: P,
    config: ServoConfig,
    angle: u16,
}

impl<P: SetDutyCycle> Servo<P> {
    /// Create a servo and move it to `initial` degrees
    pub fn new(pwm: P, config: ServoConfig, initial: u16) -> Self {
        let mut servo = Self {
            pwm,
            config,
            angle: initial,
        };
        servo.set_angle(initial);
        servo
    }

    pub fn config(&self) -> &ServoConfig {
        &self.config
    }
}

impl<P: SetDutyCycle> RotaryActuator for Servo<P> {
    fn set_angle(&mut self, degrees: u16) {
        let degrees = degrees.min(self.config.max_angle);
        let pulse = self.config.pulse_us(degrees);
        // A rejected duty leaves the servo where it was
        if self.pwm.set_duty_cycle_fraction(pulse, FRAME_US).is_ok() {
            self.angle = degrees;
        }
    }

    fn angle(&self) -> u16 {
        self.angle
    }
}
