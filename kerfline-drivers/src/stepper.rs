//! Step/direction stepper axis
//!
//! Generates step pulses for a step/dir driver with a trapezoidal speed
//! ramp. Commands from the controller only change the target; pulses are
//! produced by calling `service()` from a fast loop, at most one step per
//! call.
//!
//! # Ramp
//!
//! The step rate changes once per step. With rate `v` (steps/s) and
//! acceleration `a` (steps/s²), moving one step changes `v²` by `2a`:
//!
//! - accelerate while the remaining distance exceeds the stopping distance
//!   `v² / 2a`, up to the cruise speed
//! - decelerate once the remaining distance is within the stopping
//!   distance, down to a floor of `√(2a)`
//!
//! A new target behind the direction of travel makes the axis decelerate
//! to the floor rate before reversing. A new target ahead but inside the
//! stopping distance is overrun the same way and approached from the far
//! side.
//!
//! ```ignore
//! let mut axis = StepDirAxis::new(step_pin, dir_pin, false);
//! axis.set_speed(20_000);
//! axis.set_acceleration(10_000);
//! axis.move_to(4500)?;
//!
//! // In the step loop:
//! axis.service(now_us)?;
//! ```

use embedded_hal::digital::OutputPin;
use kerfline_core::traits::{AxisError, MotionAxis};

/// Pin failure while stepping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepperError {
    StepPin,
    DirPin,
}

/// Integer square root
fn isqrt(n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

/// Position-controlled step/dir axis
pub struct StepDirAxis<STEP, DIR> {
    step: STEP,
    dir: DIR,
    /// If true, positive motion = DIR pin LOW
    dir_inverted: bool,
    position: i32,
    target: i32,
    /// Cruise speed in steps/s
    speed_hz: u32,
    /// Acceleration in steps/s², 0 for no ramp
    accel: u32,
    /// Current step rate, 0 at standstill
    rate_hz: u32,
    /// Direction of the motion in progress: 1, -1 or 0 at standstill
    heading: i32,
    /// When the next step is due
    next_step_us: Option<u64>,
}

impl<STEP: OutputPin, DIR: OutputPin> StepDirAxis<STEP, DIR> {
    /// Create an axis at position 0
    pub fn new(step: STEP, dir: DIR, dir_inverted: bool) -> Self {
        Self {
            step,
            dir,
            dir_inverted,
            position: 0,
            target: 0,
            speed_hz: 1000,
            accel: 10_000,
            rate_hz: 0,
            heading: 0,
            next_step_us: None,
        }
    }

    /// Time of the next step, if a step is pending
    pub fn next_step_us(&self) -> Option<u64> {
        if self.position == self.target {
            None
        } else {
            self.next_step_us
        }
    }

    /// Slowest rate of the ramp
    fn floor_hz(&self) -> u32 {
        (isqrt(2 * self.accel as u64) as u32).max(1)
    }

    /// Steps needed to come to rest from the current rate
    fn stopping_steps(&self) -> u64 {
        if self.accel == 0 {
            return 0;
        }
        let v = self.rate_hz as u64;
        v * v / (2 * self.accel as u64)
    }

    fn set_direction(&mut self, heading: i32) -> Result<(), StepperError> {
        let high = (heading > 0) != self.dir_inverted;
        let result = if high {
            self.dir.set_high()
        } else {
            self.dir.set_low()
        };
        result.map_err(|_| StepperError::DirPin)?;
        self.heading = heading;
        Ok(())
    }

    fn pulse(&mut self) -> Result<(), StepperError> {
        self.step.set_high().map_err(|_| StepperError::StepPin)?;
        self.step.set_low().map_err(|_| StepperError::StepPin)
    }

    /// Rate for the next step given the distance left in the heading
    fn next_rate(&self, remaining: u64) -> u32 {
        if self.accel == 0 {
            return self.speed_hz.max(1);
        }

        let v = self.rate_hz as u64;
        let a2 = 2 * self.accel as u64;
        let floor = self.floor_hz();

        if remaining <= self.stopping_steps() || self.rate_hz > self.speed_hz {
            let slowed = isqrt((v * v).saturating_sub(a2)) as u32;
            let limit = if remaining <= self.stopping_steps() {
                floor
            } else {
                self.speed_hz
            };
            slowed.max(limit).max(floor)
        } else if self.rate_hz < self.speed_hz {
            (isqrt(v * v + a2) as u32).min(self.speed_hz).max(floor.min(self.speed_hz))
        } else {
            self.rate_hz
        }
    }

    /// Emit the next step if one is due
    ///
    /// Returns true if a step was produced.
    pub fn service(&mut self, now_us: u64) -> Result<bool, StepperError> {
        let distance = self.target as i64 - self.position as i64;
        if distance == 0 && self.heading == 0 {
            self.next_step_us = None;
            return Ok(false);
        }
        if let Some(due) = self.next_step_us {
            if now_us < due {
                return Ok(false);
            }
        }

        if distance == 0 && self.stopping_steps() <= 1 {
            // Arrived
            self.rate_hz = 0;
            self.heading = 0;
            self.next_step_us = None;
            return Ok(false);
        }

        // Reaching the target too fast to stop: run past it and come back
        let wanted = if distance == 0 {
            self.heading
        } else {
            distance.signum() as i32
        };
        if self.heading == 0 {
            self.set_direction(wanted)?;
        } else if self.heading != wanted && self.rate_hz <= self.floor_hz() {
            self.rate_hz = 0;
            self.set_direction(wanted)?;
        }

        let remaining = if self.heading == wanted && distance != 0 {
            distance.unsigned_abs()
        } else {
            0
        };
        self.rate_hz = self.next_rate(remaining);

        self.pulse()?;
        self.position += self.heading;
        self.next_step_us = Some(now_us + 1_000_000 / self.rate_hz.max(1) as u64);
        Ok(true)
    }
}

impl<STEP: OutputPin, DIR: OutputPin> MotionAxis for StepDirAxis<STEP, DIR> {
    fn move_to(&mut self, steps: i32) -> Result<(), AxisError> {
        if self.speed_hz == 0 {
            return Err(AxisError::NotReady);
        }
        self.target = steps;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.position != self.target || self.heading != 0
    }

    fn current_position(&self) -> i32 {
        self.position
    }

    /// Redefine the current position
    ///
    /// A move in progress keeps its remaining distance.
    fn set_position(&mut self, steps: i32) {
        let shift = steps.wrapping_sub(self.position);
        self.position = steps;
        self.target = self.target.wrapping_add(shift);
    }

    fn stop(&mut self) {
        let stopping = self.stopping_steps().min(i32::MAX as u64) as i32;
        self.target = self.position.saturating_add(self.heading * stopping);
    }

    fn force_stop_and_set_position(&mut self, steps: i32) {
        self.position = steps;
        self.target = steps;
        self.rate_hz = 0;
        self.heading = 0;
        self.next_step_us = None;
    }

    fn set_speed(&mut self, speed_hz: u32) {
        self.speed_hz = speed_hz;
    }

    fn set_acceleration(&mut self, accel: u32) {
        self.accel = accel;
    }
}
