//! Hardware driver implementations
//!
//! This crate provides concrete implementations of the traits defined
//! in kerfline-core on top of the `embedded-hal` 1.0 pin and PWM traits:
//!
//! - Debounced digital inputs (home switches, operator switches, sensors)
//! - GPIO binary outputs with polarity (clamp valves, signal relay, lamps)
//! - Hobby servo over a 50 Hz PWM channel
//! - Step/direction stepper axis with a trapezoidal speed ramp

#![no_std]
#![deny(unsafe_code)]

pub mod input;
pub mod output;
pub mod servo;
pub mod stepper;

pub use input::DebouncedInput;
pub use output::GpioOutput;
pub use servo::Servo;
pub use stepper::{StepDirAxis, StepperError};
