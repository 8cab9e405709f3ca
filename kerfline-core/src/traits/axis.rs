//! Motion axis trait
//!
//! Abstracts a non-blocking, position-controlled stepper axis. Commands
//! return immediately; the caller polls `is_running()` to learn when the
//! axis has reached its target.

use crate::motion::MotionProfile;

/// Errors that can occur when commanding an axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AxisError {
    /// Driver not enabled or not yet configured
    NotReady,
    /// Target outside the representable range
    OutOfRange,
}

/// Trait for position-controlled axes
///
/// All positions are absolute step counts relative to the zero established
/// at homing time.
pub trait MotionAxis {
    /// Start a move toward an absolute step position
    ///
    /// A new target replaces any move in progress.
    fn move_to(&mut self, steps: i32) -> Result<(), AxisError>;

    /// Check if the axis is currently moving
    fn is_running(&self) -> bool;

    /// Get the current step position
    fn current_position(&self) -> i32;

    /// Redefine the current position without moving
    fn set_position(&mut self, steps: i32);

    /// Decelerate to a stop using the configured acceleration
    fn stop(&mut self);

    /// Halt immediately and redefine the current position
    fn force_stop_and_set_position(&mut self, steps: i32);

    /// Set the cruise speed in steps/s
    fn set_speed(&mut self, speed_hz: u32);

    /// Set the acceleration in steps/s²
    fn set_acceleration(&mut self, accel: u32);

    /// Apply a speed/acceleration profile
    fn apply(&mut self, profile: MotionProfile) {
        self.set_speed(profile.speed_hz);
        self.set_acceleration(profile.accel);
    }
}
