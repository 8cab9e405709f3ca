//! Actuator traits
//!
//! Clamps, the completion signal and indicator lamps are all binary
//! outputs. The hold-down arm is a rotary actuator positioned by angle.

/// A two-position output (pneumatic valve, relay, lamp)
///
/// Commands are idempotent: extending an extended clamp does nothing.
pub trait BinaryOutput {
    /// Drive the output to the given logical state
    fn set(&mut self, active: bool);

    /// Get the last commanded logical state
    fn is_active(&self) -> bool;

    fn extend(&mut self) {
        self.set(true);
    }

    fn retract(&mut self) {
        self.set(false);
    }

    fn on(&mut self) {
        self.set(true);
    }

    fn off(&mut self) {
        self.set(false);
    }

    fn toggle(&mut self) {
        let active = self.is_active();
        self.set(!active);
    }
}

/// An actuator positioned by angle (hobby servo)
pub trait RotaryActuator {
    /// Command an absolute angle in degrees
    fn set_angle(&mut self, degrees: u16);

    /// Get the last commanded angle
    fn angle(&self) -> u16;
}
