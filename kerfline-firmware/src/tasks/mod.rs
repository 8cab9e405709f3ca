//! Embassy async tasks
//!
//! The control task owns the controller; the stepper task owns nothing
//! but reaches the step generators through their shared cells.

pub mod control;
pub mod stepper;

pub use control::control_task;
pub use stepper::stepper_task;
