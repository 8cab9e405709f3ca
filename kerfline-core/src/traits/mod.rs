//! Hardware abstraction traits
//!
//! These traits define the interface between the cutting cycle logic
//! and hardware-specific implementations.

pub mod actuator;
pub mod axis;
pub mod board;
pub mod clock;
pub mod input;

pub use actuator::{BinaryOutput, RotaryActuator};
pub use axis::{AxisError, MotionAxis};
pub use board::{Board, Io};
pub use clock::{Clock, DiagnosticSink, LogLevel};
pub use input::DigitalInput;
