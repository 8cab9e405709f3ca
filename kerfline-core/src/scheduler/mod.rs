//! Tick-driven timing
//!
//! One-shot timers, blink patterns and the deferred actuator actions
//! serviced by the controller on every tick.

pub mod deferred;
pub mod timer;

pub use deferred::{DeferredActions, Serviced};
pub use timer::{elapsed, Blinker, DeferredTimer};
