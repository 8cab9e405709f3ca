//! Controller state
//!
//! `SystemState` names the top-level states, `State` carries the data of
//! whichever one is active and `Context` holds everything shared between
//! them.

pub mod active;
pub mod context;
pub mod machine;

pub use active::{CycleCursor, State};
pub use context::{Context, Flags};
pub use machine::{Fault, SystemState};

/// Outcome of one state step: a requested transition, or a fault
pub type StepResult = Result<Option<SystemState>, Fault>;
