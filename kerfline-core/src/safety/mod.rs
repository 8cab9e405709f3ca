//! Cut axis home safety
//!
//! Everything that decides whether the cut axis is truly at home: the
//! checked verification with its optional slow recovery, the policies
//! layered on top of it, and the real-time monitor that watches the switch
//! while the axis returns.

pub mod check;
pub mod home;
pub mod monitor;

pub use check::{HomeCheck, HomeCheckOutcome, HomeCheckPolicy};
pub use home::{diagnostic, Diagnostic, HomeErrorResult, HomeVerifier, MAX_DIAGNOSTIC_LEN};
pub use monitor::{InterlockMode, MonitorEvent, MonitorPhase, ReturnMonitor};
