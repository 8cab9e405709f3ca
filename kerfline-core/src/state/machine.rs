//! State machine definition
//!
//! Exactly one state is active at a time. The controller holds the current
//! and previous state and is the only place a transition happens.

use crate::motion::AxisId;
use crate::traits::AxisError;

/// Top-level machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemState {
    /// Power-on: park actuators, evaluate the start switch
    Startup,
    /// Establish the reference for both axes
    Homing,
    /// Ready for a start command
    Idle,
    /// Cut stroke in progress
    Cutting,
    /// Returning with stock still in the machine
    ReturnMaterialPresent,
    /// Returning after the stock ran out
    ReturnMaterialAbsent,
    /// Fault; all motion halted until acknowledged
    Error,
    /// Clearing fault state before re-homing
    ErrorReset,
    /// Suction confirmation failed; waiting for operator re-arm
    SuctionHold,
    /// Manual re-verification of the cut axis home
    HomeCheck,
    /// Two manual feed strokes bringing fresh stock up for its first cut
    FeedFirstCut,
    /// One manual feed stroke with stock already present
    FeedForwardOne,
}

impl SystemState {
    pub fn name(self) -> &'static str {
        match self {
            SystemState::Startup => "STARTUP",
            SystemState::Homing => "HOMING",
            SystemState::Idle => "IDLE",
            SystemState::Cutting => "CUTTING",
            SystemState::ReturnMaterialPresent => "RETURN_PRESENT",
            SystemState::ReturnMaterialAbsent => "RETURN_ABSENT",
            SystemState::Error => "ERROR",
            SystemState::ErrorReset => "ERROR_RESET",
            SystemState::SuctionHold => "SUCTION_HOLD",
            SystemState::HomeCheck => "HOME_CHECK",
            SystemState::FeedFirstCut => "FEED_FIRST_CUT",
            SystemState::FeedForwardOne => "FEED_FORWARD_ONE",
        }
    }
}

/// Faults that halt the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// Cut axis home not confirmed and the excursion budget is spent
    HomeNotConfirmed,
    /// Slow recovery ran out of time without finding home
    HomeRecoveryTimeout,
    /// An axis did not reach its home switch during homing
    HomingTimeout(AxisId),
    /// An axis rejected a command
    Axis(AxisId, AxisError),
}
