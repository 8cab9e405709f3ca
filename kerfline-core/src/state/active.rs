//! Active state and its per-entry data
//!
//! Each variant owns the cursors of its sequence. Leaving a state drops its
//! variant, so a re-entered state always starts from fresh cursors.

use crate::cycle::{
    fault, homing, idle, CuttingSequence, ErrorHold, FeedMode, HomeCheckMaintenance,
    HomingSequence, ManualFeedSequence, ReturnBranch, ReturnSequence, SuctionHold,
};
use crate::traits::Board;

use super::{Context, Fault, StepResult, SystemState};

/// Snapshot of the cycle progress cursors
///
/// All zero/false outside the cutting, return and manual feed states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleCursor {
    pub step: u8,
    pub homing_step: u8,
    pub suction_step: u8,
    pub nudges: u8,
    pub early_clamp_fired: bool,
    pub early_rotary_fired: bool,
}

/// The active state with its data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Startup,
    Homing(HomingSequence),
    Idle,
    Cutting(CuttingSequence),
    Return(ReturnSequence),
    Error(ErrorHold),
    ErrorReset,
    SuctionHold(SuctionHold),
    HomeCheck(HomeCheckMaintenance),
    ManualFeed(ManualFeedSequence),
}

impl State {
    pub fn kind(&self) -> SystemState {
        match self {
            State::Startup => SystemState::Startup,
            State::Homing(_) => SystemState::Homing,
            State::Idle => SystemState::Idle,
            State::Cutting(_) => SystemState::Cutting,
            State::Return(seq) => match seq.branch() {
                ReturnBranch::MaterialPresent => SystemState::ReturnMaterialPresent,
                ReturnBranch::MaterialAbsent => SystemState::ReturnMaterialAbsent,
            },
            State::Error(_) => SystemState::Error,
            State::ErrorReset => SystemState::ErrorReset,
            State::SuctionHold(_) => SystemState::SuctionHold,
            State::HomeCheck(_) => SystemState::HomeCheck,
            State::ManualFeed(seq) => seq.mode().state(),
        }
    }

    /// Build the data for `kind` and run its entry actions
    pub fn enter<B: Board>(kind: SystemState, ctx: &mut Context<B>) -> Result<Self, Fault> {
        let now = ctx.now_ms;
        let state = match kind {
            SystemState::Startup => State::Startup,
            SystemState::Homing => {
                let mut seq = HomingSequence::new(now);
                seq.enter(ctx)?;
                State::Homing(seq)
            }
            SystemState::Idle => {
                idle::enter(ctx);
                State::Idle
            }
            SystemState::Cutting => State::Cutting(CuttingSequence::new()),
            SystemState::ReturnMaterialPresent => {
                let mut seq = ReturnSequence::new(ReturnBranch::MaterialPresent);
                seq.enter(ctx)?;
                State::Return(seq)
            }
            SystemState::ReturnMaterialAbsent => {
                let mut seq = ReturnSequence::new(ReturnBranch::MaterialAbsent);
                seq.enter(ctx)?;
                State::Return(seq)
            }
            SystemState::Error => {
                let mut hold = ErrorHold::new(now);
                hold.enter(ctx);
                State::Error(hold)
            }
            SystemState::ErrorReset => State::ErrorReset,
            SystemState::SuctionHold => {
                let mut hold = SuctionHold::new(now);
                hold.enter(ctx)?;
                State::SuctionHold(hold)
            }
            SystemState::HomeCheck => {
                let mut check = HomeCheckMaintenance::new(now);
                check.enter(ctx);
                State::HomeCheck(check)
            }
            SystemState::FeedFirstCut | SystemState::FeedForwardOne => {
                let mode = if kind == SystemState::FeedFirstCut {
                    FeedMode::FirstCut
                } else {
                    FeedMode::ForwardOne
                };
                let mut seq = ManualFeedSequence::new(mode);
                seq.enter(ctx);
                State::ManualFeed(seq)
            }
        };
        Ok(state)
    }

    /// Run exit actions
    pub fn exit<B: Board>(&mut self, ctx: &mut Context<B>) {
        match self {
            State::Idle => idle::exit(ctx),
            State::Return(seq) => seq.exit(ctx),
            State::HomeCheck(check) => check.exit(ctx),
            _ => {}
        }
    }

    /// Advance the active state by one tick
    pub fn step<B: Board>(&mut self, ctx: &mut Context<B>) -> StepResult {
        match self {
            State::Startup => Ok(Some(homing::startup(ctx))),
            State::Homing(seq) => seq.poll(ctx),
            State::Idle => idle::poll(ctx),
            State::Cutting(seq) => seq.poll(ctx),
            State::Return(seq) => seq.poll(ctx),
            State::Error(hold) => hold.poll(ctx),
            State::ErrorReset => Ok(Some(fault::reset(ctx))),
            State::SuctionHold(hold) => hold.poll(ctx),
            State::HomeCheck(check) => check.poll(ctx),
            State::ManualFeed(seq) => seq.poll(ctx),
        }
    }

    pub fn cursor(&self) -> CycleCursor {
        match self {
            State::Cutting(seq) => CycleCursor {
                step: seq.step().index(),
                suction_step: seq.suction_step(),
                early_clamp_fired: seq.early_clamp_fired(),
                early_rotary_fired: seq.early_rotary_fired(),
                ..CycleCursor::default()
            },
            State::Return(seq) => CycleCursor {
                step: seq.step(),
                homing_step: seq.homing_step(),
                nudges: seq.nudges(),
                ..CycleCursor::default()
            },
            State::ManualFeed(seq) => CycleCursor {
                step: seq.step().index(),
                ..CycleCursor::default()
            },
            _ => CycleCursor::default(),
        }
    }
}
