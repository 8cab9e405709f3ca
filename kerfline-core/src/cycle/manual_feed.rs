//! Manual stock feed from idle
//!
//! The manual feed switch pushes stock toward the blade without cutting.
//! With nothing at the material sensor, fresh stock gets two strokes to
//! bring its end up for a first cut; with stock present, one full stroke
//! advances it. Each stroke opens the feed clamp, runs back to its grip
//! position, grips while releasing the secure clamp and drives forward to
//! its release position.
//!
//! If the start switch is held when the last stroke finishes the machine
//! goes straight into a cut, otherwise back to idle.

use crate::config::MachineConfig;
use crate::motion::{AxisId, ProfileKind};
use crate::scheduler::elapsed;
use crate::state::{Context, StepResult, SystemState};
use crate::traits::{BinaryOutput, Board, DigitalInput};

/// Which feed the operator asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FeedMode {
    /// Fresh stock not yet at the sensor
    FirstCut,
    /// Stock present; advance one stroke
    ForwardOne,
}

impl FeedMode {
    pub fn for_material(present: bool) -> Self {
        if present {
            FeedMode::ForwardOne
        } else {
            FeedMode::FirstCut
        }
    }

    pub fn state(self) -> SystemState {
        match self {
            FeedMode::FirstCut => SystemState::FeedFirstCut,
            FeedMode::ForwardOne => SystemState::FeedForwardOne,
        }
    }

    fn strokes(self) -> u8 {
        match self {
            FeedMode::FirstCut => 2,
            FeedMode::ForwardOne => 1,
        }
    }

    /// Grip and release positions of stroke `n`
    fn stroke(self, n: u8, config: &MachineConfig) -> (i32, i32) {
        let travel = config.feed_axis.travel_mils;
        let feed = &config.stock_feed;
        match (self, n) {
            (FeedMode::ForwardOne, _) => (0, travel),
            (FeedMode::FirstCut, 0) => (feed.first_cut_grips_mils[0], travel),
            (FeedMode::FirstCut, _) => (
                feed.first_cut_grips_mils[1],
                travel - feed.first_cut_shortfall_mils,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FeedStep {
    /// Open the feed clamp
    #[default]
    Release,
    /// Run back to the grip position once the carriage is still
    Reach,
    /// Grip the stock and free it from the secure clamp
    Grip,
    Settle { since_ms: u64 },
    /// Drive to the release position
    Push,
    /// Waiting for the push to end
    Finish,
}

impl FeedStep {
    pub fn index(self) -> u8 {
        match self {
            FeedStep::Release => 0,
            FeedStep::Reach => 1,
            FeedStep::Grip => 2,
            FeedStep::Settle { .. } => 3,
            FeedStep::Push => 4,
            FeedStep::Finish => 5,
        }
    }
}

/// Non-blocking manual feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ManualFeedSequence {
    mode: FeedMode,
    stroke: u8,
    step: FeedStep,
}

impl ManualFeedSequence {
    pub fn new(mode: FeedMode) -> Self {
        Self {
            mode,
            stroke: 0,
            step: FeedStep::Release,
        }
    }

    pub fn mode(&self) -> FeedMode {
        self.mode
    }

    pub fn step(&self) -> FeedStep {
        self.step
    }

    pub fn stroke(&self) -> u8 {
        self.stroke
    }

    pub fn enter<B: Board>(&mut self, ctx: &mut Context<B>) {
        ctx.configure(AxisId::Feed, ProfileKind::Normal);
        ctx.io.green.off();
        info!(ctx.io.diag, "manual feed: {} strokes", self.mode.strokes());
    }

    pub fn poll<B: Board>(&mut self, ctx: &mut Context<B>) -> StepResult {
        let running = ctx.axis_running(AxisId::Feed);
        let (grip, release) = self.mode.stroke(self.stroke, &ctx.config);

        match self.step {
            FeedStep::Release => {
                ctx.io.feed_clamp.retract();
                self.step = FeedStep::Reach;
            }
            FeedStep::Reach => {
                if !running {
                    ctx.move_to(AxisId::Feed, grip)?;
                    self.step = FeedStep::Grip;
                }
            }
            FeedStep::Grip => {
                if !running {
                    ctx.io.feed_clamp.extend();
                    ctx.io.secure_clamp.retract();
                    self.step = FeedStep::Settle {
                        since_ms: ctx.now_ms,
                    };
                }
            }
            FeedStep::Settle { since_ms } => {
                if elapsed(ctx.now_ms, since_ms) >= ctx.config.stock_feed.grip_settle_ms as u64 {
                    self.step = FeedStep::Push;
                }
            }
            FeedStep::Push => {
                if !running {
                    ctx.move_to(AxisId::Feed, release)?;
                    debug!(ctx.io.diag, "manual feed: stroke {} to {}", self.stroke + 1, release);
                    self.step = FeedStep::Finish;
                }
            }
            FeedStep::Finish => {
                if !running {
                    self.stroke += 1;
                    if self.stroke < self.mode.strokes() {
                        self.step = FeedStep::Release;
                    } else {
                        return Ok(Some(self.finish(ctx)));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Start switch held: cut at once; otherwise back to idle
    fn finish<B: Board>(&mut self, ctx: &mut Context<B>) -> SystemState {
        let flags = &ctx.flags;
        if ctx.io.start_switch.level() && flags.start_safe && !flags.suction_fault {
            info!(ctx.io.diag, "manual feed: done, start held");
            ctx.flags.cycle_in_progress = true;
            ctx.configure(AxisId::Cut, ProfileKind::Normal);
            ctx.io.yellow.on();
            ctx.io.feed_clamp.extend();
            ctx.io.secure_clamp.extend();
            SystemState::Cutting
        } else {
            info!(ctx.io.diag, "manual feed: done");
            SystemState::Idle
        }
    }
}
