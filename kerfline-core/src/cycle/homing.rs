//! Power-on and machine homing
//!
//! `Startup` parks the actuators and evaluates the start switch once.
//! `Homing` references the cut axis against its switch, then runs the
//! shared feed homing sub-sequence and parks the feed carriage at travel.

use crate::motion::{AxisId, ProfileKind, MILS_PER_INCH};
use crate::scheduler::{elapsed, Blinker};
use crate::state::{Context, Fault, StepResult, SystemState};
use crate::traits::{BinaryOutput, Board, DigitalInput, MotionAxis, RotaryActuator};

use super::feed_homing::FeedHoming;

/// Park everything and pick up the start switch state
///
/// A start switch already on at power-up must be cycled off before it can
/// start a cut.
pub fn startup<B: Board>(ctx: &mut Context<B>) -> SystemState {
    ctx.io.lamps_off();
    ctx.io.completion_signal.off();
    ctx.io.blue.on();
    ctx.io.rotary.set_angle(ctx.config.actuators.rotary_home_deg);
    ctx.io.secure_clamp.extend();
    ctx.flags.start_safe = !ctx.io.start_switch.level();
    if !ctx.flags.start_safe {
        warn!(ctx.io.diag, "start switch on at power-up; cycle it off to arm");
    }
    SystemState::Homing
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingStep {
    /// Cut axis moving toward its switch
    SeekCut { attempt: u8, since_ms: u64 },
    /// Feed carriage homing with its clamp open
    HomeFeed(FeedHoming),
    /// Carrying the clamp out to travel
    ParkFeed,
}

/// Machine homing in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HomingSequence {
    step: HomingStep,
    blinker: Blinker,
}

impl HomingSequence {
    pub fn new(now_ms: u64) -> Self {
        Self {
            step: HomingStep::SeekCut {
                attempt: 1,
                since_ms: now_ms,
            },
            blinker: Blinker::new(0, now_ms),
        }
    }

    pub fn step(&self) -> HomingStep {
        self.step
    }

    pub fn enter<B: Board>(&mut self, ctx: &mut Context<B>) -> Result<(), Fault> {
        self.blinker = Blinker::new(ctx.config.timing.homing_blink_ms, ctx.now_ms);
        ctx.io.green.off();
        seek_cut_home(ctx)?;
        info!(ctx.io.diag, "homing: cut axis seeking switch");
        Ok(())
    }

    pub fn poll<B: Board>(&mut self, ctx: &mut Context<B>) -> StepResult {
        if self.blinker.due(ctx.now_ms) {
            ctx.io.blue.toggle();
            let blue = ctx.io.blue.is_active();
            ctx.io.green.set(blue);
        }

        match &mut self.step {
            HomingStep::SeekCut { attempt, since_ms } => {
                if ctx.io.cut_home.level() {
                    ctx.io.cut_axis.force_stop_and_set_position(0);
                    ctx.configure(AxisId::Cut, ProfileKind::Normal);
                    ctx.io.feed_clamp.retract();
                    info!(ctx.io.diag, "homing: cut axis homed");
                    self.step = HomingStep::HomeFeed(FeedHoming::new());
                    return Ok(None);
                }

                let timing = ctx.config.timing;
                if elapsed(ctx.now_ms, *since_ms) < timing.cut_homing_timeout_ms as u64 {
                    return Ok(None);
                }

                let position = ctx.io.cut_axis.current_position();
                ctx.io.cut_axis.force_stop_and_set_position(position);
                if *attempt >= timing.cut_homing_attempts {
                    error!(ctx.io.diag, "homing: cut switch not found after {} attempts", *attempt);
                    return Err(Fault::HomingTimeout(AxisId::Cut));
                }

                warn!(ctx.io.diag, "homing: cut attempt {} timed out, retrying", *attempt);
                *attempt += 1;
                *since_ms = ctx.now_ms;
                ctx.io.cut_axis.set_position(0);
                seek_cut_home(ctx)?;
                Ok(None)
            }
            HomingStep::HomeFeed(homing) => {
                if homing.poll(ctx)? {
                    ctx.io.feed_clamp.extend();
                    ctx.move_to(AxisId::Feed, ctx.config.feed_axis.travel_mils)?;
                    self.step = HomingStep::ParkFeed;
                }
                Ok(None)
            }
            HomingStep::ParkFeed => {
                if ctx.io.feed_axis.is_running() {
                    return Ok(None);
                }
                ctx.io.blue.off();
                ctx.io.green.on();
                ctx.io.rotary.set_angle(ctx.config.actuators.rotary_home_deg);
                info!(ctx.io.diag, "homing: complete");
                Ok(Some(SystemState::Idle))
            }
        }
    }
}

/// Head for the cut switch from wherever the axis thinks it is
fn seek_cut_home<B: Board>(ctx: &mut Context<B>) -> Result<(), Fault> {
    ctx.configure(AxisId::Cut, ProfileKind::Homing);
    let overshoot = ctx.config.cut_axis.travel_mils + MILS_PER_INCH;
    ctx.move_to(AxisId::Cut, -overshoot)
}
