//! Feed axis homing sub-sequence
//!
//! The feed home switch sits beyond the far end of travel. The axis seeks
//! it at homing speed, takes the switch position as `travel`, backs off by
//! the configured distance and defines that point as `travel` again, so the
//! working stroke ends just clear of the switch.

use crate::motion::{AxisId, ProfileKind, MILS_PER_INCH};
use crate::state::{Context, Fault};
use crate::traits::{Board, DigitalInput, MotionAxis};

/// Seek target, far enough that the switch is always reached first
const SEEK_MILS: i32 = 10_000 * MILS_PER_INCH;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FeedHomingStep {
    /// Start the move toward the switch
    #[default]
    Seek,
    /// Moving; waiting for the switch
    AwaitSwitch,
    /// Waiting for the stop, then backing off the switch
    BackOff,
    /// Waiting for the back-off, then defining the datum
    SetDatum,
    Done,
}

impl FeedHomingStep {
    pub fn index(self) -> u8 {
        match self {
            FeedHomingStep::Seek => 0,
            FeedHomingStep::AwaitSwitch => 1,
            FeedHomingStep::BackOff => 2,
            FeedHomingStep::SetDatum => 3,
            FeedHomingStep::Done => 4,
        }
    }
}

/// Non-blocking feed axis homing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FeedHoming {
    step: FeedHomingStep,
}

impl FeedHoming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> FeedHomingStep {
        self.step
    }

    pub fn is_done(&self) -> bool {
        self.step == FeedHomingStep::Done
    }

    /// Advance the sequence; returns true once the datum is set
    pub fn poll<B: Board>(&mut self, ctx: &mut Context<B>) -> Result<bool, Fault> {
        let feed = ctx.config.feed_axis;
        let backoff = ctx.config.stock_feed.homing_backoff_mils;
        let travel_steps = feed.steps(feed.travel_mils);

        match self.step {
            FeedHomingStep::Seek => {
                ctx.configure(AxisId::Feed, ProfileKind::Homing);
                ctx.move_to(AxisId::Feed, SEEK_MILS)?;
                debug!(ctx.io.diag, "feed homing: seeking switch");
                self.step = FeedHomingStep::AwaitSwitch;
            }
            FeedHomingStep::AwaitSwitch => {
                // Level, not edge: a carriage parked on the switch is already home
                if ctx.io.feed_home.level() {
                    ctx.io.feed_axis.stop();
                    ctx.io.feed_axis.set_position(travel_steps);
                    debug!(ctx.io.diag, "feed homing: switch hit");
                    self.step = FeedHomingStep::BackOff;
                }
            }
            FeedHomingStep::BackOff => {
                if !ctx.io.feed_axis.is_running() {
                    ctx.move_to(AxisId::Feed, feed.travel_mils - backoff)?;
                    self.step = FeedHomingStep::SetDatum;
                }
            }
            FeedHomingStep::SetDatum => {
                if !ctx.io.feed_axis.is_running() {
                    ctx.io.feed_axis.set_position(travel_steps);
                    ctx.configure(AxisId::Feed, ProfileKind::Normal);
                    info!(ctx.io.diag, "feed homing: datum set");
                    self.step = FeedHomingStep::Done;
                }
            }
            FeedHomingStep::Done => {}
        }

        Ok(self.is_done())
    }
}
