//! Cut stroke
//!
//! Drives the cut axis across the stock, confirms the workpiece is held by
//! suction, fires the early actuators near the end of travel and hands over
//! to one of the return paths once the axis stops. A suction failure sends
//! the cut axis home and parks the machine in `SuctionHold`.

use crate::motion::{AxisId, Inches, ProfileKind};
use crate::safety::{HomeCheck, HomeCheckOutcome, HomeCheckPolicy};
use crate::scheduler::elapsed;
use crate::state::{Context, Fault, StepResult, SystemState};
use crate::traits::{Board, DigitalInput, MotionAxis};

/// Where a suction failure is in bringing the cut axis home
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SuctionRecovery {
    /// Returning; waiting for the axis to stop
    AwaitCutStop,
    /// Re-reading the home switch before holding
    Verify(HomeCheck),
}

impl SuctionRecovery {
    pub fn index(&self) -> u8 {
        match self {
            SuctionRecovery::AwaitCutStop => 1,
            SuctionRecovery::Verify(_) => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CutStep {
    #[default]
    Start,
    SuctionCheck { since_ms: u64 },
    CutMonitor,
    SuctionRecovery(SuctionRecovery),
}

impl CutStep {
    /// Sparse step number, matching the machine's operator documentation
    pub fn index(&self) -> u8 {
        match self {
            CutStep::Start => 0,
            CutStep::SuctionCheck { .. } => 1,
            CutStep::CutMonitor => 2,
            CutStep::SuctionRecovery(_) => 9,
        }
    }
}

/// One cut stroke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CuttingSequence {
    step: CutStep,
    early_clamp_fired: bool,
    early_rotary_fired: bool,
}

impl CuttingSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> CutStep {
        self.step
    }

    pub fn early_clamp_fired(&self) -> bool {
        self.early_clamp_fired
    }

    pub fn early_rotary_fired(&self) -> bool {
        self.early_rotary_fired
    }

    pub fn suction_step(&self) -> u8 {
        match &self.step {
            CutStep::SuctionRecovery(recovery) => recovery.index(),
            _ => 0,
        }
    }

    pub fn poll<B: Board>(&mut self, ctx: &mut Context<B>) -> StepResult {
        match self.step {
            CutStep::Start => {
                self.early_clamp_fired = false;
                self.early_rotary_fired = false;
                let travel = ctx.config.cut_axis.travel_mils;
                ctx.move_to(AxisId::Cut, travel)?;
                debug!(ctx.io.diag, "cut: stroke to {}", Inches(travel));
                self.step = CutStep::SuctionCheck {
                    since_ms: ctx.now_ms,
                };
                Ok(None)
            }
            CutStep::SuctionCheck { since_ms } => {
                if elapsed(ctx.now_ms, since_ms) < ctx.config.timing.suction_settle_ms as u64 {
                    return Ok(None);
                }
                if ctx.io.suction_sensor.level() {
                    ctx.configure(AxisId::Cut, ProfileKind::Normal);
                    self.step = CutStep::CutMonitor;
                } else {
                    self.abort_for_suction(ctx)?;
                }
                Ok(None)
            }
            CutStep::CutMonitor => self.monitor_stroke(ctx),
            CutStep::SuctionRecovery(_) => self.recover_from_suction(ctx),
        }
    }

    fn abort_for_suction<B: Board>(&mut self, ctx: &mut Context<B>) -> Result<(), Fault> {
        warn!(ctx.io.diag, "cut: no suction, returning cut axis");
        ctx.flags.suction_fault = true;
        let feed = ctx.io.feed_axis.current_position();
        ctx.io.feed_axis.force_stop_and_set_position(feed);
        ctx.configure(AxisId::Cut, ProfileKind::Return);
        ctx.move_to(AxisId::Cut, ctx.config.recovery.return_target_mils)?;
        ctx.flags.cycle_in_progress = false;
        self.step = CutStep::SuctionRecovery(SuctionRecovery::AwaitCutStop);
        Ok(())
    }

    fn monitor_stroke<B: Board>(&mut self, ctx: &mut Context<B>) -> StepResult {
        let travel = ctx.config.cut_axis.travel_mils;
        let actuators = ctx.config.actuators;
        let position = ctx.position_mils(AxisId::Cut);

        if !self.early_clamp_fired && position >= travel - actuators.early_clamp_mils {
            ctx.deferred
                .fire_rotation_clamp(&mut ctx.io, &actuators, ctx.now_ms);
            self.early_clamp_fired = true;
            trace!(ctx.io.diag, "cut: early clamp at {}", Inches(position));
        }

        if !self.early_rotary_fired && position >= travel - actuators.early_rotary_mils {
            ctx.deferred.engage_rotary(&mut ctx.io, &actuators, ctx.now_ms);
            self.early_rotary_fired = true;
            trace!(ctx.io.diag, "cut: early rotary at {}", Inches(position));
        }

        if ctx.io.cut_axis.is_running() {
            return Ok(None);
        }

        let timing = ctx.config.timing;
        ctx.deferred.pulse_signal(&mut ctx.io, &timing, ctx.now_ms);
        if !self.early_rotary_fired {
            ctx.deferred.engage_rotary(&mut ctx.io, &actuators, ctx.now_ms);
            self.early_rotary_fired = true;
        }
        ctx.configure(AxisId::Cut, ProfileKind::Return);

        if ctx.io.material_sensor.level() {
            Ok(Some(SystemState::ReturnMaterialPresent))
        } else {
            Ok(Some(SystemState::ReturnMaterialAbsent))
        }
    }

    fn recover_from_suction<B: Board>(&mut self, ctx: &mut Context<B>) -> StepResult {
        let CutStep::SuctionRecovery(recovery) = &mut self.step else {
            return Ok(None);
        };

        match recovery {
            SuctionRecovery::AwaitCutStop => {
                if !ctx.io.cut_axis.is_running() {
                    *recovery = SuctionRecovery::Verify(HomeCheck::new(
                        HomeCheckPolicy::WarnAndProceed,
                        "suction recovery",
                        ctx.now_ms,
                    ));
                }
                Ok(None)
            }
            SuctionRecovery::Verify(check) => {
                let outcome = check
                    .poll(
                        &mut ctx.io.cut_axis,
                        &ctx.io.cut_home,
                        &ctx.config.recovery,
                        &ctx.config.cut_axis,
                        ctx.now_ms,
                    )
                    .map_err(|e| Fault::Axis(AxisId::Cut, e))?;

                match outcome {
                    None => Ok(None),
                    Some(HomeCheckOutcome::Confirmed) => {
                        info!(ctx.io.diag, "cut: home confirmed after suction failure");
                        Ok(Some(SystemState::SuctionHold))
                    }
                    Some(HomeCheckOutcome::Proceed(msg)) | Some(HomeCheckOutcome::Fault(msg)) => {
                        warn!(ctx.io.diag, "cut: {}", msg.as_str());
                        Ok(Some(SystemState::SuctionHold))
                    }
                }
            }
        }
    }
}
