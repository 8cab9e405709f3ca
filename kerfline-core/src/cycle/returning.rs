//! Return paths
//!
//! After a cut the machine returns both axes and re-feeds stock along one
//! of two branches. Both run the same small set of operations from a fixed
//! plan and finish with the shared feed homing sub-sequence; the branch
//! only picks the plan and its `ReturnPathConfig`.
//!
//! With stock present the cut axis returns under the return monitor while
//! the feed carriage fetches the next length. With stock absent the feed
//! carriage re-grips in two strokes, pausing between clamp changes so the
//! cylinders can seat.

use crate::config::ReturnPathConfig;
use crate::motion::{AxisId, ProfileKind};
use crate::safety::{HomeCheck, HomeCheckOutcome, HomeCheckPolicy};
use crate::scheduler::elapsed;
use crate::state::{Context, Fault, StepResult, SystemState};
use crate::traits::{BinaryOutput, Board, DigitalInput, MotionAxis};

use super::feed_homing::FeedHoming;

/// Which return path is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReturnBranch {
    MaterialPresent,
    MaterialAbsent,
}

impl ReturnBranch {
    fn name(self) -> &'static str {
        match self {
            ReturnBranch::MaterialPresent => "present return",
            ReturnBranch::MaterialAbsent => "absent return",
        }
    }

    fn plan(self) -> &'static [Op] {
        match self {
            ReturnBranch::MaterialPresent => PRESENT_PLAN,
            ReturnBranch::MaterialAbsent => ABSENT_PLAN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clamp {
    Feed,
    Secure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedTarget {
    Zero,
    Regrip,
    Travel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    /// Wait for an axis to stop
    AwaitStop(AxisId),
    /// Wait for the monitored cut return to finish, then clear the monitor
    AwaitCutReturn,
    Clamp(Clamp, bool),
    /// Cylinder settle delay
    Settle,
    Configure(AxisId, ProfileKind),
    MoveFeed(FeedTarget),
    /// Checked verification of the cut axis home under the branch policy
    VerifyCutHome,
    /// Shared feed homing, then finish the cycle
    HomeFeed,
}

const PRESENT_PLAN: &[Op] = &[
    Op::AwaitStop(AxisId::Feed),
    Op::Clamp(Clamp::Feed, true),
    Op::AwaitCutReturn,
    Op::VerifyCutHome,
    Op::Clamp(Clamp::Secure, false),
    Op::Configure(AxisId::Feed, ProfileKind::Normal),
    Op::MoveFeed(FeedTarget::Travel),
    Op::AwaitStop(AxisId::Feed),
    Op::Clamp(Clamp::Feed, false),
    Op::HomeFeed,
];

const ABSENT_PLAN: &[Op] = &[
    Op::AwaitStop(AxisId::Cut),
    Op::Clamp(Clamp::Feed, true),
    Op::Settle,
    Op::AwaitStop(AxisId::Feed),
    Op::Clamp(Clamp::Feed, false),
    Op::Settle,
    Op::MoveFeed(FeedTarget::Regrip),
    Op::AwaitStop(AxisId::Feed),
    Op::Clamp(Clamp::Feed, true),
    Op::Settle,
    Op::MoveFeed(FeedTarget::Zero),
    Op::AwaitStop(AxisId::Feed),
    Op::Clamp(Clamp::Feed, false),
    Op::Settle,
    Op::MoveFeed(FeedTarget::Travel),
    Op::AwaitStop(AxisId::Feed),
    Op::VerifyCutHome,
    Op::Clamp(Clamp::Feed, false),
    Op::HomeFeed,
];

/// Progress through the current operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Pending {
    None,
    Settling { since_ms: u64 },
    Verifying(HomeCheck),
    Homing(FeedHoming),
}

enum Progress {
    Next,
    Wait,
    Done(SystemState),
}

/// A return path in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReturnSequence {
    branch: ReturnBranch,
    op: u8,
    pending: Pending,
}

impl ReturnSequence {
    pub fn new(branch: ReturnBranch) -> Self {
        Self {
            branch,
            op: 0,
            pending: Pending::None,
        }
    }

    pub fn branch(&self) -> ReturnBranch {
        self.branch
    }

    /// 1-based step number; 0 before the first tick
    pub fn step(&self) -> u8 {
        self.op + 1
    }

    /// Feed homing sub-step, 0 outside the homing phase
    pub fn homing_step(&self) -> u8 {
        match &self.pending {
            Pending::Homing(homing) => homing.step().index(),
            _ => 0,
        }
    }

    /// Nudges issued by the current home check
    pub fn nudges(&self) -> u8 {
        match &self.pending {
            Pending::Verifying(check) => check.nudges(),
            _ => 0,
        }
    }

    fn path_config<B: Board>(&self, ctx: &Context<B>) -> ReturnPathConfig {
        match self.branch {
            ReturnBranch::MaterialPresent => ctx.config.return_present,
            ReturnBranch::MaterialAbsent => ctx.config.return_absent,
        }
    }

    /// Start the return moves
    pub fn enter<B: Board>(&mut self, ctx: &mut Context<B>) -> Result<(), Fault> {
        let return_target = ctx.config.recovery.return_target_mils;
        match self.branch {
            ReturnBranch::MaterialPresent => {
                ctx.configure(AxisId::Feed, ProfileKind::Return);
                ctx.io.feed_clamp.retract();
                ctx.io.secure_clamp.retract();
                let cut = ctx.config.cut_axis;
                ctx.monitor
                    .arm(cut.steps(return_target), cut.profiles.returning);
            }
            ReturnBranch::MaterialAbsent => {
                ctx.configure(AxisId::Feed, ProfileKind::Normal);
                ctx.io.secure_clamp.retract();
            }
        }
        ctx.configure(AxisId::Cut, ProfileKind::Return);
        ctx.move_to(AxisId::Cut, return_target)?;
        ctx.move_to(AxisId::Feed, 0)?;
        debug!(ctx.io.diag, "{}: axes returning", self.branch.name());
        Ok(())
    }

    pub fn exit<B: Board>(&mut self, ctx: &mut Context<B>) {
        ctx.monitor.disarm();
        *self = Self::new(self.branch);
    }

    pub fn poll<B: Board>(&mut self, ctx: &mut Context<B>) -> StepResult {
        let plan = self.branch.plan();
        while let Some(&op) = plan.get(self.op as usize) {
            match self.run(op, ctx)? {
                Progress::Next => {
                    self.op += 1;
                    self.pending = Pending::None;
                }
                Progress::Wait => return Ok(None),
                Progress::Done(next) => return Ok(Some(next)),
            }
        }
        Ok(None)
    }

    fn run<B: Board>(&mut self, op: Op, ctx: &mut Context<B>) -> Result<Progress, Fault> {
        let path = self.path_config(ctx);
        match op {
            Op::AwaitStop(id) => Ok(if ctx.axis_running(id) {
                Progress::Wait
            } else {
                Progress::Next
            }),
            Op::AwaitCutReturn => {
                if ctx.io.cut_axis.is_running() || ctx.monitor.is_busy() {
                    return Ok(Progress::Wait);
                }
                ctx.monitor.disarm();
                Ok(Progress::Next)
            }
            Op::Clamp(clamp, extended) => {
                let output = match clamp {
                    Clamp::Feed => &mut ctx.io.feed_clamp,
                    Clamp::Secure => &mut ctx.io.secure_clamp,
                };
                output.set(extended);
                Ok(Progress::Next)
            }
            Op::Settle => match self.pending {
                Pending::Settling { since_ms } => {
                    Ok(if elapsed(ctx.now_ms, since_ms) >= path.settle_ms as u64 {
                        Progress::Next
                    } else {
                        Progress::Wait
                    })
                }
                _ => {
                    self.pending = Pending::Settling {
                        since_ms: ctx.now_ms,
                    };
                    Ok(Progress::Wait)
                }
            },
            Op::Configure(id, kind) => {
                ctx.configure(id, kind);
                Ok(Progress::Next)
            }
            Op::MoveFeed(target) => {
                let mils = match target {
                    FeedTarget::Zero => 0,
                    FeedTarget::Regrip => path.regrip_mils,
                    FeedTarget::Travel => ctx.config.feed_axis.travel_mils,
                };
                ctx.move_to(AxisId::Feed, mils)?;
                Ok(Progress::Next)
            }
            Op::VerifyCutHome => self.verify_cut_home(path.home_check, ctx),
            Op::HomeFeed => {
                let mut homing = match self.pending {
                    Pending::Homing(homing) => homing,
                    _ => FeedHoming::new(),
                };
                let done = homing.poll(ctx)?;
                self.pending = Pending::Homing(homing);
                if done {
                    Ok(Progress::Done(self.finish(ctx)))
                } else {
                    Ok(Progress::Wait)
                }
            }
        }
    }

    fn verify_cut_home<B: Board>(
        &mut self,
        policy: HomeCheckPolicy,
        ctx: &mut Context<B>,
    ) -> Result<Progress, Fault> {
        let mut check = match self.pending {
            Pending::Verifying(check) => check,
            _ => HomeCheck::new(policy, self.branch.name(), ctx.now_ms),
        };
        let outcome = check
            .poll(
                &mut ctx.io.cut_axis,
                &ctx.io.cut_home,
                &ctx.config.recovery,
                &ctx.config.cut_axis,
                ctx.now_ms,
            )
            .map_err(|e| Fault::Axis(AxisId::Cut, e))?;
        self.pending = Pending::Verifying(check);

        match outcome {
            None => Ok(Progress::Wait),
            Some(HomeCheckOutcome::Confirmed) => {
                debug!(ctx.io.diag, "{}: cut home confirmed", self.branch.name());
                Ok(Progress::Next)
            }
            Some(HomeCheckOutcome::Proceed(msg)) => {
                warn!(ctx.io.diag, "{}: proceeding, {}", self.branch.name(), msg.as_str());
                Ok(Progress::Next)
            }
            Some(HomeCheckOutcome::Fault(msg)) => {
                error!(ctx.io.diag, "{}: {}", self.branch.name(), msg.as_str());
                Err(match policy {
                    HomeCheckPolicy::SlowRecovery => Fault::HomeRecoveryTimeout,
                    _ => Fault::HomeNotConfirmed,
                })
            }
        }
    }

    /// Close the cycle and pick the next state
    ///
    /// With the start switch still held and the restart latch set the next
    /// cut starts straight away without passing through `Idle`.
    fn finish<B: Board>(&mut self, ctx: &mut Context<B>) -> SystemState {
        ctx.io.secure_clamp.extend();
        ctx.io.yellow.off();
        ctx.flags.cycle_in_progress = false;

        if ctx.io.start_switch.level() && ctx.flags.start_safe {
            ctx.io.feed_clamp.extend();
            ctx.configure(AxisId::Cut, ProfileKind::Normal);
            ctx.io.yellow.on();
            ctx.flags.cycle_in_progress = true;
            info!(ctx.io.diag, "{}: continuing with next cut", self.branch.name());
            SystemState::Cutting
        } else {
            info!(ctx.io.diag, "{}: cycle complete", self.branch.name());
            SystemState::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBoard;

    fn entered(branch: ReturnBranch) -> (Context<SimBoard>, ReturnSequence) {
        let mut ctx = SimBoard::context();
        ctx.flags.cycle_in_progress = true;
        ctx.io.cut_axis.position = 4500;
        ctx.io.feed_axis.position = 3400;
        let mut seq = ReturnSequence::new(branch);
        seq.enter(&mut ctx).unwrap();
        (ctx, seq)
    }

    fn set_input(input: &mut crate::sim::SimInput, level: bool, now: u64) {
        input.set(level);
        input.update(now);
    }

    /// Tick until a transition, completing axis moves each tick
    fn run(ctx: &mut Context<SimBoard>, seq: &mut ReturnSequence, until_ms: u64) -> StepResult {
        while ctx.now_ms < until_ms {
            ctx.now_ms += 1;
            ctx.io.cut_axis.complete();
            ctx.io.feed_axis.complete();
            // Feed switch sits just past the travel end
            let feed_on_switch = ctx.io.feed_axis.target > 3400;
            set_input(&mut ctx.io.feed_home, feed_on_switch, ctx.now_ms);
            if let Some(next) = seq.poll(ctx)? {
                return Ok(Some(next));
            }
        }
        Ok(None)
    }

    #[test]
    fn test_present_enter_moves_both_axes() {
        let (ctx, _) = entered(ReturnBranch::MaterialPresent);
        assert_eq!(ctx.io.cut_axis.target, -10);
        assert_eq!(ctx.io.feed_axis.target, 0);
        assert_eq!(ctx.io.feed_axis.speed_hz, 20_000);
        assert!(ctx.monitor.is_armed());
        assert!(!ctx.io.feed_clamp.is_active());
        assert!(!ctx.io.secure_clamp.is_active());
    }

    #[test]
    fn test_present_path_to_idle() {
        let (mut ctx, mut seq) = entered(ReturnBranch::MaterialPresent);
        set_input(&mut ctx.io.cut_home, true, 0);

        assert_eq!(run(&mut ctx, &mut seq, 2000), Ok(Some(SystemState::Idle)));
        assert!(!ctx.monitor.is_armed());
        assert!(!ctx.flags.cycle_in_progress);
        assert!(ctx.io.secure_clamp.is_active());
        assert_eq!(ctx.io.cut_axis.current_position(), 0);
        assert_eq!(ctx.io.feed_axis.current_position(), 3400);
        // Feed fetched stock at zero and carried it to travel
        assert!(ctx.io.feed_axis.moves.contains(&0));
        assert!(ctx.io.feed_axis.moves.contains(&3400));
    }

    #[test]
    fn test_present_path_waits_for_monitor() {
        let (mut ctx, mut seq) = entered(ReturnBranch::MaterialPresent);
        ctx.io.feed_axis.complete();
        ctx.io.cut_axis.complete();
        ctx.monitor.arm(-10, ctx.config.cut_axis.profiles.returning);
        // Simulate a hit being verified
        ctx.io.cut_axis.position = 40;
        ctx.io.cut_axis.move_to(-10).unwrap();
        set_input(&mut ctx.io.cut_home, true, 0);
        ctx.monitor
            .poll(
                &mut ctx.io.cut_axis,
                &ctx.io.cut_home,
                &ctx.config.recovery,
                &ctx.config.cut_axis,
                0,
            )
            .unwrap();
        assert!(ctx.monitor.is_busy());
        ctx.io.cut_axis.complete();

        seq.poll(&mut ctx).unwrap();
        assert_eq!(seq.step(), 3);
    }

    #[test]
    fn test_present_path_faults_after_four_nudges() {
        let (mut ctx, mut seq) = entered(ReturnBranch::MaterialPresent);

        assert_eq!(
            run(&mut ctx, &mut seq, 10_000),
            Err(Fault::HomeNotConfirmed)
        );
        // Four 0.1in nudges of 50 steps past the -10 return target
        let nudges: heapless::Vec<i32, 8> = ctx
            .io
            .cut_axis
            .moves
            .iter()
            .copied()
            .filter(|&t| t < -10)
            .collect();
        assert_eq!(nudges.as_slice(), &[-60, -110, -160, -210]);
        assert!(ctx.io.diag.contains("home not found after 4 nudges"));
    }

    #[test]
    fn test_absent_path_regrips_with_settle() {
        let (mut ctx, mut seq) = entered(ReturnBranch::MaterialAbsent);
        assert!(!ctx.monitor.is_armed());

        assert_eq!(run(&mut ctx, &mut seq, 5000), Ok(Some(SystemState::Idle)));
        let feed: heapless::Vec<i32, 16> = ctx.io.feed_axis.moves.iter().copied().collect();
        // Home, regrip at 2.0in, home, travel, then homing
        assert_eq!(&feed[..4], &[0, 2000, 0, 3400]);
        // Unconfirmed cut home is tolerated on this path
        assert!(ctx.io.diag.contains("proceeding"));
    }

    #[test]
    fn test_absent_path_settle_delay() {
        let (mut ctx, mut seq) = entered(ReturnBranch::MaterialAbsent);
        ctx.io.cut_axis.complete();
        seq.poll(&mut ctx).unwrap();
        assert!(ctx.io.feed_clamp.is_active());
        assert_eq!(seq.step(), 3);

        ctx.io.feed_axis.complete();
        ctx.now_ms = 149;
        seq.poll(&mut ctx).unwrap();
        assert_eq!(seq.step(), 3);
        ctx.now_ms = 150;
        seq.poll(&mut ctx).unwrap();
        assert!(!ctx.io.feed_clamp.is_active());
        assert_eq!(seq.step(), 6);
    }

    #[test]
    fn test_continuous_fast_path_skips_idle() {
        let (mut ctx, mut seq) = entered(ReturnBranch::MaterialPresent);
        set_input(&mut ctx.io.cut_home, true, 0);
        set_input(&mut ctx.io.start_switch, true, 0);
        ctx.flags.start_safe = true;

        assert_eq!(
            run(&mut ctx, &mut seq, 2000),
            Ok(Some(SystemState::Cutting))
        );
        assert!(ctx.flags.cycle_in_progress);
        assert!(ctx.io.yellow.is_active());
        assert!(ctx.io.feed_clamp.is_active());
        assert_eq!(ctx.io.cut_axis.speed_hz, 700);
    }

    #[test]
    fn test_start_without_latch_lands_in_idle() {
        let (mut ctx, mut seq) = entered(ReturnBranch::MaterialPresent);
        set_input(&mut ctx.io.cut_home, true, 0);
        set_input(&mut ctx.io.start_switch, true, 0);
        ctx.flags.start_safe = false;

        assert_eq!(run(&mut ctx, &mut seq, 2000), Ok(Some(SystemState::Idle)));
        assert!(!ctx.flags.cycle_in_progress);
    }
}
