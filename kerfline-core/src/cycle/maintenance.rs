//! Manual home re-verification
//!
//! Lets an operator confirm the cut axis reference without running a cut.
//! Slow recovery is allowed here, so a drifted axis creeps back onto its
//! switch instead of faulting straight away.

use crate::motion::AxisId;
use crate::safety::{HomeCheck, HomeCheckOutcome, HomeCheckPolicy};
use crate::scheduler::elapsed;
use crate::state::{Context, Fault, StepResult, SystemState};
use crate::traits::{BinaryOutput, Board};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Phase {
    /// Clamps closing
    Clamping { since_ms: u64 },
    Checking(HomeCheck),
}

/// Home check requested from the maintenance button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HomeCheckMaintenance {
    phase: Phase,
}

impl HomeCheckMaintenance {
    pub fn new(now_ms: u64) -> Self {
        Self {
            phase: Phase::Clamping { since_ms: now_ms },
        }
    }

    pub fn enter<B: Board>(&mut self, ctx: &mut Context<B>) {
        self.phase = Phase::Clamping {
            since_ms: ctx.now_ms,
        };
        ctx.io.feed_clamp.extend();
        ctx.io.rotation_clamp.extend();
        info!(ctx.io.diag, "home check: clamping");
    }

    pub fn exit<B: Board>(&mut self, ctx: &mut Context<B>) {
        ctx.io.rotation_clamp.retract();
    }

    pub fn poll<B: Board>(&mut self, ctx: &mut Context<B>) -> StepResult {
        match &mut self.phase {
            Phase::Clamping { since_ms } => {
                if elapsed(ctx.now_ms, *since_ms) >= ctx.config.timing.home_check_delay_ms as u64 {
                    self.phase = Phase::Checking(HomeCheck::new(
                        HomeCheckPolicy::SlowRecovery,
                        "maintenance",
                        ctx.now_ms,
                    ));
                }
                Ok(None)
            }
            Phase::Checking(check) => {
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
                        info!(ctx.io.diag, "home check: confirmed");
                        Ok(Some(SystemState::Idle))
                    }
                    Some(HomeCheckOutcome::Proceed(msg)) => {
                        warn!(ctx.io.diag, "home check: {}", msg.as_str());
                        Ok(Some(SystemState::Idle))
                    }
                    Some(HomeCheckOutcome::Fault(msg)) => {
                        error!(ctx.io.diag, "home check: {}", msg.as_str());
                        Err(Fault::HomeRecoveryTimeout)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBoard;
    use crate::traits::{DigitalInput, MotionAxis};

    #[test]
    fn test_check_waits_for_clamps() {
        let mut ctx = SimBoard::context();
        let mut check = HomeCheckMaintenance::new(0);
        check.enter(&mut ctx);
        assert!(ctx.io.rotation_clamp.is_active());
        assert!(ctx.io.feed_clamp.is_active());

        ctx.now_ms = 99;
        check.poll(&mut ctx).unwrap();
        assert!(matches!(check.phase, Phase::Clamping { .. }));
        ctx.now_ms = 100;
        check.poll(&mut ctx).unwrap();
        assert!(matches!(check.phase, Phase::Checking(_)));
    }

    #[test]
    fn test_confirmed_returns_to_idle() {
        let mut ctx = SimBoard::context();
        ctx.io.cut_axis.position = 12;
        ctx.io.cut_home.set(true);
        ctx.io.cut_home.update(0);
        let mut check = HomeCheckMaintenance::new(0);
        check.enter(&mut ctx);

        let mut result = None;
        while result.is_none() && ctx.now_ms < 1000 {
            ctx.now_ms += 1;
            result = check.poll(&mut ctx).unwrap();
        }
        assert_eq!(result, Some(SystemState::Idle));
        assert_eq!(ctx.now_ms, 130);
        assert_eq!(ctx.io.cut_axis.current_position(), 0);

        check.exit(&mut ctx);
        assert!(!ctx.io.rotation_clamp.is_active());
    }

    #[test]
    fn test_slow_recovery_finds_drifted_home() {
        let mut ctx = SimBoard::context();
        ctx.io.cut_axis.position = 40;
        let mut check = HomeCheckMaintenance::new(0);
        check.enter(&mut ctx);

        let mut result = None;
        while result.is_none() && ctx.now_ms < 1000 {
            ctx.now_ms += 1;
            if ctx.now_ms == 500 {
                ctx.io.cut_home.set(true);
                ctx.io.cut_home.update(ctx.now_ms);
            }
            result = check.poll(&mut ctx).unwrap();
        }
        assert_eq!(result, Some(SystemState::Idle));
        assert!(!ctx.io.cut_axis.is_running());
        assert!(ctx.io.cut_home.level());
    }

    #[test]
    fn test_recovery_timeout_faults() {
        let mut ctx = SimBoard::context();
        let mut check = HomeCheckMaintenance::new(0);
        check.enter(&mut ctx);

        let mut result = Ok(None);
        while result == Ok(None) && ctx.now_ms < 10_000 {
            ctx.now_ms += 1;
            result = check.poll(&mut ctx);
        }
        assert_eq!(result, Err(Fault::HomeRecoveryTimeout));
        // 100ms clamp delay, three samples, then 5s of recovery
        assert_eq!(ctx.now_ms, 100 + 90 + 5000);
    }
}
