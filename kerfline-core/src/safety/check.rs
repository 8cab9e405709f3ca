//! Home check policies
//!
//! Wraps a `HomeVerifier` with what the call site wants done when the
//! switch cannot be confirmed.

use crate::config::{AxisConfig, RecoveryConfig};
use crate::traits::{AxisError, DigitalInput, MotionAxis};

use super::home::{Diagnostic, HomeErrorResult, HomeVerifier};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Reaction to an unconfirmed cut axis home
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HomeCheckPolicy {
    /// Step toward home in small increments, re-checking after each, and
    /// fault once the excursion budget is spent
    NudgeThenFault,
    /// Log the miss and carry on without recalibrating
    WarnAndProceed,
    /// Creep back at homing speed until found or timed out
    SlowRecovery,
}

/// Final outcome of a home check
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomeCheckOutcome {
    /// Home confirmed and position zeroed
    Confirmed,
    /// Not confirmed, tolerated by policy
    Proceed(Diagnostic),
    /// Not confirmed and not recoverable
    Fault(Diagnostic),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum CheckPhase {
    Verifying(HomeVerifier),
    /// Waiting for an incremental move toward home to finish
    Nudging,
}

/// A home check in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HomeCheck {
    policy: HomeCheckPolicy,
    context: &'static str,
    phase: CheckPhase,
    nudged_mils: i32,
    nudges: u8,
}

impl HomeCheck {
    pub fn new(policy: HomeCheckPolicy, context: &'static str, now_ms: u64) -> Self {
        let allow_slow = policy == HomeCheckPolicy::SlowRecovery;
        Self {
            policy,
            context,
            phase: CheckPhase::Verifying(HomeVerifier::new(context, allow_slow, now_ms)),
            nudged_mils: 0,
            nudges: 0,
        }
    }

    /// Number of incremental moves issued so far
    pub fn nudges(&self) -> u8 {
        self.nudges
    }

    /// Advance the check; `Ok(None)` while still working
    pub fn poll<A: MotionAxis, I: DigitalInput>(
        &mut self,
        axis: &mut A,
        home: &I,
        recovery: &RecoveryConfig,
        cut: &AxisConfig,
        now_ms: u64,
    ) -> Result<Option<HomeCheckOutcome>, AxisError> {
        match &mut self.phase {
            CheckPhase::Nudging => {
                if !axis.is_running() {
                    self.phase =
                        CheckPhase::Verifying(HomeVerifier::new(self.context, false, now_ms));
                }
                Ok(None)
            }
            CheckPhase::Verifying(verifier) => {
                let verdict = match verifier.poll(axis, home, recovery, cut, now_ms)? {
                    Some(verdict) => verdict,
                    None => return Ok(None),
                };

                match verdict {
                    HomeErrorResult::Confirmed => Ok(Some(HomeCheckOutcome::Confirmed)),
                    HomeErrorResult::TransitionToError(msg) => {
                        Ok(Some(HomeCheckOutcome::Fault(msg)))
                    }
                    HomeErrorResult::WarningOnly(msg) => self.on_miss(axis, recovery, cut, msg),
                    // Handled inside the verifier
                    HomeErrorResult::AttemptSlowRecovery => Ok(None),
                }
            }
        }
    }

    fn on_miss<A: MotionAxis>(
        &mut self,
        axis: &mut A,
        recovery: &RecoveryConfig,
        cut: &AxisConfig,
        msg: Diagnostic,
    ) -> Result<Option<HomeCheckOutcome>, AxisError> {
        match self.policy {
            HomeCheckPolicy::WarnAndProceed => Ok(Some(HomeCheckOutcome::Proceed(msg))),
            HomeCheckPolicy::NudgeThenFault => {
                let next = self.nudged_mils + recovery.nudge_mils;
                if next > recovery.max_nudge_mils {
                    return Ok(Some(HomeCheckOutcome::Fault(super::home::diagnostic(
                        format_args!(
                            "home not found after {} nudges ({})",
                            self.nudges, self.context
                        ),
                    ))));
                }
                let target = axis.current_position() - cut.steps(recovery.nudge_mils);
                axis.move_to(target)?;
                self.nudged_mils = next;
                self.nudges += 1;
                self.phase = CheckPhase::Nudging;
                Ok(None)
            }
            HomeCheckPolicy::SlowRecovery => Ok(Some(HomeCheckOutcome::Fault(msg))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimAxis, SimInput};

    struct Rig {
        axis: SimAxis,
        home: SimInput,
        recovery: RecoveryConfig,
        cut: AxisConfig,
        now: u64,
    }

    impl Rig {
        fn new(home: bool) -> Self {
            Self {
                axis: SimAxis::at(0),
                home: SimInput::new(home),
                recovery: RecoveryConfig::default(),
                cut: AxisConfig::cut(),
                now: 0,
            }
        }

        /// Tick until an outcome, completing moves as they are issued
        fn run(&mut self, check: &mut HomeCheck, max_ms: u64) -> Option<HomeCheckOutcome> {
            while self.now <= max_ms {
                self.axis.complete();
                self.home.update(self.now);
                if let Some(outcome) = check
                    .poll(&mut self.axis, &self.home, &self.recovery, &self.cut, self.now)
                    .unwrap()
                {
                    return Some(outcome);
                }
                self.now += 1;
            }
            None
        }
    }

    #[test]
    fn test_confirmed_without_nudging() {
        let mut rig = Rig::new(true);
        let mut check = HomeCheck::new(HomeCheckPolicy::NudgeThenFault, "test", 0);
        assert_eq!(rig.run(&mut check, 1000), Some(HomeCheckOutcome::Confirmed));
        assert_eq!(check.nudges(), 0);
    }

    #[test]
    fn test_nudge_budget_is_exactly_four() {
        let mut rig = Rig::new(false);
        let mut check = HomeCheck::new(HomeCheckPolicy::NudgeThenFault, "present return", 0);

        let outcome = rig.run(&mut check, 10_000).unwrap();
        assert!(matches!(outcome, HomeCheckOutcome::Fault(_)));
        assert_eq!(check.nudges(), 4);
        assert_eq!(check.nudged_mils, 400);
        // 4 x 0.1in at 500 steps/in
        assert_eq!(rig.axis.current_position(), -200);
        assert_eq!(rig.axis.moves.len(), 4);
    }

    #[test]
    fn test_nudge_then_found() {
        let mut rig = Rig::new(false);
        let mut check = HomeCheck::new(HomeCheckPolicy::NudgeThenFault, "present return", 0);

        // First verification misses and issues one nudge
        assert!(rig.run(&mut check, 95).is_none());
        assert_eq!(check.nudges(), 1);

        rig.home.set(true);
        assert_eq!(rig.run(&mut check, 1000), Some(HomeCheckOutcome::Confirmed));
        assert_eq!(check.nudges(), 1);
        assert_eq!(rig.axis.current_position(), 0);
    }

    #[test]
    fn test_warn_and_proceed() {
        let mut rig = Rig::new(false);
        let mut check = HomeCheck::new(HomeCheckPolicy::WarnAndProceed, "absent return", 0);
        let outcome = rig.run(&mut check, 1000).unwrap();
        assert!(matches!(outcome, HomeCheckOutcome::Proceed(_)));
        assert!(rig.axis.moves.is_empty());
    }

    #[test]
    fn test_slow_recovery_policy_times_out_to_fault() {
        let mut rig = Rig::new(false);
        let mut check = HomeCheck::new(HomeCheckPolicy::SlowRecovery, "maintenance", 0);
        // Hold the axis in motion so recovery keeps polling
        rig.axis.hold_motion = true;
        let outcome = rig.run(&mut check, 10_000).unwrap();
        assert!(matches!(outcome, HomeCheckOutcome::Fault(_)));
        assert_eq!(rig.now, 5090);
    }
}
