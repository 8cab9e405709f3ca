//! Checked home verification for the cut axis
//!
//! Decides whether the cut axis is really sitting on its home reference.
//! The switch is sampled a few times with a settle delay in between; if
//! every sample misses, the caller either gets a warning or, when allowed,
//! the axis creeps backward at homing speed until the switch is found or
//! the recovery times out.
//!
//! Everything here is polled once per tick. While a verification is in
//! progress the owning sequence does not advance, which preserves the
//! "nothing else proceeds" behaviour of a blocking check without ever
//! blocking the tick loop.

use core::fmt::Write;

use heapless::String;

use crate::config::{AxisConfig, RecoveryConfig};
use crate::scheduler::elapsed;
use crate::traits::{AxisError, DigitalInput, MotionAxis};

/// Maximum diagnostic message length
pub const MAX_DIAGNOSTIC_LEN: usize = 96;

/// Human-readable reason attached to a home check verdict
pub type Diagnostic = String<MAX_DIAGNOSTIC_LEN>;

/// Build a diagnostic, truncating silently if it does not fit
pub fn diagnostic(args: core::fmt::Arguments<'_>) -> Diagnostic {
    let mut msg = Diagnostic::new();
    let _ = msg.write_fmt(args);
    msg
}

/// Verdict of a home verification
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomeErrorResult {
    /// Switch confirmed, axis position redefined as zero
    Confirmed,
    /// Switch never seen; proceed without recalibrating
    WarningOnly(Diagnostic),
    /// Unrecoverable; the machine must halt
    TransitionToError(Diagnostic),
    /// Samples exhausted and slow recovery is permitted
    ///
    /// Only produced internally on the way into the recovery phase.
    AttemptSlowRecovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum VerifyPhase {
    /// Waiting out the settle delay before sample `attempt`
    Settling { attempt: u8, since_ms: u64 },
    /// Creeping backward, polling the switch
    SlowRecovery { started_ms: u64, last_poll_ms: u64 },
    /// Verdict already returned
    Done,
}

/// Non-blocking checked verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HomeVerifier {
    phase: VerifyPhase,
    allow_slow_recovery: bool,
    context: &'static str,
}

impl HomeVerifier {
    /// Start a verification at `now_ms`
    ///
    /// `context` names the call site in diagnostics.
    pub fn new(context: &'static str, allow_slow_recovery: bool, now_ms: u64) -> Self {
        Self {
            phase: VerifyPhase::Settling {
                attempt: 1,
                since_ms: now_ms,
            },
            allow_slow_recovery,
            context,
        }
    }

    /// Advance the verification
    ///
    /// Returns `Ok(None)` while still working. `home` must already have been
    /// refreshed this tick.
    pub fn poll<A: MotionAxis, I: DigitalInput>(
        &mut self,
        axis: &mut A,
        home: &I,
        recovery: &RecoveryConfig,
        cut: &AxisConfig,
        now_ms: u64,
    ) -> Result<Option<HomeErrorResult>, AxisError> {
        match self.phase {
            VerifyPhase::Settling { attempt, since_ms } => {
                if elapsed(now_ms, since_ms) < recovery.settle_ms as u64 {
                    return Ok(None);
                }

                if home.level() {
                    axis.set_position(0);
                    self.phase = VerifyPhase::Done;
                    return Ok(Some(HomeErrorResult::Confirmed));
                }

                if attempt < recovery.attempts {
                    self.phase = VerifyPhase::Settling {
                        attempt: attempt + 1,
                        since_ms: now_ms,
                    };
                    return Ok(None);
                }

                match self.exhausted() {
                    HomeErrorResult::AttemptSlowRecovery => {
                        self.begin_slow_recovery(axis, recovery, cut, now_ms)?;
                        Ok(None)
                    }
                    verdict => {
                        self.phase = VerifyPhase::Done;
                        Ok(Some(verdict))
                    }
                }
            }
            VerifyPhase::SlowRecovery {
                started_ms,
                last_poll_ms,
            } => {
                if elapsed(now_ms, last_poll_ms) >= recovery.slow_recovery_poll_ms as u64 {
                    self.phase = VerifyPhase::SlowRecovery {
                        started_ms,
                        last_poll_ms: now_ms,
                    };
                    if home.level() {
                        axis.force_stop_and_set_position(0);
                        self.phase = VerifyPhase::Done;
                        return Ok(Some(HomeErrorResult::Confirmed));
                    }
                }

                if elapsed(now_ms, started_ms) >= recovery.slow_recovery_timeout_ms as u64 {
                    let position = axis.current_position();
                    axis.force_stop_and_set_position(position);
                    self.phase = VerifyPhase::Done;
                    return Ok(Some(HomeErrorResult::TransitionToError(diagnostic(
                        format_args!(
                            "home recovery timeout after {}ms ({})",
                            recovery.slow_recovery_timeout_ms, self.context
                        ),
                    ))));
                }

                Ok(None)
            }
            VerifyPhase::Done => Ok(None),
        }
    }

    /// Verdict once every sample has missed
    fn exhausted(&self) -> HomeErrorResult {
        if self.allow_slow_recovery {
            HomeErrorResult::AttemptSlowRecovery
        } else {
            HomeErrorResult::WarningOnly(diagnostic(format_args!(
                "home switch not seen ({})",
                self.context
            )))
        }
    }

    fn begin_slow_recovery<A: MotionAxis>(
        &mut self,
        axis: &mut A,
        recovery: &RecoveryConfig,
        cut: &AxisConfig,
        now_ms: u64,
    ) -> Result<(), AxisError> {
        axis.set_speed(cut.profiles.homing.speed_hz);
        axis.set_acceleration(recovery.slow_recovery_accel);
        // Full stroke backward is more than enough to reach the switch
        let target = axis
            .current_position()
            .saturating_sub(cut.steps(cut.travel_mils));
        axis.move_to(target)?;
        self.phase = VerifyPhase::SlowRecovery {
            started_ms: now_ms,
            last_poll_ms: now_ms,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimAxis, SimInput};

    fn run(
        verifier: &mut HomeVerifier,
        axis: &mut SimAxis,
        home: &mut SimInput,
        from_ms: u64,
        to_ms: u64,
    ) -> Option<(u64, HomeErrorResult)> {
        let recovery = RecoveryConfig::default();
        let cut = AxisConfig::cut();
        let mut now = from_ms;
        while now <= to_ms {
            home.update(now);
            if let Some(result) = verifier.poll(axis, home, &recovery, &cut, now).unwrap() {
                return Some((now, result));
            }
            now += 1;
        }
        None
    }

    #[test]
    fn test_confirmed_on_first_sample() {
        let mut axis = SimAxis::at(7);
        let mut home = SimInput::new(true);
        let mut verifier = HomeVerifier::new("test", false, 0);

        let (at, result) = run(&mut verifier, &mut axis, &mut home, 0, 100).unwrap();
        assert_eq!(result, HomeErrorResult::Confirmed);
        assert_eq!(at, 30);
        assert_eq!(axis.current_position(), 0);
    }

    #[test]
    fn test_warning_after_three_misses() {
        let mut axis = SimAxis::at(7);
        let mut home = SimInput::new(false);
        let mut verifier = HomeVerifier::new("absent return", false, 0);

        let (at, result) = run(&mut verifier, &mut axis, &mut home, 0, 500).unwrap();
        assert_eq!(at, 90);
        assert!(matches!(result, HomeErrorResult::WarningOnly(_)));
        // No recalibration on a warning
        assert_eq!(axis.current_position(), 7);
    }

    #[test]
    fn test_second_sample_confirms() {
        let mut axis = SimAxis::at(3);
        let mut home = SimInput::new(false);
        let mut verifier = HomeVerifier::new("test", false, 0);

        assert!(run(&mut verifier, &mut axis, &mut home, 0, 40).is_none());
        assert!(matches!(verifier.phase, VerifyPhase::Settling { attempt: 2, .. }));
        home.set(true);
        let (_, result) = run(&mut verifier, &mut axis, &mut home, 41, 100).unwrap();
        assert!(matches!(result, HomeErrorResult::Confirmed));
    }

    #[test]
    fn test_slow_recovery_finds_home() {
        let mut axis = SimAxis::at(20);
        let mut home = SimInput::new(false);
        let mut verifier = HomeVerifier::new("maintenance", true, 0);

        assert!(run(&mut verifier, &mut axis, &mut home, 0, 1000).is_none());
        assert!(matches!(verifier.phase, VerifyPhase::SlowRecovery { .. }));
        assert!(axis.is_running());
        assert_eq!(axis.speed_hz, 1000);
        assert_eq!(axis.target, 20 - 4500);

        home.set(true);
        let (_, result) = run(&mut verifier, &mut axis, &mut home, 1001, 1100).unwrap();
        assert!(matches!(result, HomeErrorResult::Confirmed));
        assert!(!axis.is_running());
        assert_eq!(axis.current_position(), 0);
    }

    #[test]
    fn test_slow_recovery_timeout() {
        let mut axis = SimAxis::at(20);
        let mut home = SimInput::new(false);
        let mut verifier = HomeVerifier::new("maintenance", true, 0);

        let (at, result) = run(&mut verifier, &mut axis, &mut home, 0, 10_000).unwrap();
        // Three 30ms samples, then 5s of recovery
        assert_eq!(at, 90 + 5000);
        match result {
            HomeErrorResult::TransitionToError(msg) => {
                assert!(msg.as_str().contains("timeout"));
                assert!(msg.as_str().contains("maintenance"));
            }
            other => panic!("unexpected verdict {:?}", other),
        }
        assert!(!axis.is_running());
    }

    #[test]
    fn test_diagnostic_drops_overflowing_fragments() {
        let chunk = "0123456789012345678901234567890123456789";
        let msg = diagnostic(format_args!("{}{}{}", chunk, chunk, chunk));
        assert_eq!(msg.len(), 80);
        assert!(msg.len() <= MAX_DIAGNOSTIC_LEN);
    }
}
