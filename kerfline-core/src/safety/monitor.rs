//! Cut axis return monitor
//!
//! Watches the cut axis home switch while the axis returns with material
//! still in the machine. A switch hit while moving is handled in one of two
//! ways depending on the configured interlock:
//!
//! - `InstantStop`: halt and zero in the same tick
//! - `Decelerate`: stop short with a high deceleration, wait for the switch
//!   to settle, then confirm or reject the hit
//!
//! The monitor owns the return flag. Clearing the flag always resets the
//! monitor to `Monitoring`.

use crate::config::{AxisConfig, RecoveryConfig};
use crate::motion::MotionProfile;
use crate::scheduler::elapsed;
use crate::traits::{AxisError, DigitalInput, MotionAxis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How the return interlock reacts to the home switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InterlockMode {
    /// Force-stop and zero the moment the switch reads active
    InstantStop,
    /// Decelerate onto the switch and verify before zeroing
    Decelerate,
}

/// Monitor phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MonitorPhase {
    /// Watching for the switch while the axis moves
    Monitoring,
    /// Stopping short after a switch hit
    Decelerating,
    /// Axis stopped, waiting for the switch to stabilise
    WaitingForDelay { since_ms: u64 },
    /// Re-reading the switch
    VerifyingSensor,
}

/// Something the monitor did this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MonitorEvent {
    /// Switch hit while moving; decelerating from `from` toward `to` (steps)
    Triggered { from: i32, to: i32 },
    /// Home confirmed, position zeroed, return flag cleared
    HomeConfirmed,
    /// Switch released during verification; return resumed
    FalseTrigger,
}

/// Real-time monitor for the cut axis return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReturnMonitor {
    phase: MonitorPhase,
    armed: bool,
    /// Where the return was headed, for resuming after a false trigger
    resume_target: i32,
    resume_profile: MotionProfile,
}

impl Default for ReturnMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ReturnMonitor {
    pub const fn new() -> Self {
        Self {
            phase: MonitorPhase::Monitoring,
            armed: false,
            resume_target: 0,
            resume_profile: MotionProfile::new(0, 0),
        }
    }

    /// Set the return flag for a return toward `target` (steps)
    pub fn arm(&mut self, target: i32, profile: MotionProfile) {
        self.armed = true;
        self.phase = MonitorPhase::Monitoring;
        self.resume_target = target;
        self.resume_profile = profile;
    }

    /// Clear the return flag
    pub fn disarm(&mut self) {
        self.armed = false;
        self.phase = MonitorPhase::Monitoring;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// True while a hit is being handled
    pub fn is_busy(&self) -> bool {
        self.armed && self.phase != MonitorPhase::Monitoring
    }

    /// Run one tick of the monitor
    ///
    /// `home` must already have been refreshed this tick.
    pub fn poll<A: MotionAxis, I: DigitalInput>(
        &mut self,
        axis: &mut A,
        home: &I,
        recovery: &RecoveryConfig,
        cut: &AxisConfig,
        now_ms: u64,
    ) -> Result<Option<MonitorEvent>, AxisError> {
        if !self.armed {
            self.phase = MonitorPhase::Monitoring;
            return Ok(None);
        }

        match recovery.interlock {
            InterlockMode::InstantStop => {
                if axis.is_running() && home.level() {
                    axis.force_stop_and_set_position(0);
                    self.disarm();
                    return Ok(Some(MonitorEvent::HomeConfirmed));
                }
                Ok(None)
            }
            InterlockMode::Decelerate => self.poll_decelerate(axis, home, recovery, cut, now_ms),
        }
    }

    fn poll_decelerate<A: MotionAxis, I: DigitalInput>(
        &mut self,
        axis: &mut A,
        home: &I,
        recovery: &RecoveryConfig,
        cut: &AxisConfig,
        now_ms: u64,
    ) -> Result<Option<MonitorEvent>, AxisError> {
        match self.phase {
            MonitorPhase::Monitoring => {
                // Level, not edge: a switch made before arming still stops the axis
                if axis.is_running() && home.level() {
                    let from = axis.current_position();
                    let to = from - cut.steps(recovery.decel_distance_mils);
                    axis.set_acceleration(recovery.decel_accel);
                    axis.move_to(to)?;
                    self.phase = MonitorPhase::Decelerating;
                    return Ok(Some(MonitorEvent::Triggered { from, to }));
                }
                Ok(None)
            }
            MonitorPhase::Decelerating => {
                if !axis.is_running() {
                    self.phase = MonitorPhase::WaitingForDelay { since_ms: now_ms };
                }
                Ok(None)
            }
            MonitorPhase::WaitingForDelay { since_ms } => {
                if elapsed(now_ms, since_ms) < recovery.verify_delay_ms as u64 {
                    return Ok(None);
                }
                self.phase = MonitorPhase::VerifyingSensor;
                self.verify(axis, home)
            }
            MonitorPhase::VerifyingSensor => self.verify(axis, home),
        }
    }

    fn verify<A: MotionAxis, I: DigitalInput>(
        &mut self,
        axis: &mut A,
        home: &I,
    ) -> Result<Option<MonitorEvent>, AxisError> {
        if home.level() {
            axis.force_stop_and_set_position(0);
            self.disarm();
            Ok(Some(MonitorEvent::HomeConfirmed))
        } else {
            // Flag stays set; carry on toward the original target
            self.phase = MonitorPhase::Monitoring;
            axis.apply(self.resume_profile);
            axis.move_to(self.resume_target)?;
            Ok(Some(MonitorEvent::FalseTrigger))
        }
    }
}
