//! Deferred actuator actions
//!
//! Actuators that are fired during a cut and released later on their own:
//! the hold-down arm, the rotation clamp and the completion signal. They
//! are serviced once per tick regardless of the active state.

use crate::config::{ActuatorConfig, TimingConfig};
use crate::traits::{BinaryOutput, Board, DigitalInput, Io, RotaryActuator};

use super::timer::DeferredTimer;

/// Timers for actuators released after a delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeferredActions {
    rotary_return: DeferredTimer,
    clamp_retract: DeferredTimer,
    signal_pulse: DeferredTimer,
}

/// Which deferred action completed during `service`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Serviced {
    pub rotary_returned: bool,
    pub clamp_retracted: bool,
    pub signal_ended: bool,
}

impl DeferredActions {
    pub const fn new() -> Self {
        Self {
            rotary_return: DeferredTimer::new(),
            clamp_retract: DeferredTimer::new(),
            signal_pulse: DeferredTimer::new(),
        }
    }

    /// Swing the hold-down arm to its active angle and start its hold time
    pub fn engage_rotary<B: Board>(&mut self, io: &mut Io<B>, cfg: &ActuatorConfig, now_ms: u64) {
        io.rotary.set_angle(cfg.rotary_active_deg);
        self.rotary_return.arm(now_ms, cfg.rotary_hold_ms);
    }

    /// Extend the rotation clamp and schedule its retraction
    pub fn fire_rotation_clamp<B: Board>(
        &mut self,
        io: &mut Io<B>,
        cfg: &ActuatorConfig,
        now_ms: u64,
    ) {
        io.rotation_clamp.extend();
        self.clamp_retract.arm(now_ms, cfg.rotation_clamp_hold_ms);
    }

    /// Raise the completion signal for one pulse width
    pub fn pulse_signal<B: Board>(&mut self, io: &mut Io<B>, timing: &TimingConfig, now_ms: u64) {
        io.completion_signal.on();
        self.signal_pulse.arm(now_ms, timing.signal_pulse_ms);
    }

    /// Release every actuator whose delay has passed
    ///
    /// The arm only swings back once the suction sensor confirms the
    /// workpiece is held; until then it stays engaged past its hold time.
    pub fn service<B: Board>(
        &mut self,
        io: &mut Io<B>,
        cfg: &ActuatorConfig,
        now_ms: u64,
    ) -> Serviced {
        let mut done = Serviced::default();

        if self.rotary_return.is_elapsed(now_ms) && io.suction_sensor.level() {
            io.rotary.set_angle(cfg.rotary_home_deg);
            self.rotary_return.cancel();
            done.rotary_returned = true;
        }

        if self.clamp_retract.fire(now_ms) {
            io.rotation_clamp.retract();
            done.clamp_retracted = true;
        }

        if self.signal_pulse.fire(now_ms) {
            io.completion_signal.off();
            done.signal_ended = true;
        }

        done
    }
}
