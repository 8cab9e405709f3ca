//! Fault handling states
//!
//! `Error` halts all motion until the operator acknowledges on the reload
//! switch, `ErrorReset` clears fault state and re-runs startup, and
//! `SuctionHold` parks the cut axis after a suction failure until the start
//! switch re-arms the machine.

use crate::motion::{AxisId, ProfileKind, MILS_PER_INCH};
use crate::scheduler::{elapsed, Blinker};
use crate::state::{Context, Fault, StepResult, SystemState};
use crate::traits::{BinaryOutput, Board, DigitalInput, MotionAxis};

/// All motion halted, waiting for acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorHold {
    blinker: Blinker,
}

impl ErrorHold {
    pub fn new(now_ms: u64) -> Self {
        Self {
            blinker: Blinker::new(0, now_ms),
        }
    }

    pub fn enter<B: Board>(&mut self, ctx: &mut Context<B>) {
        self.blinker = Blinker::new(ctx.config.timing.error_blink_ms, ctx.now_ms);
        ctx.monitor.disarm();
        let cut = ctx.io.cut_axis.current_position();
        ctx.io.cut_axis.force_stop_and_set_position(cut);
        let feed = ctx.io.feed_axis.current_position();
        ctx.io.feed_axis.force_stop_and_set_position(feed);

        ctx.io.feed_clamp.extend();
        ctx.io.secure_clamp.extend();
        ctx.io.lamps_off();
        ctx.io.red.on();
        ctx.flags.cycle_in_progress = false;
        ctx.flags.error_acknowledged = false;

        match ctx.last_fault {
            Some(fault) => error!(ctx.io.diag, "error: {:?}, waiting for reload to acknowledge", fault),
            None => error!(ctx.io.diag, "error: waiting for reload to acknowledge"),
        }
    }

    pub fn poll<B: Board>(&mut self, ctx: &mut Context<B>) -> StepResult {
        if self.blinker.due(ctx.now_ms) {
            ctx.io.red.toggle();
            let red = ctx.io.red.is_active();
            ctx.io.yellow.set(!red);
        }

        ctx.stop_all();

        if ctx.flags.error_acknowledged {
            return Ok(Some(SystemState::ErrorReset));
        }
        Ok(None)
    }
}

/// Clear fault state and start over
pub fn reset<B: Board>(ctx: &mut Context<B>) -> SystemState {
    ctx.io.lamps_off();
    ctx.flags.error_acknowledged = false;
    ctx.flags.suction_fault = false;
    info!(ctx.io.diag, "error reset");
    SystemState::Startup
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HoldPhase {
    /// Bringing the cut axis onto its switch
    Homing { since_ms: u64 },
    /// Blinking, waiting for the start switch
    Waiting,
}

/// Suction failure hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SuctionHold {
    phase: HoldPhase,
    blinker: Blinker,
}

impl SuctionHold {
    pub fn new(now_ms: u64) -> Self {
        Self {
            phase: HoldPhase::Homing { since_ms: now_ms },
            blinker: Blinker::new(0, now_ms),
        }
    }

    pub fn enter<B: Board>(&mut self, ctx: &mut Context<B>) -> Result<(), Fault> {
        self.blinker = Blinker::new(ctx.config.timing.suction_blink_ms, ctx.now_ms);
        self.phase = HoldPhase::Homing {
            since_ms: ctx.now_ms,
        };
        ctx.io.lamps_off();
        ctx.io.red.on();
        ctx.configure(AxisId::Cut, ProfileKind::Homing);
        let overshoot = ctx.config.cut_axis.travel_mils + MILS_PER_INCH;
        ctx.move_to(AxisId::Cut, -overshoot)?;
        warn!(ctx.io.diag, "suction hold: homing cut axis");
        Ok(())
    }

    pub fn poll<B: Board>(&mut self, ctx: &mut Context<B>) -> StepResult {
        match self.phase {
            HoldPhase::Homing { since_ms } => {
                if ctx.io.cut_home.level() {
                    ctx.io.cut_axis.force_stop_and_set_position(0);
                    ctx.configure(AxisId::Cut, ProfileKind::Normal);
                    self.phase = HoldPhase::Waiting;
                    warn!(ctx.io.diag, "suction hold: press start to re-arm");
                    return Ok(None);
                }
                if elapsed(ctx.now_ms, since_ms) >= ctx.config.timing.suction_homing_timeout_ms as u64
                {
                    let position = ctx.io.cut_axis.current_position();
                    ctx.io.cut_axis.force_stop_and_set_position(position);
                    error!(ctx.io.diag, "suction hold: cut switch not found");
                    return Err(Fault::HomingTimeout(AxisId::Cut));
                }
                Ok(None)
            }
            HoldPhase::Waiting => {
                if self.blinker.due(ctx.now_ms) {
                    ctx.io.red.toggle();
                }
                ctx.io.yellow.off();
                ctx.io.green.off();
                ctx.io.blue.off();

                if !ctx.io.start_switch.rose() {
                    return Ok(None);
                }
                ctx.io.red.off();
                ctx.flags.continuous_mode = false;
                ctx.flags.start_safe = false;
                ctx.flags.suction_fault = false;
                info!(ctx.io.diag, "suction hold: re-armed");
                Ok(Some(SystemState::Homing))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBoard;

    #[test]
    fn test_error_halts_motion() {
        let mut ctx = SimBoard::context();
        ctx.io.cut_axis.move_to(2000).unwrap();
        ctx.io.feed_axis.move_to(1000).unwrap();
        ctx.monitor.arm(-10, ctx.config.cut_axis.profiles.returning);

        let mut hold = ErrorHold::new(0);
        hold.enter(&mut ctx);
        assert!(!ctx.io.cut_axis.is_running());
        assert!(!ctx.io.feed_axis.is_running());
        assert!(!ctx.monitor.is_armed());
        assert!(ctx.io.secure_clamp.is_active());
        assert!(ctx.io.red.is_active());
    }

    #[test]
    fn test_error_blinks_until_acknowledged() {
        let mut ctx = SimBoard::context();
        let mut hold = ErrorHold::new(0);
        hold.enter(&mut ctx);

        ctx.now_ms = 250;
        assert_eq!(hold.poll(&mut ctx), Ok(None));
        assert!(!ctx.io.red.is_active());
        assert!(ctx.io.yellow.is_active());

        ctx.now_ms = 500;
        hold.poll(&mut ctx).unwrap();
        assert!(ctx.io.red.is_active());
        assert!(!ctx.io.yellow.is_active());

        // Axes are told to stop on every tick
        assert!(ctx.io.cut_axis.stops >= 2);

        ctx.flags.error_acknowledged = true;
        assert_eq!(hold.poll(&mut ctx), Ok(Some(SystemState::ErrorReset)));
    }

    #[test]
    fn test_reset_clears_flags() {
        let mut ctx = SimBoard::context();
        ctx.flags.error_acknowledged = true;
        ctx.flags.suction_fault = true;
        ctx.io.red.on();
        assert_eq!(reset(&mut ctx), SystemState::Startup);
        assert!(!ctx.flags.error_acknowledged);
        assert!(!ctx.flags.suction_fault);
        assert!(!ctx.io.red.is_active());
    }

    #[test]
    fn test_suction_hold_rearm() {
        let mut ctx = SimBoard::context();
        ctx.flags.continuous_mode = true;
        ctx.flags.start_safe = true;
        ctx.flags.suction_fault = true;
        let mut hold = SuctionHold::new(0);
        hold.enter(&mut ctx).unwrap();
        assert_eq!(ctx.io.cut_axis.speed_hz, 1000);

        ctx.io.cut_home.set(true);
        ctx.io.cut_home.update(1);
        ctx.now_ms = 1;
        hold.poll(&mut ctx).unwrap();
        assert_eq!(hold.phase, HoldPhase::Waiting);
        assert_eq!(ctx.io.cut_axis.current_position(), 0);

        ctx.now_ms = 1501;
        assert_eq!(hold.poll(&mut ctx), Ok(None));
        assert!(!ctx.io.red.is_active());

        ctx.io.start_switch.set(true);
        ctx.io.start_switch.update(1600);
        ctx.now_ms = 1600;
        assert_eq!(hold.poll(&mut ctx), Ok(Some(SystemState::Homing)));
        assert!(!ctx.flags.continuous_mode);
        assert!(!ctx.flags.start_safe);
        assert!(!ctx.flags.suction_fault);
    }

    #[test]
    fn test_suction_hold_homing_timeout() {
        let mut ctx = SimBoard::context();
        let mut hold = SuctionHold::new(0);
        hold.enter(&mut ctx).unwrap();

        ctx.now_ms = 9999;
        assert_eq!(hold.poll(&mut ctx), Ok(None));
        ctx.now_ms = 10_000;
        assert_eq!(hold.poll(&mut ctx), Err(Fault::HomingTimeout(AxisId::Cut)));
    }
}
