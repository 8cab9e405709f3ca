//! Idle: waiting for a start command
//!
//! The reload switch opens both clamps so the operator can load stock.
//! While reloading no cycle can start and the manual feed is ignored.

use crate::cycle::FeedMode;
use crate::motion::{AxisId, ProfileKind};
use crate::state::{Context, StepResult, SystemState};
use crate::traits::{BinaryOutput, Board, DigitalInput};

pub fn enter<B: Board>(ctx: &mut Context<B>) {
    ctx.io.secure_clamp.extend();
    ctx.io.feed_clamp.retract();
    ctx.io.green.on();
}

pub fn exit<B: Board>(ctx: &mut Context<B>) {
    if ctx.flags.reload_mode {
        leave_reload(ctx);
    }
}

pub fn poll<B: Board>(ctx: &mut Context<B>) -> StepResult {
    let reload = ctx.io.reload_switch.level();
    if reload && !ctx.flags.reload_mode {
        ctx.flags.reload_mode = true;
        ctx.io.feed_clamp.retract();
        ctx.io.secure_clamp.retract();
        ctx.io.blue.on();
        info!(ctx.io.diag, "idle: reload mode");
    } else if !reload && ctx.flags.reload_mode {
        leave_reload(ctx);
    }

    if ctx.flags.reload_mode {
        return Ok(None);
    }

    if ctx.io.home_check_button.rose() {
        return Ok(Some(SystemState::HomeCheck));
    }

    if ctx.io.manual_feed_switch.rose() {
        let present = ctx.io.material_sensor.level();
        return Ok(Some(FeedMode::for_material(present).state()));
    }

    ctx.io.green.on();
    if !start_requested(ctx) {
        return Ok(None);
    }

    ctx.io.green.off();
    ctx.io.blue.off();
    ctx.io.yellow.on();
    ctx.flags.cycle_in_progress = true;
    ctx.configure(AxisId::Cut, ProfileKind::Normal);
    ctx.io.feed_clamp.extend();
    ctx.io.secure_clamp.extend();
    Ok(Some(SystemState::Cutting))
}

/// A fresh start press, or continuous mode between cycles
fn start_requested<B: Board>(ctx: &Context<B>) -> bool {
    let flags = &ctx.flags;
    (ctx.io.start_switch.rose() || (flags.continuous_mode && !flags.cycle_in_progress))
        && !flags.suction_fault
        && flags.start_safe
}

fn leave_reload<B: Board>(ctx: &mut Context<B>) {
    ctx.flags.reload_mode = false;
    ctx.io.secure_clamp.extend();
    ctx.io.feed_clamp.retract();
    ctx.io.blue.off();
    info!(ctx.io.diag, "idle: reload mode off");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimBoard, SimInput};

    fn press(input: &mut SimInput, now: u64) {
        input.set(true);
        input.update(now);
    }

    fn idle() -> Context<SimBoard> {
        let mut ctx = SimBoard::context();
        ctx.flags.start_safe = true;
        enter(&mut ctx);
        ctx
    }

    #[test]
    fn test_enter_sets_clamps() {
        let ctx = idle();
        assert!(ctx.io.secure_clamp.is_active());
        assert!(!ctx.io.feed_clamp.is_active());
        assert!(ctx.io.green.is_active());
    }

    #[test]
    fn test_start_press_begins_cycle() {
        let mut ctx = idle();
        assert_eq!(poll(&mut ctx), Ok(None));

        press(&mut ctx.io.start_switch, 1);
        assert_eq!(poll(&mut ctx), Ok(Some(SystemState::Cutting)));
        assert!(ctx.flags.cycle_in_progress);
        assert!(ctx.io.feed_clamp.is_active());
        assert!(ctx.io.yellow.is_active());
        assert_eq!(ctx.io.cut_axis.speed_hz, 700);
    }

    #[test]
    fn test_start_blocked_until_safe() {
        let mut ctx = idle();
        ctx.flags.start_safe = false;
        press(&mut ctx.io.start_switch, 1);
        assert_eq!(poll(&mut ctx), Ok(None));
    }

    #[test]
    fn test_start_blocked_by_suction_fault() {
        let mut ctx = idle();
        ctx.flags.suction_fault = true;
        press(&mut ctx.io.start_switch, 1);
        assert_eq!(poll(&mut ctx), Ok(None));
    }

    #[test]
    fn test_continuous_mode_starts_without_edge() {
        let mut ctx = idle();
        ctx.flags.continuous_mode = true;
        assert_eq!(poll(&mut ctx), Ok(Some(SystemState::Cutting)));
    }

    #[test]
    fn test_reload_mode_blocks_start() {
        let mut ctx = idle();
        press(&mut ctx.io.reload_switch, 1);
        press(&mut ctx.io.start_switch, 1);
        assert_eq!(poll(&mut ctx), Ok(None));
        assert!(ctx.flags.reload_mode);
        assert!(!ctx.io.secure_clamp.is_active());
        assert!(ctx.io.blue.is_active());

        ctx.io.reload_switch.set(false);
        ctx.io.reload_switch.update(2);
        ctx.io.start_switch.update(2);
        assert_eq!(poll(&mut ctx), Ok(None));
        assert!(!ctx.flags.reload_mode);
        assert!(ctx.io.secure_clamp.is_active());
        assert!(!ctx.io.blue.is_active());
    }

    #[test]
    fn test_exit_leaves_reload_mode() {
        let mut ctx = idle();
        press(&mut ctx.io.reload_switch, 1);
        poll(&mut ctx).unwrap();
        exit(&mut ctx);
        assert!(!ctx.flags.reload_mode);
        assert!(ctx.io.secure_clamp.is_active());
    }

    #[test]
    fn test_manual_feed_follows_material() {
        let mut ctx = idle();
        press(&mut ctx.io.manual_feed_switch, 1);
        assert_eq!(poll(&mut ctx), Ok(Some(SystemState::FeedFirstCut)));

        let mut ctx = idle();
        press(&mut ctx.io.material_sensor, 1);
        press(&mut ctx.io.manual_feed_switch, 1);
        assert_eq!(poll(&mut ctx), Ok(Some(SystemState::FeedForwardOne)));
    }

    #[test]
    fn test_manual_feed_ignored_while_reloading() {
        let mut ctx = idle();
        press(&mut ctx.io.reload_switch, 1);
        press(&mut ctx.io.manual_feed_switch, 1);
        assert_eq!(poll(&mut ctx), Ok(None));
    }

    #[test]
    fn test_home_check_button() {
        let mut ctx = idle();
        press(&mut ctx.io.home_check_button, 1);
        assert_eq!(poll(&mut ctx), Ok(Some(SystemState::HomeCheck)));
    }
}
