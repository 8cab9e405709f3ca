//! Top-level controller
//!
//! Owns the active state and the shared context. `tick()` is the single
//! entry point and runs, in order:
//!
//! 1. input refresh
//! 2. the cut axis return interlock
//! 3. deferred actuator timers
//! 4. start switch latches and error acknowledgement
//! 5. the active state's step
//!
//! Transitions only happen through `change_state`.

use crate::config::MachineConfig;
use crate::cycle::ErrorHold;
use crate::safety::MonitorEvent;
use crate::state::{Context, CycleCursor, Fault, State, SystemState};
use crate::traits::{Board, Clock, DigitalInput, Io};

/// The cutting cycle controller
pub struct Controller<B: Board> {
    state: State,
    previous: SystemState,
    ctx: Context<B>,
}

impl<B: Board> Controller<B> {
    /// Create a controller in `Startup`; the first tick begins homing
    pub fn new(io: Io<B>, config: MachineConfig) -> Self {
        let mut ctx = Context::new(io, config);
        ctx.now_ms = ctx.io.clock.now_ms();
        Self {
            state: State::Startup,
            previous: SystemState::Startup,
            ctx,
        }
    }

    /// Run one control cycle
    pub fn tick(&mut self) {
        let now = self.ctx.io.clock.now_ms();
        self.ctx.now_ms = now;
        self.ctx.io.update_inputs(now);

        self.service_interlock();

        self.service_deferred();

        self.update_latches();

        match self.state.step(&mut self.ctx) {
            Ok(Some(next)) => self.change_state(next),
            Ok(None) => {}
            Err(fault) => self.fault(fault),
        }
    }

    /// Switch to `next`, running exit and entry actions
    ///
    /// Requesting the current state does nothing.
    pub fn change_state(&mut self, next: SystemState) {
        let current = self.state.kind();
        if next == current {
            return;
        }

        self.state.exit(&mut self.ctx);
        self.previous = current;
        info!(self.ctx.io.diag, "state: {} -> {}", current.name(), next.name());

        match State::enter(next, &mut self.ctx) {
            Ok(state) => self.state = state,
            Err(fault) => {
                self.ctx.last_fault = Some(fault);
                error!(self.ctx.io.diag, "entering {} failed: {:?}", next.name(), fault);
                self.enter_error();
            }
        }
    }

    fn fault(&mut self, fault: Fault) {
        self.ctx.last_fault = Some(fault);
        error!(self.ctx.io.diag, "fault in {}: {:?}", self.state.kind().name(), fault);
        if self.state.kind() == SystemState::Error {
            return;
        }
        self.change_state(SystemState::Error);
    }

    fn enter_error(&mut self) {
        let mut hold = ErrorHold::new(self.ctx.now_ms);
        hold.enter(&mut self.ctx);
        self.state = State::Error(hold);
    }

    fn service_interlock(&mut self) {
        let ctx = &mut self.ctx;
        let event = ctx.monitor.poll(
            &mut ctx.io.cut_axis,
            &ctx.io.cut_home,
            &ctx.config.recovery,
            &ctx.config.cut_axis,
            ctx.now_ms,
        );

        match event {
            Ok(None) => {}
            Ok(Some(MonitorEvent::Triggered { from, to })) => {
                debug!(ctx.io.diag, "interlock: home hit at {}, stopping at {}", from, to);
            }
            Ok(Some(MonitorEvent::HomeConfirmed)) => {
                info!(ctx.io.diag, "interlock: cut home confirmed during return");
            }
            Ok(Some(MonitorEvent::FalseTrigger)) => {
                warn!(ctx.io.diag, "interlock: false home trigger, return resumed");
            }
            Err(e) => self.fault(Fault::Axis(crate::motion::AxisId::Cut, e)),
        }
    }

    fn service_deferred(&mut self) {
        let ctx = &mut self.ctx;
        let actuators = ctx.config.actuators;
        let done = ctx.deferred.service(&mut ctx.io, &actuators, ctx.now_ms);
        if done.rotary_returned {
            debug!(ctx.io.diag, "deferred: hold-down arm parked");
        }
        if done.clamp_retracted {
            debug!(ctx.io.diag, "deferred: rotation clamp retracted");
        }
        if done.signal_ended {
            debug!(ctx.io.diag, "deferred: completion signal ended");
        }
    }

    fn update_latches(&mut self) {
        let io = &self.ctx.io;
        let flags = &mut self.ctx.flags;

        if !flags.start_safe && io.start_switch.fell() {
            flags.start_safe = true;
        }

        if self.state.kind() == SystemState::Error && io.reload_switch.rose() {
            flags.error_acknowledged = true;
        }

        let start = io.start_switch.level();
        if start != flags.continuous_mode && flags.start_safe {
            flags.continuous_mode = start;
        }
    }

    pub fn state(&self) -> SystemState {
        self.state.kind()
    }

    pub fn previous_state(&self) -> SystemState {
        self.previous
    }

    /// Progress cursors of the active cycle state
    pub fn cycle_cursor(&self) -> CycleCursor {
        self.state.cursor()
    }

    pub fn reload_mode(&self) -> bool {
        self.ctx.flags.reload_mode
    }

    pub fn continuous_mode(&self) -> bool {
        self.ctx.flags.continuous_mode
    }

    pub fn set_continuous_mode(&mut self, on: bool) {
        self.ctx.flags.continuous_mode = on;
    }

    pub fn cycle_in_progress(&self) -> bool {
        self.ctx.flags.cycle_in_progress
    }

    pub fn error_acknowledged(&self) -> bool {
        self.ctx.flags.error_acknowledged
    }

    /// Acknowledge the current error as if the reload switch was pressed
    pub fn acknowledge_error(&mut self) {
        if self.state.kind() == SystemState::Error {
            self.ctx.flags.error_acknowledged = true;
        }
    }

    pub fn last_fault(&self) -> Option<Fault> {
        self.ctx.last_fault
    }

    pub fn io(&self) -> &Io<B> {
        &self.ctx.io
    }

    pub fn io_mut(&mut self) -> &mut Io<B> {
        &mut self.ctx.io
    }

    pub fn config(&self) -> &MachineConfig {
        &self.ctx.config
    }
}
