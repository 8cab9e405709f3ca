//! Simulated board for host tests
//!
//! Every capability is a plain struct with public fields so tests can
//! script inputs and inspect commands. `Harness` closes the loop: it moves
//! the axes at their commanded speed, derives the home switches from axis
//! position and ticks a `Controller` one millisecond at a time.

use core::fmt::{self, Write as _};
use std::string::String;
use std::vec::Vec;

use crate::config::MachineConfig;
use crate::controller::Controller;
use crate::state::{Context, SystemState};
use crate::traits::{
    AxisError, BinaryOutput, Board, Clock, DiagnosticSink, DigitalInput, Io, LogLevel,
    MotionAxis, RotaryActuator,
};

/// Step-counting axis with an optional travel range
#[derive(Debug, Clone)]
pub struct SimAxis {
    /// Logical position in steps
    pub position: i32,
    /// Physical minus logical position; changes when zero is redefined
    pub offset: i32,
    pub target: i32,
    pub running: bool,
    pub speed_hz: u32,
    pub accel: u32,
    /// Every `move_to` target, in order
    pub moves: Vec<i32>,
    pub stops: u32,
    pub force_stops: u32,
    /// Ignore `advance`/`complete`, keeping the axis in motion
    pub hold_motion: bool,
    /// Hard stops in physical steps
    pub min_physical: i32,
    pub max_physical: i32,
    /// Reject every `move_to`
    pub fail_moves: bool,
}

impl SimAxis {
    pub fn at(position: i32) -> Self {
        Self {
            position,
            offset: 0,
            target: position,
            running: false,
            speed_hz: 0,
            accel: 0,
            moves: Vec::new(),
            stops: 0,
            force_stops: 0,
            hold_motion: false,
            min_physical: i32::MIN / 2,
            max_physical: i32::MAX / 2,
            fail_moves: false,
        }
    }

    pub fn physical(&self) -> i32 {
        self.position + self.offset
    }

    /// Move up to `max_steps` toward the target
    pub fn advance(&mut self, max_steps: i32) {
        if !self.running || self.hold_motion {
            return;
        }
        let remaining = self.target - self.position;
        let next = self.position + remaining.clamp(-max_steps, max_steps);
        let physical = next + self.offset;
        let clamped = physical.clamp(self.min_physical, self.max_physical);
        self.position = clamped - self.offset;
        if self.position == self.target || clamped != physical {
            self.running = false;
        }
    }

    /// Finish the current move at once
    pub fn complete(&mut self) {
        self.advance(i32::MAX / 2);
    }
}

impl MotionAxis for SimAxis {
    fn move_to(&mut self, steps: i32) -> Result<(), AxisError> {
        if self.fail_moves {
            return Err(AxisError::NotReady);
        }
        self.moves.push(steps);
        self.target = steps;
        self.running = steps != self.position;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn current_position(&self) -> i32 {
        self.position
    }

    fn set_position(&mut self, steps: i32) {
        self.offset = self.physical() - steps;
        self.position = steps;
        if !self.running {
            self.target = steps;
        }
    }

    fn stop(&mut self) {
        self.stops += 1;
        self.running = false;
        self.target = self.position;
    }

    fn force_stop_and_set_position(&mut self, steps: i32) {
        self.force_stops += 1;
        self.running = false;
        self.set_position(steps);
    }

    fn set_speed(&mut self, speed_hz: u32) {
        self.speed_hz = speed_hz;
    }

    fn set_acceleration(&mut self, accel: u32) {
        self.accel = accel;
    }
}

/// Scripted input; `set` takes effect on the next `update`
#[derive(Debug, Clone, Default)]
pub struct SimInput {
    pending: bool,
    level: bool,
    rose: bool,
    fell: bool,
}

impl SimInput {
    pub fn new(level: bool) -> Self {
        Self {
            pending: level,
            level,
            rose: false,
            fell: false,
        }
    }

    pub fn set(&mut self, level: bool) {
        self.pending = level;
    }
}

impl DigitalInput for SimInput {
    fn update(&mut self, _now_ms: u64) {
        self.rose = self.pending && !self.level;
        self.fell = !self.pending && self.level;
        self.level = self.pending;
    }

    fn level(&self) -> bool {
        self.level
    }

    fn rose(&self) -> bool {
        self.rose
    }

    fn fell(&self) -> bool {
        self.fell
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimOutput {
    pub active: bool,
}

impl BinaryOutput for SimOutput {
    fn set(&mut self, active: bool) {
        self.active = active;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimRotary {
    pub degrees: u16,
}

impl RotaryActuator for SimRotary {
    fn set_angle(&mut self, degrees: u16) {
        self.degrees = degrees;
    }

    fn angle(&self) -> u16 {
        self.degrees
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimClock {
    pub now: u64,
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now
    }
}

/// Captures every diagnostic line
#[derive(Debug, Clone, Default)]
pub struct SimDiag {
    pub lines: Vec<String>,
}

impl SimDiag {
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }
}

impl DiagnosticSink for SimDiag {
    fn emit(&mut self, level: LogLevel, args: fmt::Arguments<'_>) {
        let mut line = String::new();
        let _ = write!(line, "{:?} {}", level, args);
        self.lines.push(line);
    }
}

pub struct SimBoard;

impl Board for SimBoard {
    type Axis = SimAxis;
    type Output = SimOutput;
    type Input = SimInput;
    type Rotary = SimRotary;
    type Clock = SimClock;
    type Diag = SimDiag;
}

impl SimBoard {
    /// Board with both axes at zero and every input low
    pub fn io() -> Io<SimBoard> {
        Io {
            cut_axis: SimAxis::at(0),
            feed_axis: SimAxis::at(0),
            rotary: SimRotary::default(),
            feed_clamp: SimOutput::default(),
            secure_clamp: SimOutput::default(),
            rotation_clamp: SimOutput::default(),
            completion_signal: SimOutput::default(),
            red: SimOutput::default(),
            yellow: SimOutput::default(),
            green: SimOutput::default(),
            blue: SimOutput::default(),
            cut_home: SimInput::new(false),
            feed_home: SimInput::new(false),
            reload_switch: SimInput::new(false),
            start_switch: SimInput::new(false),
            material_sensor: SimInput::new(false),
            suction_sensor: SimInput::new(false),
            home_check_button: SimInput::new(false),
            manual_feed_switch: SimInput::new(false),
            clock: SimClock::default(),
            diag: SimDiag::default(),
        }
    }

    pub fn context() -> Context<SimBoard> {
        Context::new(Self::io(), MachineConfig::default())
    }
}

/// Closed-loop machine model around a controller
pub struct Harness {
    pub controller: Controller<SimBoard>,
    /// Cut home switch reads low regardless of position
    pub cut_switch_stuck_low: bool,
    visits: Vec<SystemState>,
}

impl Harness {
    /// Machine powered up with stock loaded and suction working
    ///
    /// The cut carriage starts a little off its switch; the cut switch is
    /// active at or below physical zero and the feed switch at the back-off
    /// distance beyond feed travel.
    pub fn new() -> Self {
        let mut io = SimBoard::io();
        io.cut_axis = SimAxis::at(300);
        io.cut_axis.min_physical = -20;
        io.feed_axis.max_physical = 3600;
        io.suction_sensor = SimInput::new(true);
        io.material_sensor = SimInput::new(true);

        Self {
            controller: Controller::new(io, MachineConfig::default()),
            cut_switch_stuck_low: false,
            visits: Vec::new(),
        }
    }

    /// Advance one millisecond
    pub fn step(&mut self) {
        let config = *self.controller.config();
        let feed_switch = config
            .feed_axis
            .steps(config.feed_axis.travel_mils + config.stock_feed.homing_backoff_mils);
        let stuck = self.cut_switch_stuck_low;

        let io = self.controller.io_mut();
        io.clock.now += 1;
        for axis in [&mut io.cut_axis, &mut io.feed_axis] {
            let per_ms = (axis.speed_hz / 1000).max(1) as i32;
            axis.advance(per_ms);
        }
        let cut_home = !stuck && io.cut_axis.physical() <= 0;
        io.cut_home.set(cut_home);
        let feed_home = io.feed_axis.physical() >= feed_switch;
        io.feed_home.set(feed_home);

        self.controller.tick();

        let state = self.controller.state();
        if self.visits.last() != Some(&state) {
            self.visits.push(state);
        }
    }

    pub fn run_for(&mut self, ms: u64) {
        for _ in 0..ms {
            self.step();
        }
    }

    /// Step until `done` holds, at most `max_ms` times
    pub fn run_until<F>(&mut self, max_ms: u64, mut done: F) -> bool
    where
        F: FnMut(&Controller<SimBoard>) -> bool,
    {
        for _ in 0..max_ms {
            self.step();
            if done(&self.controller) {
                return true;
            }
        }
        false
    }

    pub fn visited(&self, state: SystemState) -> bool {
        self.visits.contains(&state)
    }

    pub fn clear_visits(&mut self) {
        self.visits.clear();
    }

    pub fn press_start(&mut self) {
        self.controller.io_mut().start_switch.set(true);
    }

    pub fn release_start(&mut self) {
        self.controller.io_mut().start_switch.set(false);
    }
}
