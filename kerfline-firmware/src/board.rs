//! RP2040 board definition
//!
//! Binds the core capability traits to embassy-rp peripherals. The step
//! generators are shared between the control task, which commands them,
//! and the stepper task, which produces the pulses.

use core::cell::RefCell;
use core::fmt::{self, Write};

use defmt::*;
use embassy_rp::gpio::{Input, Output};
use embassy_rp::pwm::PwmOutput;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Instant;
use heapless::String;

use kerfline_core::traits::{AxisError, Board, Clock, DiagnosticSink, LogLevel, MotionAxis};
use kerfline_drivers::{DebouncedInput, GpioOutput, Servo, StepDirAxis};

/// Longest diagnostic line forwarded to defmt
const LINE_LEN: usize = 128;

pub type StepAxis = StepDirAxis<Output<'static>, Output<'static>>;

/// A step generator shared between tasks
pub type AxisCell = Mutex<CriticalSectionRawMutex, RefCell<StepAxis>>;

/// Controller-side handle to a shared step generator
#[derive(Clone, Copy)]
pub struct SharedAxis(&'static AxisCell);

impl SharedAxis {
    pub fn new(cell: &'static AxisCell) -> Self {
        Self(cell)
    }

    fn with<R>(&self, f: impl FnOnce(&mut StepAxis) -> R) -> R {
        self.0.lock(|cell| f(&mut cell.borrow_mut()))
    }
}

impl MotionAxis for SharedAxis {
    fn move_to(&mut self, steps: i32) -> Result<(), AxisError> {
        self.with(|axis| axis.move_to(steps))
    }

    fn is_running(&self) -> bool {
        self.with(|axis| axis.is_running())
    }

    fn current_position(&self) -> i32 {
        self.with(|axis| axis.current_position())
    }

    fn set_position(&mut self, steps: i32) {
        self.with(|axis| axis.set_position(steps))
    }

    fn stop(&mut self) {
        self.with(|axis| axis.stop())
    }

    fn force_stop_and_set_position(&mut self, steps: i32) {
        self.with(|axis| axis.force_stop_and_set_position(steps))
    }

    fn set_speed(&mut self, speed_hz: u32) {
        self.with(|axis| axis.set_speed(speed_hz))
    }

    fn set_acceleration(&mut self, accel: u32) {
        self.with(|axis| axis.set_acceleration(accel))
    }
}

/// Millisecond clock from the embassy time driver
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }
}

/// Forwards controller diagnostics to defmt
pub struct DefmtSink;

impl DiagnosticSink for DefmtSink {
    fn emit(&mut self, level: LogLevel, args: fmt::Arguments<'_>) {
        let mut line: String<LINE_LEN> = String::new();
        // Overlong lines are cut short
        let _ = line.write_fmt(args);
        let line = line.as_str();
        match level {
            LogLevel::Trace => trace!("{=str}", line),
            LogLevel::Debug => debug!("{=str}", line),
            LogLevel::Info => info!("{=str}", line),
            LogLevel::Warn => warn!("{=str}", line),
            LogLevel::Error => error!("{=str}", line),
        }
    }
}

/// The RP2040 cutting machine controller board
pub struct Rp2040Board;

impl Board for Rp2040Board {
    type Axis = SharedAxis;
    type Output = GpioOutput<Output<'static>>;
    type Input = DebouncedInput<Input<'static>>;
    type Rotary = Servo<PwmOutput<'static>>;
    type Clock = EmbassyClock;
    type Diag = DefmtSink;
}
