//! Kerfline - Cutting Machine Firmware
//!
//! Main firmware binary for RP2040-based single-axis cutting machines.
//! Builds the board from embassy-rp peripherals, loads the embedded
//! machine.toml and hands everything to the control and stepper tasks.
//!
//! Named after the kerf, the slot a blade leaves behind.

#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_sync::blocking_mutex::Mutex;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use kerfline_core::config::{parse_config, MachineConfig};
use kerfline_core::traits::Io;
use kerfline_core::Controller;
use kerfline_drivers::servo::ServoConfig;
use kerfline_drivers::{DebouncedInput, GpioOutput, Servo, StepDirAxis};

mod board;
mod tasks;

use board::{AxisCell, DefmtSink, EmbassyClock, SharedAxis};

/// Embedded configuration (compiled into firmware)
/// Edit machine.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../machine.toml");

// Debounce intervals in milliseconds
const CUT_HOME_DEBOUNCE_MS: u32 = 3;
const FEED_HOME_DEBOUNCE_MS: u32 = 5;
const RELOAD_DEBOUNCE_MS: u32 = 10;
const BUTTON_DEBOUNCE_MS: u32 = 20;
const SENSOR_DEBOUNCE_MS: u32 = 3;

// Step generators live for the program duration and are shared by tasks
static CUT_AXIS: StaticCell<AxisCell> = StaticCell::new();
static FEED_AXIS: StaticCell<AxisCell> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Kerfline firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = load_config();

    // Step/dir drivers
    let cut_axis: &'static AxisCell = CUT_AXIS.init(Mutex::new(RefCell::new(StepDirAxis::new(
        Output::new(p.PIN_12, Level::Low),
        Output::new(p.PIN_11, Level::Low),
        false,
    ))));
    let feed_axis: &'static AxisCell = FEED_AXIS.init(Mutex::new(RefCell::new(StepDirAxis::new(
        Output::new(p.PIN_17, Level::Low),
        Output::new(p.PIN_18, Level::Low),
        false,
    ))));
    info!("Step generators initialized");

    // Hold-down servo on PWM slice 7 channel A: 125 MHz / 125 = 1 MHz,
    // 20000 counts per 50 Hz frame
    let mut pwm_config = PwmConfig::default();
    pwm_config.divider = 125u8.into();
    pwm_config.top = 19_999;
    let pwm = Pwm::new_output_a(p.PWM_SLICE7, p.PIN_14, pwm_config);
    let (servo_pwm, _) = pwm.split();
    let servo = Servo::new(
        unwrap!(servo_pwm),
        ServoConfig::default(),
        config.actuators.rotary_home_deg,
    );
    info!("Servo initialized");

    // Pneumatic valves are active-low, lamps and the signal relay active-high
    let io = Io {
        cut_axis: SharedAxis::new(cut_axis),
        feed_axis: SharedAxis::new(feed_axis),
        rotary: servo,

        feed_clamp: GpioOutput::new(Output::new(p.PIN_20, Level::High), true, true),
        secure_clamp: GpioOutput::new(Output::new(p.PIN_21, Level::High), true, true),
        rotation_clamp: GpioOutput::active_high(Output::new(p.PIN_22, Level::Low)),
        completion_signal: GpioOutput::active_high(Output::new(p.PIN_8, Level::Low)),

        red: GpioOutput::active_high(Output::new(p.PIN_26, Level::Low)),
        yellow: GpioOutput::active_high(Output::new(p.PIN_27, Level::Low)),
        green: GpioOutput::active_high(Output::new(p.PIN_28, Level::Low)),
        blue: GpioOutput::active_high(Output::new(p.PIN_19, Level::Low)),

        cut_home: DebouncedInput::active_high(
            Input::new(p.PIN_3, Pull::Down),
            CUT_HOME_DEBOUNCE_MS,
        ),
        feed_home: DebouncedInput::active_high(
            Input::new(p.PIN_16, Pull::Down),
            FEED_HOME_DEBOUNCE_MS,
        ),
        reload_switch: DebouncedInput::active_high(
            Input::new(p.PIN_6, Pull::Down),
            RELOAD_DEBOUNCE_MS,
        ),
        start_switch: DebouncedInput::active_high(
            Input::new(p.PIN_5, Pull::Down),
            BUTTON_DEBOUNCE_MS,
        ),
        // Material sensor pulls low when stock is present
        material_sensor: DebouncedInput::active_low(
            Input::new(p.PIN_10, Pull::Up),
            SENSOR_DEBOUNCE_MS,
        ),
        // Suction confirmation reads high while the vacuum holds
        suction_sensor: DebouncedInput::active_high(
            Input::new(p.PIN_9, Pull::Up),
            SENSOR_DEBOUNCE_MS,
        ),
        home_check_button: DebouncedInput::active_high(
            Input::new(p.PIN_13, Pull::Down),
            BUTTON_DEBOUNCE_MS,
        ),
        manual_feed_switch: DebouncedInput::active_high(
            Input::new(p.PIN_7, Pull::Down),
            BUTTON_DEBOUNCE_MS,
        ),

        clock: EmbassyClock,
        diag: DefmtSink,
    };
    info!("IO initialized");

    let controller = Controller::new(io, config);

    spawner.spawn(tasks::stepper_task([cut_axis, feed_axis])).unwrap();
    spawner.spawn(tasks::control_task(controller)).unwrap();

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}

/// Parse and validate the embedded configuration
///
/// Falls back to the built-in defaults if machine.toml is rejected. The
/// build script validates the same file, so this should only happen
/// during development.
fn load_config() -> MachineConfig {
    let config = match parse_config(EMBEDDED_CONFIG) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to parse embedded config: {:?}", e);
            error!("Using built-in defaults");
            return MachineConfig::default();
        }
    };

    match config.validate() {
        Ok(()) => {
            info!("Parsed embedded configuration successfully");
            config
        }
        Err(e) => {
            error!("Embedded config rejected: {:?}", e);
            error!("Using built-in defaults");
            MachineConfig::default()
        }
    }
}
