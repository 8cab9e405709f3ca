//! Control task
//!
//! Runs the controller tick at a fixed rate. The home interlock relies on
//! sub-10ms granularity, so ticks that run late are reported.

use defmt::*;
use embassy_time::{Duration, Instant, Ticker};

use kerfline_core::state::SystemState;
use kerfline_core::Controller;

use crate::board::Rp2040Board;

/// Tick interval in milliseconds
pub const TICK_INTERVAL_MS: u64 = 1;

/// A tick taking longer than this is logged
const OVERRUN_US: u64 = 5_000;

#[embassy_executor::task]
pub async fn control_task(mut controller: Controller<Rp2040Board>) {
    info!("Control task started");

    let mut ticker = Ticker::every(Duration::from_millis(TICK_INTERVAL_MS));
    let mut last_state = controller.state();

    loop {
        ticker.next().await;

        let started = Instant::now();
        controller.tick();
        let took = started.elapsed().as_micros();
        if took > OVERRUN_US {
            warn!("Control tick overran: {}us", took);
        }

        let state = controller.state();
        if state != last_state {
            if state == SystemState::Error {
                if let Some(fault) = controller.last_fault() {
                    error!("Machine halted: {:?}", fault);
                }
            }
            last_state = state;
        }
    }
}
