//! Stepper service task
//!
//! Produces step pulses for both axes. Sleeps until the earliest pending
//! step, or polls for new targets while both axes are idle.

use defmt::*;
use embassy_time::{Instant, Timer};

use crate::board::AxisCell;

/// Poll interval while no step is pending
const IDLE_POLL_US: u64 = 200;

#[embassy_executor::task]
pub async fn stepper_task(axes: [&'static AxisCell; 2]) {
    info!("Stepper task started");

    // Report a pin fault once per axis
    let mut faulted = [false; 2];

    loop {
        let now_us = Instant::now().as_micros();
        let mut next_due: Option<u64> = None;

        for (index, cell) in axes.iter().enumerate() {
            let (result, due) = cell.lock(|axis| {
                let mut axis = axis.borrow_mut();
                let result = axis.service(now_us);
                (result, axis.next_step_us())
            });

            if let Err(e) = result {
                if !faulted[index] {
                    error!("Axis {} step fault: {:?}", index, e);
                    faulted[index] = true;
                }
            }

            if let Some(due) = due {
                next_due = Some(next_due.map_or(due, |n| n.min(due)));
            }
        }

        match next_due {
            Some(due) => Timer::at(Instant::from_micros(due)).await,
            None => Timer::after_micros(IDLE_POLL_US).await,
        }
    }
}
