//! Board-agnostic control core for the Kerfline cutting machine
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Capability traits for axes, actuators, inputs, clock and logging
//! - Unit conversion between mils and axis steps
//! - Machine configuration and its TOML-subset parser
//! - Deferred actuator timers
//! - Cut axis home verification, recovery and the return interlock
//! - The cutting, return, homing and fault sequences
//! - The `Controller` that dispatches them once per tick

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

#[macro_use]
mod log;

pub mod config;
pub mod controller;
pub mod cycle;
pub mod motion;
pub mod safety;
pub mod scheduler;
pub mod state;
pub mod traits;

#[cfg(test)]
mod sim;

pub use controller::Controller;
