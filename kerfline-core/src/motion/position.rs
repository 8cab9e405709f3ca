//! Axis positions in physical units
//!
//! Distances are fixed-point mils (thousandths of an inch). Each axis
//! converts them to step counts through its own calibration.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Mils per inch
pub const MILS_PER_INCH: i32 = 1000;

/// Axis identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AxisId {
    /// Cutting tool carriage
    Cut,
    /// Workpiece feed carriage
    Feed,
}

/// Steps-per-inch calibration for one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AxisCalibration {
    pub steps_per_inch: u32,
}

impl AxisCalibration {
    pub const fn new(steps_per_inch: u32) -> Self {
        Self { steps_per_inch }
    }

    /// Convert a distance in mils to the nearest step count
    pub fn mils_to_steps(&self, mils: i32) -> i32 {
        div_round(mils as i64 * self.steps_per_inch as i64, MILS_PER_INCH as i64) as i32
    }

    /// Convert a step count to the nearest distance in mils
    pub fn steps_to_mils(&self, steps: i32) -> i32 {
        if self.steps_per_inch == 0 {
            return 0;
        }
        div_round(steps as i64 * MILS_PER_INCH as i64, self.steps_per_inch as i64) as i32
    }

    /// True when `mils` lands on a whole step and converts back unchanged
    pub fn is_exact(&self, mils: i32) -> bool {
        (mils as i64 * self.steps_per_inch as i64) % MILS_PER_INCH as i64 == 0
            && self.steps_to_mils(self.mils_to_steps(mils)) == mils
    }
}

/// Integer division rounding half away from zero
fn div_round(num: i64, den: i64) -> i64 {
    if (num < 0) == (den < 0) {
        (num + den / 2) / den
    } else {
        (num - den / 2) / den
    }
}

/// Display wrapper rendering mils as decimal inches (`-0.020`, `9.000`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inches(pub i32);

impl fmt::Display for Inches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(
            f,
            "{}{}.{:03}in",
            sign,
            abs / MILS_PER_INCH as u32,
            abs % MILS_PER_INCH as u32
        )
    }
}
