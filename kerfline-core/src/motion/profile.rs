//! Speed and acceleration profiles

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Speed/acceleration pair applied to an axis before a move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotionProfile {
    /// Step rate in steps/s
    pub speed_hz: u32,
    /// Acceleration in steps/s²
    pub accel: u32,
}

impl MotionProfile {
    pub const fn new(speed_hz: u32, accel: u32) -> Self {
        Self { speed_hz, accel }
    }
}

/// Which of an axis's profiles to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProfileKind {
    /// Working pass (cutting stroke, feed advance)
    Normal,
    /// Fast return toward home
    Return,
    /// Slow approach onto a home switch
    Homing,
}

/// The three profiles every axis is configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AxisProfiles {
    pub normal: MotionProfile,
    pub returning: MotionProfile,
    pub homing: MotionProfile,
}

impl AxisProfiles {
    pub fn get(&self, kind: ProfileKind) -> MotionProfile {
        match kind {
            ProfileKind::Normal => self.normal,
            ProfileKind::Return => self.returning,
            ProfileKind::Homing => self.homing,
        }
    }
}
