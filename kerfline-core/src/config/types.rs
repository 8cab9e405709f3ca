//! Configuration type definitions
//!
//! These types represent the machine configuration. Defaults are the
//! tuned values for the production machine; `machine.toml` overrides
//! individual fields.

use crate::motion::{AxisCalibration, AxisProfiles, MotionProfile};
use crate::safety::{HomeCheckPolicy, InterlockMode};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A distance does not land on a whole step for its axis
    InexactDistance { field: &'static str, mils: i32 },
    /// A speed or acceleration is zero
    ZeroRate { field: &'static str },
    /// An early activation offset reaches past the start of travel
    OffsetExceedsTravel { field: &'static str },
    /// A count that must be at least one is zero
    ZeroCount { field: &'static str },
}

/// Per-axis configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AxisConfig {
    pub calibration: AxisCalibration,
    /// Full working travel from home
    pub travel_mils: i32,
    pub profiles: AxisProfiles,
}

impl AxisConfig {
    /// Cutting axis: 500 steps/in, 9.0in stroke
    pub fn cut() -> Self {
        Self {
            calibration: AxisCalibration::new(500),
            travel_mils: 9000,
            profiles: AxisProfiles {
                normal: MotionProfile::new(700, 10_000),
                returning: MotionProfile::new(20_000, 10_000),
                homing: MotionProfile::new(1000, 10_000),
            },
        }
    }

    /// Feed axis: 1000 steps/in, 3.4in stroke
    pub fn feed() -> Self {
        Self {
            calibration: AxisCalibration::new(1000),
            travel_mils: 3400,
            profiles: AxisProfiles {
                normal: MotionProfile::new(17_000, 20_000),
                returning: MotionProfile::new(20_000, 20_000),
                homing: MotionProfile::new(2000, 20_000),
            },
        }
    }

    /// Convert a distance on this axis to steps
    pub fn steps(&self, mils: i32) -> i32 {
        self.calibration.mils_to_steps(mils)
    }

    /// Convert a step position on this axis to mils
    pub fn mils(&self, steps: i32) -> i32 {
        self.calibration.steps_to_mils(steps)
    }
}

/// Feed carriage homing and the manual stock feed strokes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StockFeedConfig {
    /// Distance the feed carriage backs off its home switch
    pub homing_backoff_mils: i32,
    /// Feed clamp settle after gripping the stock
    pub grip_settle_ms: u32,
    /// Grip positions of the two strokes that square up fresh stock
    pub first_cut_grips_mils: [i32; 2],
    /// The second first-cut stroke stops this far short of travel
    pub first_cut_shortfall_mils: i32,
}

impl Default for StockFeedConfig {
    fn default() -> Self {
        Self {
            homing_backoff_mils: 100,
            grip_settle_ms: 200,
            first_cut_grips_mils: [-1000, -2000],
            first_cut_shortfall_mils: 2750,
        }
    }
}

/// Actuator positions and hold times
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ActuatorConfig {
    /// Hold-down arm parked angle
    pub rotary_home_deg: u16,
    /// Hold-down arm engaged angle
    pub rotary_active_deg: u16,
    /// Minimum time the arm stays engaged
    pub rotary_hold_ms: u32,
    /// Time before the rotation clamp retracts on its own
    pub rotation_clamp_hold_ms: u32,
    /// Distance before full travel at which the rotation clamp fires
    pub early_clamp_mils: i32,
    /// Distance before full travel at which the arm engages
    pub early_rotary_mils: i32,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            rotary_home_deg: 24,
            rotary_active_deg: 90,
            rotary_hold_ms: 2700,
            rotation_clamp_hold_ms: 1200,
            early_clamp_mils: 1250,
            early_rotary_mils: 300,
        }
    }
}

/// Cycle timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimingConfig {
    /// Completion signal pulse width
    pub signal_pulse_ms: u32,
    /// Delay before sampling the suction sensor after a cut starts
    pub suction_settle_ms: u32,
    pub error_blink_ms: u32,
    pub homing_blink_ms: u32,
    pub suction_blink_ms: u32,
    /// Timeout for one cut axis homing attempt
    pub cut_homing_timeout_ms: u32,
    /// Homing attempts before giving up
    pub cut_homing_attempts: u8,
    /// Timeout for the safety home on entering suction hold
    pub suction_homing_timeout_ms: u32,
    /// Clamp settle before a manual home check
    pub home_check_delay_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            signal_pulse_ms: 2000,
            suction_settle_ms: 500,
            error_blink_ms: 250,
            homing_blink_ms: 500,
            suction_blink_ms: 1500,
            cut_homing_timeout_ms: 5000,
            cut_homing_attempts: 3,
            suction_homing_timeout_ms: 10_000,
            home_check_delay_ms: 100,
        }
    }
}

/// Home verification and recovery tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RecoveryConfig {
    /// Settle before each home sample
    pub settle_ms: u32,
    /// Home samples per verification
    pub attempts: u8,
    pub slow_recovery_timeout_ms: u32,
    pub slow_recovery_poll_ms: u32,
    pub slow_recovery_accel: u32,
    /// Step taken toward home after a failed verification
    pub nudge_mils: i32,
    /// Total nudge distance allowed before faulting
    pub max_nudge_mils: i32,
    /// Overshoot allowed past the switch when decelerating onto it
    pub decel_distance_mils: i32,
    pub decel_accel: u32,
    /// Stabilisation delay before re-reading the switch after a stop
    pub verify_delay_ms: u32,
    /// Return target for the cut axis, slightly past zero
    pub return_target_mils: i32,
    pub interlock: InterlockMode,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            settle_ms: 30,
            attempts: 3,
            slow_recovery_timeout_ms: 5000,
            slow_recovery_poll_ms: 10,
            slow_recovery_accel: 10_000,
            nudge_mils: 100,
            max_nudge_mils: 400,
            decel_distance_mils: 200,
            decel_accel: 30_000,
            verify_delay_ms: 30,
            return_target_mils: -20,
            interlock: InterlockMode::Decelerate,
        }
    }
}

/// Tuning for one return branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReturnPathConfig {
    /// Cylinder settle between clamp transitions
    pub settle_ms: u32,
    /// Intermediate feed position used to re-grip the stock
    pub regrip_mils: i32,
    /// What to do when the cut axis home cannot be confirmed
    pub home_check: HomeCheckPolicy,
}

impl ReturnPathConfig {
    /// Material still present: overlapping return, strict home check
    pub fn present() -> Self {
        Self {
            settle_ms: 0,
            regrip_mils: 0,
            home_check: HomeCheckPolicy::NudgeThenFault,
        }
    }

    /// Material exhausted: stepped return with cylinder settles
    pub fn absent() -> Self {
        Self {
            settle_ms: 150,
            regrip_mils: 2000,
            home_check: HomeCheckPolicy::WarnAndProceed,
        }
    }
}

/// Complete machine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MachineConfig {
    pub cut_axis: AxisConfig,
    pub feed_axis: AxisConfig,
    pub stock_feed: StockFeedConfig,
    pub actuators: ActuatorConfig,
    pub timing: TimingConfig,
    pub recovery: RecoveryConfig,
    pub return_present: ReturnPathConfig,
    pub return_absent: ReturnPathConfig,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineConfig {
    /// Create the default machine configuration
    pub fn new() -> Self {
        Self {
            cut_axis: AxisConfig::cut(),
            feed_axis: AxisConfig::feed(),
            stock_feed: StockFeedConfig::default(),
            actuators: ActuatorConfig::default(),
            timing: TimingConfig::default(),
            recovery: RecoveryConfig::default(),
            return_present: ReturnPathConfig::present(),
            return_absent: ReturnPathConfig::absent(),
        }
    }

    /// Check that every configured value is usable
    ///
    /// All distances must convert to whole steps on the axis they apply to,
    /// so the controller never accumulates rounding error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cut = &self.cut_axis;
        let feed = &self.feed_axis;

        let cut_distances = [
            ("cut_axis.travel", cut.travel_mils),
            ("actuators.early_clamp", self.actuators.early_clamp_mils),
            ("actuators.early_rotary", self.actuators.early_rotary_mils),
            ("recovery.nudge", self.recovery.nudge_mils),
            ("recovery.max_nudge", self.recovery.max_nudge_mils),
            ("recovery.decel_distance", self.recovery.decel_distance_mils),
            ("recovery.return_target", self.recovery.return_target_mils),
        ];
        for (field, mils) in cut_distances {
            if !cut.calibration.is_exact(mils) {
                return Err(ConfigError::InexactDistance { field, mils });
            }
        }

        let feed_distances = [
            ("feed_axis.travel", feed.travel_mils),
            ("stock_feed.homing_backoff", self.stock_feed.homing_backoff_mils),
            ("stock_feed.first_grip", self.stock_feed.first_cut_grips_mils[0]),
            ("stock_feed.second_grip", self.stock_feed.first_cut_grips_mils[1]),
            (
                "stock_feed.first_cut_shortfall",
                self.stock_feed.first_cut_shortfall_mils,
            ),
            ("return_absent.regrip", self.return_absent.regrip_mils),
            ("return_present.regrip", self.return_present.regrip_mils),
        ];
        for (field, mils) in feed_distances {
            if !feed.calibration.is_exact(mils) {
                return Err(ConfigError::InexactDistance { field, mils });
            }
        }

        for (field, axis) in [("cut_axis", cut), ("feed_axis", feed)] {
            if axis.calibration.steps_per_inch == 0 {
                return Err(ConfigError::ZeroRate { field });
            }
            let p = &axis.profiles;
            for profile in [p.normal, p.returning, p.homing] {
                if profile.speed_hz == 0 || profile.accel == 0 {
                    return Err(ConfigError::ZeroRate { field });
                }
            }
        }

        if self.actuators.early_clamp_mils >= cut.travel_mils {
            return Err(ConfigError::OffsetExceedsTravel {
                field: "actuators.early_clamp",
            });
        }
        if self.actuators.early_rotary_mils >= cut.travel_mils {
            return Err(ConfigError::OffsetExceedsTravel {
                field: "actuators.early_rotary",
            });
        }

        if self.stock_feed.first_cut_shortfall_mils >= feed.travel_mils {
            return Err(ConfigError::OffsetExceedsTravel {
                field: "stock_feed.first_cut_shortfall",
            });
        }

        if self.recovery.attempts == 0 {
            return Err(ConfigError::ZeroCount {
                field: "recovery.attempts",
            });
        }
        if self.timing.cut_homing_attempts == 0 {
            return Err(ConfigError::ZeroCount {
                field: "timing.cut_homing_attempts",
            });
        }
        if self.recovery.nudge_mils <= 0 {
            return Err(ConfigError::ZeroCount {
                field: "recovery.nudge",
            });
        }

        Ok(())
    }
}
