//! Axis units and motion profiles
//!
//! Positions are carried as mils until the moment a command reaches an
//! axis, where the axis calibration turns them into step counts.

pub mod position;
pub mod profile;

pub use position::{AxisCalibration, AxisId, Inches, MILS_PER_INCH};
pub use profile::{AxisProfiles, MotionProfile, ProfileKind};
