//! Machine sequences
//!
//! One module per top-level state family. Each sequence is plain data
//! advanced by `poll` once per tick against the shared `Context`.

pub mod cutting;
pub mod fault;
pub mod feed_homing;
pub mod homing;
pub mod idle;
pub mod maintenance;
pub mod manual_feed;
pub mod returning;

pub use cutting::{CutStep, CuttingSequence, SuctionRecovery};
pub use fault::{ErrorHold, HoldPhase, SuctionHold};
pub use feed_homing::{FeedHoming, FeedHomingStep};
pub use homing::{HomingSequence, HomingStep};
pub use maintenance::HomeCheckMaintenance;
pub use manual_feed::{FeedMode, FeedStep, ManualFeedSequence};
pub use returning::{ReturnBranch, ReturnSequence};
