//! Shared controller context
//!
//! Everything a state step may touch besides its own data: hardware,
//! configuration, cross-cutting flags, deferred actions and the return
//! monitor. States receive `&mut Context` and never reach outside it.

use crate::config::{AxisConfig, MachineConfig};
use crate::motion::{AxisId, ProfileKind};
use crate::safety::ReturnMonitor;
use crate::scheduler::DeferredActions;
use crate::traits::{Board, Io, MotionAxis};

use super::machine::Fault;

/// Cross-cutting flags shared between states and the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Flags {
    /// Operator is reloading stock; clamps released
    pub reload_mode: bool,
    /// Start switch held: cycles restart automatically
    pub continuous_mode: bool,
    /// A cut-and-return cycle is underway
    pub cycle_in_progress: bool,
    /// Operator acknowledged the current error
    pub error_acknowledged: bool,
    /// Start switch has been seen off since the last forced stop
    pub start_safe: bool,
    /// Suction confirmation failed during the last cycle
    pub suction_fault: bool,
}

/// State shared by every state step
pub struct Context<B: Board> {
    pub io: Io<B>,
    pub config: MachineConfig,
    pub flags: Flags,
    pub deferred: DeferredActions,
    pub monitor: ReturnMonitor,
    pub last_fault: Option<Fault>,
    /// Timestamp of the current tick
    pub now_ms: u64,
}

impl<B: Board> Context<B> {
    pub fn new(io: Io<B>, config: MachineConfig) -> Self {
        Self {
            io,
            config,
            flags: Flags::default(),
            deferred: DeferredActions::new(),
            monitor: ReturnMonitor::new(),
            last_fault: None,
            now_ms: 0,
        }
    }

    pub fn axis_config(&self, id: AxisId) -> &AxisConfig {
        match id {
            AxisId::Cut => &self.config.cut_axis,
            AxisId::Feed => &self.config.feed_axis,
        }
    }

    pub fn axis(&mut self, id: AxisId) -> &mut B::Axis {
        match id {
            AxisId::Cut => &mut self.io.cut_axis,
            AxisId::Feed => &mut self.io.feed_axis,
        }
    }

    pub fn axis_running(&self, id: AxisId) -> bool {
        match id {
            AxisId::Cut => self.io.cut_axis.is_running(),
            AxisId::Feed => self.io.feed_axis.is_running(),
        }
    }

    /// Apply one of an axis's configured profiles
    pub fn configure(&mut self, id: AxisId, kind: ProfileKind) {
        let profile = self.axis_config(id).profiles.get(kind);
        self.axis(id).apply(profile);
    }

    /// Move an axis to an absolute position in mils
    pub fn move_to(&mut self, id: AxisId, mils: i32) -> Result<(), Fault> {
        let steps = self.axis_config(id).steps(mils);
        self.move_to_steps(id, steps)
    }

    pub fn move_to_steps(&mut self, id: AxisId, steps: i32) -> Result<(), Fault> {
        self.axis(id)
            .move_to(steps)
            .map_err(|e| Fault::Axis(id, e))
    }

    /// Current axis position in mils
    pub fn position_mils(&self, id: AxisId) -> i32 {
        let steps = match id {
            AxisId::Cut => self.io.cut_axis.current_position(),
            AxisId::Feed => self.io.feed_axis.current_position(),
        };
        self.axis_config(id).mils(steps)
    }

    /// Halt both axes where they are
    pub fn stop_all(&mut self) {
        self.io.cut_axis.stop();
        self.io.feed_axis.stop();
    }
}
