//! Board definition
//!
//! A board names the concrete type of each capability so the controller
//! can be generic over a single parameter.

use super::{BinaryOutput, Clock, DiagnosticSink, DigitalInput, MotionAxis, RotaryActuator};

/// Bundle of capability types provided by a board
pub trait Board {
    type Axis: MotionAxis;
    type Output: BinaryOutput;
    type Input: DigitalInput;
    type Rotary: RotaryActuator;
    type Clock: Clock;
    type Diag: DiagnosticSink;
}

/// Every hardware handle the controller drives or reads
pub struct Io<B: Board> {
    /// Cutting tool carriage
    pub cut_axis: B::Axis,
    /// Workpiece feed carriage
    pub feed_axis: B::Axis,
    /// Hold-down arm that swings over the workpiece near the end of a cut
    pub rotary: B::Rotary,

    /// Clamp riding on the feed carriage
    pub feed_clamp: B::Output,
    /// Stationary clamp holding stock against the fence
    pub secure_clamp: B::Output,
    /// Clamp fired early near the end of a cut
    pub rotation_clamp: B::Output,
    /// Pulse to downstream equipment after each cut
    pub completion_signal: B::Output,

    pub red: B::Output,
    pub yellow: B::Output,
    pub green: B::Output,
    pub blue: B::Output,

    /// Cut axis home switch
    pub cut_home: B::Input,
    /// Feed axis home switch
    pub feed_home: B::Input,
    /// Operator reload switch (also acknowledges errors)
    pub reload_switch: B::Input,
    /// Operator start/continuous switch
    pub start_switch: B::Input,
    /// Material presence sensor at the feed
    pub material_sensor: B::Input,
    /// Vacuum retention confirmation
    pub suction_sensor: B::Input,
    /// Maintenance button for manual home re-verification
    pub home_check_button: B::Input,
    /// Operator switch that pushes stock forward from idle
    pub manual_feed_switch: B::Input,

    pub clock: B::Clock,
    pub diag: B::Diag,
}

impl<B: Board> Io<B> {
    /// Refresh every debounced input
    pub fn update_inputs(&mut self, now_ms: u64) {
        self.cut_home.update(now_ms);
        self.feed_home.update(now_ms);
        self.reload_switch.update(now_ms);
        self.start_switch.update(now_ms);
        self.material_sensor.update(now_ms);
        self.suction_sensor.update(now_ms);
        self.home_check_button.update(now_ms);
        self.manual_feed_switch.update(now_ms);
    }

    /// Switch every indicator lamp off
    pub fn lamps_off(&mut self) {
        self.red.off();
        self.yellow.off();
        self.green.off();
        self.blue.off();
    }
}
