//! Per-cycle telemetry.

use crate::math::{Cart3, Pose9};
use crate::segment::{CanonType, Segment, StateTag};

/// Snapshot written by every cycle for user interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionStatus {
    /// Path velocity commanded this cycle.
    pub current_vel: f64,
    /// Feed programmed for the executing segment.
    pub requested_vel: f64,
    /// Path length left in the executing segment.
    pub distance_to_go: f64,
    /// Per-axis distance from the current position to the segment end.
    pub dtg: Pose9,
    /// Unit path direction.
    pub current_dir: Cart3,
    /// Enable bits of the executing segment.
    pub enables_queued: u8,
    /// Spindle synchronization established.
    pub spindle_sync: bool,
    /// Kind of move executing, `None` when idle.
    pub motion_type: Option<CanonType>,
    /// Id of the executing segment.
    pub exec_id: i64,
    /// Interpreter tag of the executing segment.
    pub exec_tag: StateTag,
    /// Lookahead depth the optimizer reached for the executing segment.
    pub active_depth: usize,
    /// Segments queued ahead of the cycle, the executing one included.
    pub queue_len: usize,
}

impl MotionStatus {
    /// Report `tc` at `current_pos`.
    pub(crate) fn update(&mut self, tc: &Segment, current_pos: &Pose9) {
        self.motion_type = Some(tc.canon_type);
        self.active_depth = tc.active_depth;
        self.distance_to_go = tc.target - tc.progress;
        self.enables_queued = tc.enables;
        self.exec_id = tc.id;
        self.requested_vel = tc.req_vel;
        self.current_vel = tc.current_vel;
        self.current_dir = tc.current_dir();
        self.dtg = tc.end_point().map(|end| end - *current_pos).unwrap_or(Pose9::ZERO);
    }

    /// Idle report. The exec tag survives so the last executed line stays
    /// visible.
    pub(crate) fn clear(&mut self) {
        *self = Self {
            exec_tag: self.exec_tag,
            ..Self::default()
        };
    }
}
