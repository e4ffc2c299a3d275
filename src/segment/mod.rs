//! Motion segments.
//!
//! A [`Segment`] couples a piece of geometry ([`Coords`]) with the
//! kinematic state the cycle advances: progress, velocities, limits and the
//! flags that drive blending, splitting and removal.

mod coords;
mod rigid_tap;
mod syncio;
mod types;

pub use coords::Coords;
pub use rigid_tap::{RigidTap, TapAction, TapState};
pub use syncio::{SegmentAction, SegmentActions, SyncDio, MAX_AIO, MAX_DIO};
pub use types::{AccelMode, CanonType, MotionType, OptimizationState, StateTag, SyncMode, TermCond};

use crate::consts::{BLEND_ACC_RATIO_TANGENTIAL, TP_MIN_SEGMENT_CYCLES, TP_POS_EPSILON};
use crate::geom::GeomResult;
use crate::math::{Cart3, Pose9};

/// Planner-wide modal state copied into each new segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModalState {
    /// Termination condition for new segments.
    pub term_cond: TermCond,
    /// Blend tolerance, zero for "as large as possible".
    pub tolerance: f64,
    /// Spindle synchronization.
    pub sync_mode: SyncMode,
    /// Distance per spindle revolution when synchronized.
    pub uu_per_rev: f64,
    /// Spindle the segment is synchronized to.
    pub spindle_num: usize,
    /// Default acceleration law.
    pub accel_mode: AccelMode,
}

impl Default for ModalState {
    fn default() -> Self {
        Self {
            term_cond: TermCond::Parabolic,
            tolerance: 0.0,
            sync_mode: SyncMode::None,
            uu_per_rev: 0.0,
            spindle_num: 0,
            accel_mode: AccelMode::Trapezoidal,
        }
    }
}

/// One queued motion.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Geometry.
    pub coords: Coords,
    /// Queue id, `-1` until queued.
    pub id: i64,
    /// Length to travel.
    pub target: f64,
    /// Length before any blend trimmed it.
    pub nominal_length: f64,
    /// Distance travelled.
    pub progress: f64,

    /// Velocity this cycle.
    pub current_vel: f64,
    /// Acceleration applied this cycle.
    pub current_acc: f64,
    /// Velocity to hand over to the next segment.
    pub final_vel: f64,
    /// Requested feed.
    pub req_vel: f64,
    /// Feed the profile aims for this cycle.
    pub target_vel: f64,
    /// Ceiling from machine and geometry limits.
    pub max_vel: f64,
    /// Acceleration limit.
    pub max_accel: f64,
    /// Jerk limit.
    pub max_jerk: f64,

    /// Velocity ceiling at a tangent kink into the next segment, `-1` if
    /// none.
    pub kink_vel: f64,
    /// Acceleration share reserved for the kink at the end.
    pub kink_accel_reduce: f64,
    /// Acceleration share reserved for the kink at the start.
    pub kink_accel_reduce_prev: f64,
    /// Fraction of acceleration available tangentially on curves.
    pub acc_ratio_tan: f64,
    /// Blend tolerance.
    pub tolerance: f64,
    /// Velocity at which a parabolic blend into the next segment starts.
    pub blend_vel: f64,
    /// Velocity when the parabolic blend started.
    pub vel_at_blend_start: f64,
    /// Velocity at the split point.
    pub term_vel: f64,
    /// Time step of the current update, shorter than a cycle when split.
    pub cycle_time: f64,

    /// Termination condition.
    pub term_cond: TermCond,
    /// Spindle synchronization.
    pub sync_mode: SyncMode,
    /// Distance per spindle revolution.
    pub uu_per_rev: f64,
    /// Spindle the segment follows.
    pub spindle_num: usize,
    /// Acceleration law.
    pub accel_mode: AccelMode,
    /// Interpreter motion class.
    pub canon_type: CanonType,
    /// Override enable bits.
    pub enables: u8,
    /// Wait for spindle at speed before starting.
    pub atspeed: bool,
    /// Rotary axis that must be unlocked while this segment runs.
    pub indexer: Option<usize>,
    /// Interpreter tag.
    pub tag: StateTag,
    /// Outputs written when the segment starts.
    pub syncdio: SyncDio,
    /// Actions fired when the segment starts.
    pub actions: SegmentActions,
    /// Optimizer bookkeeping.
    pub optimization_state: OptimizationState,
    /// Lookahead depth reported while active.
    pub active_depth: usize,
    /// Dwell duration.
    pub dwell_time: f64,
    /// Dwell time left.
    pub dwell_remaining: f64,
    /// Cycles since position sync started, zero once locked.
    pub sync_accel: u32,

    /// Reached the head of the queue and started.
    pub active: bool,
    /// Geometry fixed; no more blending into this segment.
    pub finalized: bool,
    /// Done; pop at the end of this cycle.
    pub remove: bool,
    /// Ends partway through the current cycle.
    pub splitting: bool,
    /// Parabolic blend into the next segment has started.
    pub blending_next: bool,
    /// Decelerating to the final velocity.
    pub on_final_decel: bool,
    /// Being advanced as the second half of a parabolic blend.
    pub is_blending: bool,
    /// Previous segment blends parabolically into this one.
    pub blend_prev: bool,
}

impl Default for Segment {
    fn default() -> Self {
        Self::new(Coords::default(), 0.0, CanonType::Feed, 0, false)
    }
}

impl Segment {
    /// Fresh segment with kinematic state cleared.
    pub fn new(coords: Coords, cycle_time: f64, canon_type: CanonType, enables: u8, atspeed: bool) -> Self {
        Self {
            coords,
            id: -1,
            target: 0.0,
            nominal_length: 0.0,
            progress: 0.0,
            current_vel: 0.0,
            current_acc: 0.0,
            final_vel: 0.0,
            req_vel: 0.0,
            target_vel: 0.0,
            max_vel: 0.0,
            max_accel: 0.0,
            max_jerk: 0.0,
            kink_vel: -1.0,
            kink_accel_reduce: 0.0,
            kink_accel_reduce_prev: 0.0,
            acc_ratio_tan: BLEND_ACC_RATIO_TANGENTIAL,
            tolerance: 0.0,
            blend_vel: 0.0,
            vel_at_blend_start: 0.0,
            term_vel: 0.0,
            cycle_time,
            term_cond: TermCond::Parabolic,
            sync_mode: SyncMode::None,
            uu_per_rev: 0.0,
            spindle_num: 0,
            accel_mode: AccelMode::Trapezoidal,
            canon_type,
            enables,
            atspeed,
            indexer: None,
            tag: StateTag::default(),
            syncdio: SyncDio::default(),
            actions: SegmentActions::default(),
            optimization_state: OptimizationState::Untouched,
            active_depth: 1,
            dwell_time: 0.0,
            dwell_remaining: 0.0,
            sync_accel: 0,
            active: false,
            finalized: false,
            remove: false,
            splitting: false,
            blending_next: false,
            on_final_decel: false,
            is_blending: false,
            blend_prev: false,
        }
    }

    /// Motion type of the geometry.
    #[inline]
    pub fn motion_type(&self) -> MotionType {
        self.coords.motion_type()
    }

    /// Copy the planner's modal state.
    pub fn setup_state(&mut self, modal: &ModalState) {
        self.term_cond = modal.term_cond;
        self.blend_prev = false;
        self.tolerance = modal.tolerance;
        self.sync_mode = modal.sync_mode;
        self.uu_per_rev = modal.uu_per_rev;
        self.spindle_num = modal.spindle_num;
        self.accel_mode = modal.accel_mode;
    }

    /// Set velocity and acceleration limits; the requested feed is the
    /// initial target.
    pub fn setup_motion(&mut self, vel: f64, max_vel: f64, accel: f64, jerk: f64) {
        self.max_accel = accel;
        self.max_vel = max_vel;
        self.req_vel = vel;
        self.target_vel = vel;
        self.max_jerk = jerk;
        self.final_vel = 0.0;
        self.current_vel = 0.0;
        self.current_acc = 0.0;
        self.progress = 0.0;
    }

    /// Limit the velocity so the segment lasts at least one cycle.
    pub fn clamp_velocity_by_length(&mut self) {
        let sample_max = self.target / (self.cycle_time * TP_MIN_SEGMENT_CYCLES);
        self.max_vel = self.max_vel.min(sample_max);
    }

    /// Re-derive arc speed limits from the centripetal budget.
    pub fn update_arc_limits(&mut self) {
        if let Coords::Circle { xyz, .. } = &self.coords {
            let (v, ratio) = xyz.actual_max_vel(self.max_vel, self.overall_max_accel());
            self.max_vel = v;
            self.acc_ratio_tan = ratio;
        }
    }

    /// Freeze the geometry. Returns `false` if already final.
    pub fn finalize_length(&mut self) -> bool {
        if self.finalized {
            return false;
        }
        self.clamp_velocity_by_length();
        self.update_arc_limits();
        self.finalized = true;
        true
    }

    /// Acceleration available after kink and parabolic blend reservations.
    pub fn overall_max_accel(&self) -> f64 {
        let mut scale = 1.0 - self.kink_accel_reduce.max(self.kink_accel_reduce_prev);
        if self.term_cond == TermCond::Parabolic || self.blend_prev {
            scale *= 0.5;
        }
        self.max_accel * scale
    }

    /// Acceleration available along the path.
    pub fn tangential_max_accel(&self) -> f64 {
        let a = self.overall_max_accel();
        match self.motion_type() {
            MotionType::Circular | MotionType::Spherical | MotionType::Bezier => a * self.acc_ratio_tan,
            _ => a,
        }
    }

    /// Highest velocity reachable at feed scale `max_scale`.
    pub fn max_target_vel(&self, max_scale: f64) -> f64 {
        let v = match self.sync_mode {
            SyncMode::None => self.req_vel * max_scale,
            SyncMode::Velocity | SyncMode::Position => self.max_vel,
        };
        v.min(self.max_vel)
    }

    /// Set how this segment ends and whether `next` is blended from it.
    pub fn set_term_cond(&mut self, next: Option<&mut Segment>, term: TermCond) {
        if let Some(next) = next {
            next.blend_prev = term == TermCond::Parabolic;
        }
        self.term_cond = term;
    }

    /// Force a stop before entering position-synchronized motion.
    pub fn flag_early_stop(&mut self, next: &mut Segment) {
        if self.sync_mode != SyncMode::Position && next.sync_mode == SyncMode::Position {
            self.set_term_cond(Some(next), TermCond::Stop);
        }
    }

    /// Segment has not started and may be swallowed by a blend.
    pub fn can_consume(&self) -> bool {
        !self.active && self.progress < TP_POS_EPSILON
    }

    /// Record a tangent kink between `self` and `next`.
    pub fn set_kink(&mut self, next: &mut Segment, kink_vel: f64, accel_reduction: f64) {
        self.kink_vel = kink_vel;
        self.kink_accel_reduce = accel_reduction.max(self.kink_accel_reduce);
        next.kink_accel_reduce_prev = accel_reduction.max(next.kink_accel_reduce_prev);
    }

    /// Forget the kink between `self` and `next`.
    pub fn remove_kink(&mut self, next: &mut Segment) {
        self.kink_vel = -1.0;
        self.kink_accel_reduce = 0.0;
        next.kink_accel_reduce_prev = 0.0;
    }

    /// Remaining distance, or the distance travelled when running in
    /// reverse.
    #[inline]
    pub fn distance_to_go(&self, reverse: bool) -> f64 {
        if reverse {
            self.progress
        } else {
            self.target - self.progress
        }
    }

    /// Progress at which the segment is complete in the given direction.
    #[inline]
    pub fn end_progress(&self, reverse: bool) -> f64 {
        if reverse {
            0.0
        } else {
            self.target
        }
    }

    /// Current pose.
    pub fn pos(&self) -> GeomResult<Pose9> {
        self.coords.pos_at(self.progress, self.target)
    }

    /// Pose at the end.
    pub fn end_point(&self) -> GeomResult<Pose9> {
        self.coords.end_point(self.target)
    }

    /// Unit tangent at the current progress, zero when undefined.
    pub fn current_dir(&self) -> Cart3 {
        self.coords.tangent_at(self.progress).unwrap_or(Cart3::ZERO)
    }
}
