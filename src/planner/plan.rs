//! Producer side: turn motion commands into queued segments.
//!
//! Every add call builds a complete [`Segment`] first, hands the corner it
//! forms with the last queued segment to the blend engine, and only then
//! touches the queue. Rejected calls leave the queue and the goal position
//! exactly as they were.

use alloc::sync::Arc;

use libm::fmin;

use crate::blend::{handle_blend, BlendContext, BlendOutcome};
use crate::consts::{BLEND_DIST_FRACTION, TP_OPTIMIZATION_CUTOFF, TP_POS_EPSILON};
use crate::error::{ConfigError, GeomError, PlannerError, QueueError, Result};
use crate::math::{Cart3, Pose9};
use crate::config::PlannerType;
use crate::motion::{
    effective_jerk, optimal_final_velocity, optimization_initial_velocity, scurve_final_velocity, scurve_v_peak,
};
use crate::queue::PlanQueue;
use crate::segment::{
    CanonType, Coords, ModalState, OptimizationState, RigidTap, Segment, SegmentAction, SegmentActions, StateTag,
    SyncDio, SyncMode, TermCond,
};

use super::control::ControlBlock;

/// Kinematic parameters of one commanded move.
///
/// Limits left unset fall back to the planner-wide `vmax`, `amax` and
/// `max_jerk`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveParams {
    /// Interpreter motion class.
    pub canon_type: CanonType,
    /// Requested feed.
    pub vel: f64,
    /// Velocity ceiling of the move.
    pub max_vel: Option<f64>,
    /// Acceleration ceiling of the move.
    pub accel: Option<f64>,
    /// Jerk ceiling of the move.
    pub jerk: Option<f64>,
    /// Enable bits reported while the move executes.
    pub enables: u8,
    /// Wait for every spindle to reach speed before starting.
    pub atspeed: bool,
    /// Locking rotary axis to unlock for this move.
    pub indexer: Option<usize>,
    /// Interpreter tag.
    pub tag: StateTag,
}

impl MoveParams {
    fn new(canon_type: CanonType, vel: f64) -> Self {
        Self {
            canon_type,
            vel,
            max_vel: None,
            accel: None,
            jerk: None,
            enables: 0,
            atspeed: false,
            indexer: None,
            tag: StateTag::default(),
        }
    }

    /// Feed move (G1).
    pub fn feed(vel: f64) -> Self {
        Self::new(CanonType::Feed, vel)
    }

    /// Rapid move (G0).
    pub fn traverse(vel: f64) -> Self {
        Self::new(CanonType::Traverse, vel)
    }

    /// Arc feed move (G2/G3).
    pub fn arc(vel: f64) -> Self {
        Self::new(CanonType::Arc, vel)
    }

    /// Set the velocity ceiling.
    pub fn max_vel(mut self, max_vel: f64) -> Self {
        self.max_vel = Some(max_vel);
        self
    }

    /// Set the acceleration ceiling.
    pub fn accel(mut self, accel: f64) -> Self {
        self.accel = Some(accel);
        self
    }

    /// Set the jerk ceiling.
    pub fn jerk(mut self, jerk: f64) -> Self {
        self.jerk = Some(jerk);
        self
    }

    /// Set the enable bits.
    pub fn enables(mut self, enables: u8) -> Self {
        self.enables = enables;
        self
    }

    /// Require the spindle at speed before starting.
    pub fn atspeed(mut self) -> Self {
        self.atspeed = true;
        self
    }

    /// Unlock rotary axis `axis` for the move.
    pub fn indexer(mut self, axis: usize) -> Self {
        self.indexer = Some(axis);
        self
    }

    /// Attach an interpreter tag.
    pub fn tag(mut self, tag: StateTag) -> Self {
        self.tag = tag;
        self
    }
}

/// Producer-side planner state.
#[derive(Debug)]
pub struct Planning {
    ctx: BlendContext,
    vmax: f64,
    amax: f64,
    max_jerk: f64,
    planner_type: PlannerType,
    spindle_count: usize,
    goal: Pose9,
    next_id: i64,
    syncdio: SyncDio,
    actions: SegmentActions,
    control: Arc<ControlBlock>,
    seen_epoch: u32,
}

impl Planning {
    /// Planning state with the given blend context and machine limits.
    pub fn new(
        ctx: BlendContext,
        vmax: f64,
        amax: f64,
        max_jerk: f64,
        spindle_count: usize,
        control: Arc<ControlBlock>,
    ) -> Self {
        let seen_epoch = control.stop_epoch();
        Self {
            ctx,
            vmax,
            amax,
            max_jerk,
            planner_type: PlannerType::Trapezoidal,
            spindle_count,
            goal: Pose9::ZERO,
            next_id: 0,
            syncdio: SyncDio::default(),
            actions: SegmentActions::default(),
            control,
            seen_epoch,
        }
    }

    /// Size lookahead velocities for the given law.
    pub fn with_planner_type(mut self, planner_type: PlannerType) -> Self {
        self.planner_type = planner_type;
        self
    }

    /// End point of the last queued move.
    #[inline]
    pub fn goal(&self) -> Pose9 {
        self.goal
    }

    /// Id the next queued segment will get.
    #[inline]
    pub fn next_id(&self) -> i64 {
        self.next_id
    }

    /// Modal state copied into new segments.
    #[inline]
    pub fn modal(&self) -> &ModalState {
        &self.ctx.modal
    }

    /// Blend and optimizer settings.
    #[inline]
    pub fn context(&self) -> &BlendContext {
        &self.ctx
    }

    /// Lookahead depth the optimizer walks.
    #[inline]
    pub fn optimization_depth(&self) -> usize {
        self.ctx.optimization_depth
    }

    /// Adopt the stop position of an abort completed since the last call.
    /// Returns `true` if one was.
    pub fn sync_with_control(&mut self) -> bool {
        let epoch = self.control.stop_epoch();
        if epoch == self.seen_epoch {
            return false;
        }
        self.seen_epoch = epoch;
        self.goal = self.control.stop_pos();
        self.ctx.modal.sync_mode = SyncMode::None;
        self.ctx.modal.uu_per_rev = 0.0;
        self.syncdio.clear();
        self.actions.clear();
        tp_debug!("planning resynchronized after abort");
        true
    }

    pub(crate) fn reset_goal(&mut self, pos: Pose9) {
        self.goal = pos;
    }

    /// Move the goal without queueing motion.
    pub fn set_pos(&mut self, pos: Pose9) -> Result<()> {
        if !pos.is_finite() {
            return Err(PlannerError::InvalidPose.into());
        }
        self.goal = pos;
        Ok(())
    }

    /// Forget ids, modal synchronization and pending outputs.
    pub fn clear(&mut self, pos: Pose9) {
        self.seen_epoch = self.control.stop_epoch();
        self.goal = pos;
        self.next_id = 0;
        self.ctx.modal.sync_mode = SyncMode::None;
        self.ctx.modal.uu_per_rev = 0.0;
        self.syncdio.clear();
        self.actions.clear();
    }

    /// Termination condition and path tolerance for the following moves.
    pub fn set_term_cond(&mut self, term_cond: TermCond, tolerance: f64) -> Result<()> {
        if !(tolerance >= 0.0) {
            return Err(ConfigError::InvalidTolerance(tolerance).into());
        }
        self.ctx.modal.term_cond = term_cond;
        self.ctx.modal.tolerance = tolerance;
        Ok(())
    }

    /// Default velocity ceiling.
    pub fn set_vmax(&mut self, vmax: f64) -> Result<()> {
        if !(vmax > 0.0) {
            return Err(ConfigError::InvalidMaxVelocity(vmax).into());
        }
        self.vmax = vmax;
        Ok(())
    }

    /// Default acceleration ceiling.
    pub fn set_amax(&mut self, amax: f64) -> Result<()> {
        if !(amax > 0.0) {
            return Err(ConfigError::InvalidMaxAcceleration(amax).into());
        }
        self.amax = amax;
        Ok(())
    }

    /// Servo period used to size new segments.
    pub fn set_cycle_time(&mut self, cycle_time: f64) -> Result<()> {
        if !(cycle_time > 0.0) {
            return Err(ConfigError::InvalidCycleTime(cycle_time).into());
        }
        self.ctx.cycle_time = cycle_time;
        Ok(())
    }

    /// Synchronize the following moves to `spindle`: `uu_per_rev` units
    /// per revolution, by velocity or by position. Zero ends
    /// synchronization.
    pub fn set_spindle_sync(&mut self, spindle: usize, uu_per_rev: f64, velocity_mode: bool) -> Result<()> {
        if spindle >= self.spindle_count {
            return Err(PlannerError::InvalidSpindle(spindle).into());
        }
        if uu_per_rev != 0.0 {
            self.ctx.modal.sync_mode = if velocity_mode {
                SyncMode::Velocity
            } else {
                SyncMode::Position
            };
            self.ctx.modal.uu_per_rev = uu_per_rev;
            self.ctx.modal.spindle_num = spindle;
        } else {
            self.ctx.modal.sync_mode = SyncMode::None;
        }
        Ok(())
    }

    /// Digital output change written when the next queued move starts.
    pub fn set_dout(&mut self, index: usize, on: bool) -> Result<()> {
        if !self.syncdio.set_dout(index, on) {
            return Err(PlannerError::InvalidOutput(index).into());
        }
        Ok(())
    }

    /// Analog output change written when the next queued move starts.
    pub fn set_aout(&mut self, index: usize, value: f64) -> Result<()> {
        if !self.syncdio.set_aout(index, value) {
            return Err(PlannerError::InvalidOutput(index).into());
        }
        Ok(())
    }

    /// Drop output changes not yet attached to a segment.
    pub fn clear_dios(&mut self) {
        self.syncdio.clear();
    }

    /// Action fired when the next queued move starts. `value` is the
    /// spindle speed or the custom value.
    pub fn set_segment_actions(&mut self, action: SegmentAction, spindle: usize, value: f64) -> Result<()> {
        let spindle_action = matches!(
            action,
            SegmentAction::SpindleCw | SegmentAction::SpindleCcw | SegmentAction::SpindleOff
        );
        if spindle_action && spindle >= self.spindle_count {
            return Err(PlannerError::InvalidSpindle(spindle).into());
        }
        self.actions.set(action, spindle, value);
        Ok(())
    }

    /// Queue a straight move from the goal to `end`.
    pub fn add_line<Q: PlanQueue + ?Sized>(&mut self, q: &mut Q, end: Pose9, params: &MoveParams) -> Result<()> {
        self.error_check(q)?;
        if !end.is_finite() {
            return Err(PlannerError::InvalidPose.into());
        }

        let mut tc = self.new_segment(Coords::line(&self.goal, &end), params);
        tc.target = tc.coords.length();
        if tc.target < TP_POS_EPSILON {
            tp_debug!("zero-length line rejected");
            return Err(GeomError::ZeroLength.into());
        }
        tc.nominal_length = tc.target;
        tc.clamp_velocity_by_length();
        self.finish_motion(q, tc)
    }

    /// Queue an arc from the goal to `end` about `center`, in the plane
    /// normal to `normal`, with `turn` extra full turns.
    pub fn add_circle<Q: PlanQueue + ?Sized>(
        &mut self,
        q: &mut Q,
        end: Pose9,
        center: Cart3,
        normal: Cart3,
        turn: i32,
        params: &MoveParams,
    ) -> Result<()> {
        self.error_check(q)?;
        if !end.is_finite() || !center.is_finite() || !normal.is_finite() {
            return Err(PlannerError::InvalidPose.into());
        }

        let coords = Coords::circle(&self.goal, &end, center, normal, turn)?;
        let mut tc = self.new_segment(coords, params);
        tc.target = tc.coords.length();
        if tc.target < TP_POS_EPSILON {
            tp_debug!("zero-length arc rejected");
            return Err(GeomError::ZeroLength.into());
        }
        tc.nominal_length = tc.target;
        tc.clamp_velocity_by_length();
        tc.update_arc_limits();
        self.finish_motion(q, tc)
    }

    /// Queue a rigid tap from the goal down to `end` and back. The
    /// retraction runs `reversal_scale` times faster than the feed in.
    pub fn add_rigid_tap<Q: PlanQueue + ?Sized>(
        &mut self,
        q: &mut Q,
        end: Cart3,
        reversal_scale: f64,
        params: &MoveParams,
    ) -> Result<()> {
        self.error_check(q)?;
        if self.ctx.modal.sync_mode == SyncMode::None {
            tp_warn!("rigid tap refused without spindle synchronization");
            return Err(PlannerError::NotSynchronized.into());
        }
        if !end.is_finite() || !(reversal_scale > 0.0) {
            return Err(PlannerError::InvalidPose.into());
        }

        let tap = RigidTap::new(&self.goal, end, reversal_scale);
        if tap.xyz.tmag < TP_POS_EPSILON {
            return Err(GeomError::ZeroLength.into());
        }
        let mut params = *params;
        params.atspeed = true;
        let mut tc = self.new_segment(Coords::RigidTap(tap), &params);
        tc.target = tap.target(tc.uu_per_rev);
        tc.nominal_length = tc.target;
        tc.set_term_cond(None, TermCond::Stop);
        tc.finalize_length();
        self.take_synced_io(&mut tc);

        if let Some(prev) = q.last_mut() {
            handle_mode_change(prev, &mut tc);
            prev.finalize_length();
            prev.flag_early_stop(&mut tc);
        }
        // The tap returns to where it started, so the goal stays
        self.push(q, tc, true, false)?;
        self.run_optimization(q);
        Ok(())
    }

    /// Queue a pause of `seconds` at the goal. The previous move stops
    /// before it.
    pub fn add_dwell<Q: PlanQueue + ?Sized>(&mut self, q: &mut Q, seconds: f64, tag: StateTag) -> Result<()> {
        self.error_check(q)?;
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };

        let params = MoveParams::feed(0.0).tag(tag);
        let mut tc = self.new_segment(Coords::Dwell { pos: self.goal }, &params);
        tc.sync_mode = SyncMode::None;
        tc.dwell_time = seconds;
        tc.dwell_remaining = seconds;
        tc.set_term_cond(None, TermCond::Stop);
        tc.finalized = true;
        self.take_synced_io(&mut tc);

        if let Some(prev) = q.last_mut() {
            prev.set_term_cond(Some(&mut tc), TermCond::Stop);
            prev.finalize_length();
        }
        self.push(q, tc, true, false)?;
        Ok(())
    }

    fn error_check<Q: PlanQueue + ?Sized>(&mut self, q: &Q) -> Result<()> {
        self.sync_with_control();
        self.ctx.limits.vlimit = self.control.vlimit();
        if self.control.is_aborting() {
            tp_warn!("segment refused while aborting");
            return Err(PlannerError::Aborting.into());
        }
        if q.is_full() {
            tp_debug!("segment queue full");
            return Err(QueueError::Full.into());
        }
        Ok(())
    }

    fn new_segment(&self, coords: Coords, params: &MoveParams) -> Segment {
        let mut tc = Segment::new(
            coords,
            self.ctx.cycle_time,
            params.canon_type,
            params.enables,
            params.atspeed,
        );
        tc.tag = params.tag;
        tc.indexer = params.indexer;
        tc.setup_state(&self.ctx.modal);
        tc.setup_motion(
            params.vel,
            params.max_vel.unwrap_or(self.vmax),
            params.accel.unwrap_or(self.amax),
            params.jerk.unwrap_or(self.max_jerk),
        );
        if tc.indexer.is_some() {
            // The axis relocks at the end, which needs a standstill
            tc.term_cond = TermCond::Stop;
        }
        tc
    }

    fn take_synced_io(&mut self, tc: &mut Segment) {
        if self.syncdio.anychanged {
            tc.syncdio = self.syncdio;
        }
        self.syncdio.clear();
    }

    /// Common tail of the line and arc paths: corner handling, the previous
    /// segment's final geometry, enqueue and optimization.
    fn finish_motion<Q: PlanQueue + ?Sized>(&mut self, q: &mut Q, mut tc: Segment) -> Result<()> {
        self.take_synced_io(&mut tc);

        let mut outcome = None;
        if let Some(prev) = q.last_mut() {
            handle_mode_change(prev, &mut tc);
            if prev.indexer.is_some() {
                prev.set_term_cond(Some(&mut tc), TermCond::Stop);
            }
            if self.ctx.optimization_depth >= 2 {
                outcome = Some(handle_blend(prev, &mut tc, &self.ctx));
            }
        }

        let mut prev_offset = 0;
        if let Some(BlendOutcome {
            blend: Some(blend),
            consume_prev,
            kind,
        }) = outcome
        {
            tp_debug!("corner crossed with {:?}", kind);
            if consume_prev {
                q.pop_back()?;
            } else {
                prev_offset = 1;
            }
            self.push(q, blend, false, true)?;
        }

        if let Some(prev) = q.back_mut(prev_offset) {
            prev.finalize_length();
            prev.flag_early_stop(&mut tc);
        }
        self.push(q, tc, true, true)?;
        self.run_optimization(q);
        Ok(())
    }

    fn push<Q: PlanQueue + ?Sized>(
        &mut self,
        q: &mut Q,
        mut tc: Segment,
        inc_id: bool,
        moves_goal: bool,
    ) -> Result<()> {
        let end = if moves_goal { Some(tc.end_point()?) } else { None };
        tc.id = self.next_id;
        tc.actions = self.actions;
        q.put(tc)?;
        self.actions.clear();
        if inc_id {
            self.next_id += 1;
        }
        if let Some(end) = end {
            self.goal = end;
        }
        Ok(())
    }

    /// Walk back from the tail raising final velocities as far as the
    /// segments downstream allow.
    pub fn run_optimization<Q: PlanQueue + ?Sized>(&self, q: &mut Q) {
        let depth = self.ctx.optimization_depth;
        if depth < 2 {
            return;
        }
        let mut hit_peaks = 0usize;
        let mut hit_non_tangent = false;

        for x in 1..depth + 2 {
            let Some((prev, tc)) = q.back_pair_mut(x - 1) else {
                return;
            };

            if prev.term_cond != TermCond::Tangent {
                if hit_non_tangent {
                    return;
                }
                hit_non_tangent = true;
                continue;
            }
            hit_non_tangent = false;
            if prev.progress / prev.target.max(TP_POS_EPSILON) >= BLEND_DIST_FRACTION / 2.0
                || prev.splitting
                || prev.blending_next
            {
                return;
            }

            if tc.atspeed {
                tc.final_vel = 0.0;
            }
            let kink_limit = if prev.kink_vel >= 0.0 {
                prev.kink_vel
            } else {
                f64::MAX
            };

            let scurve = self.planner_type == PlannerType::SCurve;
            let jerk = effective_jerk(tc.max_jerk, self.max_jerk);
            if !tc.finalized {
                let max_target_vel = self.ctx.limits.max_target_vel(tc);
                let v0 = if scurve {
                    fmin(scurve_v_peak(tc.tangential_max_accel(), jerk, tc.target), max_target_vel)
                } else {
                    optimization_initial_velocity(tc.tangential_max_accel(), tc.target, max_target_vel)
                };
                prev.final_vel = fmin(fmin(prev.max_vel, v0), kink_limit);
                tc.final_vel = 0.0;
            } else {
                let vf_limit = fmin(fmin(tc.max_vel, prev.max_vel), kink_limit);
                let (vf, at_max) = if scurve {
                    scurve_final_velocity(tc.final_vel, tc.tangential_max_accel(), jerk, tc.target, vf_limit)
                } else {
                    optimal_final_velocity(tc.final_vel, tc.tangential_max_accel(), tc.target, vf_limit)
                };
                prev.final_vel = vf;
                if at_max {
                    tc.optimization_state = OptimizationState::AtMax;
                }
                tc.clamp_velocity_by_length();
            }
            if scurve {
                // Never above what the previous segment reaches on its own
                let prev_jerk = effective_jerk(prev.max_jerk, self.max_jerk);
                let reachable = scurve_v_peak(prev.tangential_max_accel(), prev_jerk, prev.target);
                prev.final_vel = fmin(prev.final_vel, reachable);
            }

            tc.active_depth = (x + 1).saturating_sub(hit_peaks).saturating_sub(2);
            if tc.optimization_state == OptimizationState::AtMax {
                hit_peaks += 1;
            }
            if hit_peaks > TP_OPTIMIZATION_CUTOFF {
                return;
            }
        }
    }
}

/// Rapids and feeds never blend into each other, and position
/// synchronization starts from a stop.
fn handle_mode_change(prev: &mut Segment, tc: &mut Segment) {
    let prev_rapid = prev.canon_type == CanonType::Traverse;
    let tc_rapid = tc.canon_type == CanonType::Traverse;
    if prev_rapid != tc_rapid {
        tp_debug!("no blending between rapid and feed moves");
        prev.set_term_cond(Some(tc), TermCond::Stop);
    }
    if prev.sync_mode != SyncMode::Position && tc.sync_mode == SyncMode::Position {
        prev.set_term_cond(Some(tc), TermCond::Stop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend::{test_context, BlendKind};
    use crate::config::BlendMode;
    use crate::queue::{ExecQueue, SegmentQueue};
    use crate::segment::MotionType;

    fn planning(mode: BlendMode) -> Planning {
        let mut ctx = test_context();
        ctx.mode = mode;
        ctx.modal.tolerance = 0.05;
        Planning::new(ctx, 100.0, 1000.0, 1e6, 1, Arc::new(ControlBlock::default()))
    }

    fn at(x: f64, y: f64) -> Pose9 {
        Pose9::from_xyz(x, y, 0.0)
    }

    #[test]
    fn test_zero_length_line_rejected() {
        let mut p = planning(BlendMode::Arc);
        let mut q = SegmentQueue::new(100);
        p.add_line(&mut q, at(1.0, 0.0), &MoveParams::feed(10.0)).unwrap();
        let err = p.add_line(&mut q, at(1.0, 0.0), &MoveParams::feed(10.0));
        assert_eq!(err, Err(GeomError::ZeroLength.into()));
        assert_eq!(PlanQueue::len(&q), 1);
        assert_eq!(p.goal(), at(1.0, 0.0));
        assert_eq!(p.next_id(), 1);
    }

    #[test]
    fn test_nan_end_rejected_without_mutation() {
        let mut p = planning(BlendMode::Arc);
        let mut q = SegmentQueue::new(100);
        let bad = Pose9::from_xyz(f64::NAN, 0.0, 0.0);
        assert_eq!(
            p.add_line(&mut q, bad, &MoveParams::feed(10.0)),
            Err(PlannerError::InvalidPose.into())
        );
        assert!(PlanQueue::is_empty(&q));
        assert_eq!(p.goal(), Pose9::ZERO);
    }

    #[test]
    fn test_corner_gets_arc_blend() {
        let mut p = planning(BlendMode::Arc);
        let mut q = SegmentQueue::new(100);
        p.add_line(&mut q, at(10.0, 0.0), &MoveParams::feed(50.0)).unwrap();
        p.add_line(&mut q, at(10.0, 10.0), &MoveParams::feed(50.0)).unwrap();

        assert_eq!(PlanQueue::len(&q), 3);
        let blend = q.back(1).unwrap();
        assert_eq!(blend.motion_type(), MotionType::Spherical);
        // The blend shares the id of the move that follows it
        assert_eq!(blend.id, 1);
        let first = q.back(2).unwrap();
        assert_eq!(first.term_cond, TermCond::Tangent);
        assert!(first.final_vel > 0.0);
        assert!(first.finalized);
        assert_eq!(p.goal(), at(10.0, 10.0));
    }

    #[test]
    fn test_parabolic_mode_queues_no_blend() {
        let mut p = planning(BlendMode::Parabolic);
        let mut q = SegmentQueue::new(100);
        p.add_line(&mut q, at(10.0, 0.0), &MoveParams::feed(50.0)).unwrap();
        p.add_line(&mut q, at(10.0, 10.0), &MoveParams::feed(50.0)).unwrap();
        assert_eq!(PlanQueue::len(&q), 2);
        assert_eq!(q.back(1).unwrap().term_cond, TermCond::Parabolic);
    }

    #[test]
    fn test_rapid_to_feed_stops() {
        let mut p = planning(BlendMode::Arc);
        let mut q = SegmentQueue::new(100);
        p.add_line(&mut q, at(10.0, 0.0), &MoveParams::traverse(100.0)).unwrap();
        p.add_line(&mut q, at(10.0, 10.0), &MoveParams::feed(50.0)).unwrap();
        assert_eq!(PlanQueue::len(&q), 2);
        assert_eq!(q.back(1).unwrap().term_cond, TermCond::Stop);
    }

    #[test]
    fn test_collinear_lines_handoff_tangent() {
        let mut p = planning(BlendMode::Arc);
        let mut q = SegmentQueue::new(100);
        p.add_line(&mut q, at(10.0, 0.0), &MoveParams::feed(50.0)).unwrap();
        p.add_line(&mut q, at(20.0, 0.0), &MoveParams::feed(50.0)).unwrap();
        assert_eq!(PlanQueue::len(&q), 2);
        let first = q.back(1).unwrap();
        assert_eq!(first.term_cond, TermCond::Tangent);
        assert!((first.final_vel - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_optimizer_respects_stopping_distance() {
        let mut p = planning(BlendMode::Arc);
        let mut q = SegmentQueue::new(100);
        for i in 1..=6 {
            p.add_line(&mut q, at(i as f64 * 0.1, 0.0), &MoveParams::feed(50.0)).unwrap();
        }
        // Each final velocity lets the successor reach its own final
        // velocity at the successor's acceleration
        let n = PlanQueue::len(&q);
        for k in 1..n {
            let seg = q.back(k).unwrap();
            let next = q.back(k - 1).unwrap();
            let a = next.tangential_max_accel();
            let bound = (next.final_vel * next.final_vel + 2.0 * a * next.target).sqrt();
            assert!(seg.final_vel <= bound + 1e-9);
        }
        assert_eq!(q.back(0).unwrap().final_vel, 0.0);
    }

    #[test]
    fn test_scurve_lookahead_fits_jerk_limited_stop() {
        let mut trap = planning(BlendMode::Arc);
        let mut scurve = planning(BlendMode::Arc).with_planner_type(PlannerType::SCurve);
        let mut qt = SegmentQueue::new(100);
        let mut qs = SegmentQueue::new(100);
        for i in 1..=6 {
            let end = at(i as f64 * 0.1, 0.0);
            trap.add_line(&mut qt, end, &MoveParams::feed(50.0)).unwrap();
            scurve.add_line(&mut qs, end, &MoveParams::feed(50.0)).unwrap();
        }

        let n = PlanQueue::len(&qs);
        for k in 1..n {
            let seg = qs.back(k).unwrap();
            let next = qs.back(k - 1).unwrap();
            let jerk = effective_jerk(next.max_jerk, 1e6);
            let bound = crate::motion::scurve_max_start_speed(
                next.target,
                next.final_vel,
                next.tangential_max_accel(),
                jerk,
            )
            .unwrap();
            assert!(seg.final_vel <= bound + 1e-9);
            assert!(seg.final_vel <= qt.back(k).unwrap().final_vel + 1e-9);
        }
        assert!(qs.back(1).unwrap().final_vel < qt.back(1).unwrap().final_vel);
    }

    #[test]
    fn test_pending_outputs_attach_to_next_segment() {
        let mut p = planning(BlendMode::Arc);
        let mut q = SegmentQueue::new(100);
        p.set_dout(3, true).unwrap();
        p.set_segment_actions(SegmentAction::SpindleCw, 0, 1000.0).unwrap();
        p.add_line(&mut q, at(1.0, 0.0), &MoveParams::feed(10.0)).unwrap();
        p.add_line(&mut q, at(2.0, 0.0), &MoveParams::feed(10.0)).unwrap();

        let first = ExecQueue::item(&q, 0).unwrap();
        assert!(first.syncdio.anychanged);
        assert!(first.actions.contains(SegmentAction::SpindleCw));
        let second = ExecQueue::item(&q, 1).unwrap();
        assert!(!second.syncdio.anychanged);
        assert!(second.actions.is_empty());
        assert_eq!(p.set_dout(64, true), Err(PlannerError::InvalidOutput(64).into()));
        assert_eq!(
            p.set_segment_actions(SegmentAction::SpindleOff, 2, 0.0),
            Err(PlannerError::InvalidSpindle(2).into())
        );
    }

    #[test]
    fn test_rigid_tap_needs_sync() {
        let mut p = planning(BlendMode::Arc);
        let mut q = SegmentQueue::new(100);
        let end = Cart3::new(0.0, 0.0, -5.0);
        assert_eq!(
            p.add_rigid_tap(&mut q, end, 1.0, &MoveParams::feed(5.0)),
            Err(PlannerError::NotSynchronized.into())
        );
        p.set_spindle_sync(0, 1.0, false).unwrap();
        p.add_rigid_tap(&mut q, end, 1.0, &MoveParams::feed(5.0)).unwrap();
        let tap = q.back(0).unwrap();
        assert_eq!(tap.motion_type(), MotionType::RigidTap);
        assert!(tap.atspeed);
        assert_eq!(tap.term_cond, TermCond::Stop);
        assert_eq!(p.goal(), Pose9::ZERO);
    }

    #[test]
    fn test_dwell_stops_previous_move() {
        let mut p = planning(BlendMode::Arc);
        let mut q = SegmentQueue::new(100);
        p.add_line(&mut q, at(1.0, 0.0), &MoveParams::feed(10.0)).unwrap();
        p.add_dwell(&mut q, 0.5, StateTag::line(7)).unwrap();
        assert_eq!(q.back(1).unwrap().term_cond, TermCond::Stop);
        let dwell = q.back(0).unwrap();
        assert_eq!(dwell.motion_type(), MotionType::Dwell);
        assert_eq!(dwell.dwell_remaining, 0.5);
        assert_eq!(dwell.tag.line_number, 7);
        assert_eq!(p.goal(), at(1.0, 0.0));
    }

    #[test]
    fn test_aborting_refuses_segments() {
        let mut p = planning(BlendMode::Arc);
        let mut q = SegmentQueue::new(100);
        p.control.request_abort();
        assert_eq!(
            p.add_line(&mut q, at(1.0, 0.0), &MoveParams::feed(10.0)),
            Err(PlannerError::Aborting.into())
        );
    }

    #[test]
    fn test_full_queue_refuses_segments() {
        let mut p = planning(BlendMode::Parabolic);
        let mut q = SegmentQueue::new(crate::consts::TC_QUEUE_MARGIN + 3);
        let mut added = 0;
        while p
            .add_line(&mut q, at(added as f64 + 1.0, 0.0), &MoveParams::feed(10.0))
            .is_ok()
        {
            added += 1;
        }
        assert_eq!(added, 3);
        assert_eq!(
            p.add_line(&mut q, at(100.0, 0.0), &MoveParams::feed(10.0)),
            Err(QueueError::Full.into())
        );
    }

    #[test]
    fn test_abort_epoch_resets_goal() {
        let mut p = planning(BlendMode::Arc);
        p.set_spindle_sync(0, 1.0, true).unwrap();
        p.control.finish_abort(&at(3.0, 4.0));
        assert!(p.sync_with_control());
        assert_eq!(p.goal(), at(3.0, 4.0));
        assert_eq!(p.modal().sync_mode, SyncMode::None);
        assert!(!p.sync_with_control());
    }

    #[test]
    fn test_blend_kind_logged_for_bezier() {
        let mut p = planning(BlendMode::Bezier);
        let mut q = SegmentQueue::new(100);
        p.add_line(&mut q, at(10.0, 0.0), &MoveParams::feed(50.0)).unwrap();
        p.add_line(&mut q, at(10.0, 10.0), &MoveParams::feed(50.0)).unwrap();
        assert_eq!(q.back(1).unwrap().motion_type(), MotionType::Bezier);
        let _ = BlendKind::Bezier;
    }
}
