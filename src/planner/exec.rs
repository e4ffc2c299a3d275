//! The cycle: one call per servo period advances the queue head.
//!
//! [`Execution`] holds everything the cycle owns: the commanded position,
//! spindle synchronization bookkeeping and the status snapshot. The queue
//! and the host are passed in, so the same code drives the cooperative
//! [`SegmentQueue`](crate::queue::SegmentQueue) and the consumer half of a
//! split planner.

use alloc::sync::Arc;

use libm::{fabs, fmax, fmin, sqrt};

use crate::blend::compute_blend_velocity;
use crate::config::PlannerType;
use crate::consts::{TP_POS_EPSILON, TP_TIME_EPSILON, TP_VEL_EPSILON};
use crate::error::{PlannerError, Result};
use crate::host::MotionHost;
use crate::math::Pose9;
use crate::motion::{
    effective_jerk, end_condition_split, ramp_accel, scurve_accel, trapezoidal_accel, update_dist_from_accel,
    CycleLimits, EndCondition, FeedLimits,
};
use crate::queue::ExecQueue;
use crate::segment::{
    AccelMode, CanonType, Coords, MotionType, Segment, SegmentAction, SegmentActions, StateTag, SyncMode, TapAction,
    TermCond,
};

use super::control::ControlBlock;
use super::status::MotionStatus;
use super::CycleStatus;

/// Feed override state sampled once at the start of a cycle.
#[derive(Debug, Clone, Copy)]
struct Override {
    net_feed_scale: f64,
    pausing: bool,
    aborting: bool,
    stepping: bool,
    limits: FeedLimits,
}

impl Override {
    fn feed_scale(&self, tc: &Segment) -> f64 {
        let pausing = self.pausing && tc.sync_mode != SyncMode::Position;
        if pausing || self.aborting {
            0.0
        } else if tc.sync_mode == SyncMode::Position {
            1.0
        } else if tc.is_blending {
            fmin(self.net_feed_scale, 1.0)
        } else {
            self.net_feed_scale
        }
    }

    /// Feed-scaled target velocity, capped by every ceiling.
    fn target_vel(&self, tc: &Segment) -> f64 {
        let v = if tc.sync_mode != SyncMode::None {
            tc.target_vel
        } else {
            tc.req_vel
        };
        fmin(v * self.feed_scale(tc), self.limits.max_target_vel(tc))
    }

    /// Velocity `tc` should hand over to `next`.
    fn final_vel(&self, tc: &Segment, next: Option<&Segment>, reverse: bool) -> f64 {
        if self.stepping || tc.term_cond != TermCond::Tangent || reverse {
            return 0.0;
        }
        let v_next = next.map_or(0.0, |n| self.target_vel(n));
        fmin(tc.final_vel, fmin(self.target_vel(tc), v_next))
    }
}

/// Spindle bookkeeping for synchronized motion.
#[derive(Debug, Clone, Copy, Default)]
struct SpindleSync {
    num: usize,
    offset: f64,
    revs: f64,
    synced: bool,
    waiting_for_index: Option<i64>,
    waiting_for_atspeed: Option<i64>,
}

/// Consumer-side planner state.
#[derive(Debug)]
pub struct Execution {
    cycle_time: f64,
    max_feed_scale: f64,
    ramp_cutoff: f64,
    planner_type: PlannerType,
    max_jerk: f64,
    current_pos: Pose9,
    reverse_run: bool,
    spindle: SpindleSync,
    status: MotionStatus,
    control: Arc<ControlBlock>,
}

impl Execution {
    /// Executor for a servo period of `cycle_time` seconds.
    ///
    /// Short tangent segments lasting less than one period of
    /// `ramp_frequency` switch to the ramp law.
    pub fn new(cycle_time: f64, max_feed_scale: f64, ramp_frequency: f64, control: Arc<ControlBlock>) -> Self {
        Self {
            cycle_time,
            max_feed_scale,
            ramp_cutoff: 1.0 / fmax(ramp_frequency, TP_TIME_EPSILON),
            planner_type: PlannerType::Trapezoidal,
            max_jerk: 0.0,
            current_pos: Pose9::ZERO,
            reverse_run: false,
            spindle: SpindleSync::default(),
            status: MotionStatus::default(),
            control,
        }
    }

    /// Follow `planner_type`. With [`PlannerType::SCurve`] every segment
    /// is held to `max_jerk` or its own lower limit.
    pub fn with_planner_type(mut self, planner_type: PlannerType, max_jerk: f64) -> Self {
        self.planner_type = planner_type;
        self.max_jerk = max_jerk;
        self
    }

    /// Commanded position.
    #[inline]
    pub fn pos(&self) -> Pose9 {
        self.current_pos
    }

    /// Status written by the last cycle.
    #[inline]
    pub fn status(&self) -> &MotionStatus {
        &self.status
    }

    /// Running segments backward.
    #[inline]
    pub fn is_reverse(&self) -> bool {
        self.reverse_run
    }

    /// Servo period in seconds.
    #[inline]
    pub fn cycle_time(&self) -> f64 {
        self.cycle_time
    }

    /// Change the servo period.
    pub fn set_cycle_time(&mut self, cycle_time: f64) {
        self.cycle_time = cycle_time;
    }

    /// Machine is moving or waiting to start a move.
    pub fn is_moving(&self) -> bool {
        fabs(self.status.current_vel) >= TP_VEL_EPSILON
            || self.spindle.waiting_for_index.is_some()
            || self.spindle.waiting_for_atspeed.is_some()
    }

    /// Run segments backward through the history, or forward again.
    /// Refused while moving.
    pub fn set_run_direction(&mut self, reverse: bool) -> Result<()> {
        if self.is_moving() {
            tp_warn!("run direction change refused while moving");
            return Err(PlannerError::Moving.into());
        }
        self.reverse_run = reverse;
        Ok(())
    }

    /// Jump to `pos` without motion.
    pub fn set_pos(&mut self, pos: Pose9) -> Result<()> {
        if !pos.is_finite() {
            return Err(PlannerError::InvalidPose.into());
        }
        self.current_pos = pos;
        Ok(())
    }

    /// Forget every execution state except the position.
    pub fn clear(&mut self) {
        self.reverse_run = false;
        self.spindle = SpindleSync::default();
        self.status = MotionStatus::default();
    }

    /// Advance the queue head by one servo period.
    pub fn run_cycle<Q, H>(&mut self, q: &mut Q, host: &mut H) -> Result<CycleStatus>
    where
        Q: ExecQueue + ?Sized,
        H: MotionHost + ?Sized,
    {
        let ov = Override {
            net_feed_scale: host.net_feed_scale(),
            pausing: self.control.is_pausing(),
            aborting: self.control.is_aborting(),
            stepping: host.stepping(),
            limits: FeedLimits {
                max_feed_scale: self.max_feed_scale,
                vlimit: self.control.vlimit(),
            },
        };
        self.status.current_vel = 0.0;
        self.status.requested_vel = 0.0;
        self.status.distance_to_go = 0.0;
        self.status.queue_len = q.len();

        let reverse = self.reverse_run;
        let step = if reverse { -1 } else { 1 };
        let [tc, next, next2] = q.head_mut(step);
        let Some(tc) = tc else {
            self.handle_empty_queue();
            return Ok(CycleStatus::Waiting);
        };
        // Stepping and exact stops never look past the head
        let next = if ov.stepping || tc.term_cond == TermCond::Stop {
            None
        } else {
            next
        };

        if ov.aborting {
            let at_rest = fabs(tc.current_vel) < TP_VEL_EPSILON
                && next.as_deref().map_or(true, |n| fabs(n.current_vel) < TP_VEL_EPSILON);
            let waiting = self.spindle.waiting_for_index.is_some() || self.spindle.waiting_for_atspeed.is_some();
            if at_rest || waiting {
                q.reset();
                self.finish_abort();
                return Ok(CycleStatus::Stopped);
            }
        }

        if self.check_at_speed(tc, host) == CycleStatus::Waiting {
            return Ok(CycleStatus::Waiting);
        }

        if !tc.active && self.activate(tc, &ov, host)? == CycleStatus::Waiting {
            return Ok(CycleStatus::Waiting);
        }

        if tc.motion_type() == MotionType::RigidTap {
            self.update_rigid_tap(tc, host);
        }

        let mut next = next;
        match tc.sync_mode {
            SyncMode::None => self.spindle.synced = false,
            SyncMode::Velocity => self.sync_velocity(tc, next.as_deref_mut(), host),
            SyncMode::Position => self.sync_position(tc, next.as_deref_mut(), host),
        }
        self.status.spindle_sync = self.spindle.synced;

        tc.is_blending = false;
        if let Some(n) = next.as_deref_mut() {
            n.is_blending = false;
        }

        if tc.splitting {
            self.split_cycle(&ov, tc, next, next2.map(|n| &*n), host)?;
        } else {
            self.regular_cycle(&ov, tc, next, host)?;
        }

        if tc.remove {
            self.complete_segment(q, host);
        }

        Ok(if ov.aborting {
            CycleStatus::Slowing
        } else {
            CycleStatus::Ok
        })
    }

    fn handle_empty_queue(&mut self) {
        self.status.clear();
        if self.control.is_aborting() {
            self.finish_abort();
        } else if self.control.is_pausing() {
            self.control.resume();
        }
    }

    fn finish_abort(&mut self) {
        tp_info!("abort complete");
        self.reverse_run = false;
        self.spindle.synced = false;
        self.spindle.waiting_for_index = None;
        self.spindle.waiting_for_atspeed = None;
        self.status.clear();
        self.control.finish_abort(&self.current_pos);
    }

    fn check_at_speed<H: MotionHost + ?Sized>(&mut self, tc: &mut Segment, host: &mut H) -> CycleStatus {
        if self.spindle.waiting_for_index.is_some_and(|id| id != tc.id) {
            tp_warn!("segment {} no longer waiting for index", tc.id);
            self.spindle.waiting_for_index = None;
        }
        if self.spindle.waiting_for_atspeed.is_some_and(|id| id != tc.id) {
            tp_warn!("segment {} no longer waiting for spindle at speed", tc.id);
            self.spindle.waiting_for_atspeed = None;
        }

        if self.spindle.waiting_for_atspeed.is_some() {
            if !all_at_speed(host) {
                return CycleStatus::Waiting;
            }
            self.spindle.waiting_for_atspeed = None;
        }

        if self.spindle.waiting_for_index.is_some() {
            if host.spindle(self.spindle.num).index_enable {
                return CycleStatus::Waiting;
            }
            tp_debug!("index pulse seen, spindle synchronized");
            self.spindle.synced = true;
            self.spindle.waiting_for_index = None;
            self.spindle.revs = 0.0;
            tc.sync_accel = 1;
        }
        CycleStatus::Ok
    }

    fn activate<H: MotionHost + ?Sized>(&mut self, tc: &mut Segment, ov: &Override, host: &mut H) -> Result<CycleStatus> {
        if self.reverse_run && (tc.motion_type() == MotionType::RigidTap || tc.sync_mode != SyncMode::None) {
            tp_warn!("reverse run stopped at synchronized segment {}", tc.id);
            return Err(PlannerError::ReverseEmpty.into());
        }

        let length = tc.distance_to_go(self.reverse_run);
        if length > 0.0
            && tc.canon_type != CanonType::Traverse
            && tc.term_cond == TermCond::Tangent
            && tc.motion_type() != MotionType::RigidTap
        {
            let segment_time = 2.0 * length / (tc.current_vel + fmin(tc.final_vel, ov.target_vel(tc)));
            if segment_time < self.ramp_cutoff {
                tp_debug!("segment {} short enough to ramp", tc.id);
                tc.accel_mode = AccelMode::Ramp;
            }
        }

        if tc.sync_mode != SyncMode::None {
            self.spindle.num = tc.spindle_num;
        }
        let needs_atspeed = tc.atspeed || (tc.sync_mode == SyncMode::Position && !self.spindle.synced);
        if needs_atspeed && !all_at_speed(host) {
            self.spindle.waiting_for_atspeed = Some(tc.id);
            return Ok(CycleStatus::Waiting);
        }

        if let Some(axis) = tc.indexer {
            host.set_rotary_unlock(axis, true);
            if !host.rotary_is_unlocked(axis) {
                return Ok(CycleStatus::Waiting);
            }
        }

        tp_debug!("activating segment {}", tc.id);
        tc.active = true;
        tc.blending_next = false;
        tc.on_final_decel = false;
        self.status.motion_type = Some(tc.canon_type);
        self.status.exec_tag = tc.tag;
        fire_actions(&mut tc.actions, host);

        if tc.sync_mode == SyncMode::Position && !self.spindle.synced {
            tp_debug!("segment {} waiting for spindle index", tc.id);
            self.spindle.waiting_for_index = Some(tc.id);
            self.spindle.offset = 0.0;
            host.set_index_enable(self.spindle.num, true);
            return Ok(CycleStatus::Waiting);
        }
        Ok(CycleStatus::Ok)
    }

    fn update_rigid_tap<H: MotionHost + ?Sized>(&mut self, tc: &mut Segment, host: &mut H) {
        let spindle = host.spindle(self.spindle.num);
        let action = match &mut tc.coords {
            Coords::RigidTap(tap) => tap.update(
                signed_revs(spindle.revs, spindle.direction),
                self.spindle.offset,
                tc.uu_per_rev,
                &mut tc.progress,
                &mut tc.target,
            ),
            _ => TapAction::None,
        };
        match action {
            TapAction::None => {}
            TapAction::ScaleSpindle(factor) => host.set_spindle_speed(self.spindle.num, spindle.speed_cmd * factor),
            TapAction::Release => {
                tc.sync_mode = SyncMode::None;
                tc.target_vel = tc.max_vel;
            }
        }
    }

    fn sync_velocity<H: MotionHost + ?Sized>(&mut self, tc: &mut Segment, next: Option<&mut Segment>, host: &H) {
        let speed = host.spindle(self.spindle.num).speed_in;
        let mut v = fabs(speed) * tc.uu_per_rev;
        if let Some(n) = next.as_deref() {
            // Part of the feed already went into the blend with `next`
            v -= n.progress;
        }
        tc.target_vel = v;
        if let Some(n) = next {
            if n.sync_mode != SyncMode::None {
                n.target_vel = tc.target_vel;
            }
        }
    }

    fn sync_position<H: MotionHost + ?Sized>(&mut self, tc: &mut Segment, next: Option<&mut Segment>, host: &H) {
        let spindle = host.spindle(self.spindle.num);
        let spindle_pos = signed_revs(spindle.revs, spindle.direction);
        let old_revs = self.spindle.revs;

        self.spindle.revs = match &tc.coords {
            Coords::RigidTap(tap) if tap.counts_from_reversal() => tap.spindlerevs_at_reversal - spindle_pos,
            _ => spindle_pos,
        };

        let pos_desired = (self.spindle.revs - self.spindle.offset) * tc.uu_per_rev;
        let mut pos_error = pos_desired - tc.progress;
        if let Some(n) = next.as_deref() {
            pos_error -= n.progress;
        }

        if tc.sync_accel > 0 {
            // Catching up with the spindle from rest
            let dt = fmax(self.cycle_time, TP_TIME_EPSILON);
            let spindle_vel = self.spindle.revs / (dt * f64::from(tc.sync_accel));
            tc.sync_accel += 1;
            let target_vel = spindle_vel * tc.uu_per_rev;
            if tc.current_vel >= target_vel {
                tp_debug!("position sync reached spindle velocity");
                self.spindle.offset = self.spindle.revs - tc.progress / tc.uu_per_rev;
                tc.sync_accel = 0;
                tc.target_vel = target_vel;
            } else {
                tc.target_vel = tc.max_vel;
            }
        } else {
            let spindle_vel = (self.spindle.revs - old_revs) / fmax(self.cycle_time, TP_TIME_EPSILON);
            let target_vel = spindle_vel * tc.uu_per_rev;
            let mut error_vel = sqrt(fabs(pos_error) * tc.tangential_max_accel());
            if pos_error < 0.0 {
                error_vel = -error_vel;
            }
            tc.target_vel = target_vel + error_vel;
        }

        tc.target_vel = fmax(tc.target_vel, 0.0);
        if let Some(n) = next {
            if n.sync_mode != SyncMode::None {
                n.target_vel = tc.target_vel;
            }
        }
    }

    fn regular_cycle<H: MotionHost + ?Sized>(
        &mut self,
        ov: &Override,
        tc: &mut Segment,
        next: Option<&mut Segment>,
        host: &mut H,
    ) -> Result<()> {
        if tc.remove {
            return Ok(());
        }
        tc.cycle_time = self.cycle_time;
        self.update_cycle(ov, tc, next.as_deref())?;

        match next {
            Some(next) => {
                let v = compute_blend_velocity(tc, next, ov.target_vel(tc), ov.target_vel(next));
                tc.blend_vel = v.this;
                next.blend_vel = v.next;
                if is_blending(tc) {
                    return self.parabolic_blend(ov, tc, next, host);
                }
            }
            None => tc.blend_vel = 0.0,
        }
        toggle_dios(tc, host);
        self.status.update(tc, &self.current_pos);
        Ok(())
    }

    fn split_cycle<H: MotionHost + ?Sized>(
        &mut self,
        ov: &Override,
        tc: &mut Segment,
        next: Option<&mut Segment>,
        next2: Option<&Segment>,
        host: &mut H,
    ) -> Result<()> {
        if tc.remove {
            return Ok(());
        }
        let before = tc.pos()?;
        tc.progress = tc.end_progress(self.reverse_run);
        let after = tc.pos()?;
        self.add_current_pos(after - before)?;
        tc.remove = true;

        let Some(next) = next else {
            tp_debug!("split cycle without a next segment");
            return Ok(());
        };
        if tc.term_cond == TermCond::Tangent {
            next.cycle_time = self.cycle_time - tc.cycle_time;
            next.current_vel = tc.term_vel;
            next.current_acc = tc.current_acc;
        }
        self.update_cycle(ov, next, next2)?;

        if tc.cycle_time > next.cycle_time && tc.term_cond == TermCond::Tangent {
            toggle_dios(tc, host);
            self.status.update(tc, &self.current_pos);
        } else {
            toggle_dios(next, host);
            self.status.update(next, &self.current_pos);
        }
        Ok(())
    }

    fn parabolic_blend<H: MotionHost + ?Sized>(
        &mut self,
        ov: &Override,
        tc: &mut Segment,
        next: &mut Segment,
        host: &mut H,
    ) -> Result<()> {
        let mut saved_vel = next.target_vel;
        if ov.feed_scale(next) > TP_VEL_EPSILON {
            let dv = tc.vel_at_blend_start - tc.current_vel;
            let vel_start = fmax(tc.vel_at_blend_start, TP_VEL_EPSILON);
            let blend_progress = (dv / vel_start).clamp(0.0, 1.0);
            let blend_scale = tc.vel_at_blend_start / fmax(tc.blend_vel, TP_VEL_EPSILON);
            next.target_vel = blend_progress * next.blend_vel * blend_scale;
            next.is_blending = true;
        } else {
            next.target_vel = 0.0;
            saved_vel = 0.0;
        }
        self.update_cycle(ov, next, None)?;
        next.target_vel = saved_vel;

        if tc.current_vel > next.current_vel {
            self.status.update(tc, &self.current_pos);
        } else {
            toggle_dios(next, host);
            self.status.update(next, &self.current_pos);
        }
        self.status.current_vel = tc.current_vel + next.current_vel;
        Ok(())
    }

    fn update_cycle(&mut self, ov: &Override, tc: &mut Segment, next: Option<&Segment>) -> Result<()> {
        if tc.motion_type() == MotionType::Dwell {
            tc.dwell_remaining -= tc.cycle_time;
            tc.current_vel = 0.0;
            tc.current_acc = 0.0;
            if tc.dwell_remaining <= 0.0 {
                tc.dwell_remaining = 0.0;
                tc.remove = true;
            }
            return Ok(());
        }

        let reverse = self.reverse_run;
        let before = tc.pos()?;
        if !tc.blending_next {
            tc.vel_at_blend_start = tc.current_vel;
        }

        let limits = CycleLimits {
            target_vel: ov.target_vel(tc),
            final_vel: ov.final_vel(tc, next, reverse),
            max_accel: tc.tangential_max_accel(),
        };
        let cmd = match self.planner_type {
            PlannerType::SCurve => scurve_accel(tc, &limits, effective_jerk(tc.max_jerk, self.max_jerk), reverse),
            PlannerType::Trapezoidal if tc.accel_mode == AccelMode::Ramp && tc.term_cond == TermCond::Tangent => {
                ramp_accel(tc, &limits, reverse)
            }
            PlannerType::Trapezoidal => None,
        };
        let cmd = match cmd {
            Some(cmd) => cmd,
            None => trapezoidal_accel(tc, &limits, reverse),
        };
        update_dist_from_accel(tc, cmd, reverse);
        self.check_end_condition(ov, tc, next);

        let after = tc.pos()?;
        self.add_current_pos(after - before)
    }

    fn check_end_condition(&self, ov: &Override, tc: &mut Segment, next: Option<&Segment>) {
        let reverse = self.reverse_run;
        tc.cycle_time = self.cycle_time;
        let dx = tc.distance_to_go(reverse);
        let stops = tc.term_cond == TermCond::Stop
            || (tc.term_cond != TermCond::Tangent && tc.final_vel <= TP_VEL_EPSILON);

        if dx <= TP_POS_EPSILON {
            tc.progress = tc.end_progress(reverse);
            if !reverse {
                set_split(tc, 0.0, tc.current_vel);
            }
            if stops || reverse {
                tc.remove = true;
            }
            return;
        }
        if reverse || stops {
            return;
        }

        let v_f = ov.final_vel(tc, next, reverse);
        match end_condition_split(dx, tc.current_vel, v_f, tc.tangential_max_accel(), self.cycle_time) {
            EndCondition::Continue => {}
            EndCondition::Done { final_vel } => {
                tc.progress = tc.target;
                set_split(tc, 0.0, final_vel);
            }
            EndCondition::Split { time, final_vel } => set_split(tc, time, final_vel),
        }
    }

    fn complete_segment<Q, H>(&mut self, q: &mut Q, host: &mut H)
    where
        Q: ExecQueue + ?Sized,
        H: MotionHost + ?Sized,
    {
        let Some(tc) = q.item_mut(0) else {
            return;
        };
        if self.spindle.waiting_for_atspeed == Some(tc.id) {
            return;
        }
        self.spindle.offset = if tc.sync_mode != SyncMode::None && tc.uu_per_rev != 0.0 {
            self.spindle.offset + tc.target / tc.uu_per_rev
        } else {
            0.0
        };
        if let Some(axis) = tc.indexer {
            host.set_rotary_unlock(axis, false);
            if host.rotary_is_unlocked(axis) {
                return;
            }
        }

        tp_debug!("segment {} complete", tc.id);
        tc.active = false;
        tc.remove = false;
        tc.is_blending = false;
        tc.splitting = false;
        tc.cycle_time = self.cycle_time;
        tc.current_vel = 0.0;
        tc.current_acc = 0.0;
        tc.term_vel = 0.0;

        let res = if self.reverse_run { q.back_step() } else { q.pop() };
        if let Err(e) = res {
            tp_error!("failed to retire segment: {:?}", e);
        }
        // Last segment retired: report idle at the final position
        if q.is_empty() {
            self.status.clear();
        }
    }

    fn add_current_pos(&mut self, displacement: Pose9) -> Result<()> {
        if !displacement.is_finite() {
            tp_error!("non-finite displacement");
            return Err(PlannerError::InvalidPose.into());
        }
        self.current_pos = self.current_pos + displacement;
        Ok(())
    }

    /// Exec tag of the segment most recently activated.
    pub fn exec_tag(&self) -> StateTag {
        self.status.exec_tag
    }
}

fn all_at_speed<H: MotionHost + ?Sized>(host: &H) -> bool {
    (0..host.spindle_count()).all(|n| host.spindle(n).at_speed)
}

fn signed_revs(revs: f64, direction: i8) -> f64 {
    if direction < 0 {
        -revs
    } else {
        revs
    }
}

fn set_split(tc: &mut Segment, time: f64, final_vel: f64) {
    if tc.splitting && time > 0.0 {
        tp_error!("segment {} already splitting", tc.id);
        return;
    }
    tc.splitting = true;
    tc.cycle_time = time;
    tc.term_vel = final_vel;
}

/// Latch the start of a parabolic blend once `tc` decelerates below its
/// blend velocity.
fn is_blending(tc: &mut Segment) -> bool {
    let start = tc.term_cond == TermCond::Parabolic
        && tc.on_final_decel
        && tc.current_vel < tc.blend_vel
        && tc.motion_type() != MotionType::RigidTap;
    tc.blending_next |= start;
    tc.blending_next
}

fn toggle_dios<H: MotionHost + ?Sized>(tc: &mut Segment, host: &mut H) {
    if !tc.syncdio.anychanged {
        return;
    }
    for (index, on) in tc.syncdio.digital_writes() {
        host.write_dio(index, on);
    }
    for (index, value) in tc.syncdio.analog_writes() {
        host.write_aio(index, value);
    }
    tc.syncdio.anychanged = false;
}

fn fire_actions<H: MotionHost + ?Sized>(actions: &mut SegmentActions, host: &mut H) {
    if actions.is_empty() {
        return;
    }
    let n = actions.spindle_num;
    let spindle_action = actions.contains(SegmentAction::SpindleCw)
        || actions.contains(SegmentAction::SpindleCcw)
        || actions.contains(SegmentAction::SpindleOff);
    if spindle_action && n >= host.spindle_count() {
        tp_error!("segment action for invalid spindle {}", n);
        actions.clear();
        return;
    }

    if actions.contains(SegmentAction::SpindleCw) {
        host.set_spindle_state(n, true, 1);
        host.set_spindle_speed(n, actions.spindle_speed);
        host.set_spindle_brake(n, false);
    }
    if actions.contains(SegmentAction::SpindleCcw) {
        host.set_spindle_state(n, true, -1);
        host.set_spindle_speed(n, -actions.spindle_speed);
        host.set_spindle_brake(n, false);
    }
    if actions.contains(SegmentAction::SpindleOff) {
        host.set_spindle_state(n, false, 0);
        host.set_spindle_speed(n, 0.0);
        host.set_spindle_brake(n, true);
    }
    if actions.contains(SegmentAction::CoolantMist) {
        host.write_dio(0, true);
    }
    if actions.contains(SegmentAction::CoolantFlood) {
        host.write_dio(1, true);
    }
    if actions.contains(SegmentAction::CoolantOff) {
        host.write_dio(0, false);
        host.write_dio(1, false);
    }
    if actions.contains(SegmentAction::Custom) {
        host.custom_action(actions.custom_value);
    }
    actions.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostCall, SimHost};
    use crate::math::Pose9;
    use crate::queue::{PlanQueue, SegmentQueue};

    fn exec() -> Execution {
        Execution::new(0.001, 1.0, 100.0, Arc::new(ControlBlock::default()))
    }

    fn line(id: i64, start: Pose9, end: Pose9, vel: f64) -> Segment {
        let mut s = Segment::new(Coords::line(&start, &end), 0.001, CanonType::Feed, 0, false);
        s.setup_motion(vel, 100.0, 1000.0, 1e6);
        s.target = s.coords.length();
        s.nominal_length = s.target;
        s.term_cond = TermCond::Stop;
        s.id = id;
        s
    }

    fn run_until_empty(e: &mut Execution, q: &mut SegmentQueue, host: &mut SimHost) -> usize {
        let mut cycles = 0;
        while !ExecQueue::is_empty(q) && cycles < 1_000_000 {
            e.run_cycle(q, host).unwrap();
            cycles += 1;
        }
        cycles
    }

    #[test]
    fn test_empty_queue_waits() {
        let mut e = exec();
        let mut q = SegmentQueue::new(100);
        let mut host = SimHost::new(1);
        assert_eq!(e.run_cycle(&mut q, &mut host).unwrap(), CycleStatus::Waiting);
        assert_eq!(e.pos(), Pose9::ZERO);
    }

    #[test]
    fn test_single_line_reaches_end() {
        let mut e = exec();
        let mut q = SegmentQueue::new(100);
        let mut host = SimHost::new(1);
        q.put(line(0, Pose9::ZERO, Pose9::from_xyz(1.0, 0.0, 0.0), 10.0)).unwrap();

        let cycles = run_until_empty(&mut e, &mut q, &mut host);
        // 10 ms ramps at each end and 90 ms of cruise
        assert!(cycles > 50 && cycles < 200, "took {} cycles", cycles);
        assert!((e.pos().tran.x - 1.0).abs() < 1e-9);
        assert_eq!(q.history_len(), 1);
    }

    #[test]
    fn test_status_idle_once_last_segment_retires() {
        let mut e = exec();
        let mut q = SegmentQueue::new(100);
        let mut host = SimHost::new(1);
        q.put(line(7, Pose9::ZERO, Pose9::from_xyz(1.0, 0.0, 0.0), 10.0)).unwrap();

        e.run_cycle(&mut q, &mut host).unwrap();
        assert_eq!(e.status().motion_type, Some(CanonType::Feed));
        assert_eq!(e.status().exec_id, 7);

        run_until_empty(&mut e, &mut q, &mut host);
        let status = e.status();
        assert_eq!(status.motion_type, None);
        assert_eq!(status.current_vel, 0.0);
        assert_eq!(status.requested_vel, 0.0);
        assert_eq!(status.distance_to_go, 0.0);
        assert_eq!(status.exec_id, 0);
        assert_eq!(status.queue_len, 0);
        assert!((e.pos().tran.x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_and_acceleration_bounded() {
        let mut e = exec();
        let mut q = SegmentQueue::new(100);
        let mut host = SimHost::new(1);
        q.put(line(0, Pose9::ZERO, Pose9::from_xyz(5.0, 0.0, 0.0), 20.0)).unwrap();

        let mut last_v = 0.0;
        while !ExecQueue::is_empty(&q) {
            e.run_cycle(&mut q, &mut host).unwrap();
            let v = e.status().current_vel;
            assert!(v <= 20.0 + 1e-9);
            assert!((v - last_v).abs() <= 1000.0 * 0.001 + 1e-9);
            last_v = v;
        }
    }

    #[test]
    fn test_scurve_jerk_bounded() {
        let jerk = 1e5;
        let mut e = exec().with_planner_type(PlannerType::SCurve, jerk);
        let mut q = SegmentQueue::new(100);
        let mut host = SimHost::new(1);
        q.put(line(0, Pose9::ZERO, Pose9::from_xyz(5.0, 0.0, 0.0), 20.0)).unwrap();

        let mut last_v = 0.0;
        let mut last_a = 0.0;
        let mut cycles = 0;
        while !ExecQueue::is_empty(&q) && cycles < 100_000 {
            e.run_cycle(&mut q, &mut host).unwrap();
            cycles += 1;
            let v = e.status().current_vel;
            let a = (v - last_v) / 0.001;
            assert!(v <= 20.0 + 1e-9);
            assert!(a.abs() <= 1000.0 + 1e-6);
            assert!((a - last_a).abs() <= jerk * 0.001 + 1e-6, "cycle {}: {} after {}", cycles, a, last_a);
            last_v = v;
            last_a = a;
        }
        assert!(ExecQueue::is_empty(&q));
        assert!((e.pos().tran.x - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_pause_holds_position() {
        let mut e = exec();
        let mut q = SegmentQueue::new(100);
        let mut host = SimHost::new(1);
        q.put(line(0, Pose9::ZERO, Pose9::from_xyz(10.0, 0.0, 0.0), 50.0)).unwrap();
        for _ in 0..100 {
            e.run_cycle(&mut q, &mut host).unwrap();
        }
        e.control.pause();
        for _ in 0..200 {
            e.run_cycle(&mut q, &mut host).unwrap();
        }
        let held = e.pos();
        e.run_cycle(&mut q, &mut host).unwrap();
        assert_eq!(e.pos(), held);
        assert!(held.tran.x < 10.0);
        assert!(!e.is_moving());
    }

    #[test]
    fn test_atspeed_wait() {
        let mut e = exec();
        let mut q = SegmentQueue::new(100);
        let mut host = SimHost::new(1);
        host.spindles[0].at_speed = false;
        let mut s = line(0, Pose9::ZERO, Pose9::from_xyz(1.0, 0.0, 0.0), 10.0);
        s.atspeed = true;
        q.put(s).unwrap();

        for _ in 0..5 {
            assert_eq!(e.run_cycle(&mut q, &mut host).unwrap(), CycleStatus::Waiting);
        }
        assert_eq!(ExecQueue::item(&q, 0).unwrap().progress, 0.0);
        assert!(e.is_moving());
        host.spindles[0].at_speed = true;
        assert_eq!(e.run_cycle(&mut q, &mut host).unwrap(), CycleStatus::Ok);
        assert!(ExecQueue::item(&q, 0).unwrap().progress > 0.0);
    }

    #[test]
    fn test_sync_dio_written_at_start() {
        let mut e = exec();
        let mut q = SegmentQueue::new(100);
        let mut host = SimHost::new(1);
        let mut s = line(0, Pose9::ZERO, Pose9::from_xyz(1.0, 0.0, 0.0), 10.0);
        s.syncdio.set_dout(4, true);
        s.syncdio.set_aout(2, 1.5);
        q.put(s).unwrap();

        e.run_cycle(&mut q, &mut host).unwrap();
        assert_eq!(host.dio_writes().collect::<alloc::vec::Vec<_>>(), [(4, true)]);
        assert_eq!(host.aio_writes().collect::<alloc::vec::Vec<_>>(), [(2, 1.5)]);
        host.clear_calls();
        e.run_cycle(&mut q, &mut host).unwrap();
        assert_eq!(host.dio_writes().count(), 0);
    }

    #[test]
    fn test_spindle_actions_fire_on_activation() {
        let mut e = exec();
        let mut q = SegmentQueue::new(100);
        let mut host = SimHost::new(1);
        let mut s = line(0, Pose9::ZERO, Pose9::from_xyz(1.0, 0.0, 0.0), 10.0);
        s.actions.set(SegmentAction::SpindleCcw, 0, 800.0);
        s.actions.set(SegmentAction::CoolantFlood, 0, 0.0);
        q.put(s).unwrap();

        e.run_cycle(&mut q, &mut host).unwrap();
        assert!(host.calls.contains(&HostCall::SpindleState(0, true, -1)));
        assert!(host.calls.contains(&HostCall::SpindleSpeed(0, -800.0)));
        assert!(host.calls.contains(&HostCall::Dio(1, true)));
        assert!(ExecQueue::item(&q, 0).unwrap().actions.is_empty());
    }

    #[test]
    fn test_dwell_lasts_its_time() {
        let mut e = exec();
        let mut q = SegmentQueue::new(100);
        let mut host = SimHost::new(1);
        let mut d = Segment::new(Coords::Dwell { pos: Pose9::ZERO }, 0.001, CanonType::Feed, 0, false);
        d.term_cond = TermCond::Stop;
        d.dwell_time = 0.0105;
        d.dwell_remaining = 0.0105;
        q.put(d).unwrap();

        let cycles = run_until_empty(&mut e, &mut q, &mut host);
        assert_eq!(cycles, 11);
        assert_eq!(e.pos(), Pose9::ZERO);
    }

    #[test]
    fn test_tangent_handoff_keeps_velocity() {
        let mut e = exec();
        let mut q = SegmentQueue::new(100);
        let mut host = SimHost::new(1);
        let mut a = line(0, Pose9::ZERO, Pose9::from_xyz(2.0, 0.0, 0.0), 20.0);
        a.term_cond = TermCond::Tangent;
        a.final_vel = 20.0;
        a.finalized = true;
        let b = line(1, Pose9::from_xyz(2.0, 0.0, 0.0), Pose9::from_xyz(4.0, 0.0, 0.0), 20.0);
        q.put(a).unwrap();
        q.put(b).unwrap();

        let mut min_cruise = f64::MAX;
        let mut cruising = false;
        while !ExecQueue::is_empty(&q) {
            e.run_cycle(&mut q, &mut host).unwrap();
            let v = e.status().current_vel;
            if v > 19.999 {
                cruising = true;
            }
            if cruising && e.pos().tran.x < 3.0 {
                min_cruise = min_cruise.min(v);
            }
        }
        assert!(min_cruise > 19.99, "velocity dipped to {}", min_cruise);
        assert!((e.pos().tran.x - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_abort_stops_and_clears() {
        let control = Arc::new(ControlBlock::default());
        let mut e = Execution::new(0.001, 1.0, 100.0, control.clone());
        let mut q = SegmentQueue::new(100);
        let mut host = SimHost::new(1);
        q.put(line(0, Pose9::ZERO, Pose9::from_xyz(10.0, 0.0, 0.0), 50.0)).unwrap();
        for _ in 0..100 {
            e.run_cycle(&mut q, &mut host).unwrap();
        }
        control.request_abort();
        let mut last = CycleStatus::Ok;
        for _ in 0..1000 {
            last = e.run_cycle(&mut q, &mut host).unwrap();
            if last == CycleStatus::Stopped {
                break;
            }
            assert_eq!(last, CycleStatus::Slowing);
        }
        assert_eq!(last, CycleStatus::Stopped);
        assert!(ExecQueue::is_empty(&q));
        assert_eq!(control.stop_epoch(), 1);
        assert_eq!(control.stop_pos(), e.pos());
        assert!(!control.is_pausing());
    }

    #[test]
    fn test_reverse_refused_while_moving() {
        let mut e = exec();
        let mut q = SegmentQueue::new(100);
        let mut host = SimHost::new(1);
        q.put(line(0, Pose9::ZERO, Pose9::from_xyz(10.0, 0.0, 0.0), 50.0)).unwrap();
        for _ in 0..10 {
            e.run_cycle(&mut q, &mut host).unwrap();
        }
        assert_eq!(
            e.set_run_direction(true),
            Err(crate::error::Error::Planner(PlannerError::Moving))
        );
    }

    #[test]
    fn test_reverse_run_retraces_history() {
        let mut e = exec();
        let mut q = SegmentQueue::new(100);
        let mut host = SimHost::new(1);
        q.put(line(0, Pose9::ZERO, Pose9::from_xyz(1.0, 0.0, 0.0), 10.0)).unwrap();
        q.put(line(1, Pose9::from_xyz(1.0, 0.0, 0.0), Pose9::from_xyz(2.0, 0.0, 0.0), 10.0)).unwrap();
        // Stop partway through the second segment
        while ExecQueue::len(&q) == 2 {
            e.run_cycle(&mut q, &mut host).unwrap();
        }
        for _ in 0..50 {
            e.run_cycle(&mut q, &mut host).unwrap();
        }
        e.control.pause();
        while e.is_moving() || e.status().motion_type.is_none() {
            e.run_cycle(&mut q, &mut host).unwrap();
        }
        let paused_at = e.pos().tran.x;
        assert!(paused_at > 1.0 && paused_at < 2.0);

        e.set_run_direction(true).unwrap();
        e.control.resume();
        for _ in 0..2000 {
            e.run_cycle(&mut q, &mut host).unwrap();
        }
        assert!(e.pos().tran.x < 1.0, "only reversed to {}", e.pos().tran.x);
    }

    #[test]
    fn test_fire_actions_rejects_bad_spindle() {
        let mut host = SimHost::new(1);
        let mut a = SegmentActions::default();
        a.set(SegmentAction::SpindleCw, 3, 100.0);
        fire_actions(&mut a, &mut host);
        assert!(host.calls.is_empty());
        assert!(a.is_empty());
    }
}
