//! The trajectory planner.
//!
//! [`TrajectoryPlanner`] runs both sides on one thread: motion commands go
//! in through the `add_*` calls and [`run_cycle`](TrajectoryPlanner::run_cycle)
//! is called once per servo period. For a realtime cycle on its own thread,
//! [`split`](TrajectoryPlanner::split) hands the two sides out separately.

mod control;
mod exec;
mod plan;
mod split;
mod status;

pub use control::ControlBlock;
pub use exec::Execution;
pub use plan::{MoveParams, Planning};
pub use split::{ExecHandle, PlanHandle, StagedQueue};
pub use status::MotionStatus;

use alloc::sync::Arc;

use crate::blend::BlendContext;
use crate::config::{
    validate_config, BlendSection, Hertz, MachineBounds, PlannerConfig, PlannerSection, PlannerType, Seconds,
    UnitsPerSec, UnitsPerSecCubed, UnitsPerSecSquared,
};
use crate::error::{ConfigError, Error, Result};
use crate::host::MotionHost;
use crate::math::{Cart3, Pose9};
use crate::queue::{ExecQueue, SegmentQueue};
use crate::segment::{AccelMode, CanonType, ModalState, SegmentAction, StateTag, TermCond};

/// Outcome of one servo cycle. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleStatus {
    /// Motion advanced normally.
    Ok,
    /// Nothing moved: the queue is empty, or the head waits for the
    /// spindle.
    Waiting,
    /// An abort is decelerating the machine.
    Slowing,
    /// An abort completed this cycle and the queue was dropped.
    Stopped,
}

/// Planner with both sides on one thread.
pub struct TrajectoryPlanner<H: MotionHost> {
    queue: SegmentQueue,
    planning: Planning,
    exec: Execution,
    control: Arc<ControlBlock>,
    host: H,
}

impl<H: MotionHost> TrajectoryPlanner<H> {
    /// Start building a planner.
    pub fn builder() -> TrajectoryPlannerBuilder<H> {
        TrajectoryPlannerBuilder::new()
    }

    // Queueing

    /// Queue a straight move to `end`.
    pub fn add_line(&mut self, end: Pose9, params: &MoveParams) -> Result<()> {
        self.planning.add_line(&mut self.queue, end, params)
    }

    /// Queue an arc to `end` about `center` in the plane normal to
    /// `normal`, with `turn` extra full turns.
    pub fn add_circle(&mut self, end: Pose9, center: Cart3, normal: Cart3, turn: i32, params: &MoveParams) -> Result<()> {
        self.planning
            .add_circle(&mut self.queue, end, center, normal, turn, params)
    }

    /// Queue a rigid tap down to `end` and back out.
    pub fn add_rigid_tap(&mut self, end: Cart3, reversal_scale: f64, params: &MoveParams) -> Result<()> {
        self.planning
            .add_rigid_tap(&mut self.queue, end, reversal_scale, params)
    }

    /// Queue a dwell of `seconds`.
    pub fn add_dwell(&mut self, seconds: f64, tag: StateTag) -> Result<()> {
        self.planning.add_dwell(&mut self.queue, seconds, tag)
    }

    // Modal settings

    /// Termination condition and blend tolerance for the following moves.
    pub fn set_term_cond(&mut self, term_cond: TermCond, tolerance: f64) -> Result<()> {
        self.planning.set_term_cond(term_cond, tolerance)
    }

    /// Default velocity ceiling.
    pub fn set_vmax(&mut self, vmax: f64) -> Result<()> {
        self.planning.set_vmax(vmax)
    }

    /// Default acceleration ceiling.
    pub fn set_amax(&mut self, amax: f64) -> Result<()> {
        self.planning.set_amax(amax)
    }

    /// Run-time velocity limit. Takes effect on the next cycle.
    pub fn set_vlimit(&self, vlimit: f64) {
        self.control.set_vlimit(vlimit);
    }

    /// Servo period.
    pub fn set_cycle_time(&mut self, cycle_time: f64) -> Result<()> {
        self.planning.set_cycle_time(cycle_time)?;
        self.exec.set_cycle_time(cycle_time);
        Ok(())
    }

    /// Spindle synchronization for the following moves. Zero `uu_per_rev`
    /// ends it.
    pub fn set_spindle_sync(&mut self, spindle: usize, uu_per_rev: f64, velocity_mode: bool) -> Result<()> {
        self.planning.set_spindle_sync(spindle, uu_per_rev, velocity_mode)
    }

    /// Digital output change applied when the next queued move starts.
    pub fn set_dout(&mut self, index: usize, on: bool) -> Result<()> {
        self.planning.set_dout(index, on)
    }

    /// Analog output change applied when the next queued move starts.
    pub fn set_aout(&mut self, index: usize, value: f64) -> Result<()> {
        self.planning.set_aout(index, value)
    }

    /// Drop output changes not yet attached to a move.
    pub fn clear_dios(&mut self) {
        self.planning.clear_dios();
    }

    /// Action fired when the next queued move starts.
    pub fn set_segment_actions(&mut self, action: SegmentAction, spindle: usize, value: f64) -> Result<()> {
        self.planning.set_segment_actions(action, spindle, value)
    }

    /// Teleport both the commanded and the goal position.
    pub fn set_pos(&mut self, pos: Pose9) -> Result<()> {
        self.exec.set_pos(pos)?;
        self.planning.set_pos(pos)
    }

    /// Run the queue backward through its history, or forward again.
    pub fn set_run_direction(&mut self, reverse: bool) -> Result<()> {
        self.exec.set_run_direction(reverse)
    }

    /// Drop every queued segment and reset to the commanded position.
    pub fn clear(&mut self) {
        ExecQueue::reset(&mut self.queue);
        self.control.resume();
        self.planning.clear(self.exec.pos());
        self.exec.clear();
    }

    // Motion control

    /// Decelerate to a stop and hold.
    pub fn pause(&self) {
        self.control.pause();
    }

    /// Continue after a pause.
    pub fn resume(&self) {
        self.control.resume();
    }

    /// Stop as fast as possible and drop the queue once at rest.
    pub fn abort(&mut self) {
        if self.control.request_abort() {
            tp_info!("abort requested");
        }
        self.planning.clear_dios();
    }

    /// Advance the queue by one servo period.
    pub fn run_cycle(&mut self) -> Result<CycleStatus> {
        let status = self.exec.run_cycle(&mut self.queue, &mut self.host)?;
        self.planning.sync_with_control();
        if ExecQueue::is_empty(&self.queue) {
            self.planning.reset_goal(self.exec.pos());
        }
        Ok(status)
    }

    /// Split into a planning handle and a cycle handle for separate
    /// threads. Segments already queued move to the cycle side.
    pub fn split(self) -> Result<(PlanHandle, ExecHandle<H>)> {
        split::split(self.queue, self.planning, self.exec, self.control, self.host)
    }

    // Status

    /// Commanded position.
    pub fn pos(&self) -> Pose9 {
        self.exec.pos()
    }

    /// End point of the last queued move.
    pub fn goal_pos(&self) -> Pose9 {
        self.planning.goal()
    }

    /// Queue empty and machine at rest.
    pub fn is_done(&self) -> bool {
        ExecQueue::is_empty(&self.queue) && !self.exec.is_moving()
    }

    /// Moving, or waiting on the spindle to start a move.
    pub fn is_moving(&self) -> bool {
        self.exec.is_moving()
    }

    /// Segments waiting, the executing one included.
    pub fn queue_depth(&self) -> usize {
        ExecQueue::len(&self.queue)
    }

    /// Lookahead depth reached for the executing segment.
    pub fn active_depth(&self) -> usize {
        self.exec.status().active_depth
    }

    /// Id of the executing segment.
    pub fn exec_id(&self) -> i64 {
        self.exec.status().exec_id
    }

    /// Interpreter tag of the most recently started segment.
    pub fn exec_tag(&self) -> StateTag {
        self.exec.exec_tag()
    }

    /// Kind of move executing.
    pub fn motion_type(&self) -> Option<CanonType> {
        self.exec.status().motion_type
    }

    /// Path velocity commanded in the last cycle.
    pub fn current_vel(&self) -> f64 {
        self.exec.status().current_vel
    }

    /// Feed programmed for the executing move.
    pub fn requested_vel(&self) -> f64 {
        self.exec.status().requested_vel
    }

    /// Path length left in the executing segment.
    pub fn distance_to_go(&self) -> f64 {
        self.exec.status().distance_to_go
    }

    /// Per-axis distance to the end of the executing segment.
    pub fn dtg_pose(&self) -> Pose9 {
        self.exec.status().dtg
    }

    /// Spindle synchronization established.
    pub fn spindle_sync_status(&self) -> bool {
        self.exec.status().spindle_sync
    }

    /// Full status snapshot of the last cycle.
    pub fn status(&self) -> &MotionStatus {
        self.exec.status()
    }

    /// Shared pause/abort/velocity-limit block.
    pub fn control(&self) -> Arc<ControlBlock> {
        Arc::clone(&self.control)
    }

    /// The machine interface.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The machine interface, mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

/// Builder for [`TrajectoryPlanner`].
///
/// `host`, `cycle_time`, `vmax` and `amax` are required, either set
/// directly or taken from a [`PlannerConfig`].
pub struct TrajectoryPlannerBuilder<H: MotionHost> {
    host: Option<H>,
    cycle_time: Option<f64>,
    vmax: Option<f64>,
    amax: Option<f64>,
    vlimit: Option<f64>,
    queue_size: usize,
    max_jerk: f64,
    max_feed_scale: f64,
    ramp_frequency: f64,
    term_cond: TermCond,
    tolerance: f64,
    accel_mode: AccelMode,
    planner_type: PlannerType,
    blend: BlendSection,
    bounds: MachineBounds,
}

impl<H: MotionHost> Default for TrajectoryPlannerBuilder<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: MotionHost> TrajectoryPlannerBuilder<H> {
    /// Builder with the configuration defaults.
    pub fn new() -> Self {
        Self {
            host: None,
            cycle_time: None,
            vmax: None,
            amax: None,
            vlimit: None,
            queue_size: 2000,
            max_jerk: 1.0e9,
            max_feed_scale: 1.0,
            ramp_frequency: 100.0,
            term_cond: TermCond::Parabolic,
            tolerance: 0.0,
            accel_mode: AccelMode::Trapezoidal,
            planner_type: PlannerType::Trapezoidal,
            blend: BlendSection::default(),
            bounds: MachineBounds::default(),
        }
    }

    /// Take every setting from a parsed configuration.
    pub fn from_config(mut self, config: &PlannerConfig) -> Self {
        let p = &config.planner;
        self.cycle_time = Some(p.cycle_time.0);
        self.queue_size = p.queue_size;
        self.vmax = Some(p.vmax.0);
        self.amax = Some(p.amax.0);
        self.vlimit = p.vlimit.map(|v| v.0);
        self.max_jerk = p.max_jerk.0;
        self.max_feed_scale = p.max_feed_scale;
        self.ramp_frequency = p.ramp_frequency.0;
        self.term_cond = p.term_cond;
        self.tolerance = p.tolerance;
        self.accel_mode = p.accel_mode;
        self.planner_type = p.planner_type;
        self.blend = config.blend.clone();
        self.bounds = config.bounds();
        self
    }

    /// Set the machine interface.
    pub fn host(mut self, host: H) -> Self {
        self.host = Some(host);
        self
    }

    /// Set the servo period in seconds.
    pub fn cycle_time(mut self, seconds: f64) -> Self {
        self.cycle_time = Some(seconds);
        self
    }

    /// Set the queue capacity.
    pub fn queue_size(mut self, size: usize) -> Self {
        self.queue_size = size;
        self
    }

    /// Set the default velocity ceiling.
    pub fn vmax(mut self, vmax: f64) -> Self {
        self.vmax = Some(vmax);
        self
    }

    /// Set the default acceleration ceiling.
    pub fn amax(mut self, amax: f64) -> Self {
        self.amax = Some(amax);
        self
    }

    /// Set the run-time velocity limit.
    pub fn vlimit(mut self, vlimit: f64) -> Self {
        self.vlimit = Some(vlimit);
        self
    }

    /// Set the largest feed override.
    pub fn max_feed_scale(mut self, scale: f64) -> Self {
        self.max_feed_scale = scale;
        self
    }

    /// Set the initial termination condition and tolerance.
    pub fn term_cond(mut self, term_cond: TermCond, tolerance: f64) -> Self {
        self.term_cond = term_cond;
        self.tolerance = tolerance;
        self
    }

    /// Set the jerk limit of moves that do not carry their own.
    pub fn max_jerk(mut self, jerk: f64) -> Self {
        self.max_jerk = jerk;
        self
    }

    /// Select the velocity law.
    pub fn planner_type(mut self, planner_type: PlannerType) -> Self {
        self.planner_type = planner_type;
        self
    }

    /// Set the blend settings.
    pub fn blend(mut self, blend: BlendSection) -> Self {
        self.blend = blend;
        self
    }

    /// Set the per-axis machine bounds.
    pub fn bounds(mut self, bounds: MachineBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Build the planner.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or a setting is out
    /// of range.
    pub fn build(self) -> Result<TrajectoryPlanner<H>> {
        let host = self.host.ok_or(Error::Config(ConfigError::MissingField("host")))?;
        let cycle_time = self
            .cycle_time
            .ok_or(Error::Config(ConfigError::MissingField("cycle_time")))?;
        let vmax = self.vmax.ok_or(Error::Config(ConfigError::MissingField("vmax")))?;
        let amax = self.amax.ok_or(Error::Config(ConfigError::MissingField("amax")))?;

        let config = PlannerConfig {
            planner: PlannerSection {
                cycle_time: Seconds(cycle_time),
                queue_size: self.queue_size,
                vmax: UnitsPerSec(vmax),
                vlimit: self.vlimit.map(UnitsPerSec),
                amax: UnitsPerSecSquared(amax),
                max_feed_scale: self.max_feed_scale,
                term_cond: self.term_cond,
                tolerance: self.tolerance,
                accel_mode: self.accel_mode,
                ramp_frequency: Hertz(self.ramp_frequency),
                max_jerk: UnitsPerSecCubed(self.max_jerk),
                planner_type: self.planner_type,
            },
            blend: self.blend,
            axes: Default::default(),
        };
        validate_config(&config)?;

        let modal = ModalState {
            term_cond: self.term_cond,
            tolerance: self.tolerance,
            accel_mode: self.accel_mode,
            ..ModalState::default()
        };
        let mut ctx = BlendContext::from_config(&config, modal);
        ctx.bounds = self.bounds;
        let vlimit = config.vlimit();
        let control = Arc::new(ControlBlock::new(vlimit));

        let max_jerk = config.planner.max_jerk.0;
        let planning = Planning::new(ctx, vmax, amax, max_jerk, host.spindle_count(), Arc::clone(&control))
            .with_planner_type(self.planner_type);
        let exec = Execution::new(
            cycle_time,
            config.planner.max_feed_scale,
            config.planner.ramp_frequency.0,
            Arc::clone(&control),
        )
        .with_planner_type(self.planner_type, max_jerk);

        tp_info!("planner ready, queue {} cycle {}", self.queue_size, cycle_time);
        Ok(TrajectoryPlanner {
            queue: SegmentQueue::new(self.queue_size),
            planning,
            exec,
            control,
            host,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlannerError;
    use crate::host::SimHost;

    fn planner() -> TrajectoryPlanner<SimHost> {
        TrajectoryPlanner::builder()
            .host(SimHost::new(1))
            .cycle_time(0.001)
            .vmax(100.0)
            .amax(1000.0)
            .queue_size(200)
            .build()
            .unwrap()
    }

    fn run_until_done(tp: &mut TrajectoryPlanner<SimHost>, max_cycles: usize) -> usize {
        for i in 0..max_cycles {
            tp.run_cycle().unwrap();
            if tp.is_done() {
                return i;
            }
        }
        panic!("planner did not finish in {} cycles", max_cycles);
    }

    #[test]
    fn test_builder_requires_host() {
        let result = TrajectoryPlannerBuilder::<SimHost>::new()
            .cycle_time(0.001)
            .vmax(1.0)
            .amax(1.0)
            .build();
        assert!(matches!(result, Err(Error::Config(ConfigError::MissingField("host")))));
    }

    #[test]
    fn test_builder_rejects_small_queue() {
        let result = TrajectoryPlanner::builder()
            .host(SimHost::new(1))
            .cycle_time(0.001)
            .vmax(1.0)
            .amax(1.0)
            .queue_size(10)
            .build();
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidQueueSize { size: 10, .. }))
        ));
    }

    #[test]
    fn test_line_runs_to_goal() {
        let mut tp = planner();
        let end = Pose9::from_xyz(5.0, 0.0, 0.0);
        tp.add_line(end, &MoveParams::feed(50.0)).unwrap();
        assert_eq!(tp.goal_pos(), end);
        assert!(!tp.is_done());
        run_until_done(&mut tp, 10_000);
        assert!((tp.pos().tran.x - 5.0).abs() < 1e-6);
        assert_eq!(tp.motion_type(), None);
    }

    #[test]
    fn test_abort_resets_goal_to_stop_position() {
        let mut tp = planner();
        tp.add_line(Pose9::from_xyz(50.0, 0.0, 0.0), &MoveParams::feed(50.0))
            .unwrap();
        for _ in 0..200 {
            tp.run_cycle().unwrap();
        }
        tp.abort();
        assert_eq!(
            tp.add_line(Pose9::from_xyz(1.0, 1.0, 0.0), &MoveParams::feed(10.0)),
            Err(PlannerError::Aborting.into())
        );
        let mut stopped = false;
        for _ in 0..2000 {
            if tp.run_cycle().unwrap() == CycleStatus::Stopped {
                stopped = true;
                break;
            }
        }
        assert!(stopped);
        assert!(tp.is_done());
        assert_eq!(tp.goal_pos(), tp.pos());
        assert!(tp.pos().tran.x < 50.0);
        tp.add_line(Pose9::from_xyz(0.0, 0.0, 0.0), &MoveParams::feed(50.0))
            .unwrap();
    }

    #[test]
    fn test_set_pos_moves_both_positions() {
        let mut tp = planner();
        let p = Pose9::from_xyz(1.0, 2.0, 3.0);
        tp.set_pos(p).unwrap();
        assert_eq!(tp.pos(), p);
        assert_eq!(tp.goal_pos(), p);
    }

    #[test]
    fn test_clear_drops_queue() {
        let mut tp = planner();
        tp.add_line(Pose9::from_xyz(5.0, 0.0, 0.0), &MoveParams::feed(50.0))
            .unwrap();
        tp.clear();
        assert!(tp.is_done());
        assert_eq!(tp.goal_pos(), Pose9::ZERO);
    }
}
