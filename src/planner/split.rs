//! Planning and cycle on separate threads.
//!
//! The planning thread keeps the newest segments in a staged window where
//! blends and the optimizer may still revise them. Segments leave the
//! window through the SPSC ring once they fall behind the lookahead depth,
//! once they end in a full stop, or on [`PlanHandle::flush`]. The cycle
//! thread only ever sees published segments.

use alloc::collections::VecDeque;
use alloc::sync::Arc;

use crate::error::{QueueError, Result};
use crate::host::MotionHost;
use crate::math::{Cart3, Pose9};
use crate::queue::spsc::{self, Consumer, Producer};
use crate::queue::{ExecQueue, PlanQueue, SegmentQueue};
use crate::segment::{Segment, SegmentAction, StateTag, TermCond};

use super::control::ControlBlock;
use super::exec::Execution;
use super::plan::{MoveParams, Planning};
use super::status::MotionStatus;
use super::CycleStatus;

/// Producer-side queue: a staged window in front of the ring.
pub struct StagedQueue {
    window: VecDeque<Segment>,
    depth: usize,
    producer: Producer,
}

impl StagedQueue {
    /// Stage up to `depth` segments in front of `producer`.
    pub fn new(producer: Producer, depth: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(depth + 2),
            depth,
            producer,
        }
    }

    /// Segments still revisable.
    pub fn staged(&self) -> usize {
        self.window.len()
    }

    /// Segments published and not yet retired by the cycle.
    pub fn published(&self) -> usize {
        self.producer.len()
    }

    /// Publish every staged segment the ring has room for.
    pub fn flush(&mut self) -> core::result::Result<(), QueueError> {
        self.publish_front(self.window.len())
    }

    /// Drop the staged window.
    pub fn discard(&mut self) {
        self.window.clear();
    }

    /// Publish everything up to the last staged segment that ends in a full
    /// stop, the tail excepted. Nothing behind such a stop can be blended
    /// or re-optimized any more.
    fn publish_settled(&mut self) -> core::result::Result<(), QueueError> {
        let settled = self
            .window
            .iter()
            .take(self.window.len().saturating_sub(1))
            .rposition(|s| s.term_cond == TermCond::Stop);
        match settled {
            Some(i) => self.publish_front(i + 1),
            None => Ok(()),
        }
    }

    fn publish_front(&mut self, count: usize) -> core::result::Result<(), QueueError> {
        for _ in 0..count {
            if self.producer.is_full() {
                return Err(QueueError::Full);
            }
            match self.window.pop_front() {
                Some(seg) => self.producer.put(seg)?,
                None => break,
            }
        }
        Ok(())
    }
}

impl PlanQueue for StagedQueue {
    fn len(&self) -> usize {
        self.window.len()
    }

    fn is_full(&self) -> bool {
        self.producer.is_full() && self.window.len() >= self.depth
    }

    fn put(&mut self, seg: Segment) -> core::result::Result<(), QueueError> {
        self.window.push_back(seg);
        let excess = self.window.len().saturating_sub(self.depth);
        // A full ring leaves the excess staged; is_full stops new segments
        let _ = self.publish_front(excess);
        Ok(())
    }

    fn pop_back(&mut self) -> core::result::Result<Segment, QueueError> {
        self.window.pop_back().ok_or(QueueError::Empty)
    }

    fn back(&self, n: usize) -> Option<&Segment> {
        let i = self.window.len().checked_sub(n + 1)?;
        self.window.get(i)
    }

    fn back_mut(&mut self, n: usize) -> Option<&mut Segment> {
        let i = self.window.len().checked_sub(n + 1)?;
        self.window.get_mut(i)
    }

    fn back_pair_mut(&mut self, n: usize) -> Option<(&mut Segment, &mut Segment)> {
        let i = self.window.len().checked_sub(n + 2)?;
        let slots = self.window.make_contiguous();
        let (head, tail) = slots.split_at_mut(i + 1);
        Some((&mut head[i], &mut tail[0]))
    }
}

/// Planning half of a split planner.
pub struct PlanHandle {
    planning: Planning,
    queue: StagedQueue,
    control: Arc<ControlBlock>,
}

impl PlanHandle {
    /// Drop staged work made stale by a completed abort.
    fn sync(&mut self) {
        if self.planning.sync_with_control() {
            tp_debug!("dropping {} staged segments after abort", self.queue.staged());
            self.queue.discard();
        }
    }

    fn settle(&mut self) -> Result<()> {
        if self.control.is_aborting() {
            return Ok(());
        }
        self.queue.publish_settled()?;
        Ok(())
    }

    /// Queue a straight move to `end`.
    pub fn add_line(&mut self, end: Pose9, params: &MoveParams) -> Result<()> {
        self.sync();
        self.planning.add_line(&mut self.queue, end, params)?;
        self.settle()
    }

    /// Queue an arc to `end`.
    pub fn add_circle(&mut self, end: Pose9, center: Cart3, normal: Cart3, turn: i32, params: &MoveParams) -> Result<()> {
        self.sync();
        self.planning
            .add_circle(&mut self.queue, end, center, normal, turn, params)?;
        self.settle()
    }

    /// Queue a rigid tap and publish it at once.
    pub fn add_rigid_tap(&mut self, end: Cart3, reversal_scale: f64, params: &MoveParams) -> Result<()> {
        self.sync();
        self.planning
            .add_rigid_tap(&mut self.queue, end, reversal_scale, params)?;
        self.flush()
    }

    /// Queue a dwell and publish it at once.
    pub fn add_dwell(&mut self, seconds: f64, tag: StateTag) -> Result<()> {
        self.sync();
        self.planning.add_dwell(&mut self.queue, seconds, tag)?;
        self.flush()
    }

    /// Publish every staged segment. Call when no more motion is coming
    /// for now; the cycle never sees staged segments.
    pub fn flush(&mut self) -> Result<()> {
        self.sync();
        if self.control.is_aborting() {
            return Ok(());
        }
        self.queue.flush()?;
        Ok(())
    }

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

    /// Spindle synchronization for the following moves.
    pub fn set_spindle_sync(&mut self, spindle: usize, uu_per_rev: f64, velocity_mode: bool) -> Result<()> {
        self.sync();
        self.planning.set_spindle_sync(spindle, uu_per_rev, velocity_mode)
    }

    /// Digital output change for the next queued move.
    pub fn set_dout(&mut self, index: usize, on: bool) -> Result<()> {
        self.sync();
        self.planning.set_dout(index, on)
    }

    /// Analog output change for the next queued move.
    pub fn set_aout(&mut self, index: usize, value: f64) -> Result<()> {
        self.sync();
        self.planning.set_aout(index, value)
    }

    /// Drop output changes not yet attached to a move.
    pub fn clear_dios(&mut self) {
        self.planning.clear_dios();
    }

    /// Action fired when the next queued move starts.
    pub fn set_segment_actions(&mut self, action: SegmentAction, spindle: usize, value: f64) -> Result<()> {
        self.sync();
        self.planning.set_segment_actions(action, spindle, value)
    }

    /// Decelerate to a stop and hold.
    pub fn pause(&self) {
        self.control.pause();
    }

    /// Continue after a pause.
    pub fn resume(&self) {
        self.control.resume();
    }

    /// Stop and drop everything queued. Staged segments are dropped at
    /// once; published ones once the cycle reports the machine at rest.
    pub fn abort(&mut self) {
        if self.control.request_abort() {
            tp_info!("abort requested");
        }
        self.queue.discard();
        self.planning.clear_dios();
    }

    /// Run-time velocity limit.
    pub fn set_vlimit(&self, vlimit: f64) {
        self.control.set_vlimit(vlimit);
    }

    /// End point of the last queued move.
    pub fn goal_pos(&mut self) -> Pose9 {
        self.sync();
        self.planning.goal()
    }

    /// Staged plus published segments.
    pub fn queue_depth(&self) -> usize {
        self.queue.staged() + self.queue.published()
    }

    /// Segments not yet published.
    pub fn staged(&self) -> usize {
        self.queue.staged()
    }

    /// Abort requested and not yet completed by the cycle.
    pub fn is_aborting(&self) -> bool {
        self.control.is_aborting()
    }
}

/// Cycle half of a split planner.
pub struct ExecHandle<H: MotionHost> {
    exec: Execution,
    queue: Consumer,
    host: H,
}

impl<H: MotionHost> ExecHandle<H> {
    /// Advance the published queue by one servo period.
    pub fn run_cycle(&mut self) -> Result<CycleStatus> {
        self.exec.run_cycle(&mut self.queue, &mut self.host)
    }

    /// Commanded position.
    pub fn pos(&self) -> Pose9 {
        self.exec.pos()
    }

    /// Status written by the last cycle.
    pub fn status(&self) -> &MotionStatus {
        self.exec.status()
    }

    /// Moving, or waiting on the spindle to start a move.
    pub fn is_moving(&self) -> bool {
        self.exec.is_moving()
    }

    /// Nothing published is waiting and the machine is at rest.
    pub fn is_done(&self) -> bool {
        ExecQueue::is_empty(&self.queue) && !self.exec.is_moving()
    }

    /// Run the history backward, or forward again.
    pub fn set_run_direction(&mut self, reverse: bool) -> Result<()> {
        self.exec.set_run_direction(reverse)
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

pub(crate) fn split<H: MotionHost>(
    queue: SegmentQueue,
    planning: Planning,
    exec: Execution,
    control: Arc<ControlBlock>,
    host: H,
) -> Result<(PlanHandle, ExecHandle<H>)> {
    let (mut producer, consumer) = spsc::channel(queue.capacity());
    for n in 0..ExecQueue::len(&queue) {
        if let Some(seg) = ExecQueue::item(&queue, n as isize) {
            producer.put(seg.clone())?;
        }
    }
    let depth = planning.optimization_depth() + 2;
    tp_info!("planner split, staging depth {}", depth);
    Ok((
        PlanHandle {
            planning,
            queue: StagedQueue::new(producer, depth),
            control,
        },
        ExecHandle {
            exec,
            queue: consumer,
            host,
        },
    ))
}
