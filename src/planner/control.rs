//! Flags shared between the planning side and the cycle.
//!
//! Pause and abort are requested from the planning thread and observed by
//! the cycle; the stop position and its epoch travel the other way once an
//! abort has brought the machine to rest.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::math::Pose9;

/// Lock-free control block.
///
/// Every field is a plain atomic, so a cycle running in an interrupt
/// context never waits on the planning thread.
#[derive(Debug)]
pub struct ControlBlock {
    pausing: AtomicBool,
    aborting: AtomicBool,
    vlimit: AtomicU64,
    stop_epoch: AtomicU32,
    stop_pos: [AtomicU64; 9],
}

impl ControlBlock {
    /// Block with no request pending and the given velocity limit.
    pub fn new(vlimit: f64) -> Self {
        Self {
            pausing: AtomicBool::new(false),
            aborting: AtomicBool::new(false),
            vlimit: AtomicU64::new(vlimit.to_bits()),
            stop_epoch: AtomicU32::new(0),
            stop_pos: Default::default(),
        }
    }

    /// Ask the cycle to decelerate to a stop and hold.
    pub fn pause(&self) {
        self.pausing.store(true, Ordering::Release);
    }

    /// Release a pause.
    pub fn resume(&self) {
        self.pausing.store(false, Ordering::Release);
    }

    /// Latch an abort. Returns `false` if one was already pending.
    pub fn request_abort(&self) -> bool {
        self.pause();
        !self.aborting.swap(true, Ordering::AcqRel)
    }

    /// Pause requested.
    #[inline]
    pub fn is_pausing(&self) -> bool {
        self.pausing.load(Ordering::Acquire)
    }

    /// Abort requested and not yet completed.
    #[inline]
    pub fn is_aborting(&self) -> bool {
        self.aborting.load(Ordering::Acquire)
    }

    /// Run-time velocity limit.
    #[inline]
    pub fn vlimit(&self) -> f64 {
        f64::from_bits(self.vlimit.load(Ordering::Acquire))
    }

    /// Change the run-time velocity limit. Negative values clamp to zero.
    pub fn set_vlimit(&self, vlimit: f64) {
        self.vlimit.store(vlimit.max(0.0).to_bits(), Ordering::Release);
    }

    /// Record that the machine came to rest at `pos`, clear the pause and
    /// abort latches, and advance the stop epoch.
    pub fn finish_abort(&self, pos: &Pose9) {
        for (slot, v) in self.stop_pos.iter().zip(pos.to_array()) {
            slot.store(v.to_bits(), Ordering::Relaxed);
        }
        self.aborting.store(false, Ordering::Release);
        self.pausing.store(false, Ordering::Release);
        // Publishes the position stores above
        self.stop_epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of aborts completed so far.
    #[inline]
    pub fn stop_epoch(&self) -> u32 {
        self.stop_epoch.load(Ordering::Acquire)
    }

    /// Position recorded by the last completed abort.
    pub fn stop_pos(&self) -> Pose9 {
        let mut v = [0.0; 9];
        for (out, slot) in v.iter_mut().zip(self.stop_pos.iter()) {
            *out = f64::from_bits(slot.load(Ordering::Relaxed));
        }
        Pose9::from_array(v)
    }
}

impl Default for ControlBlock {
    fn default() -> Self {
        Self::new(f64::MAX)
    }
}
