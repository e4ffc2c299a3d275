//! Fixed-capacity ring for cooperative use.

use alloc::vec::Vec;

use crate::consts::{REVERSE_MARGIN, TC_QUEUE_MARGIN};
use crate::error::QueueError;
use crate::segment::Segment;

use super::{pick_three, ExecQueue, PlanQueue};

/// Ring of segments with a full flag and a bounded reverse history.
///
/// All slots are allocated up front; puts and pops only move indices and
/// overwrite slots.
#[derive(Debug, Clone)]
pub struct SegmentQueue {
    slots: Vec<Segment>,
    start: usize,
    end: usize,
    full: bool,
    history: usize,
}

impl SegmentQueue {
    /// Queue holding up to `capacity` segments.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Segment::default);
        Self {
            slots,
            start: 0,
            end: 0,
            full: false,
            history: 0,
        }
    }

    /// Total number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Popped segments still reachable with negative offsets.
    #[inline]
    pub fn history_len(&self) -> usize {
        self.history
    }

    fn count(&self) -> usize {
        if self.full {
            self.capacity()
        } else {
            (self.end + self.capacity() - self.start) % self.capacity()
        }
    }

    fn slot_of(&self, n: isize) -> Option<usize> {
        let cap = self.capacity();
        if n >= 0 {
            let n = n as usize;
            (n < self.count()).then(|| (self.start + n) % cap)
        } else {
            let back = n.unsigned_abs();
            (back <= self.history).then(|| (self.start + cap - back) % cap)
        }
    }

    fn tail_slot(&self, n: usize) -> Option<usize> {
        let cap = self.capacity();
        (n < self.count()).then(|| (self.end + cap - 1 - n) % cap)
    }
}

impl PlanQueue for SegmentQueue {
    fn len(&self) -> usize {
        self.count()
    }

    fn is_full(&self) -> bool {
        if self.capacity() <= TC_QUEUE_MARGIN {
            self.full
        } else {
            self.count() >= self.capacity() - TC_QUEUE_MARGIN
        }
    }

    fn put(&mut self, seg: Segment) -> Result<(), QueueError> {
        if self.full {
            return Err(QueueError::Full);
        }
        // New segments overwrite the oldest history first
        if self.count() + self.history >= self.capacity() {
            self.history -= 1;
        }
        self.slots[self.end] = seg;
        self.end = (self.end + 1) % self.capacity();
        self.full = self.end == self.start;
        Ok(())
    }

    fn pop_back(&mut self) -> Result<Segment, QueueError> {
        if self.count() == 0 {
            return Err(QueueError::Empty);
        }
        self.end = (self.end + self.capacity() - 1) % self.capacity();
        self.full = false;
        Ok(core::mem::take(&mut self.slots[self.end]))
    }

    fn back(&self, n: usize) -> Option<&Segment> {
        self.tail_slot(n).map(|i| &self.slots[i])
    }

    fn back_mut(&mut self, n: usize) -> Option<&mut Segment> {
        self.tail_slot(n).map(move |i| &mut self.slots[i])
    }

    fn back_pair_mut(&mut self, n: usize) -> Option<(&mut Segment, &mut Segment)> {
        let prev = self.tail_slot(n + 1)?;
        let cur = self.tail_slot(n)?;
        let [p, c, _] = pick_three(&mut self.slots, [Some(prev), Some(cur), None]);
        Some((p?, c?))
    }
}

impl ExecQueue for SegmentQueue {
    fn len(&self) -> usize {
        self.count()
    }

    fn item(&self, n: isize) -> Option<&Segment> {
        self.slot_of(n).map(|i| &self.slots[i])
    }

    fn item_mut(&mut self, n: isize) -> Option<&mut Segment> {
        self.slot_of(n).map(move |i| &mut self.slots[i])
    }

    fn head_mut(&mut self, step: isize) -> [Option<&mut Segment>; 3] {
        let idx = [self.slot_of(0), self.slot_of(step), self.slot_of(2 * step)];
        pick_three(&mut self.slots, idx)
    }

    fn pop(&mut self) -> Result<(), QueueError> {
        if self.count() == 0 {
            return Err(QueueError::Empty);
        }
        self.start = (self.start + 1) % self.capacity();
        self.full = false;
        let room = self.capacity() - self.count();
        self.history = (self.history + 1).min(REVERSE_MARGIN).min(room);
        Ok(())
    }

    fn back_step(&mut self) -> Result<(), QueueError> {
        if self.history == 0 {
            return Err(QueueError::NoHistory);
        }
        self.start = (self.start + self.capacity() - 1) % self.capacity();
        self.history -= 1;
        self.full = self.start == self.end;
        Ok(())
    }

    fn reset(&mut self) {
        self.start = 0;
        self.end = 0;
        self.full = false;
        self.history = 0;
    }
}
