//! Segment queues.
//!
//! The planner never touches storage directly. The add/blend/optimize path
//! sees a [`PlanQueue`] (tail access only), the cycle sees an [`ExecQueue`]
//! (head access plus reverse history). [`SegmentQueue`] implements both for
//! cooperative use from one thread; [`spsc`] splits the same contract across
//! a producer and a consumer thread.

mod ring;
pub mod spsc;

pub use ring::SegmentQueue;

use crate::error::QueueError;
use crate::segment::Segment;

/// Producer view of a queue: append at the tail and revise what was
/// appended recently.
pub trait PlanQueue {
    /// Segments visible to the producer.
    fn len(&self) -> usize;

    /// No segment visible to the producer.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Too close to capacity to accept another segment.
    fn is_full(&self) -> bool;

    /// Append a segment.
    fn put(&mut self, seg: Segment) -> Result<(), QueueError>;

    /// Remove and return the last segment.
    fn pop_back(&mut self) -> Result<Segment, QueueError>;

    /// Segment `n` places from the tail, `0` being the last.
    fn back(&self, n: usize) -> Option<&Segment>;

    /// Mutable variant of [`back`](Self::back).
    fn back_mut(&mut self, n: usize) -> Option<&mut Segment>;

    /// `(back(n + 1), back(n))`, the pair the optimizer walks.
    fn back_pair_mut(&mut self, n: usize) -> Option<(&mut Segment, &mut Segment)>;

    /// Last segment.
    fn last(&self) -> Option<&Segment> {
        self.back(0)
    }

    /// Last segment, mutably.
    fn last_mut(&mut self) -> Option<&mut Segment> {
        self.back_mut(0)
    }
}

/// Consumer view of a queue: advance the head and step through reverse
/// history.
pub trait ExecQueue {
    /// Segments queued ahead of the consumer.
    fn len(&self) -> usize;

    /// Nothing to execute.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Segment at offset `n` from the head. Negative offsets reach into
    /// the reverse history.
    fn item(&self, n: isize) -> Option<&Segment>;

    /// Mutable variant of [`item`](Self::item).
    fn item_mut(&mut self, n: isize) -> Option<&mut Segment>;

    /// The head, the segment `step` after it and the one `2 * step` after
    /// it, all at once. `step` is `1` forward and `-1` in reverse.
    fn head_mut(&mut self, step: isize) -> [Option<&mut Segment>; 3];

    /// Retire the head into the history.
    fn pop(&mut self) -> Result<(), QueueError>;

    /// Bring the newest history entry back to the head.
    fn back_step(&mut self) -> Result<(), QueueError>;

    /// Drop every segment and the history.
    fn reset(&mut self);
}

/// Borrow up to three distinct slots of `slots` mutably at once. Duplicate
/// or absent indices yield `None`.
pub(crate) fn pick_three<T>(slots: &mut [T], idx: [Option<usize>; 3]) -> [Option<&mut T>; 3] {
    let mut order: heapless::Vec<(usize, usize), 3> = heapless::Vec::new();
    for (pos, slot) in idx.iter().enumerate() {
        if let Some(slot) = *slot {
            if slot < slots.len() && !order.iter().any(|&(s, _)| s == slot) {
                // Capacity is 3 and at most 3 entries are pushed
                let _ = order.push((slot, pos));
            }
        }
    }
    order.sort_unstable_by_key(|&(slot, _)| slot);

    let mut out: [Option<&mut T>; 3] = [None, None, None];
    let mut rest = slots;
    let mut base = 0;
    for &(slot, pos) in order.iter() {
        let tail = core::mem::take(&mut rest);
        let (_, tail) = tail.split_at_mut(slot - base);
        if let Some((first, tail)) = tail.split_first_mut() {
            out[pos] = Some(first);
            rest = tail;
        }
        base = slot + 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_three_out_of_order() {
        let mut v = [0, 1, 2, 3, 4];
        let [a, b, c] = pick_three(&mut v, [Some(3), Some(1), Some(4)]);
        assert_eq!((a.copied(), b.copied(), c.copied()), (Some(3), Some(1), Some(4)));
    }

    #[test]
    fn test_pick_three_duplicates_and_gaps() {
        let mut v = [10, 11, 12];
        let [a, b, c] = pick_three(&mut v, [Some(2), None, Some(2)]);
        assert_eq!(a.copied(), Some(12));
        assert!(b.is_none());
        assert!(c.is_none());
        let [a, _, _] = pick_three(&mut v, [Some(7), None, None]);
        assert!(a.is_none());
    }
}
