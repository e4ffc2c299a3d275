//! Lock-free single-producer/single-consumer segment ring.
//!
//! The producer owns `end`, the consumer owns `start`. Each side reads the
//! other's index with an acquire load and publishes its own with an
//! acquire-release swap, so a consumer that observes a new `end` also
//! observes the segment written before it. Length is always derived from
//! the two indices; nothing else is shared.
//!
//! The producer keeps [`TC_QUEUE_MARGIN`] slots free at all times. The
//! consumer's reverse history lives in that free band right behind `start`,
//! so the producer can never overwrite a segment the consumer may still
//! step back into.

#![allow(unsafe_code)]

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::consts::{REVERSE_MARGIN, TC_QUEUE_MARGIN};
use crate::error::QueueError;
use crate::segment::Segment;

use super::ExecQueue;

struct Ring {
    slots: Box<[UnsafeCell<Segment>]>,
    start: AtomicUsize,
    end: AtomicUsize,
}

// SAFETY: a slot is written only by the producer while it lies outside
// `[start - history, end)`, and accessed only by the consumer while it lies
// inside that range. The index protocol keeps the two sets disjoint.
unsafe impl Sync for Ring {}
unsafe impl Send for Ring {}

impl Ring {
    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn len_between(&self, start: usize, end: usize) -> usize {
        (end + self.capacity() - start) % self.capacity()
    }
}

/// Create a ring with `capacity` slots and return its two halves.
///
/// Capacity is raised to leave room for the safety margin plus at least one
/// segment.
pub fn channel(capacity: usize) -> (Producer, Consumer) {
    let capacity = capacity.max(TC_QUEUE_MARGIN + 2);
    let mut slots = Vec::with_capacity(capacity);
    slots.resize_with(capacity, || UnsafeCell::new(Segment::default()));
    let ring = Arc::new(Ring {
        slots: slots.into_boxed_slice(),
        start: AtomicUsize::new(0),
        end: AtomicUsize::new(0),
    });
    (
        Producer { ring: Arc::clone(&ring) },
        Consumer { ring, history: 0 },
    )
}

/// Writing half, owned by the planning thread.
pub struct Producer {
    ring: Arc<Ring>,
}

impl Producer {
    /// Segments published and not yet popped.
    pub fn len(&self) -> usize {
        let start = self.ring.start.load(Ordering::Acquire);
        let end = self.ring.end.load(Ordering::Acquire);
        self.ring.len_between(start, end)
    }

    /// Nothing published is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total slots.
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Segments that can still be published.
    pub fn available(&self) -> usize {
        (self.ring.capacity() - TC_QUEUE_MARGIN).saturating_sub(self.len())
    }

    /// Within the safety margin of capacity.
    pub fn is_full(&self) -> bool {
        self.available() == 0
    }

    /// Publish a segment.
    pub fn put(&mut self, seg: Segment) -> Result<(), QueueError> {
        let start = self.ring.start.load(Ordering::Acquire);
        let end = self.ring.end.load(Ordering::Acquire);
        let cap = self.ring.capacity();
        let next_end = (end + 1) % cap;
        let free_after = (start + cap - next_end) % cap;
        if free_after < TC_QUEUE_MARGIN {
            return Err(QueueError::Full);
        }
        // SAFETY: `end` is outside the consumer's range and at least
        // TC_QUEUE_MARGIN slots ahead of its history.
        unsafe {
            *self.ring.slots[end].get() = seg;
        }
        self.ring.end.swap(next_end, Ordering::AcqRel);
        Ok(())
    }
}

/// Reading half, owned by the realtime thread.
pub struct Consumer {
    ring: Arc<Ring>,
    history: usize,
}

impl Consumer {
    fn indices(&self) -> (usize, usize) {
        let start = self.ring.start.load(Ordering::Acquire);
        let end = self.ring.end.load(Ordering::Acquire);
        (start, end)
    }

    fn slot_of(&self, n: isize) -> Option<usize> {
        let (start, end) = self.indices();
        let cap = self.ring.capacity();
        if n >= 0 {
            let n = n as usize;
            (n < self.ring.len_between(start, end)).then(|| (start + n) % cap)
        } else {
            let back = n.unsigned_abs();
            (back <= self.history).then(|| (start + cap - back) % cap)
        }
    }

    /// Popped segments still reachable with negative offsets.
    pub fn history_len(&self) -> usize {
        self.history
    }
}

impl ExecQueue for Consumer {
    fn len(&self) -> usize {
        let (start, end) = self.indices();
        self.ring.len_between(start, end)
    }

    fn item(&self, n: isize) -> Option<&Segment> {
        let slot = self.slot_of(n)?;
        // SAFETY: published or retained slot, never written by the producer
        // while it is in the consumer's range.
        Some(unsafe { &*self.ring.slots[slot].get() })
    }

    fn item_mut(&mut self, n: isize) -> Option<&mut Segment> {
        let slot = self.slot_of(n)?;
        // SAFETY: as above; `&mut self` rules out aliasing on this side.
        Some(unsafe { &mut *self.ring.slots[slot].get() })
    }

    fn head_mut(&mut self, step: isize) -> [Option<&mut Segment>; 3] {
        let idx = [self.slot_of(0), self.slot_of(step), self.slot_of(2 * step)];
        let mut out: [Option<&mut Segment>; 3] = [None, None, None];
        for (pos, slot) in idx.iter().enumerate() {
            let Some(slot) = *slot else { continue };
            if idx[..pos].contains(&Some(slot)) {
                continue;
            }
            // SAFETY: distinct slots inside the consumer's range.
            out[pos] = Some(unsafe { &mut *self.ring.slots[slot].get() });
        }
        out
    }

    fn pop(&mut self) -> Result<(), QueueError> {
        let (start, end) = self.indices();
        if start == end {
            return Err(QueueError::Empty);
        }
        let next = (start + 1) % self.ring.capacity();
        self.ring.start.swap(next, Ordering::AcqRel);
        self.history = (self.history + 1).min(REVERSE_MARGIN);
        Ok(())
    }

    fn back_step(&mut self) -> Result<(), QueueError> {
        if self.history == 0 {
            return Err(QueueError::NoHistory);
        }
        let start = self.ring.start.load(Ordering::Acquire);
        let prev = (start + self.ring.capacity() - 1) % self.ring.capacity();
        self.ring.start.swap(prev, Ordering::AcqRel);
        self.history -= 1;
        Ok(())
    }

    fn reset(&mut self) {
        let end = self.ring.end.load(Ordering::Acquire);
        self.ring.start.swap(end, Ordering::AcqRel);
        self.history = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(id: i64) -> Segment {
        Segment {
            id,
            ..Segment::default()
        }
    }

    #[test]
    fn test_put_pop_fifo() {
        let (mut tx, mut rx) = channel(TC_QUEUE_MARGIN + 8);
        for id in 0..5 {
            tx.put(seg(id)).unwrap();
        }
        assert_eq!(tx.len(), 5);
        assert_eq!(rx.len(), 5);
        for id in 0..5 {
            assert_eq!(rx.item(0).unwrap().id, id);
            rx.pop().unwrap();
        }
        assert_eq!(rx.pop(), Err(QueueError::Empty));
        assert!(tx.is_empty());
    }

    #[test]
    fn test_margin_blocks_producer() {
        let (mut tx, _rx) = channel(TC_QUEUE_MARGIN + 4);
        let mut accepted = 0;
        while tx.put(seg(accepted)).is_ok() {
            accepted += 1;
        }
        assert_eq!(accepted as usize, 4);
        assert!(tx.is_full());
    }

    #[test]
    fn test_history_survives_refill() {
        let (mut tx, mut rx) = channel(TC_QUEUE_MARGIN + 4);
        for id in 0..4 {
            tx.put(seg(id)).unwrap();
        }
        rx.pop().unwrap();
        rx.pop().unwrap();
        tx.put(seg(4)).unwrap();
        tx.put(seg(5)).unwrap();
        assert_eq!(rx.item(-1).unwrap().id, 1);
        assert_eq!(rx.item(-2).unwrap().id, 0);
        rx.back_step().unwrap();
        assert_eq!(rx.item(0).unwrap().id, 1);
    }

    #[test]
    fn test_reset_drops_published() {
        let (mut tx, mut rx) = channel(TC_QUEUE_MARGIN + 8);
        tx.put(seg(0)).unwrap();
        tx.put(seg(1)).unwrap();
        rx.reset();
        assert!(rx.is_empty());
        assert_eq!(rx.back_step(), Err(QueueError::NoHistory));
        assert_eq!(tx.len(), 0);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_threads_preserve_order() {
        let (mut tx, mut rx) = channel(64);
        let producer = std::thread::spawn(move || {
            let mut id = 0;
            while id < 500 {
                if tx.put(seg(id)).is_ok() {
                    id += 1;
                } else {
                    std::thread::yield_now();
                }
            }
        });
        let mut expected = 0;
        while expected < 500 {
            if let Some(s) = rx.item(0) {
                assert_eq!(s.id, expected);
                expected += 1;
                rx.pop().unwrap();
            } else {
                std::thread::yield_now();
            }
        }
        producer.join().unwrap();
    }
}
