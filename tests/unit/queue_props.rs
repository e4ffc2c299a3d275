//! Property tests for the segment queues.

use std::collections::VecDeque;

use cnc_trajectory::consts::{REVERSE_MARGIN, TC_QUEUE_MARGIN};
use cnc_trajectory::queue::{spsc, ExecQueue, PlanQueue, SegmentQueue};
use cnc_trajectory::segment::Segment;
use proptest::prelude::*;

fn seg(id: i64) -> Segment {
    Segment {
        id,
        ..Segment::default()
    }
}

#[derive(Debug, Clone)]
enum Op {
    Put,
    Pop,
    PopBack,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![3 => Just(Op::Put), 2 => Just(Op::Pop), 1 => Just(Op::PopBack)]
}

proptest! {
    /// The cooperative queue behaves like a deque bounded by its margin.
    #[test]
    fn prop_segment_queue_matches_model(ops in prop::collection::vec(op(), 1..200)) {
        let cap = TC_QUEUE_MARGIN + 10;
        let mut q = SegmentQueue::new(cap);
        let mut model: VecDeque<i64> = VecDeque::new();
        let mut next = 0;

        for op in ops {
            match op {
                Op::Put => {
                    if !PlanQueue::is_full(&q) {
                        q.put(seg(next)).unwrap();
                        model.push_back(next);
                        next += 1;
                    }
                }
                Op::Pop => {
                    let expected = model.pop_front();
                    prop_assert_eq!(ExecQueue::pop(&mut q).is_ok(), expected.is_some());
                }
                Op::PopBack => {
                    let expected = model.pop_back();
                    prop_assert_eq!(q.pop_back().ok().map(|s| s.id), expected);
                }
            }
            prop_assert_eq!(PlanQueue::len(&q), model.len());
            prop_assert_eq!(ExecQueue::item(&q, 0).map(|s| s.id), model.front().copied());
            prop_assert_eq!(q.last().map(|s| s.id), model.back().copied());
            prop_assert!(q.history_len() <= REVERSE_MARGIN);
        }
    }

    /// Stepping back through the history returns segments newest first.
    #[test]
    fn prop_history_steps_back_in_order(count in 1usize..40) {
        let mut q = SegmentQueue::new(TC_QUEUE_MARGIN + 50);
        for id in 0..count as i64 {
            q.put(seg(id)).unwrap();
        }
        for _ in 0..count {
            ExecQueue::pop(&mut q).unwrap();
        }
        let kept = count.min(REVERSE_MARGIN);
        prop_assert_eq!(q.history_len(), kept);
        for k in 0..kept {
            q.back_step().unwrap();
            prop_assert_eq!(ExecQueue::item(&q, 0).unwrap().id, (count - 1 - k) as i64);
        }
        prop_assert!(q.back_step().is_err());
    }

    /// The ring delivers every published segment once, in order.
    #[test]
    fn prop_spsc_preserves_order(batches in prop::collection::vec(1usize..8, 1..30)) {
        let (mut tx, mut rx) = spsc::channel(TC_QUEUE_MARGIN + 16);
        let mut sent = 0i64;
        let mut received = 0i64;
        for batch in batches {
            for _ in 0..batch {
                if tx.put(seg(sent)).is_ok() {
                    sent += 1;
                }
            }
            while let Some(s) = rx.item(0) {
                prop_assert_eq!(s.id, received);
                received += 1;
                rx.pop().unwrap();
            }
        }
        prop_assert_eq!(sent, received);
        prop_assert!(tx.is_empty());
    }
}
