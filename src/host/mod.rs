//! Host capability interface.
//!
//! Everything the planner needs from the machine goes through
//! [`MotionHost`]: spindle feedback and commands, feed override, synchronized
//! outputs and rotary axis clamps. The planner never holds host state of its
//! own, so an in-memory [`SimHost`] is enough to drive it in tests.

mod pin;
mod sim;

pub use pin::PinHost;
pub use sim::{HostCall, SimHost};

/// Feedback from one spindle, sampled once per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpindleStatus {
    /// Accumulated revolutions from the encoder.
    pub revs: f64,
    /// Measured speed in revolutions per second.
    pub speed_in: f64,
    /// Last commanded speed, signed by direction.
    pub speed_cmd: f64,
    /// Spindle has reached its commanded speed.
    pub at_speed: bool,
    /// Index pulse request still pending. The encoder clears it on the
    /// index pulse.
    pub index_enable: bool,
    /// `1` forward, `-1` reverse, `0` stopped.
    pub direction: i8,
}

/// Capabilities the planner consumes from the machine.
///
/// Spindle numbers are checked against [`spindle_count`](Self::spindle_count)
/// by the planner before any call, so implementations may index directly.
pub trait MotionHost {
    /// Number of spindles.
    fn spindle_count(&self) -> usize;

    /// Feedback for spindle `n`.
    fn spindle(&self, n: usize) -> SpindleStatus;

    /// Command a spindle speed (signed).
    fn set_spindle_speed(&mut self, n: usize, speed: f64);

    /// Turn a spindle on or off in the given direction.
    fn set_spindle_state(&mut self, n: usize, on: bool, direction: i8);

    /// Engage or release the spindle brake.
    fn set_spindle_brake(&mut self, n: usize, engaged: bool);

    /// Arm or disarm the index pulse latch of spindle `n`.
    fn set_index_enable(&mut self, n: usize, enable: bool);

    /// Product of every active feed override.
    fn net_feed_scale(&self) -> f64 {
        1.0
    }

    /// Single-stepping through segments.
    fn stepping(&self) -> bool {
        false
    }

    /// Write a synchronized digital output.
    fn write_dio(&mut self, index: usize, on: bool);

    /// Write a synchronized analog output.
    fn write_aio(&mut self, index: usize, value: f64);

    /// Ask the clamp of a locking rotary axis to open or close.
    fn set_rotary_unlock(&mut self, _axis: usize, _unlock: bool) {}

    /// Clamp of a locking rotary axis reports open.
    fn rotary_is_unlocked(&self, _axis: usize) -> bool {
        true
    }

    /// Host-defined action attached to a segment.
    fn custom_action(&mut self, _value: f64) {}
}

impl<H: MotionHost + ?Sized> MotionHost for &mut H {
    fn spindle_count(&self) -> usize {
        (**self).spindle_count()
    }

    fn spindle(&self, n: usize) -> SpindleStatus {
        (**self).spindle(n)
    }

    fn set_spindle_speed(&mut self, n: usize, speed: f64) {
        (**self).set_spindle_speed(n, speed)
    }

    fn set_spindle_state(&mut self, n: usize, on: bool, direction: i8) {
        (**self).set_spindle_state(n, on, direction)
    }

    fn set_spindle_brake(&mut self, n: usize, engaged: bool) {
        (**self).set_spindle_brake(n, engaged)
    }

    fn set_index_enable(&mut self, n: usize, enable: bool) {
        (**self).set_index_enable(n, enable)
    }

    fn net_feed_scale(&self) -> f64 {
        (**self).net_feed_scale()
    }

    fn stepping(&self) -> bool {
        (**self).stepping()
    }

    fn write_dio(&mut self, index: usize, on: bool) {
        (**self).write_dio(index, on)
    }

    fn write_aio(&mut self, index: usize, value: f64) {
        (**self).write_aio(index, value)
    }

    fn set_rotary_unlock(&mut self, axis: usize, unlock: bool) {
        (**self).set_rotary_unlock(axis, unlock)
    }

    fn rotary_is_unlocked(&self, axis: usize) -> bool {
        (**self).rotary_is_unlocked(axis)
    }

    fn custom_action(&mut self, value: f64) {
        (**self).custom_action(value)
    }
}
