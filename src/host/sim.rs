//! In-memory host.

use alloc::vec;
use alloc::vec::Vec;

use super::{MotionHost, SpindleStatus};

/// One command issued to the host, in call order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostCall {
    /// `set_spindle_speed(spindle, speed)`
    SpindleSpeed(usize, f64),
    /// `set_spindle_state(spindle, on, direction)`
    SpindleState(usize, bool, i8),
    /// `set_spindle_brake(spindle, engaged)`
    SpindleBrake(usize, bool),
    /// `set_index_enable(spindle, enable)`
    IndexEnable(usize, bool),
    /// `write_dio(index, on)`
    Dio(usize, bool),
    /// `write_aio(index, value)`
    Aio(usize, f64),
    /// `set_rotary_unlock(axis, unlock)`
    RotaryUnlock(usize, bool),
    /// `custom_action(value)`
    Custom(f64),
}

/// Host double that records every command and lets the caller drive the
/// feedback by hand.
///
/// Rotary clamps follow their command immediately unless `hold_clamps` is
/// set. The index latch stays armed until [`index_pulse`](Self::index_pulse).
#[derive(Debug, Clone)]
pub struct SimHost {
    /// Spindle feedback returned to the planner.
    pub spindles: Vec<SpindleStatus>,
    /// Net feed override.
    pub feed_scale: f64,
    /// Single-step mode.
    pub stepping: bool,
    /// Rotary clamps ignore unlock requests.
    pub hold_clamps: bool,
    /// Clamp state per axis.
    pub unlocked: [bool; 9],
    /// Commands received so far.
    pub calls: Vec<HostCall>,
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new(1)
    }
}

impl SimHost {
    /// Host with `spindles` idle spindles that report at speed.
    pub fn new(spindles: usize) -> Self {
        let idle = SpindleStatus {
            at_speed: true,
            ..SpindleStatus::default()
        };
        Self {
            spindles: vec![idle; spindles],
            feed_scale: 1.0,
            stepping: false,
            hold_clamps: false,
            unlocked: [false; 9],
            calls: Vec::new(),
        }
    }

    /// Fire the index pulse of spindle `n`: the latch clears and the
    /// encoder count restarts from zero.
    pub fn index_pulse(&mut self, n: usize) {
        if let Some(s) = self.spindles.get_mut(n) {
            if s.index_enable {
                s.index_enable = false;
                s.revs = 0.0;
            }
        }
    }

    /// Turn every spindle for `dt` seconds at its measured speed.
    pub fn spin(&mut self, dt: f64) {
        for s in &mut self.spindles {
            s.revs += s.speed_in * dt;
        }
    }

    /// Digital writes in call order.
    pub fn dio_writes(&self) -> impl Iterator<Item = (usize, bool)> + '_ {
        self.calls.iter().filter_map(|c| match *c {
            HostCall::Dio(i, on) => Some((i, on)),
            _ => None,
        })
    }

    /// Analog writes in call order.
    pub fn aio_writes(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.calls.iter().filter_map(|c| match *c {
            HostCall::Aio(i, v) => Some((i, v)),
            _ => None,
        })
    }

    /// Forget the recorded commands.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl MotionHost for SimHost {
    fn spindle_count(&self) -> usize {
        self.spindles.len()
    }

    fn spindle(&self, n: usize) -> SpindleStatus {
        self.spindles.get(n).copied().unwrap_or_default()
    }

    fn set_spindle_speed(&mut self, n: usize, speed: f64) {
        self.calls.push(HostCall::SpindleSpeed(n, speed));
        if let Some(s) = self.spindles.get_mut(n) {
            s.speed_cmd = speed;
        }
    }

    fn set_spindle_state(&mut self, n: usize, on: bool, direction: i8) {
        self.calls.push(HostCall::SpindleState(n, on, direction));
        if let Some(s) = self.spindles.get_mut(n) {
            s.direction = if on { direction } else { 0 };
        }
    }

    fn set_spindle_brake(&mut self, n: usize, engaged: bool) {
        self.calls.push(HostCall::SpindleBrake(n, engaged));
    }

    fn set_index_enable(&mut self, n: usize, enable: bool) {
        self.calls.push(HostCall::IndexEnable(n, enable));
        if let Some(s) = self.spindles.get_mut(n) {
            s.index_enable = enable;
        }
    }

    fn net_feed_scale(&self) -> f64 {
        self.feed_scale
    }

    fn stepping(&self) -> bool {
        self.stepping
    }

    fn write_dio(&mut self, index: usize, on: bool) {
        self.calls.push(HostCall::Dio(index, on));
    }

    fn write_aio(&mut self, index: usize, value: f64) {
        self.calls.push(HostCall::Aio(index, value));
    }

    fn set_rotary_unlock(&mut self, axis: usize, unlock: bool) {
        self.calls.push(HostCall::RotaryUnlock(axis, unlock));
        if !self.hold_clamps {
            if let Some(u) = self.unlocked.get_mut(axis) {
                *u = unlock;
            }
        }
    }

    fn rotary_is_unlocked(&self, axis: usize) -> bool {
        self.unlocked.get(axis).copied().unwrap_or(false)
    }

    fn custom_action(&mut self, value: f64) {
        self.calls.push(HostCall::Custom(value));
    }
}
