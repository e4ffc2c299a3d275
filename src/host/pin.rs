//! Synchronized digital outputs on `embedded-hal` pins.

use alloc::vec::Vec;

use embedded_hal::digital::OutputPin;

use super::{MotionHost, SpindleStatus};

/// Host that drives a bank of output pins for the digital outputs
/// `first..first + pins.len()` and hands every other call to `inner`.
///
/// Pin errors are logged and otherwise ignored: a synchronized output is
/// fire-and-forget from the planner's point of view.
pub struct PinHost<P, H>
where
    P: OutputPin,
    H: MotionHost,
{
    pins: Vec<P>,
    first: usize,
    active_low: bool,
    inner: H,
}

impl<P, H> PinHost<P, H>
where
    P: OutputPin,
    H: MotionHost,
{
    /// Map `pins` onto digital outputs starting at `first`.
    pub fn new(pins: Vec<P>, first: usize, inner: H) -> Self {
        Self {
            pins,
            first,
            active_low: false,
            inner,
        }
    }

    /// Drive the pins low for "on".
    pub fn with_active_low(mut self, active_low: bool) -> Self {
        self.active_low = active_low;
        self
    }

    /// The wrapped host.
    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// The wrapped host, mutably.
    pub fn inner_mut(&mut self) -> &mut H {
        &mut self.inner
    }

    /// Give back the pins and the wrapped host.
    pub fn into_parts(self) -> (Vec<P>, H) {
        (self.pins, self.inner)
    }

    fn pin_for(&mut self, index: usize) -> Option<&mut P> {
        index.checked_sub(self.first).and_then(|i| self.pins.get_mut(i))
    }
}

impl<P, H> MotionHost for PinHost<P, H>
where
    P: OutputPin,
    H: MotionHost,
{
    fn spindle_count(&self) -> usize {
        self.inner.spindle_count()
    }

    fn spindle(&self, n: usize) -> SpindleStatus {
        self.inner.spindle(n)
    }

    fn set_spindle_speed(&mut self, n: usize, speed: f64) {
        self.inner.set_spindle_speed(n, speed)
    }

    fn set_spindle_state(&mut self, n: usize, on: bool, direction: i8) {
        self.inner.set_spindle_state(n, on, direction)
    }

    fn set_spindle_brake(&mut self, n: usize, engaged: bool) {
        self.inner.set_spindle_brake(n, engaged)
    }

    fn set_index_enable(&mut self, n: usize, enable: bool) {
        self.inner.set_index_enable(n, enable)
    }

    fn net_feed_scale(&self) -> f64 {
        self.inner.net_feed_scale()
    }

    fn stepping(&self) -> bool {
        self.inner.stepping()
    }

    fn write_dio(&mut self, index: usize, on: bool) {
        let high = on != self.active_low;
        match self.pin_for(index) {
            Some(pin) => {
                let res = if high { pin.set_high() } else { pin.set_low() };
                if res.is_err() {
                    tp_error!("failed to drive output pin {}", index);
                }
            }
            None => self.inner.write_dio(index, on),
        }
    }

    fn write_aio(&mut self, index: usize, value: f64) {
        self.inner.write_aio(index, value)
    }

    fn set_rotary_unlock(&mut self, axis: usize, unlock: bool) {
        self.inner.set_rotary_unlock(axis, unlock)
    }

    fn rotary_is_unlocked(&self, axis: usize) -> bool {
        self.inner.rotary_is_unlocked(axis)
    }

    fn custom_action(&mut self, value: f64) {
        self.inner.custom_action(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostCall, SimHost};
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State as PinState, Transaction as PinTransaction};

    #[test]
    fn test_writes_mapped_pins() {
        let pin0 = PinMock::new(&[PinTransaction::set(PinState::High), PinTransaction::set(PinState::Low)]);
        let pin1 = PinMock::new(&[PinTransaction::set(PinState::High)]);
        let mut host = PinHost::new(alloc::vec![pin0, pin1], 4, SimHost::default());

        host.write_dio(4, true);
        host.write_dio(5, true);
        host.write_dio(4, false);
        // Outside the bank: forwarded
        host.write_dio(2, true);
        host.write_dio(6, false);

        let (pins, inner) = host.into_parts();
        for mut pin in pins {
            pin.done();
        }
        assert_eq!(inner.calls, alloc::vec![HostCall::Dio(2, true), HostCall::Dio(6, false)]);
    }

    #[test]
    fn test_active_low_inverts() {
        let pin = PinMock::new(&[PinTransaction::set(PinState::Low), PinTransaction::set(PinState::High)]);
        let mut host = PinHost::new(alloc::vec![pin], 0, SimHost::default()).with_active_low(true);
        host.write_dio(0, true);
        host.write_dio(0, false);
        let (pins, _) = host.into_parts();
        for mut pin in pins {
            pin.done();
        }
    }

    #[test]
    fn test_delegates_spindle() {
        let mut host: PinHost<PinMock, SimHost> = PinHost::new(alloc::vec![], 0, SimHost::new(2));
        host.set_spindle_speed(1, 600.0);
        assert_eq!(host.spindle_count(), 2);
        assert_eq!(host.spindle(1).speed_cmd, 600.0);
        host.inner_mut().feed_scale = 0.5;
        assert_eq!(host.net_feed_scale(), 0.5);
        assert!(host.inner().spindles[0].at_speed);
    }
}
