//! Outputs and actions fired at segment boundaries.

/// Number of synchronized digital outputs.
pub const MAX_DIO: usize = 64;
/// Number of synchronized analog outputs.
pub const MAX_AIO: usize = 64;

/// Pending digital/analog output changes, latched into the next queued
/// segment and written when that segment starts executing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncDio {
    /// Any output changed since the last latch.
    pub anychanged: bool,
    /// Digital outputs to write.
    pub dio_mask: u64,
    /// Analog outputs to write.
    pub aio_mask: u64,
    /// `1` to set, `-1` to clear.
    pub dios: [i8; MAX_DIO],
    /// Analog values.
    pub aios: [f64; MAX_AIO],
}

impl Default for SyncDio {
    fn default() -> Self {
        Self {
            anychanged: false,
            dio_mask: 0,
            aio_mask: 0,
            dios: [0; MAX_DIO],
            aios: [0.0; MAX_AIO],
        }
    }
}

impl SyncDio {
    /// Queue a digital output change. Returns `false` for an index out of
    /// range.
    pub fn set_dout(&mut self, index: usize, on: bool) -> bool {
        if index >= MAX_DIO {
            return false;
        }
        self.anychanged = true;
        self.dio_mask |= 1 << index;
        self.dios[index] = if on { 1 } else { -1 };
        true
    }

    /// Queue an analog output change. Returns `false` for an index out of
    /// range.
    pub fn set_aout(&mut self, index: usize, value: f64) -> bool {
        if index >= MAX_AIO {
            return false;
        }
        self.anychanged = true;
        self.aio_mask |= 1 << index;
        self.aios[index] = value;
        true
    }

    /// Drop every pending change.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Digital writes as `(index, on)` pairs.
    pub fn digital_writes(&self) -> impl Iterator<Item = (usize, bool)> + '_ {
        (0..MAX_DIO)
            .filter(move |i| self.dio_mask & (1 << i) != 0)
            .map(move |i| (i, self.dios[i] > 0))
    }

    /// Analog writes as `(index, value)` pairs.
    pub fn analog_writes(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        (0..MAX_AIO)
            .filter(move |i| self.aio_mask & (1 << i) != 0)
            .map(move |i| (i, self.aios[i]))
    }
}

/// Spindle and coolant action fired when a segment activates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SegmentAction {
    /// Spindle on clockwise.
    SpindleCw,
    /// Spindle on counter-clockwise.
    SpindleCcw,
    /// Spindle off with brake.
    SpindleOff,
    /// Mist coolant on.
    CoolantMist,
    /// Flood coolant on.
    CoolantFlood,
    /// All coolant off.
    CoolantOff,
    /// Host-defined action carrying a value.
    Custom,
}

impl SegmentAction {
    const fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// Set of actions with their arguments.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SegmentActions {
    /// One bit per [`SegmentAction`].
    pub mask: u32,
    /// Spindle the spindle actions apply to.
    pub spindle_num: usize,
    /// Commanded speed for `SpindleCw`/`SpindleCcw`.
    pub spindle_speed: f64,
    /// Argument of `Custom`.
    pub custom_value: f64,
}

impl SegmentActions {
    /// Add an action. `value` is the spindle speed or the custom value.
    pub fn set(&mut self, action: SegmentAction, spindle_num: usize, value: f64) {
        self.mask |= action.bit();
        match action {
            SegmentAction::SpindleCw | SegmentAction::SpindleCcw => {
                self.spindle_num = spindle_num;
                self.spindle_speed = value;
            }
            SegmentAction::SpindleOff => self.spindle_num = spindle_num,
            SegmentAction::Custom => self.custom_value = value,
            _ => {}
        }
    }

    /// Whether `action` is requested.
    pub fn contains(&self, action: SegmentAction) -> bool {
        self.mask & action.bit() != 0
    }

    /// No action requested.
    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }

    /// Forget every action.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dout_latch() {
        let mut dio = SyncDio::default();
        assert!(dio.set_dout(3, true));
        assert!(dio.set_dout(5, false));
        assert!(!dio.set_dout(64, true));
        let writes: heapless::Vec<(usize, bool), 4> = dio.digital_writes().collect();
        assert_eq!(writes.as_slice(), &[(3, true), (5, false)]);
        assert!(dio.anychanged);
        dio.clear();
        assert_eq!(dio.digital_writes().count(), 0);
    }

    #[test]
    fn test_actions_mask() {
        let mut act = SegmentActions::default();
        act.set(SegmentAction::SpindleCcw, 1, 800.0);
        act.set(SegmentAction::CoolantFlood, 0, 0.0);
        assert!(act.contains(SegmentAction::SpindleCcw));
        assert!(act.contains(SegmentAction::CoolantFlood));
        assert!(!act.contains(SegmentAction::SpindleOff));
        assert_eq!(act.spindle_num, 1);
        assert_eq!(act.spindle_speed, 800.0);
        act.clear();
        assert!(act.is_empty());
    }
}
