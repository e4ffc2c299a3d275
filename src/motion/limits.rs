//! Feed override and velocity limit resolution.

use crate::segment::{Segment, SyncMode};

/// Planner-wide velocity ceilings that apply on top of each segment's own
/// limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedLimits {
    /// Largest feed override the operator can dial in.
    pub max_feed_scale: f64,
    /// Cartesian velocity limit from the velocity slider.
    pub vlimit: f64,
}

impl FeedLimits {
    /// Worst-case feed scale for a segment. Position-synchronized motion
    /// ignores the override.
    pub fn max_feed_scale_for(&self, seg: &Segment) -> f64 {
        if seg.sync_mode == SyncMode::Position {
            1.0
        } else {
            self.max_feed_scale
        }
    }

    /// Worst-case target velocity of a segment, including the velocity
    /// limit.
    ///
    /// The velocity limit does not apply to pure rotary moves, nor to
    /// position-synchronized moves whose target velocity tracks the
    /// spindle.
    pub fn max_target_vel(&self, seg: &Segment) -> f64 {
        let mut scale = self.max_feed_scale;
        if seg.is_blending {
            // Override must not push a parabolic blend past its ceiling
            scale = scale.min(1.0);
        }
        let v = seg.max_target_vel(scale);
        if !seg.coords.is_pure_rotary() && seg.sync_mode != SyncMode::Position {
            v.min(self.vlimit)
        } else {
            v
        }
    }
}

impl Default for FeedLimits {
    fn default() -> Self {
        Self {
            max_feed_scale: 1.0,
            vlimit: crate::consts::TP_BIG_NUM,
        }
    }
}
