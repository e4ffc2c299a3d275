//! Rigid tapping cycle.
//!
//! The tool feeds down locked to the spindle, the spindle reverses, and the
//! tool follows it back out. The retraction length is only known once the
//! spindle has actually turned around, so the geometry is rebuilt in place
//! at each reversal.

use crate::consts::RIGID_TAP_OVERRUN_REVS;
use crate::geom::CartLine;
use crate::math::{Cart3, Pose9};

/// Phase of the tapping cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TapState {
    /// Feeding into the hole.
    Tapping,
    /// Reversal commanded, waiting for the spindle to turn around.
    Reversing,
    /// Backing out along the tap axis.
    Retraction,
    /// Second reversal commanded, waiting for the spindle again.
    FinalReversal,
    /// Free move back to the start point.
    FinalPlacement,
}

/// Side effect the planner must apply after a state update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapAction {
    /// Nothing to do.
    None,
    /// Multiply the commanded spindle speed by this factor.
    ScaleSpindle(f64),
    /// Drop spindle synchronization and run at full speed.
    Release,
}

/// Geometry and state of a rigid tap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTap {
    /// Path into the hole.
    pub xyz: CartLine,
    /// Rebuilt path used after the first reversal.
    pub aux_xyz: CartLine,
    /// Rotary position, constant.
    pub abc: Cart3,
    /// Auxiliary position, constant.
    pub uvw: Cart3,
    /// Progress at which the next reversal is commanded.
    pub reversal_target: f64,
    /// Spindle revolutions when the spindle turned around.
    pub spindlerevs_at_reversal: f64,
    /// Current phase.
    pub state: TapState,
    /// Speed ratio of the retraction relative to the feed in.
    pub reversal_scale: f64,
    old_spindlepos: Option<f64>,
}

impl RigidTap {
    /// Tap from the current goal position down to `end`.
    pub fn new(start: &Pose9, end: Cart3, reversal_scale: f64) -> Self {
        let xyz = CartLine::new(start.tran, end);
        Self {
            xyz,
            aux_xyz: xyz,
            abc: start.abc(),
            uvw: start.uvw(),
            reversal_target: xyz.tmag,
            spindlerevs_at_reversal: 0.0,
            state: TapState::Tapping,
            reversal_scale,
            old_spindlepos: None,
        }
    }

    /// Initial segment target: the hole depth plus room for the spindle to
    /// overrun while it reverses.
    pub fn target(&self, uu_per_rev: f64) -> f64 {
        self.xyz.tmag + RIGID_TAP_OVERRUN_REVS * uu_per_rev
    }

    /// Position at `progress` in the current phase.
    pub fn point(&self, progress: f64) -> Pose9 {
        let xyz = if self.state > TapState::Reversing {
            self.aux_xyz.point(progress)
        } else {
            self.xyz.point(progress)
        };
        Pose9::from_parts(xyz, self.abc, self.uvw)
    }

    /// Spindle position is measured from the reversal point.
    pub fn counts_from_reversal(&self) -> bool {
        matches!(self.state, TapState::Retraction | TapState::FinalReversal)
    }

    /// Advance the state machine one cycle.
    ///
    /// `spindle_pos` is the signed spindle position (already negated for a
    /// reversed spindle), `spindle_offset` the accumulated offset of the
    /// planner. `progress` and `target` are updated when the geometry is
    /// rebuilt.
    pub fn update(
        &mut self,
        spindle_pos: f64,
        spindle_offset: f64,
        uu_per_rev: f64,
        progress: &mut f64,
        target: &mut f64,
    ) -> TapAction {
        let old = *self.old_spindlepos.get_or_insert(spindle_pos);
        match self.state {
            TapState::Tapping => {
                if *progress >= self.reversal_target {
                    self.state = TapState::Reversing;
                    tp_debug!("rigid tap reversing at {}", *progress);
                    return TapAction::ScaleSpindle(-self.reversal_scale);
                }
            }
            TapState::Reversing => {
                if spindle_pos < old {
                    self.spindlerevs_at_reversal = spindle_pos + spindle_offset;
                    self.aux_xyz = CartLine::new(self.xyz.point(*progress), self.xyz.start);
                    self.reversal_target = self.aux_xyz.tmag;
                    *target = self.aux_xyz.tmag + RIGID_TAP_OVERRUN_REVS * uu_per_rev;
                    *progress = 0.0;
                    self.state = TapState::Retraction;
                    tp_debug!("rigid tap retracting, new target {}", *target);
                }
                self.old_spindlepos = Some(spindle_pos);
            }
            TapState::Retraction => {
                if *progress >= self.reversal_target {
                    self.state = TapState::FinalReversal;
                    return TapAction::ScaleSpindle(-1.0 / self.reversal_scale);
                }
            }
            TapState::FinalReversal => {
                if spindle_pos > old {
                    self.aux_xyz = CartLine::new(self.aux_xyz.point(*progress), self.xyz.start);
                    *target = self.aux_xyz.tmag;
                    *progress = 0.0;
                    self.state = TapState::FinalPlacement;
                    tp_debug!("rigid tap final placement, {} to go", *target);
                    self.old_spindlepos = Some(spindle_pos);
                    return TapAction::Release;
                }
                self.old_spindlepos = Some(spindle_pos);
            }
            TapState::FinalPlacement => {}
        }
        TapAction::None
    }
}
