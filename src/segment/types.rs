//! Small enums shared by segments, the blend engine and the planner.

use serde::Deserialize;

/// Kind of geometry a segment follows. Derived from [`Coords`](super::Coords),
/// never stored separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionType {
    /// Straight line in up to nine axes.
    Linear,
    /// Circle, helix or spiral in XYZ with linear ABC/UVW.
    Circular,
    /// Spindle-synchronized tapping cycle.
    RigidTap,
    /// Great-circle blend arc.
    Spherical,
    /// Quintic 9D blend.
    Bezier,
    /// Timed pause.
    Dwell,
}

/// How a segment ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TermCond {
    /// Stop completely before the next segment (G61.1).
    Stop,
    /// Exact path, stop unless a kink is acceptable (G61).
    Exact,
    /// Blend into the next segment (G64).
    #[default]
    Parabolic,
    /// Next segment continues without a stop.
    Tangent,
}

/// Spindle synchronization mode of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncMode {
    /// Free running.
    #[default]
    None,
    /// Feed per revolution (G95).
    Velocity,
    /// Position locked to spindle angle (G33, rigid tap).
    Position,
}

/// Per-cycle acceleration law.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccelMode {
    /// Trapezoidal velocity profile.
    #[default]
    Trapezoidal,
    /// Constant acceleration to the final velocity, for short tangent
    /// segments.
    Ramp,
}

/// Interpreter-level motion class, reported as the active motion type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CanonType {
    /// Rapid (G0).
    Traverse,
    /// Feed (G1).
    #[default]
    Feed,
    /// Arc feed (G2/G3).
    Arc,
}

/// Optimizer bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OptimizationState {
    /// Final velocity not yet limited by the segment ceiling.
    #[default]
    Untouched,
    /// Final velocity saturated at the segment ceiling.
    AtMax,
}

/// Opaque interpreter state attached to a segment and reported while it
/// executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StateTag {
    /// Source line number.
    pub line_number: i32,
    /// Packed modal flags.
    pub flags: u32,
    /// Packed modal G/M code fields.
    pub fields: [i32; 8],
}

impl StateTag {
    /// Tag carrying only a line number.
    pub const fn line(line_number: i32) -> Self {
        Self {
            line_number,
            flags: 0,
            fields: [0; 8],
        }
    }
}
