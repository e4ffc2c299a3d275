//! Per-axis machine limits.

use serde::Deserialize;

use crate::consts::TP_BIG_NUM;
use crate::error::ConfigError;
use crate::math::Cart3;

use super::units::{UnitsPerSec, UnitsPerSecSquared};

/// One of the nine machine axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    /// X translation.
    X,
    /// Y translation.
    Y,
    /// Z translation.
    Z,
    /// Rotation about X.
    A,
    /// Rotation about Y.
    B,
    /// Rotation about Z.
    C,
    /// Auxiliary linear U.
    U,
    /// Auxiliary linear V.
    V,
    /// Auxiliary linear W.
    W,
}

impl Axis {
    /// All axes in pose order.
    pub const ALL: [Axis; 9] = [
        Axis::X,
        Axis::Y,
        Axis::Z,
        Axis::A,
        Axis::B,
        Axis::C,
        Axis::U,
        Axis::V,
        Axis::W,
    ];

    /// Position of the axis in a [`Pose9`](crate::math::Pose9) array.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Look up an axis by its lowercase or uppercase letter.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownAxis` for anything else.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        let axis = match name {
            "x" | "X" => Axis::X,
            "y" | "Y" => Axis::Y,
            "z" | "Z" => Axis::Z,
            "a" | "A" => Axis::A,
            "b" | "B" => Axis::B,
            "c" | "C" => Axis::C,
            "u" | "U" => Axis::U,
            "v" | "V" => Axis::V,
            "w" | "W" => Axis::W,
            _ => {
                return Err(ConfigError::UnknownAxis(
                    heapless::String::try_from(name).unwrap_or_default(),
                ))
            }
        };
        Ok(axis)
    }

    /// Rotary axes never take part in Cartesian blending.
    #[inline]
    pub fn is_rotary(self) -> bool {
        matches!(self, Axis::A | Axis::B | Axis::C)
    }
}

/// Limits of one axis, as written in `[axes.<name>]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AxisLimits {
    /// Maximum axis velocity.
    pub max_velocity: UnitsPerSec,

    /// Maximum axis acceleration.
    pub max_acceleration: UnitsPerSecSquared,
}

impl AxisLimits {
    /// Create new axis limits.
    pub fn new(max_velocity: f64, max_acceleration: f64) -> Self {
        Self {
            max_velocity: UnitsPerSec(max_velocity),
            max_acceleration: UnitsPerSecSquared(max_acceleration),
        }
    }

    /// Both limits are positive.
    pub fn is_valid(&self) -> bool {
        self.max_velocity.0 > 0.0 && self.max_acceleration.0 > 0.0
    }
}

/// Velocity and acceleration bounds of all nine axes, in pose order.
///
/// Axes that are not configured are unconstrained (`TP_BIG_NUM`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MachineBounds {
    /// Velocity bound per axis.
    pub vel: [f64; 9],
    /// Acceleration bound per axis.
    pub acc: [f64; 9],
}

impl Default for MachineBounds {
    fn default() -> Self {
        Self {
            vel: [TP_BIG_NUM; 9],
            acc: [TP_BIG_NUM; 9],
        }
    }
}

impl MachineBounds {
    /// Same limits on every axis.
    pub fn uniform(vel: f64, acc: f64) -> Self {
        Self {
            vel: [vel; 9],
            acc: [acc; 9],
        }
    }

    /// Replace the limits of one axis.
    pub fn with_axis(mut self, axis: Axis, limits: AxisLimits) -> Self {
        self.vel[axis.index()] = limits.max_velocity.0;
        self.acc[axis.index()] = limits.max_acceleration.0;
        self
    }

    /// Velocity bounds of X, Y and Z.
    #[inline]
    pub fn xyz_vel(&self) -> Cart3 {
        Cart3::new(self.vel[0], self.vel[1], self.vel[2])
    }

    /// Acceleration bounds of X, Y and Z.
    #[inline]
    pub fn xyz_acc(&self) -> Cart3 {
        Cart3::new(self.acc[0], self.acc[1], self.acc[2])
    }

    /// Smallest positive bound of a subspace, `TP_BIG_NUM` if none is.
    pub fn active_limit(bounds: Cart3) -> f64 {
        [bounds.x, bounds.y, bounds.z]
            .iter()
            .filter(|b| **b > 0.0)
            .fold(TP_BIG_NUM, |acc, b| acc.min(*b))
    }
}
