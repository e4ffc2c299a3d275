//! Unit types for physical quantities.
//!
//! Provides type-safe representations of time, frequency and the machine
//! units used for velocity, acceleration and jerk, so a cycle time cannot
//! be passed where a feed rate is expected.

use core::ops::Mul;

use serde::Deserialize;

/// Duration in seconds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct Seconds(pub f64);

impl Seconds {
    /// Create a new Seconds value.
    #[inline]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Frequency with this period.
    #[inline]
    pub fn to_hertz(self) -> Hertz {
        Hertz(1.0 / self.0)
    }
}

/// Frequency in hertz.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct Hertz(pub f64);

impl Hertz {
    /// Create a new Hertz value.
    #[inline]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Period of this frequency.
    #[inline]
    pub fn period(self) -> Seconds {
        Seconds(1.0 / self.0)
    }
}

/// Velocity in machine units per second.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct UnitsPerSec(pub f64);

impl UnitsPerSec {
    /// Create a new UnitsPerSec value.
    #[inline]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl Mul<f64> for UnitsPerSec {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

/// Acceleration in machine units per second squared.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct UnitsPerSecSquared(pub f64);

impl UnitsPerSecSquared {
    /// Create a new UnitsPerSecSquared value.
    #[inline]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl Mul<f64> for UnitsPerSecSquared {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

/// Jerk in machine units per second cubed.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct UnitsPerSecCubed(pub f64);

impl UnitsPerSecCubed {
    /// Create a new UnitsPerSecCubed value.
    #[inline]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f64 {
        self.0
    }
}

/// Extension trait for creating unit types from primitives.
pub trait UnitExt {
    /// Convert to Seconds.
    fn seconds(self) -> Seconds;
    /// Convert to Hertz.
    fn hertz(self) -> Hertz;
    /// Convert to UnitsPerSec.
    fn units_per_sec(self) -> UnitsPerSec;
    /// Convert to UnitsPerSecSquared.
    fn units_per_sec2(self) -> UnitsPerSecSquared;
    /// Convert to UnitsPerSecCubed.
    fn units_per_sec3(self) -> UnitsPerSecCubed;
}

impl UnitExt for f64 {
    #[inline]
    fn seconds(self) -> Seconds {
        Seconds(self)
    }

    #[inline]
    fn hertz(self) -> Hertz {
        Hertz(self)
    }

    #[inline]
    fn units_per_sec(self) -> UnitsPerSec {
        UnitsPerSec(self)
    }

    #[inline]
    fn units_per_sec2(self) -> UnitsPerSecSquared {
        UnitsPerSecSquared(self)
    }

    #[inline]
    fn units_per_sec3(self) -> UnitsPerSecCubed {
        UnitsPerSecCubed(self)
    }
}
