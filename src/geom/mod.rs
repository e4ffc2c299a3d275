//! Parametric curves used as path segments and blend transitions.
//!
//! Each curve caches derived data (length, fits, lookup tables) that must
//! stay consistent with its control data. Mutating operations (`stretch`,
//! `cut`, `trim`) update every cache before returning.

mod bezier;
mod circle;
mod line;
mod spherical;

pub use bezier::{Bezier9, BezierShape};
pub use circle::{Circle, SpiralFit};
pub use line::CartLine;
pub use spherical::SphericalArc;

use crate::error::GeomError;

/// Result alias for geometry operations.
pub type GeomResult<T> = core::result::Result<T, GeomError>;
