//! Configuration module for cnc-trajectory.
//!
//! Provides types for loading and validating planner settings and per-axis
//! machine limits from TOML files (with `std` feature) or pre-parsed data.

mod axes;
mod planner;
pub mod units;
#[cfg(feature = "std")]
mod loader;
mod validation;

pub use axes::{Axis, AxisLimits, MachineBounds};
pub use planner::{BlendMode, BlendSection, PlannerConfig, PlannerSection, PlannerType};
pub use validation::{validate_config, MIN_QUEUE_SIZE};

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};

// Re-export unit types at config level
pub use units::{Hertz, Seconds, UnitsPerSec, UnitsPerSecCubed, UnitsPerSecSquared};
