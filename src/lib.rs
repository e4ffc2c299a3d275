//! # cnc-trajectory
//!
//! Blending, lookahead trajectory planner core for CNC motion control.
//!
//! ## Features
//!
//! - **Nine-axis moves**: lines, helical arcs, rigid tapping and dwells
//! - **Corner blending**: tangent kinks, circular arcs or 9D Bezier curves,
//!   with parabolic blending as the fallback
//! - **Lookahead**: a backward pass raises segment exit velocities as far as
//!   the downstream path allows
//! - **Spindle synchronization**: feed per revolution and position locked
//!   motion
//! - **Split mode**: planning and the servo cycle on separate threads,
//!   joined by a lock-free ring
//! - **no_std compatible**: needs only `alloc`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cnc_trajectory::{MoveParams, Pose9, SimHost, TrajectoryPlanner};
//!
//! let config = cnc_trajectory::load_config("planner.toml")?;
//!
//! let mut tp = TrajectoryPlanner::builder()
//!     .from_config(&config)
//!     .host(SimHost::new(1))
//!     .build()?;
//!
//! tp.add_line(Pose9::from_xyz(10.0, 0.0, 0.0), &MoveParams::feed(50.0))?;
//! tp.add_line(Pose9::from_xyz(10.0, 10.0, 0.0), &MoveParams::feed(50.0))?;
//!
//! // Once per servo period
//! while !tp.is_done() {
//!     tp.run_cycle()?;
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O and TOML parsing
//! - `alloc`: Heap allocation for no_std targets with an allocator
//! - `defmt`: Enables defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

extern crate alloc;

#[macro_use]
mod log;

// Core modules
pub mod blend;
pub mod config;
pub mod consts;
pub mod error;
pub mod geom;
pub mod host;
pub mod math;
pub mod motion;
pub mod planner;
pub mod queue;
pub mod segment;

// Re-exports for ergonomic API
pub use config::{validate_config, BlendMode, PlannerConfig, PlannerType};
pub use error::{Error, Result};
pub use host::{MotionHost, PinHost, SimHost, SpindleStatus};
pub use math::{Cart3, Pose9};
pub use planner::{
    ControlBlock, CycleStatus, ExecHandle, MotionStatus, MoveParams, PlanHandle, TrajectoryPlanner,
    TrajectoryPlannerBuilder,
};
pub use segment::{CanonType, SegmentAction, StateTag, SyncMode, TermCond};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, parse_config};

// Unit types
pub use config::units::{Hertz, Seconds, UnitsPerSec, UnitsPerSecCubed, UnitsPerSecSquared};
