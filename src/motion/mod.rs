//! Motion module for the trajectory planner.
//!
//! Provides the per-cycle velocity laws (trapezoidal, ramp and jerk-limited),
//! the lookahead velocity helpers and the feed limit resolution shared by the
//! blend engine and the cycle.

mod limits;
mod profile;
mod scurve;

pub use limits::FeedLimits;
pub use profile::{
    end_condition_split, optimal_final_velocity, optimization_initial_velocity, ramp_accel,
    trapezoidal_accel, triangle_velocity, update_dist_from_accel, AccelCommand, CycleLimits,
    EndCondition,
};
pub use scurve::{
    effective_jerk, finish_distance, next_accel, scurve_accel, scurve_final_velocity, scurve_max_start_speed,
    scurve_v_peak,
};
