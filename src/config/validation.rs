//! Configuration validation.

use crate::consts::{REVERSE_MARGIN, TC_QUEUE_MARGIN};
use crate::error::{ConfigError, Error, Result};

use super::axes::{Axis, AxisLimits};
use super::PlannerConfig;

/// Smallest queue that still leaves room for the margins and one move.
pub const MIN_QUEUE_SIZE: usize = TC_QUEUE_MARGIN + REVERSE_MARGIN + 2;

/// Validate a planner configuration.
///
/// Checks:
/// - Cycle time and ramp frequency are positive
/// - The queue can hold its safety margins
/// - Velocity, acceleration and jerk ceilings are positive
/// - Tolerances are not negative
/// - Every axis name is known and its limits are positive
pub fn validate_config(config: &PlannerConfig) -> Result<()> {
    let p = &config.planner;

    if !positive(p.cycle_time.0) {
        return Err(Error::Config(ConfigError::InvalidCycleTime(p.cycle_time.0)));
    }

    if p.queue_size < MIN_QUEUE_SIZE {
        return Err(Error::Config(ConfigError::InvalidQueueSize {
            size: p.queue_size,
            minimum: MIN_QUEUE_SIZE,
        }));
    }

    if !positive(p.vmax.0) {
        return Err(Error::Config(ConfigError::InvalidMaxVelocity(p.vmax.0)));
    }

    if let Some(vlimit) = p.vlimit {
        if !positive(vlimit.0) {
            return Err(Error::Config(ConfigError::InvalidMaxVelocity(vlimit.0)));
        }
    }

    if !positive(p.amax.0) {
        return Err(Error::Config(ConfigError::InvalidMaxAcceleration(p.amax.0)));
    }

    if !positive(p.max_jerk.0) {
        return Err(Error::Config(ConfigError::InvalidMaxJerk(p.max_jerk.0)));
    }

    if !positive(p.max_feed_scale) {
        return Err(Error::Config(ConfigError::InvalidFeedScale(p.max_feed_scale)));
    }

    if !non_negative(p.tolerance) {
        return Err(Error::Config(ConfigError::InvalidTolerance(p.tolerance)));
    }

    if !positive(p.ramp_frequency.0) {
        return Err(Error::Config(ConfigError::InvalidRampFrequency(
            p.ramp_frequency.0,
        )));
    }

    validate_blend(config)?;

    for (name, limits) in config.axes.iter() {
        validate_axis(name.as_str(), limits)?;
    }

    Ok(())
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

fn non_negative(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

fn validate_blend(config: &PlannerConfig) -> Result<()> {
    let b = &config.blend;
    for tol in [b.bezier_velocity_rel_tol, b.bezier_velocity_abs_tol] {
        if !non_negative(tol) {
            return Err(Error::Config(ConfigError::InvalidVelocityTolerance(tol)));
        }
    }
    Ok(())
}

fn validate_axis(name: &str, limits: &AxisLimits) -> Result<()> {
    Axis::from_name(name)?;

    if !limits.is_valid() {
        return Err(Error::Config(ConfigError::InvalidAxisLimits {
            axis: heapless::String::try_from(name).unwrap_or_default(),
            velocity: limits.max_velocity.0,
            acceleration: limits.max_acceleration.0,
        }));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_axis_limits() {
        let result = validate_axis("x", &AxisLimits::new(0.0, 100.0));
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidAxisLimits { .. }))
        ));
    }

    #[test]
    fn test_unknown_axis_name() {
        let result = validate_axis("q", &AxisLimits::new(10.0, 100.0));
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::UnknownAxis(_)))
        ));
    }

    #[test]
    fn test_min_queue_size() {
        assert_eq!(MIN_QUEUE_SIZE, 42);
    }
}
