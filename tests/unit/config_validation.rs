//! Unit tests for configuration validation.

use cnc_trajectory::config::{validate_config, PlannerConfig, MIN_QUEUE_SIZE};
use cnc_trajectory::error::{ConfigError, Error};

fn config(planner: &str, extra: &str) -> PlannerConfig {
    let toml_str = format!(
        r#"
[planner]
cycle_time = 0.001
vmax = 100.0
amax = 1000.0
{planner}
{extra}
"#
    );
    toml::from_str(&toml_str).expect("Failed to parse TOML")
}

/// Test validation of a valid configuration.
#[test]
fn test_valid_config_passes_validation() {
    let cfg = config(
        "queue_size = 100",
        r#"
[axes.x]
max_velocity = 50.0
max_acceleration = 500.0
"#,
    );
    assert!(validate_config(&cfg).is_ok());
}

/// Test that a queue smaller than its safety margins is rejected.
#[test]
fn test_queue_too_small() {
    let cfg = config("queue_size = 10", "");
    let result = validate_config(&cfg);
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::InvalidQueueSize { size: 10, minimum })) if minimum == MIN_QUEUE_SIZE
    ));
}

/// Test that non-positive ceilings are rejected.
#[test]
fn test_non_positive_limits() {
    let mut cfg = config("", "");
    cfg.planner.vmax.0 = 0.0;
    assert!(matches!(
        validate_config(&cfg),
        Err(Error::Config(ConfigError::InvalidMaxVelocity(_)))
    ));

    let mut cfg = config("", "");
    cfg.planner.amax.0 = -1.0;
    assert!(matches!(
        validate_config(&cfg),
        Err(Error::Config(ConfigError::InvalidMaxAcceleration(_)))
    ));

    let mut cfg = config("", "");
    cfg.planner.cycle_time.0 = f64::NAN;
    assert!(matches!(
        validate_config(&cfg),
        Err(Error::Config(ConfigError::InvalidCycleTime(_)))
    ));
}

/// Test that a negative blend tolerance is rejected.
#[test]
fn test_negative_tolerance() {
    let cfg = config("tolerance = -0.1", "");
    assert!(matches!(
        validate_config(&cfg),
        Err(Error::Config(ConfigError::InvalidTolerance(_)))
    ));
}

/// Test that a zero ramp frequency is rejected.
#[test]
fn test_zero_ramp_frequency() {
    let cfg = config("ramp_frequency = 0.0", "");
    assert!(matches!(
        validate_config(&cfg),
        Err(Error::Config(ConfigError::InvalidRampFrequency(_)))
    ));
}

/// Test that unknown axis names are rejected.
#[test]
fn test_unknown_axis() {
    let cfg = config(
        "",
        r#"
[axes.q]
max_velocity = 50.0
max_acceleration = 500.0
"#,
    );
    assert!(matches!(
        validate_config(&cfg),
        Err(Error::Config(ConfigError::UnknownAxis(_)))
    ));
}

/// Test that axis limits must be positive.
#[test]
fn test_invalid_axis_limits() {
    let cfg = config(
        "",
        r#"
[axes.z]
max_velocity = 0.0
max_acceleration = 500.0
"#,
    );
    assert!(matches!(
        validate_config(&cfg),
        Err(Error::Config(ConfigError::InvalidAxisLimits { .. }))
    ));
}

/// Test that a negative Bezier velocity tolerance is rejected.
#[test]
fn test_negative_velocity_tolerance() {
    let cfg = config(
        "",
        r#"
[blend]
bezier_velocity_abs_tol = -1.0
"#,
    );
    assert!(matches!(
        validate_config(&cfg),
        Err(Error::Config(ConfigError::InvalidVelocityTolerance(_)))
    ));
}
