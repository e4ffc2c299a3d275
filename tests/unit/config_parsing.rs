//! Unit tests for TOML configuration parsing.

use cnc_trajectory::config::{parse_config, Axis, BlendMode, PlannerConfig};
use cnc_trajectory::segment::{AccelMode, TermCond};

/// Test parsing a configuration that sets every planner field.
#[test]
fn test_parse_full_planner_section() {
    let toml_str = r#"
[planner]
cycle_time = 0.0005
queue_size = 500
vmax = 150.0
vlimit = 120.0
amax = 2500.0
max_feed_scale = 1.2
term_cond = "tangent"
tolerance = 0.02
accel_mode = "ramp"
ramp_frequency = 50.0
max_jerk = 1.0e6
"#;

    let config = parse_config(toml_str).expect("Failed to parse TOML");
    let p = &config.planner;

    assert_eq!(p.cycle_time.0, 0.0005);
    assert_eq!(p.queue_size, 500);
    assert_eq!(p.vmax.0, 150.0);
    assert_eq!(config.vlimit(), 120.0);
    assert_eq!(p.amax.0, 2500.0);
    assert_eq!(p.max_feed_scale, 1.2);
    assert_eq!(p.term_cond, TermCond::Tangent);
    assert_eq!(p.tolerance, 0.02);
    assert_eq!(p.accel_mode, AccelMode::Ramp);
    assert_eq!(p.ramp_frequency.0, 50.0);
    assert_eq!(p.max_jerk.0, 1.0e6);
}

/// Test that omitted fields take their defaults.
#[test]
fn test_defaults_applied() {
    let toml_str = r#"
[planner]
cycle_time = 0.001
vmax = 100.0
amax = 1000.0
"#;

    let config = parse_config(toml_str).expect("Failed to parse TOML");

    assert_eq!(config.planner.queue_size, 2000);
    assert_eq!(config.planner.max_feed_scale, 1.0);
    assert_eq!(config.planner.term_cond, TermCond::Parabolic);
    assert_eq!(config.planner.accel_mode, AccelMode::Trapezoidal);
    assert_eq!(config.planner.ramp_frequency.0, 100.0);
    assert_eq!(config.blend.mode, BlendMode::Arc);
    assert_eq!(config.blend.optimization_depth, 50);
    assert_eq!(config.blend.gap_cycles, 4.0);
    assert_eq!(config.blend.tangent_kink_ratio, 0.1);
    assert!(config.axes.is_empty());
}

/// Test parsing the blend section and per-axis limits.
#[test]
fn test_parse_blend_and_axes() {
    let toml_str = r#"
[planner]
cycle_time = 0.001
vmax = 100.0
amax = 1000.0

[blend]
mode = "parabolic"
optimization_depth = 2
gap_cycles = 2.0
bezier_velocity_rel_tol = 0.05

[axes.x]
max_velocity = 50.0
max_acceleration = 500.0

[axes.C]
max_velocity = 360.0
max_acceleration = 3600.0
"#;

    let config = parse_config(toml_str).expect("Failed to parse TOML");

    assert_eq!(config.blend.mode, BlendMode::Parabolic);
    assert_eq!(config.blend.optimization_depth, 2);
    assert_eq!(config.blend.bezier_velocity_rel_tol, 0.05);

    let x = config.axis(Axis::X).expect("x axis");
    assert_eq!(x.max_velocity.0, 50.0);
    let c = config.axis(Axis::C).expect("c axis");
    assert_eq!(c.max_acceleration.0, 3600.0);
    assert!(config.axis(Axis::Y).is_none());

    let bounds = config.bounds();
    assert_eq!(bounds.vel[Axis::X.index()], 50.0);
    assert_eq!(bounds.acc[Axis::C.index()], 3600.0);
}

/// Test that the planner section is required.
#[test]
fn test_missing_planner_section() {
    let toml_str = r#"
[blend]
mode = "arc"
"#;

    let result: Result<PlannerConfig, _> = toml::from_str(toml_str);
    assert!(result.is_err());
}

/// Test that unknown enum values are rejected.
#[test]
fn test_unknown_blend_mode() {
    let toml_str = r#"
[planner]
cycle_time = 0.001
vmax = 100.0
amax = 1000.0

[blend]
mode = "spline"
"#;

    assert!(parse_config(toml_str).is_err());
}
