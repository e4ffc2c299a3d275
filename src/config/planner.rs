//! Planner configuration - root configuration structure.

use heapless::{FnvIndexMap, String};
use serde::Deserialize;

use crate::segment::{AccelMode, TermCond};

use super::axes::{Axis, AxisLimits, MachineBounds};
use super::units::{Hertz, Seconds, UnitsPerSec, UnitsPerSecCubed, UnitsPerSecSquared};

/// How corners between blendable segments are rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlendMode {
    /// Circular (spherical) blend arcs, falling back to tangent kinks and
    /// parabolic blends.
    #[default]
    Arc,
    /// Quintic 9D Bezier blends.
    Bezier,
    /// Parabolic blending only; no blend geometry is inserted.
    Parabolic,
}

/// Velocity law the cycle follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlannerType {
    /// Acceleration limited only.
    #[default]
    Trapezoidal,
    /// Jerk limited as well, lookahead sized for S-curve stops.
    #[serde(rename = "scurve")]
    SCurve,
}

/// `[planner]` section: timing, queue and modal defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerSection {
    /// Servo period.
    pub cycle_time: Seconds,

    /// Segment queue capacity.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// Velocity ceiling of every move.
    pub vmax: UnitsPerSec,

    /// Velocity limit applied at run time; defaults to `vmax`.
    #[serde(default)]
    pub vlimit: Option<UnitsPerSec>,

    /// Acceleration ceiling.
    pub amax: UnitsPerSecSquared,

    /// Largest feed override the operator can dial in.
    #[serde(default = "default_max_feed_scale")]
    pub max_feed_scale: f64,

    /// Initial termination condition.
    #[serde(default)]
    pub term_cond: TermCond,

    /// Initial blend tolerance, zero meaning "as large as the segments allow".
    #[serde(default)]
    pub tolerance: f64,

    /// Default acceleration law. Tangent segments shorter than one ramp
    /// period switch to the ramp law when they start regardless.
    #[serde(default)]
    pub accel_mode: AccelMode,

    /// Segments shorter than one period of this frequency ramp instead of
    /// following a trapezoid.
    #[serde(default = "default_ramp_frequency")]
    pub ramp_frequency: Hertz,

    /// Jerk limit given to moves that do not carry their own.
    #[serde(default = "default_max_jerk")]
    pub max_jerk: UnitsPerSecCubed,

    /// Velocity law. The S-curve law bounds every move by `max_jerk`.
    #[serde(default)]
    pub planner_type: PlannerType,
}

/// `[blend]` section: corner handling and lookahead.
#[derive(Debug, Clone, Deserialize)]
pub struct BlendSection {
    /// Blend strategy.
    #[serde(default)]
    pub mode: BlendMode,

    /// Segments the optimizer walks back through. Below 2 disables tangent
    /// and blend handling.
    #[serde(default = "default_optimization_depth")]
    pub optimization_depth: usize,

    /// Previous segment is swallowed by the blend when what remains of it
    /// would last fewer cycles than this.
    #[serde(default = "default_gap_cycles")]
    pub gap_cycles: f64,

    /// Acceleration share a corner may use before it counts as a kink.
    #[serde(default = "default_tangent_kink_ratio")]
    pub tangent_kink_ratio: f64,

    /// Relative shortfall of the Bezier blend velocity still accepted as
    /// reaching the goal.
    #[serde(default = "default_bezier_velocity_rel_tol")]
    pub bezier_velocity_rel_tol: f64,

    /// Absolute shortfall of the Bezier blend velocity still accepted as
    /// reaching the goal.
    #[serde(default = "default_bezier_velocity_abs_tol")]
    pub bezier_velocity_abs_tol: f64,
}

impl Default for BlendSection {
    fn default() -> Self {
        Self {
            mode: BlendMode::default(),
            optimization_depth: default_optimization_depth(),
            gap_cycles: default_gap_cycles(),
            tangent_kink_ratio: default_tangent_kink_ratio(),
            bezier_velocity_rel_tol: default_bezier_velocity_rel_tol(),
            bezier_velocity_abs_tol: default_bezier_velocity_abs_tol(),
        }
    }
}

fn default_queue_size() -> usize {
    2000
}

fn default_max_feed_scale() -> f64 {
    1.0
}

fn default_ramp_frequency() -> Hertz {
    Hertz(100.0)
}

fn default_max_jerk() -> UnitsPerSecCubed {
    UnitsPerSecCubed(1.0e9)
}

fn default_optimization_depth() -> usize {
    50
}

fn default_gap_cycles() -> f64 {
    4.0
}

fn default_tangent_kink_ratio() -> f64 {
    0.1
}

fn default_bezier_velocity_rel_tol() -> f64 {
    0.01
}

fn default_bezier_velocity_abs_tol() -> f64 {
    0.1
}

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    /// Timing, queue and modal defaults.
    pub planner: PlannerSection,

    /// Corner handling.
    #[serde(default)]
    pub blend: BlendSection,

    /// Per-axis limits keyed by axis letter.
    #[serde(default)]
    pub axes: FnvIndexMap<String<8>, AxisLimits, 16>,
}

impl PlannerConfig {
    /// Limits configured for one axis.
    pub fn axis(&self, axis: Axis) -> Option<&AxisLimits> {
        self.axes
            .iter()
            .find(|(k, _)| Axis::from_name(k.as_str()).ok() == Some(axis))
            .map(|(_, v)| v)
    }

    /// List all configured axis names.
    pub fn axis_names(&self) -> impl Iterator<Item = &str> {
        self.axes.keys().map(|s| s.as_str())
    }

    /// Per-axis bounds for the blend engine. Unknown names are skipped;
    /// [`validate_config`](super::validate_config) rejects them.
    pub fn bounds(&self) -> MachineBounds {
        self.axes
            .iter()
            .filter_map(|(name, limits)| Axis::from_name(name.as_str()).ok().map(|a| (a, *limits)))
            .fold(MachineBounds::default(), |b, (axis, limits)| b.with_axis(axis, limits))
    }

    /// Run-time velocity limit.
    pub fn vlimit(&self) -> f64 {
        self.planner.vlimit.unwrap_or(self.planner.vmax).0
    }

    /// Tangent kink ratio clamped to its usable range.
    pub fn tangent_kink_ratio(&self) -> f64 {
        self.blend.tangent_kink_ratio.clamp(0.001, 0.7071)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PlannerConfig {
        PlannerConfig {
            planner: PlannerSection {
                cycle_time: Seconds(0.001),
                queue_size: 100,
                vmax: UnitsPerSec(200.0),
                vlimit: None,
                amax: UnitsPerSecSquared(1000.0),
                max_feed_scale: 1.0,
                term_cond: TermCond::Parabolic,
                tolerance: 0.0,
                accel_mode: AccelMode::Trapezoidal,
                ramp_frequency: Hertz(100.0),
                max_jerk: UnitsPerSecCubed(1e6),
                planner_type: PlannerType::Trapezoidal,
            },
            blend: BlendSection::default(),
            axes: FnvIndexMap::new(),
        }
    }

    #[test]
    fn test_bounds_from_axes() {
        let mut cfg = config();
        cfg.axes
            .insert(String::try_from("x").unwrap(), AxisLimits::new(50.0, 500.0))
            .unwrap();
        cfg.axes
            .insert(String::try_from("Z").unwrap(), AxisLimits::new(10.0, 100.0))
            .unwrap();
        let b = cfg.bounds();
        assert_eq!(b.vel[0], 50.0);
        assert_eq!(b.acc[2], 100.0);
        assert_eq!(b.vel[1], crate::consts::TP_BIG_NUM);
        assert!(cfg.axis(Axis::Z).is_some());
        assert!(cfg.axis(Axis::Y).is_none());
    }

    #[test]
    fn test_vlimit_defaults_to_vmax() {
        let mut cfg = config();
        assert_eq!(cfg.vlimit(), 200.0);
        cfg.planner.vlimit = Some(UnitsPerSec(80.0));
        assert_eq!(cfg.vlimit(), 80.0);
    }

    #[test]
    fn test_kink_ratio_clamped() {
        let mut cfg = config();
        cfg.blend.tangent_kink_ratio = 5.0;
        assert_eq!(cfg.tangent_kink_ratio(), 0.7071);
        cfg.blend.tangent_kink_ratio = 0.0;
        assert_eq!(cfg.tangent_kink_ratio(), 0.001);
    }
}
