//! Tangent and kink analysis at a segment junction.

use libm::{fabs, sqrt};

use crate::consts::{BLEND_ACC_RATIO_TANGENTIAL, SHARP_CORNER_DEG};
use crate::math::{sq, Cart3};
use crate::segment::{Coords, MotionType, Segment, TermCond};

use super::BlendContext;

/// Curvature components below this are ignored by the jerk limits.
const CURVATURE_EPSILON: f64 = 1e-12;

/// Outcome of [`setup_tangent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TangentSetup {
    /// Junction is close enough to tangent; `prev` now ends `Tangent`.
    Tangent,
    /// Junction is a kink. A kink velocity was recorded and a blend may
    /// do better.
    Kink,
    /// No tangent handling applies. `prev` may have been forced to `Stop`.
    Rejected,
}

/// Velocity at which the per-axis jerk `max_jerk` absorbs a curvature
/// jump of `delta` within one cycle.
fn jerk_limited_velocity(delta: Cart3, max_jerk: f64, cycle_time: f64) -> f64 {
    [delta.x, delta.y, delta.z]
        .iter()
        .filter(|d| fabs(**d) > CURVATURE_EPSILON)
        .map(|d| sqrt(max_jerk * cycle_time / fabs(*d)))
        .fold(1e12, f64::min)
}

/// Curvature vector of an arc at the given angle: points at the center,
/// magnitude `1/R`.
fn arc_curvature(seg: &Segment, at_end: bool) -> Cart3 {
    match &seg.coords {
        Coords::Circle { xyz, .. } => {
            let angle = if at_end { xyz.angle } else { 0.0 };
            (xyz.center - xyz.point(angle)) / sq(xyz.radius)
        }
        _ => Cart3::ZERO,
    }
}

/// Per-axis acceleration needed to turn at `a_inst`, as a fraction of each
/// axis bound.
fn accel_scale(acc_diff: Cart3, bounds: Cart3) -> Cart3 {
    let scale = |d: f64, b: f64| if b > 0.0 { fabs(d) / b } else { 0.0 };
    Cart3::new(
        scale(acc_diff.x, bounds.x),
        scale(acc_diff.y, bounds.y),
        scale(acc_diff.z, bounds.z),
    )
}

/// Check whether the junction between `prev` and `tc` can be crossed
/// without a blend, and record its kink velocity.
///
/// The kink velocity is the speed at which the direction change fits in
/// one cycle within the tangent kink ratio of the axis accelerations. It is
/// further capped so the jump in centripetal acceleration at an arc
/// junction, or across the virtual arc through two short lines, stays
/// within the jerk limit.
pub fn setup_tangent(prev: &mut Segment, tc: &mut Segment, ctx: &BlendContext) -> TangentSetup {
    if tc.coords.has_rotary_motion() || prev.coords.has_rotary_motion() {
        tp_debug!("rotary motion, no tangent check");
        return TangentSetup::Rejected;
    }
    if ctx.optimization_depth < 2 {
        tp_debug!("optimization depth {} too low for tangent check", ctx.optimization_depth);
        return TangentSetup::Rejected;
    }
    if prev.term_cond == TermCond::Stop {
        return TangentSetup::Rejected;
    }

    let prev_tan = prev.coords.end_tangent().unwrap_or(Cart3::ZERO);
    let this_tan = tc.coords.start_tangent().unwrap_or(Cart3::ZERO);

    let sharp_corner_eps = sq(core::f64::consts::PI * SHARP_CORNER_DEG / 180.0);
    if prev_tan.anti_parallel(this_tan, sharp_corner_eps) {
        tp_debug!("sharp corner, forcing exact stop");
        prev.set_term_cond(Some(tc), TermCond::Stop);
        return TangentSetup::Rejected;
    }

    // The junction velocity is bounded by the slower segment
    let v_max1 = prev.max_target_vel(ctx.limits.max_feed_scale_for(prev));
    let v_max2 = tc.max_target_vel(ctx.limits.max_feed_scale_for(tc));
    let v_max = v_max1.min(v_max2);

    // Split cycles may carry the next segment's acceleration into the turn
    let a_inst = v_max / ctx.cycle_time + tc.max_accel;
    let acc_diff = (this_tan - prev_tan) * a_inst;
    let mut acc_scale_max = accel_scale(acc_diff, ctx.bounds.xyz_acc()).abs_max();

    let any_circular = prev.motion_type() == MotionType::Circular || tc.motion_type() == MotionType::Circular;
    if any_circular {
        acc_scale_max /= BLEND_ACC_RATIO_TANGENTIAL;
    }

    let kink_ratio = ctx.tangent_kink_ratio;
    let (mut kink_vel, accel_reduction, mut result) = if acc_scale_max < kink_ratio {
        tp_debug!("kink acceleration {} within {}, tangent", acc_scale_max, kink_ratio);
        prev.set_term_cond(Some(tc), TermCond::Tangent);
        (v_max, acc_scale_max, TangentSetup::Tangent)
    } else {
        (v_max * kink_ratio / acc_scale_max, kink_ratio, TangentSetup::Kink)
    };

    let max_jerk = prev.max_jerk.min(tc.max_jerk);

    if any_circular {
        let delta = arc_curvature(tc, false) - arc_curvature(prev, true);
        kink_vel = kink_vel.min(jerk_limited_velocity(delta, max_jerk, ctx.cycle_time));
    }

    if let (Coords::Line { xyz: l1, .. }, Coords::Line { xyz: l2, .. }) = (&prev.coords, &tc.coords) {
        // Curvature of the circle through the start, the junction and the end
        let a = l1.end - l1.start;
        let b = l2.end - l1.end;
        let (a_mag, b_mag) = (a.mag(), b.mag());
        if a_mag > CURVATURE_EPSILON && b_mag > CURVATURE_EPSILON {
            let curv = (b / b_mag - a / a_mag) * (2.0 / (a_mag + b_mag));
            kink_vel = kink_vel.min(jerk_limited_velocity(curv, max_jerk, ctx.cycle_time));

            if result == TangentSetup::Kink && prev.term_cond == TermCond::Exact {
                tp_debug!("exact path line-line corner crossed at kink velocity {}", kink_vel);
                prev.set_term_cond(Some(tc), TermCond::Tangent);
                result = TangentSetup::Tangent;
            }
        }
    }

    prev.set_kink(tc, kink_vel, accel_reduction);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend::test_context;
    use crate::math::Pose9;
    use crate::segment::CanonType;

    fn line(start: Pose9, end: Pose9) -> Segment {
        let mut s = Segment::new(Coords::line(&start, &end), 0.001, CanonType::Feed, 0, false);
        s.setup_motion(50.0, 100.0, 1000.0, 1e9);
        s.target = s.coords.length();
        s.nominal_length = s.target;
        s
    }

    #[test]
    fn test_collinear_lines_are_tangent() {
        let ctx = test_context();
        let mut a = line(Pose9::ZERO, Pose9::from_xyz(10.0, 0.0, 0.0));
        let mut b = line(Pose9::from_xyz(10.0, 0.0, 0.0), Pose9::from_xyz(20.0, 0.0, 0.0));
        assert_eq!(setup_tangent(&mut a, &mut b, &ctx), TangentSetup::Tangent);
        assert_eq!(a.term_cond, TermCond::Tangent);
        assert!(!b.blend_prev);
        assert_eq!(a.kink_vel, 50.0);
    }

    #[test]
    fn test_right_angle_is_a_kink() {
        let ctx = test_context();
        let mut a = line(Pose9::ZERO, Pose9::from_xyz(10.0, 0.0, 0.0));
        let mut b = line(Pose9::from_xyz(10.0, 0.0, 0.0), Pose9::from_xyz(10.0, 10.0, 0.0));
        assert_eq!(setup_tangent(&mut a, &mut b, &ctx), TangentSetup::Kink);
        assert_eq!(a.term_cond, TermCond::Parabolic);
        assert!(a.kink_vel > 0.0 && a.kink_vel < 50.0);
        assert_eq!(a.kink_accel_reduce, ctx.tangent_kink_ratio);
        assert_eq!(b.kink_accel_reduce_prev, ctx.tangent_kink_ratio);
    }

    #[test]
    fn test_reversal_forces_stop() {
        let ctx = test_context();
        let mut a = line(Pose9::ZERO, Pose9::from_xyz(10.0, 0.0, 0.0));
        let mut b = line(Pose9::from_xyz(10.0, 0.0, 0.0), Pose9::ZERO);
        assert_eq!(setup_tangent(&mut a, &mut b, &ctx), TangentSetup::Rejected);
        assert_eq!(a.term_cond, TermCond::Stop);
    }

    #[test]
    fn test_exact_line_corner_promoted() {
        let ctx = test_context();
        let mut a = line(Pose9::ZERO, Pose9::from_xyz(10.0, 0.0, 0.0));
        a.term_cond = TermCond::Exact;
        let mut b = line(Pose9::from_xyz(10.0, 0.0, 0.0), Pose9::from_xyz(20.0, 1.0, 0.0));
        assert_eq!(setup_tangent(&mut a, &mut b, &ctx), TangentSetup::Tangent);
        assert_eq!(a.term_cond, TermCond::Tangent);
    }

    #[test]
    fn test_rotary_motion_rejected() {
        let ctx = test_context();
        let mut end = Pose9::from_xyz(10.0, 0.0, 0.0);
        end.a = 5.0;
        let mut a = line(Pose9::ZERO, end);
        let mut b = line(end, Pose9::from_xyz(20.0, 0.0, 0.0));
        assert_eq!(setup_tangent(&mut a, &mut b, &ctx), TangentSetup::Rejected);
        assert_eq!(a.kink_vel, -1.0);
    }

    #[test]
    fn test_jerk_limited_velocity() {
        let v = jerk_limited_velocity(Cart3::new(0.0, 0.5, 0.0), 1000.0, 0.001);
        assert!((v - sqrt(2.0)).abs() < 1e-12);
        assert_eq!(jerk_limited_velocity(Cart3::ZERO, 1000.0, 0.001), 1e12);
    }
}
