//! 9D quintic Bezier blends.
//!
//! The blend replaces the last `Rb` of the previous segment and the first
//! `Rb` of the next with a G2 quintic. Sizing searches for the largest `Rb`
//! whose curve stays within the path tolerance while sustaining the target
//! velocity, and settles for a slower curve when the corner is too sharp.

use alloc::boxed::Box;

use libm::{cos, sqrt};

use crate::consts::{
    BEZIER9_GOLDEN_RATIO, BLEND9_ALPHA_MAX_RATIO, BLEND9_ALPHA_MIN_RATIO, BLEND9_ALPHA_SEARCH_ITERS,
    BLEND9_CIRC_MAX_ANGLE, BLEND9_MAX_ITERATIONS, BLEND9_MAX_SEGMENT_USE, BLEND9_MIN_SEGMENT_LENGTH,
    BLEND9_MIN_THETA, BLEND9_TOLERANCE_RATIO, BLEND_ACC_RATIO_TANGENTIAL, TP_BIG_NUM,
    TP_MAG_EPSILON, TP_POS_EPSILON,
};
use crate::error::{BlendError, GeomError};
use crate::geom::{Bezier9, BezierShape};
use crate::math::{sq, Cart3, Pose9};
use crate::segment::{CanonType, Coords, MotionType, OptimizationState, Segment, SyncMode, TermCond};

use super::arc::BlendProposal;
use super::geom3::{find_max_value_along_dir, find_max_value_on_plane, intersection_angle};
use super::BlendContext;

/// Result of sizing a Bezier blend.
#[derive(Debug, Clone, PartialEq)]
pub struct Blend9Solution {
    /// Curve shape at the chosen size.
    pub shape: BezierShape,
    /// Blend region size on each side of the corner.
    pub rb: f64,
    /// Planned velocity through the blend.
    pub v_plan: f64,
    /// Length removed from the end of the previous segment.
    pub trim_prev: f64,
    /// Length removed from the start of the next segment.
    pub trim_tc: f64,
}

/// Corner state sampled at one trial blend size.
#[derive(Debug, Clone, Copy)]
struct Boundary {
    p_start: Pose9,
    p_end: Pose9,
    u_start: Pose9,
    u_end: Pose9,
    corner: Cart3,
    s_prev: f64,
    s_tc: f64,
}

/// Limits shared by every trial.
#[derive(Debug, Clone, Copy)]
struct Limits9 {
    tolerance: f64,
    v_goal: f64,
    a_max: f64,
    j_max: f64,
}

/// Reject corners a Bezier blend cannot handle.
pub fn check_blend9(prev: &Segment, tc: &Segment) -> Result<(), BlendError> {
    let skip = |t: MotionType| matches!(t, MotionType::RigidTap | MotionType::Dwell);
    if skip(prev.motion_type()) || skip(tc.motion_type()) {
        return Err(BlendError::NotApplicable);
    }
    if prev.motion_type() == MotionType::Bezier {
        return Err(BlendError::NotApplicable);
    }
    if (prev.canon_type == CanonType::Traverse) != (tc.canon_type == CanonType::Traverse) {
        tp_debug!("no bezier blend between traverse and feed");
        return Err(BlendError::NotApplicable);
    }
    if prev.target < BLEND9_MIN_SEGMENT_LENGTH || tc.target < BLEND9_MIN_SEGMENT_LENGTH {
        tp_debug!("segments too short for bezier blend: {} {}", prev.target, tc.target);
        return Err(BlendError::NotApplicable);
    }
    if matches!(prev.term_cond, TermCond::Stop | TermCond::Exact) {
        return Err(BlendError::NotApplicable);
    }
    Ok(())
}

/// Path tolerance of a Bezier blend. An unset tolerance allows half of the
/// segment, and no more than half of either nominal length is ever used.
pub fn find_blend_tolerance9(prev: &Segment, tc: &Segment) -> f64 {
    let side = |s: &Segment| {
        if s.tolerance > 0.0 {
            s.tolerance
        } else {
            s.nominal_length * BLEND9_TOLERANCE_RATIO
        }
    };
    side(prev)
        .min(side(tc))
        .min(prev.nominal_length * BLEND9_TOLERANCE_RATIO)
        .min(tc.nominal_length * BLEND9_TOLERANCE_RATIO)
}

/// Largest blend region either segment can give up.
pub fn max_blend_region(prev: &Segment, tc: &Segment) -> f64 {
    let usable = |s: &Segment| {
        let l = s.target.min(s.nominal_length * BLEND9_MAX_SEGMENT_USE);
        match &s.coords {
            Coords::Circle { xyz, .. } => l.min(BLEND9_CIRC_MAX_ANGLE * xyz.radius),
            _ => l,
        }
    };
    usable(prev).min(usable(tc))
}

/// Per-axis velocity and acceleration bounds. XYZ is further capped by the
/// slower segment; zero means unconstrained.
fn axis_bounds(prev: &Segment, tc: &Segment, ctx: &BlendContext) -> ([f64; 9], [f64; 9]) {
    let mut vel = ctx.bounds.vel;
    let mut acc = ctx.bounds.acc;
    let v_seg = prev.max_vel.min(tc.max_vel);
    let a_seg = prev.max_accel.min(tc.max_accel);
    for i in 0..3 {
        vel[i] = vel[i].min(v_seg);
        acc[i] = acc[i].min(a_seg);
    }
    for b in vel.iter_mut().chain(acc.iter_mut()) {
        if *b >= TP_BIG_NUM {
            *b = 0.0;
        }
    }
    (vel, acc)
}

/// Largest scalar in the plane of the two tangents, or along the entry
/// tangent when they are collinear.
fn planar_limit(u_start: &Pose9, u_end: &Pose9, bounds: &[f64; 9]) -> f64 {
    let u_mag = u_start.mag();
    if u_mag < TP_MAG_EPSILON {
        return TP_BIG_NUM;
    }
    let u = *u_start * (1.0 / u_mag);
    let ua = u.to_array();
    let ea = u_end.to_array();
    let dot: f64 = ua.iter().zip(ea.iter()).map(|(a, b)| a * b).sum();
    let v = *u_end - u * dot;
    let v_mag = v.mag();
    if v_mag < TP_MAG_EPSILON {
        find_max_value_along_dir(&ua, bounds)
    } else {
        find_max_value_on_plane(&ua, &(v * (1.0 / v_mag)).to_array(), bounds)
    }
}

fn boundary(prev: &Segment, tc: &Segment, rb: f64) -> Result<Boundary, GeomError> {
    let s_prev = (prev.target - rb).max(0.0);
    let s_tc = rb.min(tc.target);
    Ok(Boundary {
        p_start: prev.coords.pos_at(s_prev, prev.target)?,
        p_end: tc.coords.pos_at(s_tc, tc.target)?,
        u_start: prev.coords.tangent9_at(s_prev, prev.target)?,
        u_end: tc.coords.tangent9_at(s_tc, tc.target)?,
        corner: tc.coords.pos_at(0.0, tc.target)?.tran,
        s_prev,
        s_tc,
    })
}

fn trial_shape(b: &Boundary, alpha: f64) -> Result<BezierShape, GeomError> {
    BezierShape::new(b.p_start, b.p_end, b.u_start, b.u_end, alpha)
}

/// Golden-section search for the control distance that maximizes the
/// sustainable velocity.
fn optimal_shape(b: &Boundary, rb: f64, lim: &Limits9) -> Option<BezierShape> {
    let score = |alpha: f64| {
        trial_shape(b, alpha).map_or(0.0, |s| s.acc_limit(lim.v_goal, lim.a_max, lim.j_max))
    };
    let mut lo = rb * BLEND9_ALPHA_MIN_RATIO;
    let mut hi = rb * BLEND9_ALPHA_MAX_RATIO;
    let mut x1 = hi - BEZIER9_GOLDEN_RATIO * (hi - lo);
    let mut x2 = lo + BEZIER9_GOLDEN_RATIO * (hi - lo);
    let mut f1 = score(x1);
    let mut f2 = score(x2);
    for _ in 0..BLEND9_ALPHA_SEARCH_ITERS {
        if f1 < f2 {
            lo = x1;
            x1 = x2;
            f1 = f2;
            x2 = lo + BEZIER9_GOLDEN_RATIO * (hi - lo);
            f2 = score(x2);
        } else {
            hi = x2;
            x2 = x1;
            f2 = f1;
            x1 = hi - BEZIER9_GOLDEN_RATIO * (hi - lo);
            f1 = score(x1);
        }
    }
    trial_shape(b, 0.5 * (lo + hi)).ok()
}

/// Whether `v` is close enough to `v_goal` to count as full speed.
fn velocity_ok(v: f64, v_goal: f64, ctx: &BlendContext) -> bool {
    v >= v_goal * (1.0 - ctx.vel_rel_tol) || v >= v_goal - ctx.vel_abs_tol
}

/// Bisect the blend region size in `(0, rb_max]`. `trial` returns a
/// solution when the size fits; any failure shrinks the upper bound and the
/// search carries on.
fn search_blend_size<F>(rb_max: f64, mut trial: F) -> Option<Blend9Solution>
where
    F: FnMut(f64) -> Option<Blend9Solution>,
{
    let mut lo = TP_POS_EPSILON;
    let mut hi = rb_max;
    let mut best = None;
    for _ in 0..BLEND9_MAX_ITERATIONS {
        let rb = 0.5 * (lo + hi);
        match trial(rb) {
            Some(sol) => {
                best = Some(sol);
                lo = rb;
            }
            None => hi = rb,
        }
        if best.is_some() && hi - lo < 0.01 * rb_max {
            break;
        }
    }
    best
}

/// Size a Bezier blend for the corner between `prev` and `tc`.
pub fn size_blend9(prev: &Segment, tc: &Segment, ctx: &BlendContext) -> Result<Blend9Solution, BlendError> {
    let tolerance = find_blend_tolerance9(prev, tc);
    if tolerance <= 0.0 {
        return Err(BlendError::Tolerance);
    }
    let rb_max = max_blend_region(prev, tc);
    if rb_max <= TP_POS_EPSILON {
        return Err(BlendError::NotApplicable);
    }

    let (vel_bounds, acc_bounds) = axis_bounds(prev, tc, ctx);
    let edge = boundary(prev, tc, rb_max)?;
    let u_start = edge.u_start.tran.unit_or_zero();
    let u_end = edge.u_end.tran.unit_or_zero();
    // No corner on a straight continuation
    if u_start.dot(u_end) > cos(BLEND9_MIN_THETA) {
        return Err(BlendError::Collinear);
    }
    if intersection_angle(u_start, u_end) < BLEND9_MIN_THETA {
        return Err(BlendError::Collinear);
    }

    let a_max = prev.max_accel.min(tc.max_accel);
    let mfs = ctx.limits.max_feed_scale;
    let v_goal = prev
        .max_target_vel(mfs)
        .max(tc.max_target_vel(mfs))
        .min(planar_limit(&edge.u_start, &edge.u_end, &vel_bounds));
    let a_planar = planar_limit(&edge.u_start, &edge.u_end, &acc_bounds);
    let lim = Limits9 {
        tolerance,
        v_goal,
        a_max: a_max.min(a_planar),
        j_max: prev.max_jerk.min(tc.max_jerk),
    };

    let mut best = search_blend_size(rb_max, |rb| {
        let b = boundary(prev, tc, rb).ok()?;
        let shape = optimal_shape(&b, rb, &lim)?;
        let v = shape.acc_limit(lim.v_goal, lim.a_max, lim.j_max);
        if v <= 0.0 || shape.deviation(b.corner) > lim.tolerance {
            return None;
        }
        // Within tolerance; a slower curve is still better than none
        let v_plan = if velocity_ok(v, lim.v_goal, ctx) { v.min(lim.v_goal) } else { v };
        Some(Blend9Solution {
            shape,
            rb,
            v_plan,
            trim_prev: prev.target - b.s_prev,
            trim_tc: b.s_tc,
        })
    });

    if best.is_none() {
        let shape = optimal_shape(&edge, rb_max, &lim).ok_or(BlendError::Tolerance)?;
        let v = shape.acc_limit(lim.v_goal, lim.a_max, lim.j_max);
        if v > 0.0 && shape.deviation(edge.corner) <= lim.tolerance {
            best = Some(Blend9Solution {
                shape,
                rb: rb_max,
                v_plan: v.min(lim.v_goal),
                trim_prev: prev.target - edge.s_prev,
                trim_tc: edge.s_tc,
            });
        }
    }

    let sol = best.ok_or(BlendError::Tolerance)?;
    if sol.v_plan <= 0.0 {
        return Err(BlendError::RadiusTooSmall(sol.shape.min_radius));
    }
    tp_debug!("bezier blend rb {}, v_plan {}, goal {}", sol.rb, sol.v_plan, lim.v_goal);
    Ok(sol)
}

/// Shorten `coords` of length `target` to `new_target`, keeping its start
/// (or its end when `keep_end` is set). Returns the new length.
pub fn trim_coords(coords: &mut Coords, target: f64, new_target: f64, keep_end: bool) -> Result<f64, GeomError> {
    if target <= TP_POS_EPSILON || new_target <= TP_POS_EPSILON {
        return Err(GeomError::ZeroLength);
    }
    let ratio = new_target / target;
    match coords {
        Coords::Line { xyz, abc, uvw } => {
            xyz.scale_len(ratio, keep_end)?;
            abc.scale_len(ratio, keep_end)?;
            uvw.scale_len(ratio, keep_end)?;
        }
        Coords::Circle { xyz, fit, abc, uvw } => {
            let new_angle = if keep_end {
                xyz.angle - xyz.angle_from_progress(fit, target - new_target)?
            } else {
                xyz.angle_from_progress(fit, new_target)?
            };
            xyz.cut(new_angle, keep_end)?;
            *fit = xyz.spiral_fit()?;
            abc.scale_len(ratio, keep_end)?;
            uvw.scale_len(ratio, keep_end)?;
        }
        Coords::Spherical { arc, .. } => arc.trim(ratio, keep_end)?,
        _ => return Err(GeomError::Unsupported),
    }
    let len = coords.length();
    if len <= TP_POS_EPSILON {
        return Err(GeomError::ZeroLength);
    }
    Ok(len)
}

/// Trim a segment in place by `amount`.
pub fn trim_segment(seg: &mut Segment, amount: f64, keep_end: bool) -> Result<(), GeomError> {
    seg.target = trim_coords(&mut seg.coords, seg.target, seg.target - amount, keep_end)?;
    Ok(())
}

fn blend_segment(prev: &Segment, tc: &Segment, sol: &Blend9Solution, ctx: &BlendContext) -> Result<Segment, BlendError> {
    let bez = Bezier9::from_shape(sol.shape.clone())?;
    let mut blend = Segment::new(Coords::Bezier(Box::new(bez)), ctx.cycle_time, prev.canon_type, prev.enables, false);
    blend.setup_state(&ctx.modal);
    blend.tolerance = prev.tolerance.min(tc.tolerance);
    blend.sync_mode = SyncMode::None;

    let a_max = prev.max_accel.min(tc.max_accel);
    let j_max = prev.max_jerk.min(tc.max_jerk);
    let v_req = prev.req_vel.max(tc.req_vel);
    blend.setup_motion(v_req, sol.v_plan, a_max, j_max);
    blend.kink_vel = sol.shape.acc_limit(v_req, a_max, j_max);

    blend.target = blend.coords.length();
    blend.nominal_length = blend.target;
    blend.set_term_cond(None, TermCond::Tangent);

    let a_n = sq(sol.v_plan) / sol.shape.min_radius;
    blend.acc_ratio_tan = if a_n < a_max {
        sqrt(1.0 - sq(a_n / a_max))
    } else {
        BLEND_ACC_RATIO_TANGENTIAL
    };
    blend.clamp_velocity_by_length();
    blend.finalized = true;
    blend.syncdio = prev.syncdio;
    blend.tag = prev.tag;
    blend.indexer = None;
    Ok(blend)
}

/// Size a Bezier blend and trim copies of both parents to meet it.
pub fn create_bezier_blend(prev: &Segment, tc: &Segment, ctx: &BlendContext) -> Result<BlendProposal, BlendError> {
    check_blend9(prev, tc)?;
    let sol = size_blend9(prev, tc, ctx)?;

    let mut prev_coords = prev.coords.clone();
    trim_coords(&mut prev_coords, prev.target, prev.target - sol.trim_prev, false)?;
    let mut next_coords = tc.coords.clone();
    trim_coords(&mut next_coords, tc.target, tc.target - sol.trim_tc, true)?;

    let mut blend = blend_segment(prev, tc, &sol, ctx)?;
    blend.final_vel = sol.v_plan;
    Ok(BlendProposal {
        prev: Some(prev_coords),
        next: next_coords,
        blend,
        consume: false,
    })
}

/// Commit a Bezier proposal. `prev` hands over at the blend's planned
/// velocity and must be re-optimized.
pub fn commit_bezier(proposal: BlendProposal, prev: &mut Segment, tc: &mut Segment) -> Segment {
    let v_plan = proposal.blend.final_vel;
    let blend = proposal.commit(prev, tc);
    prev.final_vel = v_plan;
    prev.optimization_state = OptimizationState::Untouched;
    blend
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend::test_context;

    fn line(start: Pose9, end: Pose9) -> Segment {
        let mut s = Segment::new(Coords::line(&start, &end), 0.001, CanonType::Feed, 0, false);
        s.setup_motion(50.0, 100.0, 1000.0, 1e5);
        s.target = s.coords.length();
        s.nominal_length = s.target;
        s.tolerance = 0.05;
        s
    }

    fn corner() -> (Segment, Segment) {
        (
            line(Pose9::ZERO, Pose9::from_xyz(10.0, 0.0, 0.0)),
            line(Pose9::from_xyz(10.0, 0.0, 0.0), Pose9::from_xyz(10.0, 10.0, 0.0)),
        )
    }

    #[test]
    fn test_tolerance_defaults_to_half_segment() {
        let (mut a, mut b) = corner();
        a.tolerance = 0.0;
        b.tolerance = 0.0;
        assert_eq!(find_blend_tolerance9(&a, &b), 5.0);
        a.tolerance = 0.2;
        assert_eq!(find_blend_tolerance9(&a, &b), 0.2);
    }

    #[test]
    fn test_max_blend_region_limits_arcs() {
        let (a, _) = corner();
        let coords = Coords::circle(
            &Pose9::from_xyz(10.0, 0.0, 0.0),
            &Pose9::from_xyz(12.0, 0.0, 0.0),
            Cart3::new(11.0, 0.0, 0.0),
            Cart3::new(0.0, 0.0, 1.0),
            0,
        )
        .unwrap();
        let mut c = Segment::new(coords, 0.001, CanonType::Arc, 0, false);
        c.target = c.coords.length();
        c.nominal_length = c.target;
        let rb = max_blend_region(&a, &c);
        assert!((rb - BLEND9_CIRC_MAX_ANGLE).abs() < 1e-9);
    }

    #[test]
    fn test_guards() {
        let (mut a, b) = corner();
        assert!(check_blend9(&a, &b).is_ok());
        a.term_cond = TermCond::Exact;
        assert_eq!(check_blend9(&a, &b), Err(BlendError::NotApplicable));
        let (mut a, b) = corner();
        a.canon_type = CanonType::Traverse;
        assert_eq!(check_blend9(&a, &b), Err(BlendError::NotApplicable));
        let short = line(Pose9::ZERO, Pose9::from_xyz(0.05, 0.0, 0.0));
        assert_eq!(check_blend9(&short, &b), Err(BlendError::NotApplicable));
    }

    #[test]
    fn test_collinear_corner_rejected() {
        let ctx = test_context();
        let a = line(Pose9::ZERO, Pose9::from_xyz(10.0, 0.0, 0.0));
        let b = line(Pose9::from_xyz(10.0, 0.0, 0.0), Pose9::from_xyz(20.0, 0.0, 0.0));
        assert_eq!(size_blend9(&a, &b, &ctx), Err(BlendError::Collinear));
    }

    #[test]
    fn test_search_continues_past_failed_sample() {
        let ctx = test_context();
        let (a, b) = corner();
        let template = size_blend9(&a, &b, &ctx).unwrap();
        let mut calls = 0;
        // Sizes above 1.0 cannot be sampled
        let best = search_blend_size(4.5, |rb| {
            calls += 1;
            (rb <= 1.0).then(|| Blend9Solution { rb, ..template.clone() })
        })
        .unwrap();
        assert!(calls > 2);
        assert!(best.rb > 0.95 && best.rb <= 1.0);
    }

    #[test]
    fn test_search_without_fit_finds_nothing() {
        assert!(search_blend_size(4.5, |_| None).is_none());
    }

    #[test]
    fn test_zero_acceleration_never_plans() {
        let ctx = test_context();
        let (mut a, mut b) = corner();
        a.max_accel = 0.0;
        b.max_accel = 0.0;
        assert!(size_blend9(&a, &b, &ctx).is_err());
    }

    #[test]
    fn test_right_angle_blend_respects_tolerance() {
        let ctx = test_context();
        let (a, b) = corner();
        let sol = size_blend9(&a, &b, &ctx).unwrap();
        assert!(sol.rb > 0.0 && sol.rb <= max_blend_region(&a, &b));
        assert!(sol.shape.deviation(Cart3::new(10.0, 0.0, 0.0)) <= 0.05 + 1e-9);
        assert!(sol.v_plan > 0.0 && sol.v_plan <= 50.0 + 1e-9);
        assert!((sol.trim_prev - sol.rb).abs() < 1e-9);
        assert!((sol.trim_tc - sol.rb).abs() < 1e-9);
    }

    #[test]
    fn test_proposal_meets_trimmed_parents() {
        let ctx = test_context();
        let (mut a, mut b) = corner();
        let proposal = create_bezier_blend(&a, &b, &ctx).unwrap();
        let blend = commit_bezier(proposal, &mut a, &mut b);

        assert_eq!(blend.motion_type(), MotionType::Bezier);
        assert_eq!(a.term_cond, TermCond::Tangent);
        assert_eq!(a.optimization_state, OptimizationState::Untouched);
        assert!(a.final_vel > 0.0);

        let a_end = a.coords.end_point(a.target).unwrap();
        let blend_start = blend.coords.pos_at(0.0, blend.target).unwrap();
        let blend_end = blend.coords.pos_at(blend.target, blend.target).unwrap();
        let b_start = b.coords.pos_at(0.0, b.target).unwrap();
        assert!(a_end.tran.dist(blend_start.tran) < 1e-6);
        assert!(blend_end.tran.dist(b_start.tran) < 1e-6);
        assert!(blend.acc_ratio_tan > 0.0 && blend.acc_ratio_tan <= 1.0);
    }

    #[test]
    fn test_trim_line_keeps_direction() {
        let mut s = line(Pose9::ZERO, Pose9::from_xyz(10.0, 0.0, 0.0));
        trim_segment(&mut s, 2.0, true).unwrap();
        assert!((s.target - 8.0).abs() < 1e-12);
        let start = s.coords.pos_at(0.0, s.target).unwrap();
        assert!(start.tran.dist(Cart3::new(2.0, 0.0, 0.0)) < 1e-12);
        assert_eq!(trim_segment(&mut s, 8.0, false), Err(GeomError::ZeroLength));
    }

    #[test]
    fn test_trim_circle_from_end() {
        let coords = Coords::circle(
            &Pose9::from_xyz(1.0, 0.0, 0.0),
            &Pose9::from_xyz(-1.0, 0.0, 0.0),
            Cart3::ZERO,
            Cart3::new(0.0, 0.0, 1.0),
            0,
        )
        .unwrap();
        let mut s = Segment::new(coords, 0.001, CanonType::Arc, 0, false);
        s.target = s.coords.length();
        let half = s.target / 2.0;
        trim_segment(&mut s, half, false).unwrap();
        assert!((s.target - half).abs() < 1e-6);
        let end = s.coords.end_point(s.target).unwrap();
        assert!(end.tran.dist(Cart3::new(0.0, 1.0, 0.0)) < 1e-6);
    }
}
