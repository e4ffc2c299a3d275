//! Three-dimensional blend arc sizing.
//!
//! The corner between two segments is first approximated by two lines
//! meeting at `P` (secants are used for convex arcs). The blend arc is sized
//! on that approximation, then post-processing intersects it exactly with
//! the arcs involved.

use libm::{acos, cos, fabs, sin, sqrt, tan};

use crate::consts::{BLEND_ACC_RATIO_NORMAL, TP_ANGLE_EPSILON, TP_BIG_NUM, TP_KINK_FACTOR, TP_MIN_ARC_ANGLE, TP_MIN_ARC_LENGTH, TP_POS_EPSILON};
use crate::error::BlendError;
use crate::geom::{CartLine, Circle, SphericalArc};
use crate::math::{negate, quadratic_roots, sq, Cart3};
use crate::segment::{Coords, MotionType, Segment};

/// Share of a segment's nominal length usable as default tolerance.
const TOLERANCE_RATIO: f64 = 0.25;

/// Share of the segments a blend may consume.
const GREEDINESS: f64 = 0.5;

/// Simplified corner geometry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlendGeom3 {
    /// Approximate direction into the corner.
    pub u1: Cart3,
    /// Approximate direction out of the corner.
    pub u2: Cart3,
    /// Exact tangent at the end of the previous segment.
    pub u_tan1: Cart3,
    /// Exact tangent at the start of the next segment.
    pub u_tan2: Cart3,
    /// Corner point.
    pub p: Cart3,
    /// In-plane unit vector bisecting the corner, towards the arc center.
    pub normal: Cart3,
    /// Unit normal of the blend plane.
    pub binormal: Cart3,
}

/// Inputs and results of the arc sizing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlendParameters {
    /// Acceleration bound in the blend plane.
    pub a_max: f64,
    /// Normal acceleration share of `a_max`.
    pub a_n_max: f64,
    /// Velocity at the highest feed override, capped by the plane bound.
    pub v_goal: f64,
    /// Planned blend velocity.
    pub v_plan: f64,
    /// Blend velocity at nominal feed.
    pub v_actual: f64,
    /// Requested feed, the lower of both segments.
    pub v_req: f64,
    /// Half of the corner's interior angle.
    pub theta: f64,
    /// Angle swept by the blend arc.
    pub phi: f64,
    /// Planned blend radius.
    pub r_plan: f64,
    /// Distance from the corner to the arc tangency points.
    pub d_plan: f64,
    /// Allowed deviation from the corner.
    pub tolerance: f64,
    /// Length available on the previous segment.
    pub l1: f64,
    /// Length available on the next segment.
    pub l2: f64,
    /// Largest angle that may be trimmed from a previous arc.
    pub phi1_max: f64,
    /// Largest angle that may be trimmed from a next arc.
    pub phi2_max: f64,
    /// Lead-in left over when the previous segment is consumed.
    pub line_length: f64,
    /// Arc length of the blend.
    pub s_arc: f64,
    /// Previous arc curves away from the blend.
    pub convex1: bool,
    /// Next arc curves away from the blend.
    pub convex2: bool,
    /// Previous segment is swallowed by the blend.
    pub consume: bool,
}

/// Blend arc endpoints and how much each segment loses.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlendPoints3 {
    /// Arc start on the previous segment.
    pub arc_start: Cart3,
    /// Arc end on the next segment.
    pub arc_end: Cart3,
    /// Arc center.
    pub arc_center: Cart3,
    /// Length (lines) or angle (arcs) trimmed from the previous segment.
    pub trim1: f64,
    /// Length (lines) or angle (arcs) trimmed from the next segment.
    pub trim2: f64,
}

/// Velocity and acceleration bounds of the XYZ subspace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartBounds {
    /// Per-axis velocity bound.
    pub vel: Cart3,
    /// Per-axis acceleration bound.
    pub acc: Cart3,
}

/// Half of the interior angle between two unit directions.
pub fn intersection_angle(u1: Cart3, u2: Cart3) -> f64 {
    let dot = u1.dot(u2).clamp(-1.0, 1.0);
    acos(-dot) / 2.0
}

/// Largest vector magnitude in the plane with normal `normal` that keeps
/// every axis within `bounds`.
pub fn inscribed_diameter(normal: Cart3, bounds: Cart3) -> f64 {
    let axes = [
        (Cart3::new(1.0, 0.0, 0.0), bounds.x, normal.x),
        (Cart3::new(0.0, 1.0, 0.0), bounds.y, normal.y),
        (Cart3::new(0.0, 0.0, 1.0), bounds.z, normal.z),
    ];
    axes.iter()
        .map(|&(e, bound, n_i)| {
            let planar = (e - normal * n_i).abs().mag();
            if planar > TP_POS_EPSILON {
                bound / planar
            } else {
                TP_BIG_NUM
            }
        })
        .fold(TP_BIG_NUM, f64::min)
}

/// Largest scalar along any direction of the plane spanned by the
/// orthonormal pair `u`, `v` that keeps every axis within `bounds`.
pub fn find_max_value_on_plane<const N: usize>(u: &[f64; N], v: &[f64; N], bounds: &[f64; N]) -> f64 {
    let mut m2 = TP_BIG_NUM * TP_BIG_NUM;
    for i in 0..N {
        let s = sq(u[i]) + sq(v[i]);
        let b = bounds[i];
        if s > 0.0 && b > 0.0 {
            m2 = m2.min(sq(b) / s);
        }
    }
    sqrt(m2)
}

/// Largest scalar along the unit direction `dir` that keeps every axis
/// within `bounds`.
pub fn find_max_value_along_dir<const N: usize>(dir: &[f64; N], bounds: &[f64; N]) -> f64 {
    let max_scale = dir
        .iter()
        .zip(bounds.iter())
        .filter(|(_, b)| **b > 0.0)
        .map(|(d, b)| fabs(*d) / *b)
        .fold(0.0, f64::max);
    if max_scale > 0.0 {
        1.0 / max_scale
    } else {
        TP_BIG_NUM
    }
}

/// Path tolerance of a blend between `prev` and `tc`. A zero tolerance
/// means "as much as a quarter of the segment".
pub fn find_blend_tolerance(prev: &Segment, tc: &Segment) -> f64 {
    let t1 = if prev.tolerance == 0.0 {
        prev.nominal_length * TOLERANCE_RATIO
    } else {
        prev.tolerance
    };
    let t2 = if tc.tolerance == 0.0 {
        tc.nominal_length * TOLERANCE_RATIO
    } else {
        tc.tolerance
    };
    t1.min(t2)
        .min(prev.nominal_length * TOLERANCE_RATIO)
        .min(tc.nominal_length * TOLERANCE_RATIO)
}

/// Whether an arc about `center` curves away from the blend at `p`.
pub fn arc_convex_test(center: Cart3, p: Cart3, u: Cart3, reverse: bool) -> bool {
    reverse != ((p - center).dot(u) < 0.0)
}

/// Largest tangent discontinuity the cycle can absorb at `v_plan`.
pub fn max_tangent_angle(v_plan: f64, acc_limit: f64, cycle_time: f64) -> f64 {
    let acc_margin = BLEND_ACC_RATIO_NORMAL * TP_KINK_FACTOR * acc_limit;
    let dx = v_plan / cycle_time;
    if dx > 0.0 {
        acc_margin / dx
    } else {
        TP_ANGLE_EPSILON
    }
}

impl BlendGeom3 {
    fn compute_normals(&mut self) -> Result<(), BlendError> {
        self.binormal = self.u_tan1.cross(self.u_tan2).unit().map_err(|_| BlendError::Collinear)?;
        self.normal = (self.u_tan2 - self.u_tan1).unit().map_err(|_| BlendError::Collinear)?;
        Ok(())
    }
}

pub(super) fn line_xyz(seg: &Segment) -> Result<&CartLine, BlendError> {
    match &seg.coords {
        Coords::Line { xyz, .. } => Ok(xyz),
        _ => Err(BlendError::NotApplicable),
    }
}

pub(super) fn circle_xyz(seg: &Segment) -> Result<&Circle, BlendError> {
    match &seg.coords {
        Coords::Circle { xyz, .. } => Ok(xyz),
        _ => Err(BlendError::NotApplicable),
    }
}

/// Normals, plane limits, requested velocity and tolerance, shared by all
/// four corner kinds.
fn finish_init(
    geom: &mut BlendGeom3,
    param: &mut BlendParameters,
    prev: &Segment,
    tc: &Segment,
    bounds: &CartBounds,
    max_feed_scale: f64,
) -> Result<(), BlendError> {
    param.phi = core::f64::consts::PI - param.theta * 2.0;
    geom.compute_normals()?;

    param.a_max = inscribed_diameter(geom.binormal, bounds.acc);
    param.a_n_max = param.a_max * BLEND_ACC_RATIO_NORMAL;

    param.v_req = prev.req_vel.min(tc.req_vel);
    param.v_goal = (param.v_req * max_feed_scale).min(inscribed_diameter(geom.binormal, bounds.vel));

    param.tolerance = find_blend_tolerance(prev, tc);
    Ok(())
}

/// Corner between two lines.
pub fn init_line_line(
    prev: &Segment,
    tc: &Segment,
    bounds: &CartBounds,
    max_feed_scale: f64,
) -> Result<(BlendGeom3, BlendParameters), BlendError> {
    let line1 = line_xyz(prev)?;
    let line2 = line_xyz(tc)?;
    let mut geom = BlendGeom3 {
        u1: line1.u_vec,
        u2: line2.u_vec,
        u_tan1: line1.u_vec,
        u_tan2: line2.u_vec,
        p: line1.end,
        ..Default::default()
    };
    let mut param = BlendParameters {
        theta: intersection_angle(geom.u1, geom.u2),
        ..Default::default()
    };
    finish_init(&mut geom, &mut param, prev, tc, bounds, max_feed_scale)?;

    param.l1 = prev.target.min(prev.nominal_length * GREEDINESS);
    param.l2 = tc.target * GREEDINESS;
    Ok((geom, param))
}

/// Corner from a line into an arc.
pub fn init_line_arc(
    prev: &Segment,
    tc: &Segment,
    bounds: &CartBounds,
    max_feed_scale: f64,
) -> Result<(BlendGeom3, BlendParameters), BlendError> {
    let line1 = line_xyz(prev)?;
    let circ2 = circle_xyz(tc)?;
    let u_tan1 = prev.coords.end_tangent()?;
    let u_tan2 = tc.coords.start_tangent()?;
    let theta_tan = intersection_angle(u_tan1, u_tan2);
    let p = line1.end;

    let mut param = BlendParameters::default();
    param.convex2 = arc_convex_test(circ2.center, p, u_tan1, true);
    let blend_angle_2 = if param.convex2 { theta_tan } else { core::f64::consts::FRAC_PI_2 };
    param.phi2_max = (circ2.angle / 3.0).min(blend_angle_2);
    param.theta = theta_tan;

    let u2 = if param.convex2 {
        // Secant towards a point inside the arc
        let blend_point = circ2.point(param.phi2_max / 2.0);
        param.theta = param.theta.min(theta_tan - param.phi2_max / 4.0);
        (blend_point - p).unit()?
    } else {
        u_tan2
    };
    if param.theta < core::f64::consts::FRAC_PI_6 {
        tp_debug!("line-arc theta {} below 30 degrees", param.theta);
    }

    let mut geom = BlendGeom3 {
        u1: u_tan1,
        u2,
        u_tan1,
        u_tan2,
        p,
        ..Default::default()
    };
    finish_init(&mut geom, &mut param, prev, tc, bounds, max_feed_scale)?;

    param.l1 = prev.target.min(prev.nominal_length / 2.0);
    param.l2 = if param.convex2 {
        sin(param.phi2_max / 4.0) * circ2.radius
    } else {
        param.phi2_max * circ2.radius
    };
    Ok((geom, param))
}

/// Corner from an arc into a line.
pub fn init_arc_line(
    prev: &Segment,
    tc: &Segment,
    bounds: &CartBounds,
    max_feed_scale: f64,
) -> Result<(BlendGeom3, BlendParameters), BlendError> {
    let circ1 = circle_xyz(prev)?;
    let line2 = line_xyz(tc)?;
    let u_tan1 = prev.coords.end_tangent()?;
    let u_tan2 = tc.coords.start_tangent()?;
    let theta_tan = intersection_angle(u_tan1, u_tan2);
    let p = line2.start;

    let mut param = BlendParameters::default();
    param.convex1 = arc_convex_test(circ1.center, p, u_tan2, false);
    let blend_angle_1 = if param.convex1 { theta_tan } else { core::f64::consts::FRAC_PI_2 };
    param.phi1_max = (circ1.angle * 2.0 / 3.0).min(blend_angle_1);
    param.theta = theta_tan;

    let u1 = if param.convex1 {
        let blend_point = circ1.point(circ1.angle - param.phi1_max / 2.0);
        param.theta = param.theta.min(theta_tan - param.phi1_max / 4.0);
        (p - blend_point).unit()?
    } else {
        u_tan1
    };
    if param.theta < core::f64::consts::FRAC_PI_6 {
        tp_debug!("arc-line theta {} below 30 degrees", param.theta);
    }

    let mut geom = BlendGeom3 {
        u1,
        u2: u_tan2,
        u_tan1,
        u_tan2,
        p,
        ..Default::default()
    };
    finish_init(&mut geom, &mut param, prev, tc, bounds, max_feed_scale)?;

    param.l1 = if param.convex1 {
        sin(param.phi1_max / 4.0) * circ1.radius
    } else {
        param.phi1_max * circ1.radius
    };
    param.l2 = tc.nominal_length / 2.0;
    Ok((geom, param))
}

/// Corner between two arcs.
pub fn init_arc_arc(
    prev: &Segment,
    tc: &Segment,
    bounds: &CartBounds,
    max_feed_scale: f64,
) -> Result<(BlendGeom3, BlendParameters), BlendError> {
    let circ1 = circle_xyz(prev)?;
    let circ2 = circle_xyz(tc)?;
    let u_tan1 = prev.coords.end_tangent()?;
    let u_tan2 = tc.coords.start_tangent()?;
    let theta_tan = intersection_angle(u_tan1, u_tan2);
    let p = circ2.point(0.0);

    let mut param = BlendParameters::default();
    param.convex1 = arc_convex_test(circ1.center, p, u_tan2, false);
    param.convex2 = arc_convex_test(circ2.center, p, u_tan1, true);
    let blend_angle_1 = if param.convex1 { theta_tan } else { core::f64::consts::FRAC_PI_2 };
    let blend_angle_2 = if param.convex2 { theta_tan } else { core::f64::consts::FRAC_PI_2 };
    param.phi1_max = (circ1.angle * 2.0 / 3.0).min(blend_angle_1);
    param.phi2_max = (circ2.angle / 3.0).min(blend_angle_2);
    param.theta = theta_tan;

    let u1 = if param.convex1 {
        let blend_point = circ1.point(circ1.angle - param.phi1_max / 2.0);
        param.theta = param.theta.min(theta_tan - param.phi1_max / 4.0);
        (p - blend_point).unit()?
    } else {
        u_tan1
    };
    let u2 = if param.convex2 {
        let blend_point = circ2.point(param.phi2_max / 2.0);
        param.theta = param.theta.min(theta_tan - param.phi2_max / 4.0);
        (blend_point - p).unit()?
    } else {
        u_tan2
    };

    let theta_min = core::f64::consts::PI / 12.0;
    if param.theta < theta_min {
        return Err(BlendError::AngleTooSmall(param.theta));
    }

    let mut geom = BlendGeom3 {
        u1,
        u2,
        u_tan1,
        u_tan2,
        p,
        ..Default::default()
    };
    finish_init(&mut geom, &mut param, prev, tc, bounds, max_feed_scale)?;

    param.l1 = if param.convex1 {
        sin(param.phi1_max / 4.0) * circ1.radius
    } else {
        param.phi1_max * circ1.radius
    };
    param.l2 = if param.convex2 {
        sin(param.phi2_max / 4.0) * circ2.radius
    } else {
        param.phi2_max * circ2.radius
    };
    Ok((geom, param))
}

/// Size the blend arc on the two-line approximation.
pub fn compute_parameters(param: &mut BlendParameters) -> Result<(), BlendError> {
    if param.theta < TP_MIN_ARC_ANGLE || param.phi < TP_MIN_ARC_ANGLE {
        return Err(BlendError::AngleTooSmall(param.theta));
    }
    // Distance from the arc center to the corner allowed by the tolerance
    let h_tol = param.tolerance / (1.0 - sin(param.theta));
    let d_tol = cos(param.theta) * h_tol;

    let d_geom = param.l1.min(param.l2).min(d_tol);
    let r_geom = tan(param.theta) * d_geom;

    let v_normal = sqrt(param.a_n_max * r_geom);
    param.v_plan = v_normal.min(param.v_goal);

    // Radius of the equivalent parabolic blend, so long segments are only
    // consumed as far as needed to reach the cornering speed
    let a_parabolic = param.a_max * 0.5;
    let v_triangle = sqrt(2.0 * a_parabolic * d_geom);
    let t_blend = v_triangle.min(param.v_plan) / a_parabolic;
    let s_blend = t_blend * param.v_plan;
    let r_blend = (s_blend / param.phi).min(r_geom);

    param.r_plan = (sq(param.v_plan) / param.a_n_max).max(r_blend);
    param.d_plan = param.r_plan / tan(param.theta);
    param.v_actual = param.v_plan.min(param.v_req);
    param.s_arc = param.r_plan * param.phi;

    if param.r_plan < TP_POS_EPSILON {
        return Err(BlendError::RadiusTooSmall(param.r_plan));
    }
    if param.s_arc < TP_MIN_ARC_LENGTH {
        return Err(BlendError::RadiusTooSmall(param.r_plan));
    }
    Ok(())
}

/// Decide whether the previous segment is short enough to be swallowed.
/// Only an untouched line can become the blend's lead-in.
pub fn check_consume(param: &mut BlendParameters, prev: &Segment, trim: f64, gap_cycles: f64) {
    param.consume = false;
    param.line_length = 0.0;
    if prev.motion_type() != MotionType::Linear {
        return;
    }
    let l_prev = prev.target - trim;
    let prev_seg_time = l_prev / param.v_plan;
    param.consume = prev_seg_time < gap_cycles * prev.cycle_time && prev.can_consume();
    if param.consume {
        param.line_length = l_prev;
    }
}

/// Arc endpoints on the two-line approximation.
pub fn find_points(geom: &BlendGeom3, param: &BlendParameters) -> BlendPoints3 {
    let center_dist = param.r_plan / sin(param.theta);
    BlendPoints3 {
        arc_center: geom.p + geom.normal * center_dist,
        arc_start: geom.p - geom.u1 * param.d_plan,
        arc_end: geom.p + geom.u2 * param.d_plan,
        trim1: param.d_plan,
        trim2: param.d_plan,
    }
}

/// Distance along a line from the corner to the tangency point of a blend
/// arc of radius `r` that also touches a circle, given the circle center
/// relative to `p` in line coordinates.
fn line_intersection(c_u: f64, c_n: f64, d: f64, r: f64) -> Result<f64, BlendError> {
    let (r0, r1) = quadratic_roots(1.0, 2.0 * c_u, sq(c_u) - sq(d) + sq(r - c_n)).ok_or(BlendError::Tolerance)?;
    Ok(fabs(r0).min(fabs(r1)))
}

fn angle_between(a: Cart3, b: Cart3) -> f64 {
    let dot = a.unit_or_zero().dot(b.unit_or_zero());
    acos(dot.clamp(-1.0, 1.0))
}

/// Spiral arcs are approximated by a circle about a shifted center.
fn shifted_center(circ: &Circle, u: Cart3) -> Cart3 {
    circ.center + u * (circ.spiral / circ.angle)
}

/// Exact blend points for a line-to-arc corner.
pub fn line_arc_post_process(
    param: &BlendParameters,
    geom: &BlendGeom3,
    circ2: &Circle,
) -> Result<BlendPoints3, BlendError> {
    let center2 = shifted_center(circ2, geom.u2);
    let radius2 = circ2.radius;
    let r_final = param.r_plan;
    let d2 = negate(r_final, param.convex2) + radius2;

    let r_pc2 = center2 - geom.p;
    let n1 = geom.binormal.cross(geom.u1).unit()?;
    let d_l = line_intersection(r_pc2.dot(geom.u1), r_pc2.dot(n1), d2, r_final)?;

    let c_u = geom.u1 * -d_l;
    let r_pc = c_u + n1 * r_final;
    let arc_center = geom.p + r_pc;
    if r_pc.mag() - r_final > param.tolerance {
        return Err(BlendError::Tolerance);
    }

    let r_c2c = arc_center - center2;
    Ok(BlendPoints3 {
        arc_start: geom.p + c_u,
        arc_end: center2 + r_c2c * (radius2 / d2),
        arc_center,
        trim1: d_l,
        trim2: angle_between(geom.p - center2, r_c2c),
    })
}

/// Exact blend points for an arc-to-line corner.
pub fn arc_line_post_process(
    param: &BlendParameters,
    geom: &BlendGeom3,
    circ1: &Circle,
) -> Result<BlendPoints3, BlendError> {
    let center1 = shifted_center(circ1, geom.u1);
    let radius1 = circ1.radius + circ1.spiral;
    let r_final = param.r_plan;
    let d1 = negate(r_final, param.convex1) + radius1;

    let r_pc1 = center1 - geom.p;
    let n2 = geom.binormal.cross(geom.u2).unit()?;
    let d_l = line_intersection(r_pc1.dot(geom.u2), r_pc1.dot(n2), d1, r_final)?;

    let c_u = geom.u2 * d_l;
    let r_pc = c_u + n2 * r_final;
    let arc_center = geom.p + r_pc;
    if r_pc.mag() - r_final > param.tolerance {
        return Err(BlendError::Tolerance);
    }

    let r_c1c = arc_center - center1;
    Ok(BlendPoints3 {
        arc_start: center1 + r_c1c * (radius1 / d1),
        arc_end: geom.p + c_u,
        arc_center,
        trim1: angle_between(geom.p - center1, r_c1c),
        trim2: d_l,
    })
}

/// Exact blend points for an arc-to-arc corner. Also refreshes the planned
/// radius and velocities.
pub fn arc_arc_post_process(
    param: &mut BlendParameters,
    geom: &BlendGeom3,
    circ1: &Circle,
    circ2: &Circle,
) -> Result<BlendPoints3, BlendError> {
    let center1 = shifted_center(circ1, geom.u1);
    let radius1 = circ1.radius + circ1.spiral;
    let center2 = shifted_center(circ2, geom.u2);
    let radius2 = circ2.radius;

    let r_final = param.r_plan;
    let d1 = negate(r_final, param.convex1) + radius1;
    let d2 = negate(r_final, param.convex2) + radius2;

    // Blend center in the frame spanned by the two circle centers
    let r_c1c2 = center2 - center1;
    let c2x = r_c1c2.mag();
    let cx = (-sq(d1) + sq(d2) - sq(c2x)) / (-2.0 * c2x);
    let cy_sq = sq(d1) - sq(cx);
    if !(cy_sq >= 0.0) {
        return Err(BlendError::Tolerance);
    }
    let cy = sqrt(cy_sq);

    let uc = r_c1c2.unit()?;
    let mut nc = geom.binormal.cross(uc);
    if geom.normal.dot(nc) < 0.0 {
        nc = -nc;
    }
    let nc = nc.unit()?;

    let c_x = uc * cx;
    let mut c_y = nc * cy;
    let r_pc1 = center1 - geom.p;
    let test1 = r_pc1 + c_x + c_y;
    let test2 = r_pc1 + c_x - c_y;
    if test2.mag() < test1.mag() {
        c_y = -c_y;
    }

    let r_c1c = c_x + c_y;
    let arc_center = center1 + r_c1c;
    let r_c2c = arc_center - center2;
    if (arc_center - geom.p).mag() - r_final > param.tolerance {
        return Err(BlendError::Tolerance);
    }

    let points = BlendPoints3 {
        arc_start: center1 + r_c1c * (radius1 / d1),
        arc_end: center2 + r_c2c * (radius2 / d2),
        arc_center,
        trim1: angle_between(geom.p - center1, r_c1c),
        trim2: angle_between(geom.p - center2, r_c2c),
    };

    param.r_plan = r_final;
    param.v_plan = sqrt(param.r_plan * param.a_n_max).min(param.v_plan);
    param.v_actual = param.v_plan.min(param.v_actual);
    Ok(points)
}

/// Build the blend arc. A consumed previous segment survives as the arc's
/// straight lead-in.
pub fn arc_from_blend_points(
    points: &BlendPoints3,
    geom: &BlendGeom3,
    param: &BlendParameters,
) -> Result<SphericalArc, BlendError> {
    Ok(SphericalArc::from_points(
        points.arc_start,
        points.arc_end,
        points.arc_center,
        geom.u1,
        param.line_length,
    )?)
}

/// Reject a blend arc whose tangent at the junction with `circ` deviates
/// more than the cycle can absorb.
pub fn check_tangent_angle(
    circ: &Circle,
    arc: &SphericalArc,
    geom: &BlendGeom3,
    param: &BlendParameters,
    cycle_time: f64,
    at_end: bool,
) -> Result<(), BlendError> {
    let (u_circ, u_arc) = if at_end {
        (circ.tangent(0.0)?, geom.binormal.cross(arc.r_end))
    } else {
        (circ.tangent(circ.angle)?, geom.binormal.cross(arc.r_start))
    };
    let u_arc = u_arc.unit()?;
    let blend_angle = acos(u_circ.dot(u_arc).clamp(-1.0, 1.0));
    let angle_max = max_tangent_angle(param.v_plan, param.a_max, cycle_time);
    if blend_angle > angle_max {
        tp_debug!("blend tangent angle {} above {}", blend_angle, angle_max);
        return Err(BlendError::AngleTooSmall(blend_angle));
    }
    Ok(())
}
