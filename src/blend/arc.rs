//! Circular blend arcs between lines and arcs.
//!
//! Each pipeline works on copies of both parents and returns a
//! [`BlendProposal`]. Nothing in the queue changes until the proposal is
//! committed, so a rejected blend leaves both parents untouched.

use crate::consts::TP_ANGLE_EPSILON;
use crate::error::{BlendError, GeomError};
use crate::geom::{CartLine, Circle, SphericalArc};
use crate::math::Cart3;
use crate::segment::{Coords, MotionType, Segment, TermCond};

use super::geom3::{
    arc_arc_post_process, arc_from_blend_points, arc_line_post_process, check_consume, check_tangent_angle,
    circle_xyz, compute_parameters, find_points, init_arc_arc, init_arc_line, init_line_arc, init_line_line,
    line_arc_post_process, line_xyz, BlendParameters,
};
use super::parabolic::estimate_parabolic_performance;
use super::{BlendContext, BlendKind};

/// Trimmed parents and the blend segment that joins them.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendProposal {
    /// New geometry of the previous segment, `None` when it is consumed.
    pub prev: Option<Coords>,
    /// New geometry of the next segment.
    pub next: Coords,
    /// Blend segment to queue between them.
    pub blend: Segment,
    /// Previous segment is swallowed by the blend's lead-in.
    pub consume: bool,
}

impl BlendProposal {
    /// Write the trimmed geometry into the parents and hand back the blend.
    ///
    /// When `consume` is set the caller must drop `prev` from the queue.
    pub fn commit(self, prev: &mut Segment, tc: &mut Segment) -> Segment {
        if let Some(coords) = self.prev {
            prev.target = coords.length();
            prev.coords = coords;
        }
        tc.target = self.next.length();
        tc.coords = self.next;
        prev.set_term_cond(Some(tc), TermCond::Tangent);
        tc.blend_prev = false;

        let mut blend = self.blend;
        blend.atspeed = false;
        blend
    }
}

/// Corner kinds a circular blend handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcBlendType {
    /// Line into line.
    LineLine,
    /// Line into arc.
    LineArc,
    /// Arc into line.
    ArcLine,
    /// Arc into arc.
    ArcArc,
}

/// Which pipeline applies, if any. Only parabolic corners between unfinished,
/// purely Cartesian lines and arcs qualify.
pub fn blend_type(prev: &Segment, tc: &Segment) -> Option<ArcBlendType> {
    if prev.term_cond != TermCond::Parabolic {
        return None;
    }
    if tc.coords.has_rotary_motion() || prev.coords.has_rotary_motion() {
        return None;
    }
    if tc.finalized || prev.finalized {
        return None;
    }
    match (prev.motion_type(), tc.motion_type()) {
        (MotionType::Linear, MotionType::Linear) => Some(ArcBlendType::LineLine),
        (MotionType::Linear, MotionType::Circular) => Some(ArcBlendType::LineArc),
        (MotionType::Circular, MotionType::Linear) => Some(ArcBlendType::ArcLine),
        (MotionType::Circular, MotionType::Circular) => Some(ArcBlendType::ArcArc),
        _ => None,
    }
}

/// Run the pipeline matching the corner.
pub fn create_arc_blend(prev: &Segment, tc: &Segment, ctx: &BlendContext) -> Result<BlendProposal, BlendError> {
    match blend_type(prev, tc).ok_or(BlendError::NotApplicable)? {
        ArcBlendType::LineLine => line_line(prev, tc, ctx),
        ArcBlendType::LineArc => line_arc(prev, tc, ctx),
        ArcBlendType::ArcLine => arc_line(prev, tc, ctx),
        ArcBlendType::ArcArc => arc_arc(prev, tc, ctx),
    }
}

/// Pick the fastest way through the corner and set up the parents for it.
///
/// Parabolic blending halves the acceleration of both neighbours, so its
/// velocity is discounted by half before the comparison. Ties go to the
/// earlier candidate in parabolic, tangent, arc order.
pub fn choose_best_blend(prev: &mut Segment, tc: &mut Segment, blend: Option<&Segment>, ctx: &BlendContext) -> BlendKind {
    if matches!(prev.term_cond, TermCond::Exact | TermCond::Stop) {
        return BlendKind::None;
    }

    let perf = [
        (BlendKind::Parabolic, estimate_parabolic_performance(&ctx.limits, prev, tc) / 2.0),
        (BlendKind::Tangent, prev.kink_vel),
        (BlendKind::Arc, blend.map_or(0.0, |b| b.max_vel)),
    ];
    let mut best = perf[0];
    for candidate in &perf[1..] {
        if candidate.1 > best.1 {
            best = *candidate;
        }
    }
    tp_debug!(
        "blend performance: parabolic {}, tangent {}, arc {}",
        perf[0].1,
        perf[1].1,
        perf[2].1
    );

    match best.0 {
        BlendKind::Parabolic => {
            prev.remove_kink(tc);
            prev.set_term_cond(Some(tc), TermCond::Parabolic);
        }
        BlendKind::Tangent => prev.set_term_cond(Some(tc), TermCond::Tangent),
        BlendKind::Arc => prev.remove_kink(tc),
        _ => {}
    }
    best.0
}

/// Blend segment running `arc`, inheriting the previous segment's motion
/// class, outputs and tag.
fn init_from_prev(
    prev: &Segment,
    tc: &Segment,
    arc: SphericalArc,
    abc: Cart3,
    uvw: Cart3,
    param: &BlendParameters,
    ctx: &BlendContext,
) -> Segment {
    let mut blend = Segment::new(
        Coords::Spherical { arc, abc, uvw },
        ctx.cycle_time,
        prev.canon_type,
        prev.enables,
        false,
    );
    blend.setup_state(&ctx.modal);
    blend.setup_motion(param.v_req, param.v_plan, param.a_max, prev.max_jerk.min(tc.max_jerk));
    blend.syncdio = prev.syncdio;
    blend.target = blend.coords.length();
    blend.nominal_length = blend.target;
    blend.set_term_cond(None, TermCond::Tangent);
    blend.finalize_length();
    blend.tag = prev.tag;
    blend
}

fn with_line_xyz(seg: &Segment, xyz: CartLine) -> Result<Coords, BlendError> {
    if xyz.tmag_zero {
        return Err(GeomError::ZeroLength.into());
    }
    match &seg.coords {
        Coords::Line { abc, uvw, .. } => Ok(Coords::Line { xyz, abc: *abc, uvw: *uvw }),
        _ => Err(BlendError::NotApplicable),
    }
}

fn with_circle_xyz(seg: &Segment, xyz: Circle) -> Result<Coords, BlendError> {
    match &seg.coords {
        Coords::Circle { abc, uvw, .. } => Ok(Coords::Circle {
            fit: xyz.spiral_fit()?,
            xyz,
            abc: *abc,
            uvw: *uvw,
        }),
        _ => Err(BlendError::NotApplicable),
    }
}

fn line_end_axes(seg: &Segment) -> (Cart3, Cart3) {
    match &seg.coords {
        Coords::Line { abc, uvw, .. } | Coords::Circle { abc, uvw, .. } => (abc.end, uvw.end),
        _ => (Cart3::ZERO, Cart3::ZERO),
    }
}

fn line_start_axes(seg: &Segment) -> (Cart3, Cart3) {
    match &seg.coords {
        Coords::Line { abc, uvw, .. } | Coords::Circle { abc, uvw, .. } => (abc.start, uvw.start),
        _ => (Cart3::ZERO, Cart3::ZERO),
    }
}

fn check_coplanar(binormal: Cart3, normal: Cart3) -> Result<(), BlendError> {
    if binormal.colinear(normal, TP_ANGLE_EPSILON) {
        Ok(())
    } else {
        tp_debug!("blend plane not coplanar with arc");
        Err(BlendError::NotCoplanar)
    }
}

fn check_trim(trim: f64, available: f64) -> Result<(), BlendError> {
    if trim > available {
        Err(BlendError::TrimTooLong { trim, available })
    } else {
        Ok(())
    }
}

/// Blend between two lines.
pub fn line_line(prev: &Segment, tc: &Segment, ctx: &BlendContext) -> Result<BlendProposal, BlendError> {
    let (geom, mut param) = init_line_line(prev, tc, &ctx.cart_bounds(), ctx.limits.max_feed_scale)?;
    compute_parameters(&mut param)?;
    let points = find_points(&geom, &param);
    check_consume(&mut param, prev, points.trim1, ctx.gap_cycles);

    let arc = arc_from_blend_points(&points, &geom, &param)?;
    let (abc, uvw) = line_end_axes(prev);
    let blend = init_from_prev(prev, tc, arc, abc, uvw, &param, ctx);

    // Lines are cut back to the arc's tangency points
    let line1 = line_xyz(prev)?;
    let line2 = line_xyz(tc)?;
    let prev_coords = if param.consume {
        None
    } else {
        Some(with_line_xyz(prev, CartLine::new(line1.start, points.arc_start))?)
    };
    let next = with_line_xyz(tc, CartLine::new(points.arc_end, line2.end))?;

    Ok(BlendProposal {
        prev: prev_coords,
        next,
        blend,
        consume: param.consume,
    })
}

/// Blend from a line into an arc.
pub fn line_arc(prev: &Segment, tc: &Segment, ctx: &BlendContext) -> Result<BlendProposal, BlendError> {
    let (geom, mut param) = init_line_arc(prev, tc, &ctx.cart_bounds(), ctx.limits.max_feed_scale)?;
    let circ2 = circle_xyz(tc)?;
    check_coplanar(geom.binormal, circ2.normal)?;

    compute_parameters(&mut param)?;
    let mut points = line_arc_post_process(&param, &geom, circ2)?;
    check_trim(points.trim2, param.phi2_max)?;
    check_consume(&mut param, prev, points.trim1, ctx.gap_cycles);

    let mut line1 = *line_xyz(prev)?;
    line1.stretch(line1.tmag - points.trim1, false)?;
    let mut circ2 = *circ2;
    circ2.stretch(circ2.angle - points.trim2, true)?;

    // Exact end points, accounting for spiral
    points.arc_start = line1.point(line1.tmag);
    points.arc_end = circ2.point(0.0);

    let arc = arc_from_blend_points(&points, &geom, &param)?;
    let (abc, uvw) = line_end_axes(prev);
    let blend = init_from_prev(prev, tc, arc, abc, uvw, &param, ctx);
    if let Coords::Spherical { arc, .. } = &blend.coords {
        check_tangent_angle(&circ2, arc, &geom, &param, ctx.cycle_time, true)?;
    }

    let prev_coords = if param.consume {
        None
    } else {
        Some(with_line_xyz(prev, line1)?)
    };
    Ok(BlendProposal {
        prev: prev_coords,
        next: with_circle_xyz(tc, circ2)?,
        blend,
        consume: param.consume,
    })
}

/// Blend from an arc into a line.
pub fn arc_line(prev: &Segment, tc: &Segment, ctx: &BlendContext) -> Result<BlendProposal, BlendError> {
    let (geom, mut param) = init_arc_line(prev, tc, &ctx.cart_bounds(), ctx.limits.max_feed_scale)?;
    let circ1 = circle_xyz(prev)?;
    check_coplanar(geom.binormal, circ1.normal)?;

    compute_parameters(&mut param)?;
    let mut points = arc_line_post_process(&param, &geom, circ1)?;
    check_consume(&mut param, prev, points.trim1, ctx.gap_cycles);
    check_trim(points.trim1, param.phi1_max)?;

    let mut circ1 = *circ1;
    circ1.stretch(circ1.angle - points.trim1, false)?;
    let mut line2 = *line_xyz(tc)?;
    line2.stretch(line2.tmag - points.trim2, true)?;

    points.arc_start = circ1.point(circ1.angle);
    points.arc_end = line2.point(0.0);

    let arc = arc_from_blend_points(&points, &geom, &param)?;
    let (abc, uvw) = line_start_axes(tc);
    let blend = init_from_prev(prev, tc, arc, abc, uvw, &param, ctx);
    if let Coords::Spherical { arc, .. } = &blend.coords {
        check_tangent_angle(&circ1, arc, &geom, &param, ctx.cycle_time, false)?;
    }

    Ok(BlendProposal {
        prev: Some(with_circle_xyz(prev, circ1)?),
        next: with_line_xyz(tc, line2)?,
        blend,
        consume: false,
    })
}

/// Blend between two coplanar arcs.
pub fn arc_arc(prev: &Segment, tc: &Segment, ctx: &BlendContext) -> Result<BlendProposal, BlendError> {
    let circ1 = circle_xyz(prev)?;
    let circ2 = circle_xyz(tc)?;
    if !circ1.normal.colinear(circ2.normal, TP_ANGLE_EPSILON) {
        return Err(BlendError::NotCoplanar);
    }

    let (geom, mut param) = init_arc_arc(prev, tc, &ctx.cart_bounds(), ctx.limits.max_feed_scale)?;
    check_coplanar(geom.binormal, circ1.normal)?;
    check_coplanar(geom.binormal, circ2.normal)?;

    compute_parameters(&mut param)?;
    let mut points = arc_arc_post_process(&mut param, &geom, circ1, circ2)?;
    check_consume(&mut param, prev, points.trim1, ctx.gap_cycles);
    check_trim(points.trim1, param.phi1_max)?;
    check_trim(points.trim2, param.phi2_max)?;

    let mut circ1 = *circ1;
    circ1.stretch(circ1.angle - points.trim1, false)?;
    let mut circ2 = *circ2;
    circ2.stretch(circ2.angle - points.trim2, true)?;

    points.arc_start = circ1.point(circ1.angle);
    points.arc_end = circ2.point(0.0);

    let arc = arc_from_blend_points(&points, &geom, &param)?;
    let (abc, uvw) = line_end_axes(prev);
    let blend = init_from_prev(prev, tc, arc, abc, uvw, &param, ctx);
    if let Coords::Spherical { arc, .. } = &blend.coords {
        check_tangent_angle(&circ1, arc, &geom, &param, ctx.cycle_time, false)?;
        check_tangent_angle(&circ2, arc, &geom, &param, ctx.cycle_time, true)?;
    }

    Ok(BlendProposal {
        prev: Some(with_circle_xyz(prev, circ1)?),
        next: with_circle_xyz(tc, circ2)?,
        blend,
        consume: false,
    })
}
