//! Parabolic blend velocities.
//!
//! A parabolic blend overlaps the end of one segment with the start of the
//! next and runs both at once. These helpers size the velocities at which
//! the overlap starts.

use libm::{cos, sin, sqrt};

use crate::consts::TP_MIN_ARC_ANGLE;
use crate::motion::{triangle_velocity, FeedLimits};
use crate::segment::Segment;

use super::geom3::intersection_angle;

/// Velocities at which a parabolic blend starts on each side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendVelocity {
    /// Velocity of the ending segment when the blend starts.
    pub this: f64,
    /// Velocity the next segment reaches by the end of the blend.
    pub next: f64,
    /// Net velocity along the blend tangent.
    pub net: f64,
}

/// Size a parabolic blend between `tc` and `next`, aiming at the given
/// target velocities.
///
/// The blend may use at most half of either segment, and with a tolerance
/// set it starts late enough that the corner is cut by no more than the
/// tolerance.
pub fn compute_blend_velocity(tc: &Segment, next: &Segment, target_vel_this: f64, target_vel_next: f64) -> BlendVelocity {
    let acc_this = tc.tangential_max_accel();
    let acc_next = next.tangential_max_accel();

    let v_reach_this = triangle_velocity(tc).min(target_vel_this);
    let v_reach_next = triangle_velocity(next).min(target_vel_next);

    let t_max_reachable = (tc.target / v_reach_this).min(next.target / v_reach_next);
    let t_max_blend = (v_reach_this / acc_this).max(v_reach_next / acc_next);
    let t_blend = t_max_reachable.min(t_max_blend);

    let mut v_this = v_reach_this.min(t_blend * acc_this);
    let mut v_next = v_reach_next.min(t_blend * acc_next);

    let theta = match (tc.coords.end_tangent(), next.coords.start_tangent()) {
        (Ok(u1), Ok(u2)) => intersection_angle(u1, u2),
        _ => 0.0,
    };
    let cos_theta = cos(theta);

    if tc.tolerance > 0.0 {
        let min_cos_theta = cos(core::f64::consts::FRAC_PI_2 - TP_MIN_ARC_ANGLE);
        if cos_theta > min_cos_theta {
            // Decelerating at acc_this, the corner is cut by 2T / cos(theta)
            let v_tol = 2.0 * sqrt(acc_this * tc.tolerance / cos_theta);
            v_this = v_this.min(v_tol);
            v_next = v_next.min(v_tol);
        }
    }

    BlendVelocity {
        this: v_this,
        next: v_next,
        net: sin(theta) * (v_this + v_next) / 2.0,
    }
}

/// Best-case net velocity of a parabolic blend between `tc` and `next`.
pub fn estimate_parabolic_performance(limits: &FeedLimits, tc: &Segment, next: &Segment) -> f64 {
    compute_blend_velocity(tc, next, limits.max_target_vel(tc), limits.max_target_vel(next)).net
}
