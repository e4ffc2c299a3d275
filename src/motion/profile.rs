//! Per-cycle velocity laws.
//!
//! Each cycle the planner picks an acceleration for the active segment,
//! integrates progress over the cycle time, and checks whether the segment
//! ends before the next cycle. The functions here are the numeric core of
//! those three steps; resolving feed scale, final velocity and acceleration
//! limits is the caller's job.

use libm::{fabs, fmax, fmin, sqrt};

use crate::consts::{TP_POS_EPSILON, TP_TIME_EPSILON, TP_VEL_EPSILON};
use crate::math::{bisaturate, find_v_peak, sq};
use crate::segment::Segment;

/// Limits resolved by the planner for one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleLimits {
    /// Feed-scaled target velocity, capped by the segment ceiling.
    pub target_vel: f64,
    /// Velocity to hand over at the end.
    pub final_vel: f64,
    /// Tangential acceleration limit.
    pub max_accel: f64,
}

/// Acceleration chosen for a cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelCommand {
    /// Acceleration to apply.
    pub acc: f64,
    /// Velocity the law is aiming for.
    pub vel_desired: f64,
}

/// Trapezoidal law: the highest velocity from which the segment can still
/// slow to `final_vel` within the remaining distance, capped at the target.
pub fn trapezoidal_accel(tc: &Segment, limits: &CycleLimits, reverse: bool) -> AccelCommand {
    let dx = tc.distance_to_go(reverse);
    let a_max = limits.max_accel;

    let term1 = sq(limits.final_vel);
    let term2 = a_max * (2.0 * dx - tc.current_vel * tc.cycle_time);
    let half_adt = a_max * tc.cycle_time * 0.5;
    let term3 = sq(half_adt);
    let disc = term1 + term2 + term3;

    let mut max_new_vel = -half_adt;
    // Negative velocities get clipped anyway
    if disc > term3 {
        max_new_vel += sqrt(disc);
    }

    let new_vel = bisaturate(max_new_vel, limits.target_vel);
    let dt = fmax(tc.cycle_time, TP_TIME_EPSILON);
    let acc = bisaturate((new_vel - tc.current_vel) / dt, a_max);

    AccelCommand {
        acc,
        vel_desired: max_new_vel,
    }
}

/// Ramp law: constant acceleration that reaches `final_vel` exactly at the
/// end of the segment. Returns `None` when the final velocity is too low to
/// ramp toward; the caller falls back to the trapezoidal law.
pub fn ramp_accel(tc: &mut Segment, limits: &CycleLimits, reverse: bool) -> Option<AccelCommand> {
    let dx = tc.distance_to_go(reverse);

    if !tc.blending_next {
        tc.vel_at_blend_start = tc.current_vel;
    }

    let vel_final = limits.final_vel;
    if vel_final < TP_VEL_EPSILON {
        tp_debug!("final velocity {} too low for ramping", vel_final);
        return None;
    }

    let vel_avg = (tc.current_vel + vel_final) / 2.0;
    let dt = if vel_avg > TP_VEL_EPSILON {
        fmax(dx / vel_avg, 1e-16)
    } else {
        1e-16
    };

    let acc_final = (vel_final - tc.current_vel) / dt;
    Some(AccelCommand {
        acc: bisaturate(acc_final, limits.max_accel),
        vel_desired: vel_final,
    })
}

/// Integrate one cycle of constant acceleration into progress and velocity.
///
/// The trapezoidal law undershoots by half a cycle, so when the velocity
/// would go negative while the end is within one cycle of cruising, the
/// segment snaps to its end.
pub fn update_dist_from_accel(tc: &mut Segment, cmd: AccelCommand, reverse: bool) {
    let dx = tc.distance_to_go(reverse);
    let mut v_next = tc.current_vel + cmd.acc * tc.cycle_time;
    tc.current_acc = cmd.acc;

    if v_next < 0.0 {
        v_next = 0.0;
        tc.current_acc = 0.0;
        if dx < tc.current_vel * tc.cycle_time {
            tc.progress = tc.end_progress(reverse);
        }
    } else {
        let displacement = (v_next + tc.current_vel) * 0.5 * tc.cycle_time;
        let signed = if reverse { -displacement } else { displacement };
        tc.progress = (tc.progress + signed).clamp(0.0, fmax(tc.target, 0.0));
    }

    tc.current_vel = v_next;
    tc.on_final_decel = fabs(cmd.vel_desired - tc.current_vel) < TP_VEL_EPSILON && cmd.acc < 0.0;
}

/// Outcome of the end-of-segment estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EndCondition {
    /// More than a cycle to go.
    Continue,
    /// Effectively at the end already; hand over at `final_vel`.
    Done {
        /// Velocity at the end.
        final_vel: f64,
    },
    /// Ends `time` seconds into the next cycle at `final_vel`.
    Split {
        /// Time left in the segment.
        time: f64,
        /// Velocity at the end.
        final_vel: f64,
    },
}

/// Estimate when a segment with `dx` left, moving at `v` toward `v_f`,
/// reaches its end, honoring the acceleration limit `a_max`.
///
/// First assumes the final velocity is reached exactly at the end. If that
/// needs more than `a_max`, solves `dx = v·t + a·t²/2` at the saturated
/// acceleration instead, which also revises the final velocity.
pub fn end_condition_split(dx: f64, v: f64, v_f: f64, a_max: f64, cycle_time: f64) -> EndCondition {
    let mut v_f = v_f;
    let v_avg = (v + v_f) / 2.0;

    // Start below the cutoff
    let mut dt = TP_TIME_EPSILON / 2.0;
    if v_avg > TP_VEL_EPSILON {
        dt = fmax(dt, dx / v_avg);
    } else if dx > v_avg * cycle_time && dx > TP_POS_EPSILON {
        return EndCondition::Continue;
    }

    let a_f = (v_f - v) / dt;
    let a = bisaturate(a_f, a_max);

    if a != a_f {
        let disc = sq(v / a) + 2.0 / a * dx;
        if disc < 0.0 {
            return EndCondition::Continue;
        }
        dt = if disc < TP_TIME_EPSILON * TP_TIME_EPSILON {
            -v / a
        } else if a > 0.0 {
            -v / a + sqrt(disc)
        } else {
            -v / a - sqrt(disc)
        };
        v_f = v + dt * a;
    }

    if dt < TP_TIME_EPSILON {
        EndCondition::Done { final_vel: v_f }
    } else if dt < cycle_time {
        EndCondition::Split { time: dt, final_vel: v_f }
    } else {
        EndCondition::Continue
    }
}

/// Peak velocity of a triangular profile over the segment, assuming a blend
/// may still take up to half of an unfinalized segment.
pub fn triangle_velocity(tc: &Segment) -> f64 {
    let length = if tc.finalized { tc.target } else { tc.target / 2.0 };
    find_v_peak(tc.tangential_max_accel(), length)
}

/// Worst-case final velocity into an unfinalized segment: stop within its
/// length, never above its target ceiling.
pub fn optimization_initial_velocity(accel: f64, target: f64, max_target_vel: f64) -> f64 {
    fmin(find_v_peak(accel, target), max_target_vel)
}

/// Highest final velocity of the previous segment from which the next one
/// (length `target`, tangential acceleration `accel`, final velocity
/// `next_final_vel`) can still slow down in time, capped at `vf_limit`.
///
/// The flag is set when the cap was hit, marking the previous segment as a
/// velocity peak.
pub fn optimal_final_velocity(next_final_vel: f64, accel: f64, target: f64, vf_limit: f64) -> (f64, bool) {
    let vs_back = sqrt(sq(next_final_vel) + 2.0 * accel * target);
    if vs_back >= vf_limit {
        (vf_limit, true)
    } else {
        (vs_back, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Pose9;
    use crate::segment::{CanonType, Coords, TermCond};

    fn seg(len: f64, cycle: f64) -> Segment {
        let mut s = Segment::new(
            Coords::line(&Pose9::ZERO, &Pose9::from_xyz(len, 0.0, 0.0)),
            cycle,
            CanonType::Feed,
            0,
            false,
        );
        s.setup_motion(10.0, 20.0, 100.0, 1000.0);
        s.target = len;
        s.term_cond = TermCond::Tangent;
        s
    }

    fn limits(target_vel: f64, final_vel: f64) -> CycleLimits {
        CycleLimits {
            target_vel,
            final_vel,
            max_accel: 100.0,
        }
    }

    #[test]
    fn test_trapezoidal_accelerates_from_rest() {
        let s = seg(10.0, 0.001);
        let cmd = trapezoidal_accel(&s, &limits(10.0, 0.0), false);
        assert!((cmd.acc - 100.0).abs() < 1e-9);
        assert!(cmd.vel_desired > 10.0);
    }

    #[test]
    fn test_trapezoidal_decelerates_near_end() {
        let mut s = seg(10.0, 0.001);
        s.progress = 9.9;
        s.current_vel = 10.0;
        let cmd = trapezoidal_accel(&s, &limits(10.0, 0.0), false);
        assert!(cmd.acc < 0.0);
    }

    #[test]
    fn test_ramp_needs_final_velocity() {
        let mut s = seg(1.0, 0.001);
        s.current_vel = 2.0;
        assert!(ramp_accel(&mut s, &limits(10.0, 0.0), false).is_none());
        let cmd = ramp_accel(&mut s, &limits(10.0, 4.0), false).unwrap();
        // (4 - 2) / (1 / 3)
        assert!((cmd.acc - 6.0).abs() < 1e-9);
        assert_eq!(s.vel_at_blend_start, 2.0);
    }

    #[test]
    fn test_update_dist_trapezoid_rule() {
        let mut s = seg(10.0, 0.01);
        s.current_vel = 1.0;
        update_dist_from_accel(&mut s, AccelCommand { acc: 100.0, vel_desired: 5.0 }, false);
        assert!((s.current_vel - 2.0).abs() < 1e-12);
        assert!((s.progress - 0.015).abs() < 1e-12);
        assert_eq!(s.current_acc, 100.0);
    }

    #[test]
    fn test_update_dist_snaps_on_undershoot() {
        let mut s = seg(10.0, 0.01);
        s.progress = 10.0 - 1e-4;
        s.current_vel = 0.05;
        update_dist_from_accel(&mut s, AccelCommand { acc: -100.0, vel_desired: 0.0 }, false);
        assert_eq!(s.current_vel, 0.0);
        assert_eq!(s.current_acc, 0.0);
        assert_eq!(s.progress, 10.0);
    }

    #[test]
    fn test_reverse_progress_decreases() {
        let mut s = seg(10.0, 0.01);
        s.progress = 5.0;
        s.current_vel = 1.0;
        update_dist_from_accel(&mut s, AccelCommand { acc: 0.0, vel_desired: 1.0 }, true);
        assert!((s.progress - 4.99).abs() < 1e-12);
    }

    #[test]
    fn test_end_condition_split_inside_cycle() {
        // 5 mm/s constant over 2.5 µm: half a millisecond
        match end_condition_split(2.5e-3, 5.0, 5.0, 100.0, 1e-3) {
            EndCondition::Split { time, final_vel } => {
                assert!((time - 5e-4).abs() < 1e-12);
                assert!((final_vel - 5.0).abs() < 1e-12);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(end_condition_split(1.0, 5.0, 5.0, 100.0, 1e-3), EndCondition::Continue);
    }

    #[test]
    fn test_end_condition_saturated_revises_final_velocity() {
        // Wants to go from 10 to 0 over 1 µm: far beyond a_max
        match end_condition_split(1e-3, 10.0, 0.0, 100.0, 1e-3) {
            EndCondition::Split { final_vel, .. } | EndCondition::Done { final_vel } => {
                assert!(final_vel > 9.0);
            }
            EndCondition::Continue => panic!("should end within the cycle"),
        }
    }

    #[test]
    fn test_optimal_final_velocity_caps() {
        let (v, peak) = optimal_final_velocity(0.0, 50.0, 1.0, 100.0);
        assert!((v - 10.0).abs() < 1e-12);
        assert!(!peak);
        let (v, peak) = optimal_final_velocity(0.0, 50.0, 1.0, 5.0);
        assert_eq!(v, 5.0);
        assert!(peak);
    }
}
