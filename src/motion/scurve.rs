//! Jerk-limited (S-curve) velocity law.
//!
//! Acceleration changes by at most `jerk · cycle_time` per cycle. Each
//! cycle the law takes the acceleration that closes on the target velocity
//! fastest, unless the jerk-limited stop from the resulting state would no
//! longer fit in the distance left. The lookahead helpers size velocities
//! the same way so that the optimizer never plans a final velocity the
//! cycle cannot honor.

use libm::{cbrt, fabs, fmax, fmin, sqrt};

use crate::math::{find_v_peak, sq};
use crate::segment::Segment;

use super::profile::{AccelCommand, CycleLimits};

/// Bisection steps when the fastest acceleration does not fit.
const FEASIBLE_ITERATIONS: usize = 40;

/// Jerk for a segment: its own limit when set, never above the machine's.
pub fn effective_jerk(segment_jerk: f64, max_jerk: f64) -> f64 {
    if segment_jerk > 0.0 {
        fmin(segment_jerk, max_jerk)
    } else {
        max_jerk
    }
}

/// Highest velocity from which a jerk-limited stop down to `v_final`
/// fits in `length`, starting and ending at zero acceleration.
///
/// `None` when the acceleration or jerk limit is not positive.
pub fn scurve_max_start_speed(length: f64, v_final: f64, accel: f64, jerk: f64) -> Option<f64> {
    if accel <= 0.0 || jerk <= 0.0 {
        return None;
    }
    let d = fmax(length, 0.0);
    let ve = fmax(v_final, 0.0);

    // Triangular acceleration: J·τ³ + 2·Ve·τ = D, monotonic in τ
    let mut tau = cbrt(d / jerk);
    for _ in 0..32 {
        let f = jerk * tau * tau * tau + 2.0 * ve * tau - d;
        let df = 3.0 * jerk * tau * tau + 2.0 * ve;
        if df <= 0.0 {
            break;
        }
        let step = f / df;
        tau -= step;
        if fabs(step) < 1e-15 {
            break;
        }
    }
    let tau = fmax(tau, 0.0);
    if jerk * tau <= accel {
        return Some(ve + jerk * sq(tau));
    }

    // Trapezoidal acceleration with a constant phase of t2
    let a2 = sq(accel) / jerk;
    let b = 2.0 * ve + 3.0 * a2;
    let c = (2.0 * ve + a2) * (2.0 * accel / jerk) - 2.0 * d;
    let disc = fmax(sq(b) - 4.0 * accel * c, 0.0);
    let t2 = fmax((sqrt(disc) - b) / (2.0 * accel), 0.0);
    Some(ve + a2 + accel * t2)
}

/// Peak velocity of a jerk-limited move from rest to rest over `length`.
pub fn scurve_v_peak(accel: f64, jerk: f64, length: f64) -> f64 {
    scurve_max_start_speed(length / 2.0, 0.0, accel, jerk).unwrap_or_else(|| find_v_peak(accel, length))
}

/// Jerk-limited counterpart of
/// [`optimal_final_velocity`](super::optimal_final_velocity): the highest
/// final velocity of the previous segment from which the next one can
/// still reach `next_final_vel`, capped at `vf_limit`. The trapezoidal
/// bound also applies, so the result never exceeds it.
pub fn scurve_final_velocity(
    next_final_vel: f64,
    accel: f64,
    jerk: f64,
    target: f64,
    vf_limit: f64,
) -> (f64, bool) {
    let trapezoid = sqrt(sq(next_final_vel) + 2.0 * accel * target);
    let vs_back = match scurve_max_start_speed(target, next_final_vel, accel, jerk) {
        Some(v) => fmin(v, trapezoid),
        None => trapezoid,
    };
    if vs_back >= vf_limit {
        (vf_limit, true)
    } else {
        (vs_back, false)
    }
}

fn travel(t: f64, v: f64, a: f64, j: f64) -> f64 {
    t * (v + t * (0.5 * a + j * t / 6.0))
}

fn gained(t: f64, a: f64, j: f64) -> f64 {
    t * (a + 0.5 * j * t)
}

/// Distance needed to go from velocity `v` and acceleration `a` to `v_end`
/// at zero acceleration, within `a_max` and `j_max`.
pub fn finish_distance(v: f64, v_end: f64, a: f64, a_max: f64, j_max: f64) -> f64 {
    let mut v = v;
    let mut a = a;
    let mut d = 0.0;

    if v_end > v {
        if a < 0.0 {
            let t = -a / j_max;
            d += travel(t, v, a, j_max);
            v += gained(t, a, j_max);
            a = 0.0;
        }
        let peak = fmin(sqrt(fmax((v_end - v) * j_max + 0.5 * sq(a), 0.0)), a_max);
        if peak > a {
            let t = (peak - a) / j_max;
            d += travel(t, v, a, j_max);
            v += gained(t, a, j_max);
            a = peak;
        }
        let v_release = v_end - 0.5 * sq(a) / j_max;
        if v < v_release && a > 0.0 {
            let t = (v_release - v) / a;
            d += travel(t, v, a, 0.0);
            v += gained(t, a, 0.0);
        }
        if a > 0.0 {
            d += travel(a / j_max, v, a, -j_max);
        }
        return d;
    }

    if a > 0.0 {
        let t = a / j_max;
        d += travel(t, v, a, -j_max);
        v += gained(t, a, -j_max);
        a = 0.0;
    }
    let peak = -fmin(sqrt(fmax((v - v_end) * j_max + 0.5 * sq(a), 0.0)), a_max);
    if peak < a {
        let t = (a - peak) / j_max;
        d += travel(t, v, a, -j_max);
        v += gained(t, a, -j_max);
        a = peak;
    }
    let v_release = v_end + 0.5 * sq(a) / j_max;
    if v_release < v && a < 0.0 {
        let t = (v - v_release) / -a;
        d += travel(t, v, a, 0.0);
        v += gained(t, a, 0.0);
    }
    if a < 0.0 {
        d += travel(-a / j_max, v, a, j_max);
    }
    d
}

/// Acceleration that reaches `target_vel` fastest from `(v, a)` without
/// overshooting, one cycle of `dt` at a time.
pub fn next_accel(dt: f64, target_vel: f64, v: f64, a: f64, a_max: f64, j_max: f64) -> f64 {
    let max_da = j_max * dt;
    let err = target_vel - v;
    let tiny = max_da * dt * 1e-3;

    let requested = if err > tiny {
        -max_da + sqrt(2.0 * j_max * err + sq(max_da))
    } else if err < -tiny {
        max_da - sqrt(-2.0 * j_max * err + sq(max_da))
    } else {
        0.0
    };
    requested.clamp(-a_max, a_max).clamp(a - max_da, a + max_da)
}

/// S-curve law for one cycle.
///
/// Returns `None` when the jerk is not positive, or when even the hardest
/// jerk-limited braking no longer stops in time. The caller then falls back
/// to the trapezoidal law.
pub fn scurve_accel(tc: &Segment, limits: &CycleLimits, jerk: f64, reverse: bool) -> Option<AccelCommand> {
    let a_max = limits.max_accel;
    if jerk <= 0.0 || a_max <= 0.0 {
        return None;
    }
    let dt = tc.cycle_time;
    let dx = tc.distance_to_go(reverse);
    let v = tc.current_vel;
    let a = tc.current_acc;

    // Half a cycle of slack absorbs the stepwise acceleration
    let fits = |acc: f64| {
        let v_next = fmax(v + acc * dt, 0.0);
        let step = (v + v_next) * 0.5 * dt;
        finish_distance(v_next, limits.final_vel, acc, a_max, jerk) + 0.5 * v_next * dt <= dx - step
    };

    let mut hi = next_accel(dt, limits.target_vel, v, a, a_max, jerk);
    let mut lo = fmin(fmax(a - jerk * dt, -a_max), hi);
    if fits(hi) {
        return Some(AccelCommand {
            acc: hi,
            vel_desired: limits.target_vel,
        });
    }
    if !fits(lo) {
        tp_debug!("jerk-limited stop does not fit, {} left", dx);
        return None;
    }
    for _ in 0..FEASIBLE_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Some(AccelCommand {
        acc: lo,
        vel_desired: v + lo * dt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    use crate::math::Pose9;
    use crate::motion::update_dist_from_accel;
    use crate::segment::{CanonType, Coords, TermCond};

    fn seg(len: f64, cycle: f64) -> Segment {
        let mut s = Segment::new(
            Coords::line(&Pose9::ZERO, &Pose9::from_xyz(len, 0.0, 0.0)),
            cycle,
            CanonType::Feed,
            0,
            false,
        );
        s.setup_motion(10.0, 20.0, 1000.0, 1e5);
        s.target = len;
        s.term_cond = TermCond::Stop;
        s
    }

    /// Run a segment to its end, returning the accelerations applied.
    fn drive(s: &mut Segment, limits: &CycleLimits, jerk: f64) -> Vec<f64> {
        let mut accels = Vec::new();
        for _ in 0..10_000 {
            if s.distance_to_go(false) <= 1e-12 {
                break;
            }
            let cmd = scurve_accel(s, limits, jerk, false).unwrap();
            update_dist_from_accel(s, cmd, false);
            accels.push(cmd.acc);
        }
        accels
    }

    #[test]
    fn test_v_peak_matches_closed_form() {
        // Short move: no constant acceleration phase, V = J·cbrt(d/J)²
        let v = scurve_v_peak(1000.0, 1e5, 0.002);
        let t1 = cbrt(0.001 / 1e5);
        assert!((v - 1e5 * t1 * t1).abs() < 1e-9);

        // Long move: V = A²/J + A·t2
        let (a, j, d) = (1000.0, 1e5, 0.5);
        let t2 = (sqrt(8.0 * d * a + a * a * a * a / (j * j)) - 3.0 * a * a / j) / (2.0 * a);
        let expected = a * a / j + a * t2;
        assert!((scurve_v_peak(a, j, 2.0 * d) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_v_peak_below_trapezoid() {
        for len in [0.001, 0.1, 10.0] {
            assert!(scurve_v_peak(1000.0, 1e5, len) < find_v_peak(1000.0, len));
        }
        // Unbounded jerk approaches the trapezoid
        let v = scurve_v_peak(1000.0, 1e12, 10.0);
        assert!((v - find_v_peak(1000.0, 10.0)).abs() / v < 1e-3);
    }

    #[test]
    fn test_max_start_speed_stops_in_length() {
        let (a, j) = (1000.0, 1e5);
        for (len, ve) in [(0.01, 0.0), (1.0, 5.0), (5.0, 0.0)] {
            let vs = scurve_max_start_speed(len, ve, a, j).unwrap();
            assert!(vs >= ve);
            assert!((finish_distance(vs, ve, 0.0, a, j) - len).abs() < 1e-9);
        }
        assert_eq!(scurve_max_start_speed(1.0, 0.0, 1000.0, 0.0), None);
    }

    #[test]
    fn test_final_velocity_caps_at_limit() {
        let (v, peak) = scurve_final_velocity(0.0, 1000.0, 1e5, 5.0, 1000.0);
        assert!(!peak);
        assert!(v < sqrt(2.0 * 1000.0 * 5.0));
        let (v, peak) = scurve_final_velocity(0.0, 1000.0, 1e5, 5.0, 10.0);
        assert_eq!(v, 10.0);
        assert!(peak);
    }

    #[test]
    fn test_next_accel_steps_by_jerk() {
        // From rest the first step is bounded by J·dt
        assert!((next_accel(0.001, 10.0, 0.0, 0.0, 1000.0, 1e5) - 100.0).abs() < 1e-9);
        // At the target with no acceleration nothing changes
        assert_eq!(next_accel(0.001, 10.0, 10.0, 0.0, 1000.0, 1e5), 0.0);
        // Never beyond the acceleration limit
        assert_eq!(next_accel(0.001, 100.0, 0.0, 990.0, 1000.0, 1e5), 1000.0);
    }

    #[test]
    fn test_scurve_respects_jerk_and_reaches_end() {
        let jerk = 1e5;
        let dt = 0.001;
        let limits = CycleLimits {
            target_vel: 10.0,
            final_vel: 0.0,
            max_accel: 1000.0,
        };
        let mut s = seg(1.0, dt);
        let accels = drive(&mut s, &limits, jerk);

        assert!(s.distance_to_go(false) <= 1e-12);
        assert!(s.current_vel < 1e-6);
        let mut prev = 0.0;
        for &a in &accels {
            assert!((a - prev).abs() <= jerk * dt + 1e-6, "{} after {}", a, prev);
            assert!(a.abs() <= 1000.0 + 1e-9);
            prev = a;
        }
        assert!(prev.abs() <= jerk * dt + 1e-6);
    }

    #[test]
    fn test_scurve_holds_target_velocity() {
        let limits = CycleLimits {
            target_vel: 20.0,
            final_vel: 0.0,
            max_accel: 1000.0,
        };
        let mut s = seg(5.0, 0.001);
        let mut top: f64 = 0.0;
        for _ in 0..10_000 {
            if s.distance_to_go(false) <= 1e-12 {
                break;
            }
            let cmd = scurve_accel(&s, &limits, 1e4, false).unwrap();
            update_dist_from_accel(&mut s, cmd, false);
            top = top.max(s.current_vel);
        }
        assert!(top <= 20.0 + 1e-6);
        assert!(top > 19.9);
    }

    #[test]
    fn test_hopeless_stop_falls_back() {
        let limits = CycleLimits {
            target_vel: 10.0,
            final_vel: 0.0,
            max_accel: 1000.0,
        };
        let mut s = seg(1.0, 0.001);
        s.progress = 1.0 - 1e-4;
        s.current_vel = 10.0;
        assert!(scurve_accel(&s, &limits, 1e5, false).is_none());
        assert!(scurve_accel(&seg(1.0, 0.001), &limits, 0.0, false).is_none());
    }

    #[test]
    fn test_effective_jerk() {
        assert_eq!(effective_jerk(0.0, 1e6), 1e6);
        assert_eq!(effective_jerk(1e5, 1e6), 1e5);
        assert_eq!(effective_jerk(1e7, 1e6), 1e6);
    }
}
