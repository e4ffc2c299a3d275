//! Scalar helpers shared by the geometry, blend and motion code.

use libm::{fabs, sqrt};

/// Clamp `x` to at most `max`.
#[inline]
pub fn saturate(x: f64, max: f64) -> f64 {
    if x > max {
        max
    } else {
        x
    }
}

/// Clamp `x` to `[-max, max]`.
#[inline]
pub fn bisaturate(x: f64, max: f64) -> f64 {
    if x > max {
        max
    } else if x < -max {
        -max
    } else {
        x
    }
}

/// Sign of `x`, with zero mapped to zero.
#[inline]
pub fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Negate `x` when `neg` is set.
#[inline]
pub fn negate(x: f64, neg: bool) -> f64 {
    if neg {
        -x
    } else {
        x
    }
}

/// Square.
#[inline]
pub fn sq(x: f64) -> f64 {
    x * x
}

/// Real roots of `a·x² + b·x + c = 0`, smaller root first.
///
/// Returns `None` when the discriminant is negative or the equation is
/// degenerate. A linear equation (`a == 0`) yields its single root twice.
pub fn quadratic_roots(a: f64, b: f64, c: f64) -> Option<(f64, f64)> {
    if a == 0.0 {
        if b == 0.0 {
            return None;
        }
        let r = -c / b;
        return Some((r, r));
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let sd = sqrt(disc);
    // Numerically stable form
    let q = if b >= 0.0 { -0.5 * (b + sd) } else { -0.5 * (b - sd) };
    let r1 = q / a;
    let r2 = if q != 0.0 { c / q } else { r1 };
    Some(if r1 <= r2 { (r1, r2) } else { (r2, r1) })
}

/// Peak velocity reachable over `len` with acceleration `a` when starting
/// and ending at rest, `sqrt(a·len)`.
#[inline]
pub fn find_v_peak(a: f64, len: f64) -> f64 {
    sqrt(fabs(a * len))
}

/// Velocity after covering `dist` from `v0` at constant `a`, floored at 0.
#[inline]
pub fn vel_after_dist(v0: f64, a: f64, dist: f64) -> f64 {
    let v_sq = v0 * v0 + 2.0 * a * dist;
    if v_sq > 0.0 {
        sqrt(v_sq)
    } else {
        0.0
    }
}
