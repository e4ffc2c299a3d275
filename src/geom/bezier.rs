//! Quintic Bezier transition curve over all nine axes.
//!
//! The first three and last three control points sit on the entry and exit
//! tangents, which makes the second derivative vanish at both ends. The
//! curve therefore meets its neighbours with zero curvature (G2), so the
//! centripetal acceleration ramps up smoothly instead of stepping.
//!
//! Progress along the curve is measured in the translation subspace, the
//! same metric the neighbouring segments use. The rotary and auxiliary
//! axes ride along at the same curve parameter.
//!
//! [`BezierShape`] holds only the control points and curvature extrema and
//! is cheap enough for the sizing search to build dozens of trials.
//! [`Bezier9`] adds the arc-length table needed to run the curve.

use alloc::vec::Vec;

use libm::{cbrt, fabs, sqrt};

use crate::consts::{
    BEZIER9_CURVATURE_ITERS, BEZIER9_CURVATURE_SAMPLES, BEZIER9_GOLDEN_RATIO,
    BEZIER9_LENGTH_SAMPLES, BLEND_ACC_RATIO_NORMAL, GL16_NODES, GL16_WEIGHTS, TP_BIG_NUM,
    TP_POS_EPSILON,
};
use crate::error::GeomError;
use crate::math::{Cart3, Pose9};

use super::GeomResult;

const BINOMIAL5: [f64; 6] = [1.0, 5.0, 10.0, 10.0, 5.0, 1.0];
const BINOMIAL4: [f64; 5] = [1.0, 4.0, 6.0, 4.0, 1.0];
const BINOMIAL3: [f64; 4] = [1.0, 3.0, 3.0, 1.0];
const BINOMIAL2: [f64; 3] = [1.0, 2.0, 1.0];

/// Bernstein-weighted sum of `pts` with the given binomial row.
fn bernstein<const N: usize>(pts: &[Pose9; N], binom: &[f64; N], t: f64) -> Pose9 {
    let n = N - 1;
    let s = 1.0 - t;
    let mut acc = Pose9::ZERO;
    for (i, (p, c)) in pts.iter().zip(binom.iter()).enumerate() {
        let w = c * powi(s, n - i) * powi(t, i);
        acc = acc + *p * w;
    }
    acc
}

fn powi(x: f64, n: usize) -> f64 {
    let mut r = 1.0;
    for _ in 0..n {
        r *= x;
    }
    r
}

/// Maximise `f` on `[lo, hi]` by golden-section search.
fn golden_max<F: Fn(f64) -> f64>(f: &F, lo: f64, hi: f64, iters: usize) -> f64 {
    let gr = BEZIER9_GOLDEN_RATIO;
    let (mut a, mut b) = (lo, hi);
    let mut c = b - gr * (b - a);
    let mut d = a + gr * (b - a);
    let mut fc = f(c);
    let mut fd = f(d);
    for _ in 0..iters {
        if fc > fd {
            b = d;
            d = c;
            fd = fc;
            c = b - gr * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + gr * (b - a);
            fd = f(d);
        }
    }
    fc.max(fd)
}

/// Sample `f` uniformly, then refine around the best sample.
fn find_max<F: Fn(f64) -> f64>(f: F) -> f64 {
    let n = BEZIER9_CURVATURE_SAMPLES;
    let step = 1.0 / (n - 1) as f64;
    let mut best = 0.0;
    let mut best_i = 0;
    for i in 0..n {
        let v = f(i as f64 * step);
        if v > best {
            best = v;
            best_i = i;
        }
    }
    let lo = (best_i as f64 - 1.0).max(0.0) * step;
    let hi = ((best_i + 1) as f64 * step).min(1.0);
    golden_max(&f, lo, hi, BEZIER9_CURVATURE_ITERS).max(best)
}

/// Control points and curvature extrema of a G2 quintic blend.
#[derive(Debug, Clone, PartialEq)]
pub struct BezierShape {
    /// Control points `P0..P5`.
    pub ctrl: [Pose9; 6],
    /// Distance of the inner control points from the end points.
    pub alpha: f64,
    /// Largest curvature along the curve.
    pub max_curvature: f64,
    /// Largest magnitude of curvature rate with respect to arc length.
    pub max_dkappa_ds: f64,
    /// `1 / max_curvature`, or a large number for a straight curve.
    pub min_radius: f64,
}

impl BezierShape {
    /// Place the control points for a blend from `p_start` (heading along
    /// `u_start`) to `p_end` (arriving along `u_end`).
    ///
    /// The tangents are derivatives with respect to translation arc
    /// length, so their translation part is a unit vector.
    pub fn new(p_start: Pose9, p_end: Pose9, u_start: Pose9, u_end: Pose9, alpha: f64) -> GeomResult<Self> {
        if !alpha.is_finite() || alpha <= TP_POS_EPSILON {
            return Err(GeomError::Degenerate);
        }
        if !(p_start.is_finite() && p_end.is_finite() && u_start.is_finite() && u_end.is_finite()) {
            return Err(GeomError::NotFinite);
        }
        if u_start.tran.mag() < TP_POS_EPSILON || u_end.tran.mag() < TP_POS_EPSILON {
            return Err(GeomError::Degenerate);
        }
        let ctrl = [
            p_start,
            p_start + u_start * alpha,
            p_start + u_start * (2.0 * alpha),
            p_end - u_end * (2.0 * alpha),
            p_end - u_end * alpha,
            p_end,
        ];
        let mut shape = Self {
            ctrl,
            alpha,
            max_curvature: 0.0,
            max_dkappa_ds: 0.0,
            min_radius: TP_BIG_NUM,
        };
        shape.max_curvature = find_max(|t| shape.curvature(t));
        shape.max_dkappa_ds = find_max(|t| fabs(shape.dkappa_ds(t)));
        if shape.max_curvature > TP_POS_EPSILON / TP_BIG_NUM {
            shape.min_radius = (1.0 / shape.max_curvature).min(TP_BIG_NUM);
        }
        Ok(shape)
    }

    /// Position at curve parameter `t`.
    pub fn eval(&self, t: f64) -> Pose9 {
        bernstein(&self.ctrl, &BINOMIAL5, t)
    }

    fn diff1(&self) -> [Pose9; 5] {
        let c = &self.ctrl;
        [c[1] - c[0], c[2] - c[1], c[3] - c[2], c[4] - c[3], c[5] - c[4]]
    }

    fn diff2(&self) -> [Pose9; 4] {
        let d = self.diff1();
        [d[1] - d[0], d[2] - d[1], d[3] - d[2], d[4] - d[3]]
    }

    fn diff3(&self) -> [Pose9; 3] {
        let d = self.diff2();
        [d[1] - d[0], d[2] - d[1], d[3] - d[2]]
    }

    /// First derivative with respect to `t`.
    pub fn d1(&self, t: f64) -> Pose9 {
        bernstein(&self.diff1(), &BINOMIAL4, t) * 5.0
    }

    /// Second derivative with respect to `t`.
    pub fn d2(&self, t: f64) -> Pose9 {
        bernstein(&self.diff2(), &BINOMIAL3, t) * 20.0
    }

    /// Third derivative with respect to `t`.
    pub fn d3(&self, t: f64) -> Pose9 {
        bernstein(&self.diff3(), &BINOMIAL2, t) * 60.0
    }

    /// Translation speed `|dB/dt|`.
    pub fn speed(&self, t: f64) -> f64 {
        self.d1(t).tran.mag()
    }

    /// Curvature of the translation path at `t`. Pure: repeated calls
    /// return bit-identical results.
    pub fn curvature(&self, t: f64) -> f64 {
        let d1 = self.d1(t).tran;
        let d2 = self.d2(t).tran;
        let v = d1.mag();
        if v < TP_POS_EPSILON {
            return 0.0;
        }
        d1.cross(d2).mag() / (v * v * v)
    }

    /// Rate of change of curvature with respect to arc length at `t`.
    pub fn dkappa_ds(&self, t: f64) -> f64 {
        let d1 = self.d1(t).tran;
        let d2 = self.d2(t).tran;
        let d3 = self.d3(t).tran;
        let v = d1.mag();
        if v < TP_POS_EPSILON {
            return 0.0;
        }
        let c = d1.cross(d2);
        let dc = d1.cross(d3);
        let c_mag = c.mag();
        // |c| has a kink at zero; its one-sided derivative is |c'|
        let dc_mag = if c_mag < TP_POS_EPSILON {
            dc.mag()
        } else {
            c.dot(dc) / c_mag
        };
        let dv = d1.dot(d2) / v;
        let dkappa_dt = dc_mag / (v * v * v) - 3.0 * c_mag * dv / (v * v * v * v);
        dkappa_dt / v
    }

    /// Velocity the curve sustains within acceleration `a_max` and jerk
    /// `j_max`, capped at `v_goal`. A non-positive `j_max` disables the
    /// jerk limit.
    pub fn acc_limit(&self, v_goal: f64, a_max: f64, j_max: f64) -> f64 {
        let mut v = v_goal;
        if self.max_curvature > TP_POS_EPSILON {
            let a_n = a_max * BLEND_ACC_RATIO_NORMAL;
            v = v.min(sqrt(a_n / self.max_curvature));
        }
        if j_max > 0.0 && self.max_dkappa_ds > TP_POS_EPSILON {
            v = v.min(cbrt(j_max / self.max_dkappa_ds));
        }
        v.max(0.0)
    }

    /// Distance from the curve midpoint to `corner`.
    pub fn deviation(&self, corner: Cart3) -> f64 {
        self.eval(0.5).tran.dist(corner)
    }

    /// Arc length over `[a, b]` by 16-point Gauss-Legendre quadrature.
    pub fn length_between(&self, a: f64, b: f64) -> f64 {
        let mid = 0.5 * (a + b);
        let half = 0.5 * (b - a);
        let mut sum = 0.0;
        for (x, w) in GL16_NODES.iter().zip(GL16_WEIGHTS.iter()) {
            sum += w * (self.speed(mid + half * x) + self.speed(mid - half * x));
        }
        sum * half
    }

    /// Total arc length, coarse estimate without a table.
    pub fn approx_length(&self) -> f64 {
        const PIECES: usize = 8;
        (0..PIECES)
            .map(|i| {
                let a = i as f64 / PIECES as f64;
                let b = (i + 1) as f64 / PIECES as f64;
                self.length_between(a, b)
            })
            .sum()
    }
}

/// A [`BezierShape`] with its arc-length table, ready to run as a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Bezier9 {
    shape: BezierShape,
    /// Cumulative arc length at `t = i / BEZIER9_LENGTH_SAMPLES`.
    lengths: Vec<f64>,
}

impl Bezier9 {
    /// Build the arc-length table for `shape`.
    pub fn from_shape(shape: BezierShape) -> GeomResult<Self> {
        let n = BEZIER9_LENGTH_SAMPLES;
        let mut lengths = Vec::with_capacity(n + 1);
        lengths.push(0.0);
        let mut s = 0.0;
        for i in 0..n {
            let a = i as f64 / n as f64;
            let b = (i + 1) as f64 / n as f64;
            s += shape.length_between(a, b);
            lengths.push(s);
        }
        if !s.is_finite() || s <= TP_POS_EPSILON {
            return Err(GeomError::ZeroLength);
        }
        Ok(Self { shape, lengths })
    }

    /// Underlying shape.
    pub fn shape(&self) -> &BezierShape {
        &self.shape
    }

    /// Total translation arc length.
    pub fn length(&self) -> f64 {
        self.lengths.last().copied().unwrap_or(0.0)
    }

    /// Curve parameter at arc length `s`.
    pub fn param_from_length(&self, s: f64) -> f64 {
        let total = self.length();
        if s <= 0.0 {
            return 0.0;
        }
        if s >= total {
            return 1.0;
        }
        // First index with lengths[i] >= s
        let i = self.lengths.partition_point(|&l| l < s).max(1);
        let (s0, s1) = (self.lengths[i - 1], self.lengths[i]);
        let frac = if s1 > s0 { (s - s0) / (s1 - s0) } else { 0.0 };
        let n = BEZIER9_LENGTH_SAMPLES as f64;
        ((i - 1) as f64 + frac) / n
    }

    /// Nine-axis position at arc length `progress`.
    pub fn point(&self, progress: f64) -> Pose9 {
        self.shape.eval(self.param_from_length(progress))
    }

    /// Derivative of every axis with respect to translation arc length.
    pub fn tangent(&self, progress: f64) -> GeomResult<Pose9> {
        let d = self.shape.d1(self.param_from_length(progress));
        let v = d.tran.mag();
        if v < TP_POS_EPSILON {
            return Err(GeomError::Degenerate);
        }
        Ok(d * (1.0 / v))
    }

    /// Curvature at parameter `t`.
    pub fn curvature(&self, t: f64) -> f64 {
        self.shape.curvature(t)
    }

    /// Largest curvature.
    pub fn max_curvature(&self) -> f64 {
        self.shape.max_curvature
    }

    /// Largest curvature rate with respect to arc length.
    pub fn max_dkappa_ds(&self) -> f64 {
        self.shape.max_dkappa_ds
    }

    /// Tightest radius of curvature.
    pub fn min_radius(&self) -> f64 {
        self.shape.min_radius
    }

    /// See [`BezierShape::acc_limit`].
    pub fn acc_limit(&self, v_goal: f64, a_max: f64, j_max: f64) -> f64 {
        self.shape.acc_limit(v_goal, a_max, j_max)
    }

    /// See [`BezierShape::deviation`].
    pub fn deviation(&self, corner: Cart3) -> f64 {
        self.shape.deviation(corner)
    }
}
