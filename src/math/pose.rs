//! Nine-axis pose: translation, rotation and auxiliary linear axes.

use core::ops::{Add, Mul, Sub};

use super::Cart3;

/// Machine position over the fixed nine-axis model.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose9 {
    /// X, Y, Z translation.
    pub tran: Cart3,
    /// A rotary axis.
    pub a: f64,
    /// B rotary axis.
    pub b: f64,
    /// C rotary axis.
    pub c: f64,
    /// U auxiliary axis.
    pub u: f64,
    /// V auxiliary axis.
    pub v: f64,
    /// W auxiliary axis.
    pub w: f64,
}

impl Pose9 {
    /// All axes at zero.
    pub const ZERO: Pose9 = Pose9 {
        tran: Cart3::ZERO,
        a: 0.0,
        b: 0.0,
        c: 0.0,
        u: 0.0,
        v: 0.0,
        w: 0.0,
    };

    /// Build a pose from its three subspaces.
    pub const fn from_parts(xyz: Cart3, abc: Cart3, uvw: Cart3) -> Self {
        Self {
            tran: xyz,
            a: abc.x,
            b: abc.y,
            c: abc.z,
            u: uvw.x,
            v: uvw.y,
            w: uvw.z,
        }
    }

    /// Translation-only pose.
    pub const fn from_xyz(x: f64, y: f64, z: f64) -> Self {
        Self::from_parts(Cart3::new(x, y, z), Cart3::ZERO, Cart3::ZERO)
    }

    /// Translation subspace.
    #[inline]
    pub fn xyz(&self) -> Cart3 {
        self.tran
    }

    /// Rotary subspace.
    #[inline]
    pub fn abc(&self) -> Cart3 {
        Cart3::new(self.a, self.b, self.c)
    }

    /// Auxiliary subspace.
    #[inline]
    pub fn uvw(&self) -> Cart3 {
        Cart3::new(self.u, self.v, self.w)
    }

    /// Replace the rotary subspace.
    pub fn set_abc(&mut self, abc: Cart3) {
        self.a = abc.x;
        self.b = abc.y;
        self.c = abc.z;
    }

    /// Replace the auxiliary subspace.
    pub fn set_uvw(&mut self, uvw: Cart3) {
        self.u = uvw.x;
        self.v = uvw.y;
        self.w = uvw.z;
    }

    /// True when no axis holds NaN or infinity.
    pub fn is_finite(&self) -> bool {
        self.tran.is_finite() && self.abc().is_finite() && self.uvw().is_finite()
    }

    /// Axis values in x, y, z, a, b, c, u, v, w order.
    pub fn to_array(&self) -> [f64; 9] {
        [
            self.tran.x,
            self.tran.y,
            self.tran.z,
            self.a,
            self.b,
            self.c,
            self.u,
            self.v,
            self.w,
        ]
    }

    /// Inverse of [`to_array`](Self::to_array).
    pub fn from_array(v: [f64; 9]) -> Self {
        Self::from_parts(
            Cart3::new(v[0], v[1], v[2]),
            Cart3::new(v[3], v[4], v[5]),
            Cart3::new(v[6], v[7], v[8]),
        )
    }

    /// Euclidean norm over all nine axes.
    pub fn mag(&self) -> f64 {
        libm::sqrt(self.to_array().iter().map(|v| v * v).sum())
    }
}

impl Add for Pose9 {
    type Output = Pose9;

    fn add(self, rhs: Pose9) -> Pose9 {
        Pose9::from_parts(
            self.tran + rhs.tran,
            self.abc() + rhs.abc(),
            self.uvw() + rhs.uvw(),
        )
    }
}

impl Sub for Pose9 {
    type Output = Pose9;

    fn sub(self, rhs: Pose9) -> Pose9 {
        Pose9::from_parts(
            self.tran - rhs.tran,
            self.abc() - rhs.abc(),
            self.uvw() - rhs.uvw(),
        )
    }
}

impl Mul<f64> for Pose9 {
    type Output = Pose9;

    fn mul(self, rhs: f64) -> Pose9 {
        Pose9::from_parts(self.tran * rhs, self.abc() * rhs, self.uvw() * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_order_matches_axis_names() {
        let p = Pose9::from_array([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(p.tran, Cart3::new(1.0, 2.0, 3.0));
        assert_eq!(p.abc(), Cart3::new(4.0, 5.0, 6.0));
        assert_eq!(p.uvw(), Cart3::new(7.0, 8.0, 9.0));
    }

    #[test]
    fn test_nan_is_not_finite() {
        let mut p = Pose9::ZERO;
        p.v = f64::NAN;
        assert!(!p.is_finite());
    }
}
