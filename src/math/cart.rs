//! Three-component Cartesian vector.

use core::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

use libm::{acos, fabs, sqrt};

use crate::consts::TP_POS_EPSILON;
use crate::error::GeomError;

/// Cartesian vector used for the xyz, abc and uvw subspaces of a pose.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cart3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Cart3 {
    /// The zero vector.
    pub const ZERO: Cart3 = Cart3 { x: 0.0, y: 0.0, z: 0.0 };

    /// Create a new vector.
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Dot product.
    #[inline]
    pub fn dot(self, rhs: Cart3) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Cross product.
    #[inline]
    pub fn cross(self, rhs: Cart3) -> Cart3 {
        Cart3::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    /// Squared magnitude.
    #[inline]
    pub fn mag_sq(self) -> f64 {
        self.dot(self)
    }

    /// Magnitude.
    #[inline]
    pub fn mag(self) -> f64 {
        sqrt(self.mag_sq())
    }

    /// Distance to another point.
    #[inline]
    pub fn dist(self, rhs: Cart3) -> f64 {
        (self - rhs).mag()
    }

    /// Unit vector in the same direction.
    ///
    /// # Errors
    ///
    /// Returns [`GeomError::Degenerate`] for the zero vector.
    pub fn unit(self) -> Result<Cart3, GeomError> {
        let m = self.mag();
        if m == 0.0 || !m.is_finite() {
            return Err(GeomError::Degenerate);
        }
        Ok(self / m)
    }

    /// Unit vector, or zero when the vector is (nearly) zero.
    pub fn unit_or_zero(self) -> Cart3 {
        let m = self.mag();
        if m < TP_POS_EPSILON {
            Cart3::ZERO
        } else {
            self / m
        }
    }

    /// Component-wise absolute value.
    #[inline]
    pub fn abs(self) -> Cart3 {
        Cart3::new(fabs(self.x), fabs(self.y), fabs(self.z))
    }

    /// Largest absolute component.
    #[inline]
    pub fn abs_max(self) -> f64 {
        let a = self.abs();
        a.x.max(a.y).max(a.z)
    }

    /// Component-wise product.
    #[inline]
    pub fn elem_mul(self, rhs: Cart3) -> Cart3 {
        Cart3::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }

    /// True when every component is finite.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// True when the magnitude is below `tol`.
    #[inline]
    pub fn is_zero(self, tol: f64) -> bool {
        self.mag() < tol
    }

    /// Projection of `self` onto `onto`.
    pub fn project_onto(self, onto: Cart3) -> Result<Cart3, GeomError> {
        let d = onto.mag_sq();
        if d == 0.0 {
            return Err(GeomError::Degenerate);
        }
        Ok(onto * (self.dot(onto) / d))
    }

    /// Projection of `self` onto the plane with the given normal.
    pub fn plane_project(self, normal: Cart3) -> Result<Cart3, GeomError> {
        Ok(self - self.project_onto(normal)?)
    }

    /// True when the lines containing the two vectors are within `tol`
    /// radians of each other. Opposite directions count as parallel.
    pub fn parallel(self, rhs: Cart3, tol: f64) -> bool {
        let u1 = self.unit_or_zero();
        let u2 = rhs.unit_or_zero();
        let dot = u1.dot(u2).clamp(-1.0, 1.0);
        acos(fabs(dot)) < tol
    }

    /// True when two unit vectors point in the same direction, within a
    /// squared-difference tolerance.
    #[inline]
    pub fn same_direction(self, rhs: Cart3, tol_sq: f64) -> bool {
        (self - rhs).mag_sq() < tol_sq
    }

    /// True when two unit vectors point in opposite directions, within a
    /// squared-difference tolerance.
    #[inline]
    pub fn anti_parallel(self, rhs: Cart3, tol_sq: f64) -> bool {
        (self + rhs).mag_sq() < tol_sq
    }

    /// True when two unit vectors are colinear (either direction).
    #[inline]
    pub fn colinear(self, rhs: Cart3, tol_sq: f64) -> bool {
        self.same_direction(rhs, tol_sq) || self.anti_parallel(rhs, tol_sq)
    }
}

impl Add for Cart3 {
    type Output = Cart3;

    #[inline]
    fn add(self, rhs: Cart3) -> Cart3 {
        Cart3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Cart3 {
    #[inline]
    fn add_assign(&mut self, rhs: Cart3) {
        *self = *self + rhs;
    }
}

impl Sub for Cart3 {
    type Output = Cart3;

    #[inline]
    fn sub(self, rhs: Cart3) -> Cart3 {
        Cart3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Cart3 {
    #[inline]
    fn sub_assign(&mut self, rhs: Cart3) {
        *self = *self - rhs;
    }
}

impl Neg for Cart3 {
    type Output = Cart3;

    #[inline]
    fn neg(self) -> Cart3 {
        Cart3::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f64> for Cart3 {
    type Output = Cart3;

    #[inline]
    fn mul(self, rhs: f64) -> Cart3 {
        Cart3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl MulAssign<f64> for Cart3 {
    #[inline]
    fn mul_assign(&mut self, rhs: f64) {
        *self = *self * rhs;
    }
}

impl Div<f64> for Cart3 {
    type Output = Cart3;

    #[inline]
    fn div(self, rhs: f64) -> Cart3 {
        Cart3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}
