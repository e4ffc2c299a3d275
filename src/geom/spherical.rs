//! Great-circle arc used as the transition curve of arc blends.
//!
//! The arc may carry a straight lead-in of `line_length` along `u_tan`
//! ending at `start`, left over when a blend consumes the whole previous
//! segment.

use libm::{acos, sin};

use crate::consts::{ARC_MIN_ANGLE, ARC_MIN_RADIUS, TP_ANGLE_EPSILON, TP_POS_EPSILON};
use crate::error::GeomError;
use crate::math::Cart3;

use super::GeomResult;

/// Spherical arc from `start` to `end` about `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalArc {
    /// Start of the curved part.
    pub start: Cart3,
    /// End point.
    pub end: Cart3,
    /// Center.
    pub center: Cart3,
    /// `start - center`.
    pub r_start: Cart3,
    /// `end - center`.
    pub r_end: Cart3,
    /// Direction of the lead-in line.
    pub u_tan: Cart3,
    /// Unit normal of the arc plane.
    pub binormal: Cart3,
    /// Start radius.
    pub radius: f64,
    /// End radius minus start radius (numerical drift only).
    pub spiral: f64,
    /// Swept angle.
    pub angle: f64,
    /// `sin(angle)`, cached for SLERP.
    pub sin_angle: f64,
    /// Length of the lead-in line.
    pub line_length: f64,
}

impl SphericalArc {
    /// Build an arc from three points.
    pub fn from_points(
        start: Cart3,
        end: Cart3,
        center: Cart3,
        u_tan: Cart3,
        line_length: f64,
    ) -> GeomResult<Self> {
        Self::from_vectors(center, start - center, end - center, u_tan, line_length)
    }

    /// Build an arc from its center and two radial vectors.
    pub fn from_vectors(
        center: Cart3,
        r_start: Cart3,
        r_end: Cart3,
        u_tan: Cart3,
        line_length: f64,
    ) -> GeomResult<Self> {
        let radius = r_start.mag();
        let radius_end = r_end.mag();
        if radius < ARC_MIN_RADIUS || radius_end < ARC_MIN_RADIUS {
            return Err(GeomError::RadiusTooSmall { radius });
        }
        let dot = (r_start.dot(r_end) / (radius * radius_end)).clamp(-1.0, 1.0);
        let angle = acos(dot);
        if angle < ARC_MIN_ANGLE {
            return Err(GeomError::Degenerate);
        }
        let sin_angle = sin(angle);
        if sin_angle < TP_ANGLE_EPSILON {
            return Err(GeomError::Degenerate);
        }
        let binormal = r_start.cross(r_end).unit()?;
        Ok(Self {
            start: center + r_start,
            end: center + r_end,
            center,
            r_start,
            r_end,
            u_tan,
            binormal,
            radius,
            spiral: radius_end - radius,
            angle,
            sin_angle,
            line_length,
        })
    }

    /// Total path length including the lead-in.
    pub fn length(&self) -> f64 {
        self.radius * self.angle + self.line_length
    }

    /// Radial vector at `angle_in` by SLERP between the end vectors.
    fn radial(&self, angle_in: f64) -> Cart3 {
        let s0 = sin(self.angle - angle_in) / self.sin_angle;
        let s1 = sin(angle_in) / self.sin_angle;
        self.r_start * s0 + self.r_end * s1
    }

    /// Point at `progress`.
    pub fn point(&self, progress: f64) -> Cart3 {
        let net = progress - self.line_length;
        if net <= 0.0 && self.line_length > 0.0 {
            self.start + self.u_tan * net
        } else {
            self.center + self.radial(net / self.radius)
        }
    }

    /// Unit tangent from a radial vector, with the spiral drift folded in.
    fn tangent_from_radial(&self, r: Cart3) -> GeomResult<Cart3> {
        let mut t = self.binormal.cross(r);
        if libm::fabs(self.spiral) > TP_POS_EPSILON {
            t += r.unit_or_zero() * (self.spiral / self.angle);
        }
        t.unit()
    }

    /// Unit tangent at the start (`at_end == false`) or end of the arc.
    pub fn tangent(&self, at_end: bool) -> GeomResult<Cart3> {
        self.tangent_from_radial(if at_end { self.r_end } else { self.r_start })
    }

    /// Unit tangent at an arbitrary `progress`.
    pub fn tangent_at(&self, progress: f64) -> GeomResult<Cart3> {
        let net = progress - self.line_length;
        if net <= 0.0 && self.line_length > 0.0 {
            return Ok(self.u_tan);
        }
        let angle_in = (net / self.radius).clamp(0.0, self.angle);
        self.tangent_from_radial(self.radial(angle_in))
    }

    /// Shrink the swept angle by `ratio`, keeping the start or the end.
    /// The lead-in scales with the same ratio.
    pub fn trim(&mut self, ratio: f64, keep_end: bool) -> GeomResult<()> {
        let new_angle = self.angle * ratio;
        if new_angle < ARC_MIN_ANGLE {
            return Err(GeomError::Degenerate);
        }
        if keep_end {
            self.r_start = self.radial(self.angle - new_angle);
            self.start = self.center + self.r_start;
            self.u_tan = self.tangent(false)?;
        } else {
            self.r_end = self.radial(new_angle);
            self.end = self.center + self.r_end;
        }
        self.spiral *= ratio;
        self.line_length *= ratio;
        self.angle = new_angle;
        self.sin_angle = sin(new_angle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::FRAC_PI_2;

    fn quarter() -> SphericalArc {
        SphericalArc::from_points(
            Cart3::new(1.0, 0.0, 0.0),
            Cart3::new(0.0, 1.0, 0.0),
            Cart3::ZERO,
            Cart3::new(0.0, 1.0, 0.0),
            0.0,
        )
        .unwrap()
    }

    #[test]
    fn test_slerp_endpoints() {
        let arc = quarter();
        assert!((arc.angle - FRAC_PI_2).abs() < 1e-12);
        assert!((arc.point(0.0) - arc.start).mag() < 1e-12);
        assert!((arc.point(arc.length()) - arc.end).mag() < 1e-12);
        let mid = arc.point(arc.length() / 2.0);
        assert!((mid.mag() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_lead_in_line() {
        let arc = SphericalArc::from_points(
            Cart3::new(1.0, 0.0, 0.0),
            Cart3::new(0.0, 1.0, 0.0),
            Cart3::ZERO,
            Cart3::new(0.0, 1.0, 0.0),
            0.5,
        )
        .unwrap();
        assert!((arc.point(0.0) - Cart3::new(1.0, -0.5, 0.0)).mag() < 1e-12);
        assert_eq!(arc.tangent_at(0.2).unwrap(), Cart3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_degenerate_arcs_fail() {
        let p = Cart3::new(1.0, 0.0, 0.0);
        let u = Cart3::new(0.0, 1.0, 0.0);
        assert!(SphericalArc::from_points(p, p, Cart3::ZERO, u, 0.0).is_err());
        assert!(SphericalArc::from_points(Cart3::ZERO, p, Cart3::ZERO, u, 0.0).is_err());
    }

    #[test]
    fn test_tangent_at_end() {
        let arc = quarter();
        let t = arc.tangent(true).unwrap();
        assert!((t - Cart3::new(-1.0, 0.0, 0.0)).mag() < 1e-12);
    }

    #[test]
    fn test_trim_keeps_end() {
        let mut arc = quarter();
        arc.trim(0.5, true).unwrap();
        assert!((arc.end - Cart3::new(0.0, 1.0, 0.0)).mag() < 1e-12);
        assert!((arc.length() - FRAC_PI_2 / 2.0).abs() < 1e-12);
        assert!((arc.point(0.0) - arc.start).mag() < 1e-12);
    }
}
