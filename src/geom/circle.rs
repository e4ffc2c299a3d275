//! Circular arc with optional spiral (radius change) and helix (axial rise).
//!
//! The planar arc length of a spiral has no convenient closed form, so the
//! angle/length relation is approximated by a quadratic fit. The fit is
//! checked at construction and rejected when it misses the end angle by
//! more than [`TP_ANGLE_EPSILON`].

use core::f64::consts::{PI, TAU};

use libm::{acos, cos, fabs, sin, sqrt};

use crate::consts::{BLEND_ACC_RATIO_NORMAL, BLEND_ACC_RATIO_TANGENTIAL, TP_ANGLE_EPSILON};
use crate::error::GeomError;
use crate::math::{sq, Cart3};

use super::GeomResult;

const CART_FUZZ: f64 = 1e-6;
const CIRCLE_FUZZ: f64 = 1e-6;
const DOUBLE_FUZZ: f64 = 2.220_446_049_250_313e-16;

/// Planar circle or spiral about `center`, with a linear rise along the
/// normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    /// Center, projected into the plane of the start point.
    pub center: Cart3,
    /// Unit normal; rotation follows the right-hand rule about it.
    pub normal: Cart3,
    /// Radial vector from center to start.
    pub r_tan: Cart3,
    /// `normal × r_tan`, same magnitude as `r_tan`.
    pub r_perp: Cart3,
    /// Total rise along the normal over the full angle.
    pub r_helix: Cart3,
    /// Start radius.
    pub radius: f64,
    /// Total swept angle, radians.
    pub angle: f64,
    /// End radius minus start radius.
    pub spiral: f64,
}

/// Quadratic fit of planar arc length against angle,
/// `s(θ) = b0·θ² + b1·θ`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpiralFit {
    /// Quadratic coefficient.
    pub b0: f64,
    /// Linear coefficient.
    pub b1: f64,
    /// Planar arc length over the whole angle.
    pub total_planar_length: f64,
    /// The radius shrinks along the arc, so the fit runs backwards.
    pub spiral_in: bool,
}

impl Circle {
    /// Build an arc from `start` to `end` about `center`.
    ///
    /// `turn` counts extra full revolutions; a negative value reverses the
    /// normal (`-1` is a single reversed arc, `-2` adds one revolution).
    pub fn new(start: Cart3, end: Cart3, center: Cart3, normal: Cart3, turn: i32) -> GeomResult<Self> {
        if start.dist(center) < CART_FUZZ {
            return Err(GeomError::RadiusTooSmall {
                radius: start.dist(center),
            });
        }

        let mut n = normal.unit()?;
        let mut turn = turn;
        if turn < 0 {
            turn = -1 - turn;
            n = -n;
        }

        let center = center + (start - center).project_onto(n)?;
        let radius = start.dist(center);
        let r_tan = start - center;
        let r_perp = n.cross(r_tan);

        let r_full = end - center;
        let mut r_end = r_full.plane_project(n)?;
        let spiral = r_end.mag() - radius;
        let r_helix = r_full - r_end;
        r_end = if r_end.mag() < CART_FUZZ {
            Cart3::new(radius, 0.0, 0.0)
        } else {
            r_end.unit_or_zero() * radius
        };

        let dot = r_tan.dot(r_end) / (radius * radius);
        let mut angle = if dot > 1.0 {
            0.0
        } else if dot < -1.0 {
            PI
        } else {
            acos(dot)
        };
        if r_tan.cross(r_end).dot(n) < 0.0 {
            angle = TAU - angle;
        }
        if fabs(angle) < CIRCLE_FUZZ {
            angle = TAU;
        }
        if turn > 0 {
            angle += f64::from(turn) * TAU;
        }

        Ok(Self {
            center,
            normal: n,
            r_tan,
            r_perp,
            r_helix,
            radius,
            angle,
            spiral,
        })
    }

    /// Planar radial vector at `angle` including the spiral term.
    fn radial(&self, angle: f64) -> Cart3 {
        let planar = self.r_tan * cos(angle) + self.r_perp * sin(angle);
        let scale = angle / self.angle;
        planar + planar.unit_or_zero() * (scale * self.spiral)
    }

    /// Point at `angle` from the start.
    pub fn point(&self, angle: f64) -> Cart3 {
        let scale = angle / self.angle;
        self.center + self.radial(angle) + self.r_helix * scale
    }

    /// Unit tangent at `angle`, including spiral and helix contributions.
    pub fn tangent(&self, angle: f64) -> GeomResult<Cart3> {
        let radial = self.radial(angle);
        let t = self.normal.cross(radial)
            + self.r_helix / self.angle
            + radial.unit_or_zero() * (self.spiral / self.angle);
        t.unit()
    }

    /// Change the swept angle in place. Helices are rejected; use
    /// [`cut`](Self::cut) when the arc may rise along its normal.
    pub fn stretch(&mut self, new_angle: f64, keep_end: bool) -> GeomResult<()> {
        if new_angle <= DOUBLE_FUZZ {
            return Err(GeomError::Degenerate);
        }
        if self.r_helix.mag_sq() > 1e-6 {
            return Err(GeomError::Unsupported);
        }
        if keep_end {
            let new_start = self.point(self.angle - new_angle);
            self.r_tan = new_start - self.center;
            self.r_perp = self.normal.cross(self.r_tan);
            self.radius = self.r_tan.mag();
        }
        self.spiral *= new_angle / self.angle;
        self.angle = new_angle;
        Ok(())
    }

    /// Shrink the swept angle in place, moving the center along the normal
    /// when trimming from the start of a helix.
    pub fn cut(&mut self, new_angle: f64, keep_end: bool) -> GeomResult<()> {
        if new_angle < 1e-12 {
            return Err(GeomError::Degenerate);
        }
        if keep_end {
            let new_start = self.point(self.angle - new_angle);
            let mut tmp = new_start - self.center;
            self.r_perp = self.normal.cross(tmp);
            self.r_tan = self.r_perp.cross(self.normal);
            tmp -= self.r_tan;
            self.center += tmp;
            self.radius = self.r_tan.mag();
        }
        let ratio = new_angle / self.angle;
        self.spiral *= ratio;
        self.r_helix *= ratio;
        self.angle = new_angle;
        Ok(())
    }

    /// Radius of curvature of the tightest point, folding helix pitch and
    /// spiral rate into an equivalent planar radius.
    pub fn effective_min_radius(&self) -> f64 {
        let dh2 = self.r_helix.mag_sq();
        let dr = self.spiral / self.angle;
        let h2 = dh2 / sq(self.angle);
        let n_inner = sq(dr) + sq(self.radius);
        let den = n_inner + sq(dr);
        let num = sqrt(n_inner * n_inner * n_inner);
        let r_spiral = num / den;
        h2 / r_spiral + r_spiral
    }

    /// Highest velocity that keeps normal acceleration within its share of
    /// `a_max`, plus the tangential acceleration ratio left over at that
    /// velocity.
    pub fn actual_max_vel(&self, v_max: f64, a_max: f64) -> (f64, f64) {
        let a_n_max_cutoff = BLEND_ACC_RATIO_NORMAL * a_max;
        let eff_radius = self.effective_min_radius();
        let a_n_vmax = sq(v_max) / eff_radius.max(DOUBLE_FUZZ);
        if a_n_vmax > a_n_max_cutoff {
            (sqrt(a_n_max_cutoff * eff_radius), BLEND_ACC_RATIO_TANGENTIAL)
        } else {
            (v_max, sqrt(1.0 - sq(a_n_vmax / a_max)))
        }
    }

    /// Fit the planar arc length of this circle.
    pub fn spiral_fit(&self) -> GeomResult<SpiralFit> {
        let mut coef = self.spiral / self.angle;
        let mut min_radius = self.radius;
        let spiral_in = self.spiral < 0.0;
        if spiral_in {
            coef = -coef;
            min_radius += self.spiral;
        }
        let slope_start = sqrt(sq(min_radius) + sq(coef));
        let slope_end = sqrt(sq(min_radius + coef * self.angle) + sq(coef));
        let b0 = (slope_end - slope_start) / (2.0 * self.angle);
        let b1 = slope_start;
        let fit = SpiralFit {
            b0,
            b1,
            total_planar_length: b0 * sq(self.angle) + b1 * self.angle,
            spiral_in,
        };

        let end = self.angle_from_param(&fit, 1.0)?;
        let error = end - self.angle;
        if fabs(error) > TP_ANGLE_EPSILON {
            tp_warn!("spiral fit angle error {} exceeds tolerance", error);
            return Err(GeomError::FitError { error });
        }
        Ok(fit)
    }

    /// Angle at normalized planar arc length `t` in `[0, 1]`.
    pub fn angle_from_param(&self, fit: &SpiralFit, t: f64) -> GeomResult<f64> {
        let t = if fit.spiral_in { 1.0 - t } else { t };
        let a = fit.b0;
        let b = fit.b1;
        let c = -t * fit.total_planar_length;
        let disc = sq(b) - 4.0 * a * c;
        if disc < 0.0 {
            return Err(GeomError::Degenerate);
        }
        // Alternate root form stays accurate as the quadratic term vanishes
        let angle = (2.0 * c) / (-b - sqrt(disc));
        Ok(if fit.spiral_in { self.angle - angle } else { angle })
    }

    /// Total path length including the helix.
    pub fn length(&self, fit: &SpiralFit) -> f64 {
        sqrt(sq(fit.total_planar_length) + self.r_helix.mag_sq())
    }

    /// Angle reached after `progress` along the full (helical) path.
    pub fn angle_from_progress(&self, fit: &SpiralFit, progress: f64) -> GeomResult<f64> {
        let t = progress / self.length(fit);
        self.angle_from_param(fit, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const Z: Cart3 = Cart3::new(0.0, 0.0, 1.0);

    #[test]
    fn test_quarter_circle() {
        let c = Circle::new(
            Cart3::new(1.0, 0.0, 0.0),
            Cart3::new(0.0, 1.0, 0.0),
            Cart3::ZERO,
            Z,
            0,
        )
        .unwrap();
        assert!((c.angle - core::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((c.radius - 1.0).abs() < 1e-12);
        let fit = c.spiral_fit().unwrap();
        assert!((c.length(&fit) - core::f64::consts::FRAC_PI_2).abs() < 1e-9);
        let end = c.point(c.angle);
        assert!((end - Cart3::new(0.0, 1.0, 0.0)).mag() < 1e-9);
    }

    #[test]
    fn test_negative_turn_reverses_direction() {
        let c = Circle::new(
            Cart3::new(1.0, 0.0, 0.0),
            Cart3::new(0.0, 1.0, 0.0),
            Cart3::ZERO,
            Z,
            -1,
        )
        .unwrap();
        assert!((c.angle - 1.5 * PI).abs() < 1e-12);
    }

    #[test]
    fn test_full_circle_when_start_equals_end() {
        let p = Cart3::new(2.0, 0.0, 0.0);
        let c = Circle::new(p, p, Cart3::ZERO, Z, 0).unwrap();
        assert!((c.angle - TAU).abs() < 1e-12);
    }

    #[test]
    fn test_helix_tangent_rises() {
        let c = Circle::new(
            Cart3::new(1.0, 0.0, 0.0),
            Cart3::new(-1.0, 0.0, 1.0),
            Cart3::ZERO,
            Z,
            0,
        )
        .unwrap();
        let t = c.tangent(0.0).unwrap();
        assert!(t.z > 0.0);
        assert!(t.y > 0.0);
        let fit = c.spiral_fit().unwrap();
        let a = c.angle_from_progress(&fit, c.length(&fit)).unwrap();
        assert!((c.point(a) - Cart3::new(-1.0, 0.0, 1.0)).mag() < 1e-6);
    }

    #[test]
    fn test_cut_keeps_end_of_helix() {
        let end = Cart3::new(-1.0, 0.0, 1.0);
        let mut c = Circle::new(Cart3::new(1.0, 0.0, 0.0), end, Cart3::ZERO, Z, 0).unwrap();
        let half = c.angle / 2.0;
        c.cut(half, true).unwrap();
        assert!((c.point(c.angle) - end).mag() < 1e-9);
        assert!((c.r_helix.z - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_stretch_rejects_helix() {
        let mut c = Circle::new(
            Cart3::new(1.0, 0.0, 0.0),
            Cart3::new(-1.0, 0.0, 1.0),
            Cart3::ZERO,
            Z,
            0,
        )
        .unwrap();
        assert_eq!(c.stretch(1.0, false), Err(GeomError::Unsupported));
    }

    #[test]
    fn test_spiral_fit_reaches_end() {
        let c = Circle::new(
            Cart3::new(1.0, 0.0, 0.0),
            Cart3::new(0.0, 1.2, 0.0),
            Cart3::ZERO,
            Z,
            0,
        )
        .unwrap();
        assert!(c.spiral > 0.19);
        let fit = c.spiral_fit().unwrap();
        let a = c.angle_from_progress(&fit, c.length(&fit)).unwrap();
        assert!((c.point(a) - Cart3::new(0.0, 1.2, 0.0)).mag() < 1e-6);
    }

    #[test]
    fn test_actual_max_vel_limited_by_radius() {
        let c = Circle::new(
            Cart3::new(1.0, 0.0, 0.0),
            Cart3::new(0.0, 1.0, 0.0),
            Cart3::ZERO,
            Z,
            0,
        )
        .unwrap();
        let (v, ratio) = c.actual_max_vel(100.0, 10.0);
        assert!((v - sqrt(BLEND_ACC_RATIO_NORMAL * 10.0)).abs() < 1e-9);
        assert_eq!(ratio, BLEND_ACC_RATIO_TANGENTIAL);
        let (v, ratio) = c.actual_max_vel(1.0, 10.0);
        assert_eq!(v, 1.0);
        assert!(ratio > 0.99);
    }
}
