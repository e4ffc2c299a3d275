//! Straight line in one three-axis subspace.

use crate::consts::TP_POS_EPSILON;
use crate::error::GeomError;
use crate::math::Cart3;

use super::GeomResult;

/// Line from `start` to `end`. A zero-length line is valid and marks its
/// subspace as stationary through `tmag_zero`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartLine {
    /// Start point.
    pub start: Cart3,
    /// End point.
    pub end: Cart3,
    /// Unit direction, `(1, 0, 0)` for a zero-length line.
    pub u_vec: Cart3,
    /// Length.
    pub tmag: f64,
    /// Length is below position epsilon.
    pub tmag_zero: bool,
}

impl CartLine {
    /// Build a line between two points.
    pub fn new(start: Cart3, end: Cart3) -> Self {
        let d = end - start;
        let tmag = d.mag();
        let tmag_zero = tmag <= TP_POS_EPSILON;
        let u_vec = if tmag_zero {
            Cart3::new(1.0, 0.0, 0.0)
        } else {
            d / tmag
        };
        Self {
            start,
            end,
            u_vec,
            tmag,
            tmag_zero,
        }
    }

    /// Point at `len` along the line. Returns the end point when the line
    /// has no length.
    pub fn point(&self, len: f64) -> Cart3 {
        if self.tmag_zero {
            self.end
        } else {
            self.start + self.u_vec * len
        }
    }

    /// Unit direction.
    #[inline]
    pub fn tangent(&self) -> Cart3 {
        self.u_vec
    }

    /// Change the length in place, anchored at the start (or at the end
    /// when `keep_end` is set).
    pub fn stretch(&mut self, new_len: f64, keep_end: bool) -> GeomResult<()> {
        if self.tmag_zero || new_len <= TP_POS_EPSILON {
            return Err(GeomError::ZeroLength);
        }
        if keep_end {
            self.start = self.end - self.u_vec * new_len;
        } else {
            self.end = self.start + self.u_vec * new_len;
        }
        self.tmag = new_len;
        Ok(())
    }

    /// Scale the length by `ratio`, leaving zero-length lines untouched.
    pub fn scale_len(&mut self, ratio: f64, keep_end: bool) -> GeomResult<()> {
        if self.tmag_zero {
            return Ok(());
        }
        self.stretch(self.tmag * ratio, keep_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_along_line() {
        let l = CartLine::new(Cart3::ZERO, Cart3::new(3.0, 4.0, 0.0));
        assert!((l.tmag - 5.0).abs() < 1e-12);
        let p = l.point(2.5);
        assert!((p - Cart3::new(1.5, 2.0, 0.0)).mag() < 1e-12);
    }

    #[test]
    fn test_zero_length_line_reports_end() {
        let p = Cart3::new(1.0, 1.0, 1.0);
        let l = CartLine::new(p, p);
        assert!(l.tmag_zero);
        assert_eq!(l.point(10.0), p);
        assert_eq!(l.u_vec, Cart3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_stretch_keeps_requested_anchor() {
        let mut l = CartLine::new(Cart3::ZERO, Cart3::new(10.0, 0.0, 0.0));
        l.stretch(4.0, true).unwrap();
        assert!((l.start - Cart3::new(6.0, 0.0, 0.0)).mag() < 1e-12);
        assert_eq!(l.end, Cart3::new(10.0, 0.0, 0.0));

        let mut l = CartLine::new(Cart3::ZERO, Cart3::new(10.0, 0.0, 0.0));
        l.stretch(4.0, false).unwrap();
        assert!((l.end - Cart3::new(4.0, 0.0, 0.0)).mag() < 1e-12);
        assert!(l.stretch(0.0, false).is_err());
    }
}
