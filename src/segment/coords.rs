//! Geometry of a segment as a sum type.
//!
//! Every query matches exhaustively, so adding a motion type forces every
//! consumer to handle it.

use alloc::boxed::Box;

use crate::error::GeomError;
use crate::geom::{Bezier9, CartLine, Circle, GeomResult, SphericalArc, SpiralFit};
use crate::math::{Cart3, Pose9};

use super::rigid_tap::{RigidTap, TapState};
use super::MotionType;

/// Path geometry of one segment.
#[derive(Debug, Clone, PartialEq)]
pub enum Coords {
    /// Straight line. Each subspace is scaled to the segment target.
    Line {
        /// Translation.
        xyz: CartLine,
        /// Rotary axes.
        abc: CartLine,
        /// Auxiliary linear axes.
        uvw: CartLine,
    },
    /// Arc or helix in XYZ with linear motion in ABC/UVW.
    Circle {
        /// Translation.
        xyz: Circle,
        /// Arc length fit of `xyz`.
        fit: SpiralFit,
        /// Rotary axes.
        abc: CartLine,
        /// Auxiliary linear axes.
        uvw: CartLine,
    },
    /// Spindle-synchronized tap.
    RigidTap(RigidTap),
    /// Blend arc; rotary and auxiliary axes hold still.
    Spherical {
        /// Translation.
        arc: SphericalArc,
        /// Rotary position.
        abc: Cart3,
        /// Auxiliary position.
        uvw: Cart3,
    },
    /// 9D blend curve.
    Bezier(Box<Bezier9>),
    /// Pause in place.
    Dwell {
        /// Position held.
        pos: Pose9,
    },
}

impl Default for Coords {
    fn default() -> Self {
        Coords::Dwell { pos: Pose9::ZERO }
    }
}

fn line_point(line: &CartLine, progress: f64, target: f64) -> Cart3 {
    if line.tmag_zero || target <= 0.0 {
        line.start
    } else {
        line.point(progress * line.tmag / target)
    }
}

fn line_rate(line: &CartLine, target: f64) -> Cart3 {
    if line.tmag_zero || target <= 0.0 {
        Cart3::ZERO
    } else {
        line.u_vec * (line.tmag / target)
    }
}

impl Coords {
    /// Straight line between two poses.
    pub fn line(start: &Pose9, end: &Pose9) -> Self {
        Coords::Line {
            xyz: CartLine::new(start.xyz(), end.xyz()),
            abc: CartLine::new(start.abc(), end.abc()),
            uvw: CartLine::new(start.uvw(), end.uvw()),
        }
    }

    /// Arc from `start` to `end` about `center`.
    pub fn circle(start: &Pose9, end: &Pose9, center: Cart3, normal: Cart3, turn: i32) -> GeomResult<Self> {
        let xyz = Circle::new(start.xyz(), end.xyz(), center, normal, turn)?;
        let fit = xyz.spiral_fit()?;
        Ok(Coords::Circle {
            xyz,
            fit,
            abc: CartLine::new(start.abc(), end.abc()),
            uvw: CartLine::new(start.uvw(), end.uvw()),
        })
    }

    /// Motion type implied by the variant.
    pub fn motion_type(&self) -> MotionType {
        match self {
            Coords::Line { .. } => MotionType::Linear,
            Coords::Circle { .. } => MotionType::Circular,
            Coords::RigidTap(_) => MotionType::RigidTap,
            Coords::Spherical { .. } => MotionType::Spherical,
            Coords::Bezier(_) => MotionType::Bezier,
            Coords::Dwell { .. } => MotionType::Dwell,
        }
    }

    /// Natural path length: XYZ length, else UVW, else ABC for lines.
    pub fn length(&self) -> f64 {
        match self {
            Coords::Line { xyz, abc, uvw } => {
                if !xyz.tmag_zero {
                    xyz.tmag
                } else if !uvw.tmag_zero {
                    uvw.tmag
                } else {
                    abc.tmag
                }
            }
            Coords::Circle { xyz, fit, .. } => xyz.length(fit),
            Coords::RigidTap(tap) => tap.xyz.tmag,
            Coords::Spherical { arc, .. } => arc.length(),
            Coords::Bezier(bez) => bez.length(),
            Coords::Dwell { .. } => 0.0,
        }
    }

    /// Pose after `progress` along a segment of length `target`.
    pub fn pos_at(&self, progress: f64, target: f64) -> GeomResult<Pose9> {
        Ok(match self {
            Coords::Line { xyz, abc, uvw } => Pose9::from_parts(
                line_point(xyz, progress, target),
                line_point(abc, progress, target),
                line_point(uvw, progress, target),
            ),
            Coords::Circle { xyz, fit, abc, uvw } => {
                let angle = xyz.angle_from_progress(fit, progress)?;
                Pose9::from_parts(
                    xyz.point(angle),
                    line_point(abc, progress, target),
                    line_point(uvw, progress, target),
                )
            }
            Coords::RigidTap(tap) => tap.point(progress),
            Coords::Spherical { arc, abc, uvw } => Pose9::from_parts(arc.point(progress), *abc, *uvw),
            Coords::Bezier(bez) => bez.point(progress),
            Coords::Dwell { pos } => *pos,
        })
    }

    /// Pose at the end of the segment.
    pub fn end_point(&self, target: f64) -> GeomResult<Pose9> {
        match self {
            Coords::Line { xyz, abc, uvw } => Ok(Pose9::from_parts(xyz.end, abc.end, uvw.end)),
            Coords::RigidTap(tap) => {
                let xyz = if tap.state > TapState::Reversing {
                    tap.aux_xyz.end
                } else {
                    tap.xyz.end
                };
                Ok(Pose9::from_parts(xyz, tap.abc, tap.uvw))
            }
            _ => self.pos_at(target, target),
        }
    }

    /// Unit XYZ tangent at the start.
    pub fn start_tangent(&self) -> GeomResult<Cart3> {
        match self {
            Coords::Line { xyz, .. } => Ok(xyz.u_vec),
            Coords::Circle { xyz, .. } => xyz.tangent(0.0),
            Coords::RigidTap(tap) => Ok(tap.xyz.u_vec),
            Coords::Spherical { arc, .. } => arc.tangent_at(0.0),
            Coords::Bezier(bez) => Ok(bez.tangent(0.0)?.tran),
            Coords::Dwell { .. } => Err(GeomError::Unsupported),
        }
    }

    /// Unit XYZ tangent at the end.
    pub fn end_tangent(&self) -> GeomResult<Cart3> {
        match self {
            Coords::Line { xyz, .. } => Ok(xyz.u_vec),
            Coords::Circle { xyz, .. } => xyz.tangent(xyz.angle),
            Coords::RigidTap(tap) => Ok(tap.xyz.u_vec),
            Coords::Spherical { arc, .. } => arc.tangent(true),
            Coords::Bezier(bez) => Ok(bez.tangent(bez.length())?.tran),
            Coords::Dwell { .. } => Err(GeomError::Unsupported),
        }
    }

    /// Unit XYZ tangent at `progress`.
    pub fn tangent_at(&self, progress: f64) -> GeomResult<Cart3> {
        match self {
            Coords::Circle { xyz, fit, .. } => {
                let angle = xyz.angle_from_progress(fit, progress)?;
                xyz.tangent(angle)
            }
            Coords::Spherical { arc, .. } => arc.tangent_at(progress),
            Coords::Bezier(bez) => Ok(bez.tangent(progress)?.tran),
            _ => self.start_tangent(),
        }
    }

    /// 9D rate of change with respect to path progress, used to seed a
    /// 9D blend. The XYZ part is a unit vector.
    pub fn tangent9_at(&self, progress: f64, target: f64) -> GeomResult<Pose9> {
        match self {
            Coords::Line { xyz, abc, uvw } => Ok(Pose9::from_parts(
                xyz.u_vec,
                line_rate(abc, target),
                line_rate(uvw, target),
            )),
            Coords::Circle { abc, uvw, .. } => Ok(Pose9::from_parts(
                self.tangent_at(progress)?,
                line_rate(abc, target),
                line_rate(uvw, target),
            )),
            Coords::Spherical { arc, .. } => Ok(Pose9::from_parts(arc.tangent_at(progress)?, Cart3::ZERO, Cart3::ZERO)),
            Coords::Bezier(bez) => bez.tangent(progress),
            Coords::RigidTap(_) | Coords::Dwell { .. } => Err(GeomError::Unsupported),
        }
    }

    /// Segment moves any rotary or auxiliary axis. Blend curves count as
    /// rotary so they are never re-blended.
    pub fn has_rotary_motion(&self) -> bool {
        match self {
            Coords::Line { abc, uvw, .. } | Coords::Circle { abc, uvw, .. } => {
                !(abc.tmag_zero && uvw.tmag_zero)
            }
            Coords::RigidTap(_) | Coords::Dwell { .. } => false,
            Coords::Spherical { .. } | Coords::Bezier(_) => true,
        }
    }

    /// Line that moves only the rotary axes.
    pub fn is_pure_rotary(&self) -> bool {
        matches!(self, Coords::Line { xyz, uvw, .. } if xyz.tmag_zero && uvw.tmag_zero)
    }

    /// Segment moves the translation axes.
    pub fn has_xyz_motion(&self) -> bool {
        match self {
            Coords::Line { xyz, .. } => !xyz.tmag_zero,
            Coords::RigidTap(tap) => !tap.xyz.tmag_zero,
            Coords::Dwell { .. } => false,
            Coords::Circle { .. } | Coords::Spherical { .. } | Coords::Bezier(_) => true,
        }
    }
}
