//! Vector, pose and scalar primitives.

mod cart;
mod pose;
mod util;

pub use cart::Cart3;
pub use pose::Pose9;
pub use util::{
    bisaturate, find_v_peak, negate, quadratic_roots, saturate, sign, sq, vel_after_dist,
};
