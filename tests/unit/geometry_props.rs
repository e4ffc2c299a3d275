//! Property tests for path geometry.

use core::f64::consts::PI;

use cnc_trajectory::geom::BezierShape;
use cnc_trajectory::math::{Cart3, Pose9};
use cnc_trajectory::segment::Coords;
use proptest::prelude::*;

fn coord() -> impl Strategy<Value = f64> {
    -100.0..100.0f64
}

fn pose() -> impl Strategy<Value = Pose9> {
    prop::array::uniform9(coord()).prop_map(Pose9::from_array)
}

proptest! {
    /// A line starts at its start pose, ends at its end pose and passes
    /// through the midpoint halfway.
    #[test]
    fn prop_line_endpoints(start in pose(), end in pose()) {
        let line = Coords::line(&start, &end);
        let target = line.length();
        prop_assume!(target > 1e-3);

        let p0 = line.pos_at(0.0, target).unwrap();
        let p1 = line.end_point(target).unwrap();
        let mid = line.pos_at(target / 2.0, target).unwrap();

        prop_assert!((p0 - start).mag() < 1e-9);
        prop_assert!((p1 - end).mag() < 1e-9);
        prop_assert!((mid - (start + end) * 0.5).mag() < 1e-6);
    }

    /// Every point of a planar arc stays on its radius, and its length is
    /// the swept angle times the radius.
    #[test]
    fn prop_planar_arc_on_radius(radius in 0.5..50.0f64, sweep in 0.1..6.0f64) {
        let start = Pose9::from_xyz(radius, 0.0, 0.0);
        let end = Pose9::from_xyz(radius * sweep.cos(), radius * sweep.sin(), 0.0);
        let arc = Coords::circle(&start, &end, Cart3::ZERO, Cart3::new(0.0, 0.0, 1.0), 0).unwrap();
        let target = arc.length();

        prop_assert!((target - radius * sweep).abs() < 1e-6 * radius.max(1.0));
        for i in 0..=8 {
            let p = arc.pos_at(target * i as f64 / 8.0, target).unwrap();
            prop_assert!((p.tran.mag() - radius).abs() < 1e-6 * radius.max(1.0));
            prop_assert!(p.tran.z.abs() < 1e-9);
        }
        let p1 = arc.end_point(target).unwrap();
        prop_assert!((p1 - end).mag() < 1e-6 * radius.max(1.0));
    }

    /// A helix climbs linearly with progress.
    #[test]
    fn prop_helix_climbs_linearly(radius in 1.0..20.0f64, height in 0.5..10.0f64) {
        let start = Pose9::from_xyz(radius, 0.0, 0.0);
        let end = Pose9::from_xyz(-radius, 0.0, height);
        let arc = Coords::circle(&start, &end, Cart3::ZERO, Cart3::new(0.0, 0.0, 1.0), 0).unwrap();
        let target = arc.length();

        let expected = (PI * radius).hypot(height);
        prop_assert!((target - expected).abs() < 1e-6 * expected);
        let quarter = arc.pos_at(target / 4.0, target).unwrap();
        prop_assert!((quarter.tran.z - height / 4.0).abs() < 1e-6 * height.max(1.0));
    }
}

#[test]
fn test_full_turn_adds_revolution() {
    let start = Pose9::from_xyz(1.0, 0.0, 0.0);
    let end = Pose9::from_xyz(0.0, 1.0, 0.0);
    let normal = Cart3::new(0.0, 0.0, 1.0);
    let quarter = Coords::circle(&start, &end, Cart3::ZERO, normal, 0).unwrap();
    let five_quarters = Coords::circle(&start, &end, Cart3::ZERO, normal, 1).unwrap();
    assert!((quarter.length() - PI / 2.0).abs() < 1e-9);
    assert!((five_quarters.length() - 2.5 * PI).abs() < 1e-9);
}

fn unit_dir() -> impl Strategy<Value = Cart3> {
    (0.0..core::f64::consts::TAU).prop_map(|a| Cart3::new(a.cos(), a.sin(), 0.0))
}

proptest! {
    /// Blend curves placed with G2 boundary conditions start and end with
    /// zero curvature, and evaluating curvature has no side effects.
    #[test]
    fn prop_bezier_flat_at_ends(u0 in unit_dir(), u1 in unit_dir(), alpha in 0.1..2.0f64) {
        let corner = Cart3::new(5.0, 5.0, 0.0);
        let start = corner - u0 * 2.0;
        let end = corner + u1 * 2.0;
        let to_pose = |c: Cart3| Pose9::from_parts(c, Cart3::ZERO, Cart3::ZERO);
        let shape = BezierShape::new(to_pose(start), to_pose(end), to_pose(u0), to_pose(u1), alpha).unwrap();

        prop_assert!(shape.curvature(0.0) < 1e-8);
        prop_assert!(shape.curvature(1.0) < 1e-8);
        let t = 0.37;
        prop_assert_eq!(shape.curvature(t).to_bits(), shape.curvature(t).to_bits());
    }
}
