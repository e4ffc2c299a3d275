//! Numeric tolerances and tuning constants shared by the planner.

/// Distances below this are treated as zero.
pub const TP_POS_EPSILON: f64 = 1e-12;
/// Velocities below this are treated as zero.
pub const TP_VEL_EPSILON: f64 = 1e-8;
/// Accelerations below this are treated as zero.
pub const TP_ACCEL_EPSILON: f64 = 1e-4;
/// Smallest meaningful time interval.
pub const TP_TIME_EPSILON: f64 = 1e-12;
/// Angle tolerance for fits and parallelism checks.
pub const TP_ANGLE_EPSILON: f64 = 1e-6;
/// Magnitude tolerance for unit vectors.
pub const TP_MAG_EPSILON: f64 = 1e-10;
/// Stand-in for "unbounded".
pub const TP_BIG_NUM: f64 = 1e10;

/// A segment must last at least this many cycles at its max velocity.
pub const TP_MIN_SEGMENT_CYCLES: f64 = 1.0;
/// Minimum corner angle for a blend to make sense.
pub const TP_MIN_ARC_ANGLE: f64 = 1e-3;
/// Minimum length of an arc blend.
pub const TP_MIN_ARC_LENGTH: f64 = 1e-6;

/// Fraction of total acceleration available tangentially on curved paths.
pub const BLEND_ACC_RATIO_TANGENTIAL: f64 = 0.5;
/// Fraction of total acceleration available normal to the path,
/// `sqrt(1 - BLEND_ACC_RATIO_TANGENTIAL^2)`.
pub const BLEND_ACC_RATIO_NORMAL: f64 = 0.866_025_403_784_438_6;
/// Fraction of a segment the optimizer treats as consumed by a blend.
pub const BLEND_DIST_FRACTION: f64 = 0.5;
/// Share of the normal acceleration budget a tangent kink may use.
pub const TP_KINK_FACTOR: f64 = 0.25;
/// Sharp corners beyond this angle (degrees) force an exact stop.
pub const SHARP_CORNER_DEG: f64 = 2.0;
/// Consecutive saturated segments before the optimizer gives up.
pub const TP_OPTIMIZATION_CUTOFF: usize = 4;

/// Spherical arcs below this angle are rejected.
pub const ARC_MIN_ANGLE: f64 = 1e-6;
/// Spherical arcs below this radius are rejected.
pub const ARC_MIN_RADIUS: f64 = 1e-12;

/// Slots kept free so the producer backs off before a real overflow.
pub const TC_QUEUE_MARGIN: usize = 20;
/// Popped segments retained for reverse run.
pub const REVERSE_MARGIN: usize = 20;

/// Extra spindle revolutions past the tap depth during retraction.
pub const RIGID_TAP_OVERRUN_REVS: f64 = 10.0;

/// Curvature treated as zero at Bezier end points.
pub const BEZIER9_CURVATURE_EPSILON: f64 = 1e-8;
/// Inverse golden ratio used by golden-section searches.
pub const BEZIER9_GOLDEN_RATIO: f64 = 0.618_033_988_749_894_9;
/// Number of uniform intervals in the Bezier arc-length table.
pub const BEZIER9_LENGTH_SAMPLES: usize = 1024;
/// Coarse curvature samples before golden refinement.
pub const BEZIER9_CURVATURE_SAMPLES: usize = 30;
/// Golden-section refinement steps for curvature extrema.
pub const BEZIER9_CURVATURE_ITERS: usize = 10;

/// Fallback tolerance as a fraction of nominal segment length.
pub const BLEND9_TOLERANCE_RATIO: f64 = 0.5;
/// Largest fraction of a segment one Bezier blend may claim.
pub const BLEND9_MAX_SEGMENT_USE: f64 = 0.45;
/// Largest arc span (radians) a Bezier blend may claim from a circle.
pub const BLEND9_CIRC_MAX_ANGLE: f64 = core::f64::consts::FRAC_PI_3;
/// Corners straighter than this (radians, about 1 degree) need no blend.
pub const BLEND9_MIN_THETA: f64 = 0.017_453_292_519_943_295;
/// Lower bound of the alpha search as a fraction of the blend region.
pub const BLEND9_ALPHA_MIN_RATIO: f64 = 0.05;
/// Upper bound of the alpha search as a fraction of the blend region.
pub const BLEND9_ALPHA_MAX_RATIO: f64 = 1.5;
/// Golden-section iterations for alpha.
pub const BLEND9_ALPHA_SEARCH_ITERS: usize = 20;
/// Binary-search iterations for the blend region size.
pub const BLEND9_MAX_ITERATIONS: usize = 30;
/// Default relative velocity slack when accepting a blend.
pub const BLEND9_VEL_REL_TOL: f64 = 0.01;
/// Default absolute velocity slack when accepting a blend.
pub const BLEND9_VEL_ABS_TOL: f64 = 0.1;
/// Minimum segment length eligible for a Bezier blend.
pub const BLEND9_MIN_SEGMENT_LENGTH: f64 = 0.1;

/// 16-point Gauss-Legendre nodes on `[-1, 1]` (positive half).
pub const GL16_NODES: [f64; 8] = [
    0.095_012_509_837_637_4,
    0.281_603_550_779_258_9,
    0.458_016_777_657_227_4,
    0.617_876_244_402_643_8,
    0.755_404_408_355_003_0,
    0.865_631_202_387_831_8,
    0.944_575_023_073_232_6,
    0.989_400_934_991_649_9,
];

/// 16-point Gauss-Legendre weights matching [`GL16_NODES`].
pub const GL16_WEIGHTS: [f64; 8] = [
    0.189_450_610_455_068_5,
    0.182_603_415_044_923_6,
    0.169_156_519_395_002_5,
    0.149_595_988_816_576_7,
    0.124_628_971_255_533_9,
    0.095_158_511_682_492_8,
    0.062_253_523_938_647_9,
    0.027_152_459_411_754_1,
];
