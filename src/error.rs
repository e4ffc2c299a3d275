//! Error types for the trajectory planner.
//!
//! Provides unified error handling across configuration, geometry, queueing,
//! blending, and the planner state machine. Cooperative cycle signals
//! (waiting, slowing, stopped) are not errors and live in
//! [`CycleStatus`](crate::planner::CycleStatus).

use core::fmt;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all planner operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Degenerate or invalid geometry
    Geometry(GeomError),
    /// Segment queue error
    Queue(QueueError),
    /// Blend construction error (always recoverable by the caller)
    Blend(BlendError),
    /// Planner state machine error
    Planner(PlannerError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// Cycle time must be positive
    InvalidCycleTime(f64),
    /// Queue size too small to hold the safety margins
    InvalidQueueSize {
        /// Requested size
        size: usize,
        /// Minimum accepted size
        minimum: usize,
    },
    /// Velocity limit must be positive
    InvalidMaxVelocity(f64),
    /// Acceleration limit must be positive
    InvalidMaxAcceleration(f64),
    /// Jerk limit must be positive
    InvalidMaxJerk(f64),
    /// Blend tolerance must not be negative
    InvalidTolerance(f64),
    /// Ramp frequency must be positive
    InvalidRampFrequency(f64),
    /// Feed scale ceiling must be positive
    InvalidFeedScale(f64),
    /// Axis name is not one of x, y, z, a, b, c, u, v, w
    UnknownAxis(heapless::String<32>),
    /// Axis limits are not positive
    InvalidAxisLimits {
        /// Axis name
        axis: heapless::String<32>,
        /// Configured velocity limit
        velocity: f64,
        /// Configured acceleration limit
        acceleration: f64,
    },
    /// Bezier velocity acceptance tolerance is negative
    InvalidVelocityTolerance(f64),
    /// Builder is missing a required field
    MissingField(&'static str),
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Geometry construction and evaluation errors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GeomError {
    /// Segment length below position epsilon
    ZeroLength,
    /// Geometry is numerically degenerate (zero vector, zero angle, ...)
    Degenerate,
    /// Computed radius below the minimum
    RadiusTooSmall {
        /// Offending radius
        radius: f64,
    },
    /// Spiral arc length fit exceeded its error bound
    FitError {
        /// Angle error of the fit at the end of the arc
        error: f64,
    },
    /// Non-finite value encountered
    NotFinite,
    /// Operation not supported for this motion type
    Unsupported,
}

/// Segment queue errors.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QueueError {
    /// Queue cannot accept another segment
    Full,
    /// Queue holds no segment
    Empty,
    /// Index outside the valid range
    OutOfRange {
        /// Requested offset
        index: isize,
        /// Current length
        len: usize,
    },
    /// No reverse history left to step back into
    NoHistory,
}

/// Blend construction errors. The planner degrades to a simpler strategy
/// when it sees one of these.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlendError {
    /// Segments are not eligible for this blend kind
    NotApplicable,
    /// Segment tangents are (anti-)parallel within tolerance
    Collinear,
    /// Arc pair is not coplanar
    NotCoplanar,
    /// Intersection angle below the minimum
    AngleTooSmall(f64),
    /// Blend cannot meet the path tolerance
    Tolerance,
    /// Blend radius below position epsilon
    RadiusTooSmall(f64),
    /// Trim exceeds the length the parent can give up
    TrimTooLong {
        /// Requested trim
        trim: f64,
        /// Available budget
        available: f64,
    },
    /// Another blend kind performs better at this corner
    NotBest,
    /// Underlying geometry failure
    Geometry(GeomError),
}

/// Planner state machine errors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlannerError {
    /// An abort is in progress; new motion is refused
    Aborting,
    /// Rigid tap requested without spindle synchronization
    NotSynchronized,
    /// Operation requires the machine to be stopped
    Moving,
    /// Position contains NaN or infinity
    InvalidPose,
    /// Reverse run reached a spindle-synchronized segment
    ReverseEmpty,
    /// Spindle index out of range
    InvalidSpindle(usize),
    /// Digital or analog output index out of range
    InvalidOutput(usize),
    /// Segment missing where one was required
    NoSegment,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Geometry(e) => write!(f, "Geometry error: {}", e),
            Error::Queue(e) => write!(f, "Queue error: {}", e),
            Error::Blend(e) => write!(f, "Blend error: {}", e),
            Error::Planner(e) => write!(f, "Planner error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::InvalidCycleTime(v) => write!(f, "Invalid cycle time: {}. Must be > 0", v),
            ConfigError::InvalidQueueSize { size, minimum } => {
                write!(f, "Invalid queue size: {}. Must be >= {}", size, minimum)
            }
            ConfigError::InvalidMaxVelocity(v) => write!(f, "Invalid max velocity: {}. Must be > 0", v),
            ConfigError::InvalidMaxAcceleration(v) => {
                write!(f, "Invalid max acceleration: {}. Must be > 0", v)
            }
            ConfigError::InvalidMaxJerk(v) => write!(f, "Invalid max jerk: {}. Must be > 0", v),
            ConfigError::InvalidTolerance(v) => write!(f, "Invalid blend tolerance: {}. Must be >= 0", v),
            ConfigError::InvalidRampFrequency(v) => {
                write!(f, "Invalid ramp frequency: {}. Must be > 0", v)
            }
            ConfigError::InvalidFeedScale(v) => write!(f, "Invalid max feed scale: {}. Must be > 0", v),
            ConfigError::UnknownAxis(name) => {
                write!(f, "Unknown axis '{}'. Valid axes: x, y, z, a, b, c, u, v, w", name)
            }
            ConfigError::InvalidAxisLimits { axis, velocity, acceleration } => write!(
                f,
                "Invalid limits for axis '{}': velocity {} and acceleration {} must be > 0",
                axis, velocity, acceleration
            ),
            ConfigError::InvalidVelocityTolerance(v) => {
                write!(f, "Invalid Bezier velocity tolerance: {}. Must be >= 0", v)
            }
            ConfigError::MissingField(name) => write!(f, "Missing required field: {}", name),
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for GeomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeomError::ZeroLength => write!(f, "Segment has zero length"),
            GeomError::Degenerate => write!(f, "Degenerate geometry"),
            GeomError::RadiusTooSmall { radius } => write!(f, "Radius {} too small", radius),
            GeomError::FitError { error } => {
                write!(f, "Spiral arc length fit error {} exceeds tolerance", error)
            }
            GeomError::NotFinite => write!(f, "Non-finite value in geometry"),
            GeomError::Unsupported => write!(f, "Operation not supported for this motion type"),
        }
    }
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Full => write!(f, "Segment queue is full"),
            QueueError::Empty => write!(f, "Segment queue is empty"),
            QueueError::OutOfRange { index, len } => {
                write!(f, "Queue index {} out of range (length {})", index, len)
            }
            QueueError::NoHistory => write!(f, "No reverse history available"),
        }
    }
}

impl fmt::Display for BlendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlendError::NotApplicable => write!(f, "Blend not applicable to these segments"),
            BlendError::Collinear => write!(f, "Segments are collinear"),
            BlendError::NotCoplanar => write!(f, "Segments are not coplanar"),
            BlendError::AngleTooSmall(theta) => write!(f, "Intersection angle {} too small", theta),
            BlendError::Tolerance => write!(f, "Blend cannot satisfy path tolerance"),
            BlendError::RadiusTooSmall(r) => write!(f, "Blend radius {} too small", r),
            BlendError::TrimTooLong { trim, available } => {
                write!(f, "Trim {} exceeds available length {}", trim, available)
            }
            BlendError::NotBest => write!(f, "Another blend strategy performs better"),
            BlendError::Geometry(e) => write!(f, "{}", e),
        }
    }
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::Aborting => write!(f, "Planner is aborting"),
            PlannerError::NotSynchronized => {
                write!(f, "Cannot add unsynchronized rigid tap move")
            }
            PlannerError::Moving => write!(f, "Operation requires the machine to be stopped"),
            PlannerError::InvalidPose => write!(f, "Pose contains non-finite values"),
            PlannerError::ReverseEmpty => {
                write!(f, "Reverse run reached a spindle-synchronized segment")
            }
            PlannerError::InvalidSpindle(n) => write!(f, "Invalid spindle number {}", n),
            PlannerError::InvalidOutput(n) => write!(f, "Invalid output index {}", n),
            PlannerError::NoSegment => write!(f, "No segment available"),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<GeomError> for Error {
    fn from(e: GeomError) -> Self {
        Error::Geometry(e)
    }
}

impl From<QueueError> for Error {
    fn from(e: QueueError) -> Self {
        Error::Queue(e)
    }
}

impl From<BlendError> for Error {
    fn from(e: BlendError) -> Self {
        Error::Blend(e)
    }
}

impl From<PlannerError> for Error {
    fn from(e: PlannerError) -> Self {
        Error::Planner(e)
    }
}

impl From<GeomError> for BlendError {
    fn from(e: GeomError) -> Self {
        BlendError::Geometry(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for GeomError {}

#[cfg(feature = "std")]
impl std::error::Error for QueueError {}

#[cfg(feature = "std")]
impl std::error::Error for BlendError {}

#[cfg(feature = "std")]
impl std::error::Error for PlannerError {}
