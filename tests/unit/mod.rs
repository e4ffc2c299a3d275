//! Unit test harness for cnc-trajectory.
//!
//! This module organizes the configuration checks and the property tests
//! for the queues and the path geometry.

mod config_parsing;
mod config_validation;
mod geometry_props;
mod queue_props;
