//! Reading planner settings from TOML (std only).
//!
//! Errors carry a bounded message: the leading part of the underlying
//! error, prefixed by the file path or the offending line.

use core::fmt::Write as _;
use core::str::FromStr;
use std::path::Path;

use crate::error::{ConfigError, Error, Result};

use super::validation::validate_config;
use super::PlannerConfig;

/// Copy as much of `args` as fits. Overflow is dropped at a char boundary.
fn bounded<const N: usize>(args: core::fmt::Arguments<'_>) -> heapless::String<N> {
    struct Clip<'a, const N: usize>(&'a mut heapless::String<N>);

    impl<const N: usize> core::fmt::Write for Clip<'_, N> {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            for c in s.chars() {
                if self.0.push(c).is_err() {
                    break;
                }
            }
            Ok(())
        }
    }

    let mut out = heapless::String::new();
    let _ = Clip(&mut out).write_fmt(args);
    out
}

/// 1-based line holding byte `offset` of `content`.
fn line_of(content: &str, offset: usize) -> usize {
    let end = offset.min(content.len());
    content.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

/// Read, parse and validate a planner configuration file.
///
/// ```rust,ignore
/// let config = cnc_trajectory::load_config("planner.toml")?;
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PlannerConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::IoError(bounded(format_args!("{}: {}", path.display(), e))))?;
    parse_config(&text)
}

/// Parse and validate a configuration held in memory.
///
/// A syntax or type error reports the line it was found on; a well-formed
/// file with out-of-range values fails with the matching validation error.
pub fn parse_config(text: &str) -> Result<PlannerConfig> {
    let config = toml::from_str::<PlannerConfig>(text).map_err(|e| {
        let msg = match e.span() {
            Some(span) => bounded(format_args!("line {}: {}", line_of(text, span.start), e.message())),
            None => bounded(format_args!("{}", e.message())),
        };
        Error::Config(ConfigError::ParseError(msg))
    })?;
    validate_config(&config)?;
    Ok(config)
}

impl FromStr for PlannerConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_config(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BlendMode, PlannerType};
    use crate::segment::TermCond;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[planner]
cycle_time = 0.001
vmax = 100.0
amax = 1000.0
"#;

        let config = parse_config(toml).unwrap();
        assert_eq!(config.planner.queue_size, 2000);
        assert_eq!(config.planner.term_cond, TermCond::Parabolic);
        assert_eq!(config.blend.mode, BlendMode::Arc);
        assert_eq!(config.planner.planner_type, PlannerType::Trapezoidal);
        assert_eq!(config.vlimit(), 100.0);
    }

    #[test]
    fn test_from_str_reads_sections() {
        let toml = r#"
[planner]
cycle_time = 0.001
vmax = 100.0
amax = 1000.0

[blend]
mode = "bezier"
optimization_depth = 10

[axes.x]
max_velocity = 80.0
max_acceleration = 800.0

[axes.z]
max_velocity = 20.0
max_acceleration = 300.0
"#;

        let config: PlannerConfig = toml.parse().unwrap();
        assert_eq!(config.blend.mode, BlendMode::Bezier);
        assert_eq!(config.blend.optimization_depth, 10);
        let b = config.bounds();
        assert_eq!(b.vel[0], 80.0);
        assert_eq!(b.acc[2], 300.0);
    }

    #[test]
    fn test_scurve_planner_type() {
        let toml = r#"
[planner]
cycle_time = 0.001
vmax = 100.0
amax = 1000.0
max_jerk = 50000.0
planner_type = "scurve"
"#;
        let config = parse_config(toml).unwrap();
        assert_eq!(config.planner.planner_type, PlannerType::SCurve);
        assert_eq!(config.planner.max_jerk.0, 5e4);
    }

    #[test]
    fn test_syntax_error_names_line() {
        let result = parse_config("[planner]\ncycle_time = 0.001\nvmax = = 3\n");
        match result {
            Err(Error::Config(ConfigError::ParseError(msg))) => assert!(msg.starts_with("line 3:"), "{}", msg),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_value_is_a_validation_error() {
        let toml = r#"
[planner]
cycle_time = 0.0
vmax = 100.0
amax = 1000.0
"#;
        assert!(matches!(
            parse_config(toml),
            Err(Error::Config(ConfigError::InvalidCycleTime(_)))
        ));
    }

    #[test]
    fn test_missing_file_names_path() {
        match load_config("/nonexistent/planner.toml") {
            Err(Error::Config(ConfigError::IoError(msg))) => {
                assert!(msg.starts_with("/nonexistent/planner.toml: "), "{}", msg)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_long_messages_are_clipped() {
        let long = "é".repeat(200);
        let msg: heapless::String<16> = bounded(format_args!("{}", long));
        assert_eq!(msg.len(), 16);
        assert!(msg.chars().all(|c| c == 'é'));
        assert_eq!(line_of("a\nb\nc", 4), 3);
    }
}
