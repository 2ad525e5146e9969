//! Harness configuration module.
//!
//! This module provides configuration loading for the marble harness from
//! environment variables.
//!
//! # Environment Variables
//!
//! - `MARBLES_FRAME_TIME_FACTOR`: Virtual frames per diagram column (default: `10`)
//! - `MARBLES_MAX_FRAMES`: Columns a run may simulate before queued actions
//!   are abandoned (default: `750`)
//!
//! # Invariants
//!
//! - `frame_time_factor` is always at least 1
//! - `max_frames` is always at least 1

use crate::diagram::Frame;

/// Harness configuration.
///
/// # Post-conditions
///
/// When constructed via `from_env()` or `default()`, both values are
/// non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Virtual frames per diagram column.
    pub frame_time_factor: u32,
    /// Number of columns a run may simulate.
    pub max_frames: u32,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl HarnessConfig {
    /// Default frames per column.
    pub const DEFAULT_FRAME_TIME_FACTOR: u32 = 10;
    /// Default column budget per run.
    pub const DEFAULT_MAX_FRAMES: u32 = 750;

    const FRAME_TIME_FACTOR_VAR: &'static str = "MARBLES_FRAME_TIME_FACTOR";
    const MAX_FRAMES_VAR: &'static str = "MARBLES_MAX_FRAMES";

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but is not a positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but is not a positive integer.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            frame_time_factor: Self::load_positive(
                &lookup,
                Self::FRAME_TIME_FACTOR_VAR,
                Self::DEFAULT_FRAME_TIME_FACTOR,
            )?,
            max_frames: Self::load_positive(&lookup, Self::MAX_FRAMES_VAR, Self::DEFAULT_MAX_FRAMES)?,
        })
    }

    /// Load a positive integer, falling back to `default` when unset.
    fn load_positive(
        lookup: &impl Fn(&str) -> Option<String>,
        name: &str,
        default: u32,
    ) -> Result<u32, ConfigError> {
        let Some(value) = lookup(name) else {
            return Ok(default);
        };
        match value.trim().parse::<u32>() {
            Ok(0) => Err(ConfigError::InvalidValue {
                name: name.to_string(),
                message: "must be at least 1".to_string(),
            }),
            Ok(parsed) => Ok(parsed),
            Err(_) => Err(ConfigError::InvalidValue {
                name: name.to_string(),
                message: format!("'{value}' is not a positive integer"),
            }),
        }
    }

    /// Last virtual frame a run may reach.
    #[must_use]
    pub fn frame_limit(&self) -> Frame {
        Frame::from(self.max_frames).saturating_mul(Frame::from(self.frame_time_factor))
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            frame_time_factor: Self::DEFAULT_FRAME_TIME_FACTOR,
            max_frames: Self::DEFAULT_MAX_FRAMES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn test_default_values() {
        let config = HarnessConfig::default();
        assert_eq!(config.frame_time_factor, 10);
        assert_eq!(config.max_frames, 750);
        assert_eq!(config.frame_limit(), 7500);
    }

    #[test]
    fn test_from_lookup_unset_uses_defaults() {
        let config = HarnessConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = HarnessConfig::from_lookup(lookup(&[
            ("MARBLES_FRAME_TIME_FACTOR", "1"),
            ("MARBLES_MAX_FRAMES", " 40 "),
        ]))
        .unwrap();
        assert_eq!(config.frame_time_factor, 1);
        assert_eq!(config.max_frames, 40);
        assert_eq!(config.frame_limit(), 40);
    }

    #[test]
    fn test_from_lookup_rejects_zero() {
        let error =
            HarnessConfig::from_lookup(lookup(&[("MARBLES_FRAME_TIME_FACTOR", "0")])).unwrap_err();
        assert_eq!(
            error.to_string(),
            "invalid value for MARBLES_FRAME_TIME_FACTOR: must be at least 1"
        );
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let error = HarnessConfig::from_lookup(lookup(&[("MARBLES_MAX_FRAMES", "lots")])).unwrap_err();
        assert_eq!(
            error,
            ConfigError::InvalidValue {
                name: "MARBLES_MAX_FRAMES".to_string(),
                message: "'lots' is not a positive integer".to_string(),
            }
        );
    }
}
