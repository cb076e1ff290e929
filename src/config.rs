//! Runtime configuration
//!
//! The averaging repetition counts vary per strategy (1000/500/100/1 in the
//! calibrated deployment); they are tuning knobs, not a semantic contract,
//! so they live here together with the protocol pacing intervals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Ranging repetitions per positioning strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepetitionConfig {
    /// One-anchor placement (ordinal 2)
    pub one_anchor: usize,
    /// Two-anchor circle intersection (ordinal 3)
    pub two_anchor: usize,
    /// Three-anchor sphere intersection (ordinal 4)
    pub three_anchor: usize,
    /// Tag's four-anchor multilateration round (ordinal 5)
    pub multilateration: usize,
}

impl Default for RepetitionConfig {
    fn default() -> Self {
        Self { one_anchor: 1000, two_anchor: 500, three_anchor: 100, multilateration: 1 }
    }
}

/// Engine-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositioningConfig {
    pub repetitions: RepetitionConfig,
    /// Transport receive window (milliseconds)
    pub receive_timeout_ms: u64,
    /// Pause between the tag's four announcements, giving the coordinator
    /// time to display each (milliseconds)
    pub announcement_pause_ms: u64,
    /// Sleep between steady-state positioning rounds (milliseconds)
    pub steady_state_interval_ms: u64,
}

impl Default for PositioningConfig {
    fn default() -> Self {
        Self {
            repetitions: RepetitionConfig::default(),
            receive_timeout_ms: 500,
            announcement_pause_ms: 1000,
            steady_state_interval_ms: 1000,
        }
    }
}

impl PositioningConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            details: e.to_string(),
        })?;
        let config: PositioningConfig =
            serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
                details: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let reps = [
            ("repetitions.one_anchor", self.repetitions.one_anchor),
            ("repetitions.two_anchor", self.repetitions.two_anchor),
            ("repetitions.three_anchor", self.repetitions.three_anchor),
            ("repetitions.multilateration", self.repetitions.multilateration),
        ];
        for (name, value) in reps {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    parameter: name.to_string(),
                    value: value.to_string(),
                });
            }
        }
        if self.receive_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                parameter: "receive_timeout_ms".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration loading and validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Io { path: String, details: String },
    Parse { details: String },
    Invalid { parameter: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, details } => {
                write!(f, "cannot read config {}: {}", path, details)
            }
            ConfigError::Parse { details } => write!(f, "cannot parse config: {}", details),
            ConfigError::Invalid { parameter, value } => {
                write!(f, "invalid config: {} = {}", parameter, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
