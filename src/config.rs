//! Tracker and replay configuration
//!
//! Both configs deserialize from YAML; missing fields take their defaults.
//!
//! ```rust
//! use beeline::TrackerConfig;
//!
//! let config = TrackerConfig::from_yaml_str("summary_capacity: 4").unwrap();
//! assert_eq!(config.summary_capacity, 4);
//! assert_eq!(config.reauthorization_limit, 3);
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::types::AuthorizationStatus;
use crate::{BeelineError, Result};

/// Slowest and fastest replay speed multipliers
pub const REPLAY_SPEED_RANGE: (f64, f64) = (0.1, 10.0);

/// Tracker tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Buffer of the fire-once summary stream; slow subscribers past this lag
    pub summary_capacity: usize,

    /// How many times a `NotDetermined` authorization event may re-issue a
    /// permission request before the tracker gives up
    pub reauthorization_limit: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { summary_capacity: 16, reauthorization_limit: 3 }
    }
}

impl TrackerConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = parse_yaml(yaml, "tracker config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_yaml_str(&read_file(path.as_ref())?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.summary_capacity == 0 {
            return Err(BeelineError::invalid_config("summary_capacity", "must be greater than 0"));
        }
        Ok(())
    }
}

/// Behavior of the track replay source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Playback speed multiplier (1.0 = recorded pace)
    pub speed: f64,

    /// Permission state reported before any request
    pub initial_authorization: AuthorizationStatus,

    /// Answer to a permission request: granted or denied
    pub grant_on_request: bool,

    /// Fixes delivered per `PositionsUpdated` event
    pub batch_size: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            initial_authorization: AuthorizationStatus::NotDetermined,
            grant_on_request: true,
            batch_size: 1,
        }
    }
}

impl ReplayConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = parse_yaml(yaml, "replay config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_yaml_str(&read_file(path.as_ref())?)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(BeelineError::invalid_config("speed", "must be a positive number"));
        }
        if self.batch_size == 0 {
            return Err(BeelineError::invalid_config("batch_size", "must be greater than 0"));
        }
        Ok(())
    }

    /// Speed clamped to [`REPLAY_SPEED_RANGE`]
    pub fn effective_speed(&self) -> f64 {
        self.speed.clamp(REPLAY_SPEED_RANGE.0, REPLAY_SPEED_RANGE.1)
    }
}

pub(crate) fn read_file(path: &Path) -> Result<String> {
    debug!("Reading {}", path.display());
    std::fs::read_to_string(path).map_err(|e| BeelineError::file_error(path.to_path_buf(), e))
}

pub(crate) fn parse_yaml<T: DeserializeOwned>(yaml: &str, context: &str) -> Result<T> {
    serde_yaml_ng::from_str(yaml).map_err(|e| BeelineError::parse_error(context, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_yaml_uses_defaults() {
        assert_eq!(TrackerConfig::from_yaml_str("{}").unwrap(), TrackerConfig::default());
        assert_eq!(ReplayConfig::from_yaml_str("{}").unwrap(), ReplayConfig::default());
    }

    #[test]
    fn replay_config_reads_all_fields() {
        let yaml = "speed: 4.0\ninitial_authorization: denied\ngrant_on_request: false\nbatch_size: 3\n";
        let config = ReplayConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.speed, 4.0);
        assert_eq!(config.initial_authorization, AuthorizationStatus::Denied);
        assert!(!config.grant_on_request);
        assert_eq!(config.batch_size, 3);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            TrackerConfig::from_yaml_str("summary_capacity: 0"),
            Err(BeelineError::InvalidConfig { .. })
        ));
        assert!(ReplayConfig::from_yaml_str("speed: -1.0").is_err());
        assert!(ReplayConfig::from_yaml_str("batch_size: 0").is_err());
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        match TrackerConfig::from_yaml_str("summary_capacity: [") {
            Err(BeelineError::Parse { context, .. }) => assert_eq!(context, "tracker config"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn speed_is_clamped() {
        let config = ReplayConfig { speed: 50.0, ..ReplayConfig::default() };
        assert_eq!(config.effective_speed(), 10.0);
        let config = ReplayConfig { speed: 0.01, ..ReplayConfig::default() };
        assert_eq!(config.effective_speed(), 0.1);
    }

    #[test]
    fn loads_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "reauthorization_limit: 1").unwrap();

        let config = TrackerConfig::from_path(file.path()).unwrap();
        assert_eq!(config.reauthorization_limit, 1);

        let missing = TrackerConfig::from_path("/nonexistent/beeline.yaml");
        assert!(matches!(missing, Err(BeelineError::File { .. })));
    }
}
