//! Engine configuration.
//!
//! Loaded from TOML with operator-tunable values, falling back to
//! built-in defaults:
//!
//! 1. `FUELBLEND_CONFIG` environment variable (path to TOML file)
//! 2. `fuelblend.toml` in the current working directory
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Configuration load/validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunable engine settings.
///
/// `#[serde(default)]` lets operators override a subset of keys; the
/// rest keep their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Trial budget used when a request does not carry one.
    pub default_trials: usize,
    /// Buffer size of progress-event channels handed to callers.
    pub progress_channel_buffer: usize,
    /// Buffer size of per-invocation oracle message channels.
    pub oracle_channel_buffer: usize,
    /// Tolerance on the simplex sum invariant (`|Σp − 1| ≤ tol`).
    pub simplex_sum_tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_trials: 100,
            progress_channel_buffer: 64,
            oracle_channel_buffer: 16,
            simplex_sum_tolerance: 1e-9,
        }
    }
}

impl EngineConfig {
    /// Load configuration using the documented lookup order. Never
    /// fails; a broken file logs a warning and falls back.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("FUELBLEND_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded engine config from FUELBLEND_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from FUELBLEND_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "FUELBLEND_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("fuelblend.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded engine config from ./fuelblend.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./fuelblend.toml, using defaults");
                }
            }
        }

        info!("Using built-in engine config defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_trials == 0 {
            return Err(ConfigError::Invalid(
                "default_trials must be positive".to_string(),
            ));
        }
        if self.progress_channel_buffer == 0 || self.oracle_channel_buffer == 0 {
            return Err(ConfigError::Invalid(
                "channel buffers must be positive".to_string(),
            ));
        }
        if !(self.simplex_sum_tolerance > 0.0) {
            return Err(ConfigError::Invalid(
                "simplex_sum_tolerance must be a positive number".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_trials = 250").unwrap();

        let config = EngineConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.default_trials, 250);
        assert_eq!(
            config.progress_channel_buffer,
            EngineConfig::default().progress_channel_buffer
        );
    }

    #[test]
    fn zero_trials_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_trials = 0").unwrap();

        let err = EngineConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_trials = \"lots\"").unwrap();

        let err = EngineConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_, _)));
    }
}
