//! Engine configuration.
//!
//! [`EngineConfig`] is plain data: it can be built in code, parsed from a
//! JSON string, or loaded from a JSON file. Missing fields take their
//! defaults, so `{}` is a valid configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Settings consumed by [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds of simulated time per frame in [`Engine::run`](crate::engine::Engine::run).
    /// Must be positive and finite.
    pub fixed_dt: f32,
    /// Upper bound on frames executed by `run`. `None` leaves the decision
    /// to the caller's predicate.
    pub max_frames: Option<u64>,
    /// Fallback `EnvFilter` directive for [`logging::init`](crate::logging::init).
    pub log_filter: String,
}

impl Default for EngineConfig {
    /// 60 frames per second, no frame limit, `info` logging.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            max_frames: None,
            log_filter: "info".to_owned(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check invariants that deserialization cannot express.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.fixed_dt > 0.0 && self.fixed_dt.is_finite() {
            Ok(())
        } else {
            Err(EngineError::InvalidTimestep(self.fixed_dt))
        }
    }

    /// Builder-style override of `fixed_dt`.
    pub fn with_fixed_dt(mut self, fixed_dt: f32) -> Self {
        self.fixed_dt = fixed_dt;
        self
    }

    /// Builder-style override of `max_frames`.
    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_60hz_unbounded() {
        let config = EngineConfig::default();
        assert!((config.fixed_dt - 1.0 / 60.0).abs() < f32::EPSILON);
        assert_eq!(config.max_frames, None);
        assert_eq!(config.log_filter, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_object_yields_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_json_overrides_named_fields() {
        let config =
            EngineConfig::from_json_str(r#"{ "fixed_dt": 0.5, "max_frames": 10 }"#).unwrap();
        assert_eq!(config.fixed_dt, 0.5);
        assert_eq!(config.max_frames, Some(10));
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = EngineConfig::from_json_str("{ fixed_dt: ").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn non_positive_timestep_is_rejected() {
        for dt in [0.0, -0.25] {
            let err = EngineConfig::default().with_fixed_dt(dt).validate().unwrap_err();
            assert!(matches!(err, EngineError::InvalidTimestep(v) if v == dt));
        }
        let err = EngineConfig::from_json_str(r#"{ "fixed_dt": -1.0 }"#).unwrap_err();
        assert_eq!(err.to_string(), "fixed_dt must be positive and finite, got -1");
    }

    #[test]
    fn infinite_timestep_is_rejected() {
        let config = EngineConfig::default().with_fixed_dt(f32::INFINITY);
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = EngineConfig::from_path("/nonexistent/cinder/engine.json").unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!("cinder-config-{}.json", std::process::id()));
        fs::write(&path, r#"{ "log_filter": "debug", "max_frames": 3 }"#).unwrap();
        let config = EngineConfig::from_path(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.max_frames, Some(3));
    }
}
