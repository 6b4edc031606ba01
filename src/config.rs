//! Scenario configuration.
//!
//! Scenarios can be assembled in code or loaded declaratively from YAML or
//! JSON:
//!
//! ```yaml
//! movement_logger: false
//! peers_logger: false
//! event_logging: true
//! event_filter: [LINK, ROUTER]
//! seed: 42
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event_log::Category;
use crate::types::SimTime;

/// Errors raised during scenario setup. All fatal: a bad configuration
/// aborts the run before any simulated time elapses.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unknown message generator type '{0}'")]
    UnknownGeneratorType(String),

    #[error("unknown file format: {0}")]
    UnknownFormat(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Recognized scenario options.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimConfig {
    /// Periodically report node positions via `tracing`.
    #[serde(default = "default_true")]
    pub movement_logger: bool,

    /// Periodically report neighbor sets via `tracing`.
    #[serde(default = "default_true")]
    pub peers_logger: bool,

    /// Write the structured event log.
    #[serde(default)]
    pub event_logging: bool,

    /// Categories to retain in the event log (empty keeps all).
    #[serde(default)]
    pub event_filter: Vec<Category>,

    /// Seed for generator source/destination sampling.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Interval of the movement/peers loggers, in seconds.
    #[serde(default = "default_interval")]
    pub log_interval: SimTime,

    /// Interval of the dynamic neighbor scan, in seconds.
    #[serde(default = "default_interval")]
    pub neighbor_scan_interval: SimTime,

    /// Interval of the TTL expiry scan, in seconds.
    #[serde(default = "default_interval")]
    pub ttl_scan_interval: SimTime,
}

fn default_true() -> bool {
    true
}

fn default_seed() -> u64 {
    42
}

fn default_interval() -> SimTime {
    1.0
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            movement_logger: true,
            peers_logger: true,
            event_logging: false,
            event_filter: Vec::new(),
            seed: default_seed(),
            log_interval: default_interval(),
            neighbor_scan_interval: default_interval(),
            ttl_scan_interval: default_interval(),
        }
    }
}

impl SimConfig {
    /// A configuration with every logger disabled, for batch experiments.
    pub fn quiet() -> Self {
        Self {
            movement_logger: false,
            peers_logger: false,
            ..Self::default()
        }
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON string.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file, auto-detecting the format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let content = std::fs::read_to_string(path)?;

        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml(&content),
            "json" => Self::from_json(&content),
            _ => Err(ConfigError::UnknownFormat(ext.to_string())),
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, v) in [
            ("log_interval", self.log_interval),
            ("neighbor_scan_interval", self.neighbor_scan_interval),
            ("ttl_scan_interval", self.ttl_scan_interval),
        ] {
            if !(v > 0.0) || !v.is_finite() {
                return Err(ConfigError::Validation(format!(
                    "{name} must be a positive number, got {v}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimConfig::default();
        assert!(config.movement_logger);
        assert!(config.peers_logger);
        assert!(!config.event_logging);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
movement_logger: false
peers_logger: false
event_logging: true
event_filter: [LINK, ROUTER]
seed: 7
"#;
        let config = SimConfig::from_yaml(yaml).unwrap();
        assert!(!config.movement_logger);
        assert!(config.event_logging);
        assert_eq!(config.event_filter, vec![Category::Link, Category::Router]);
        assert_eq!(config.seed, 7);
    }

    #[test]
    fn test_json_parsing() {
        let json = r#"{"event_logging": true, "event_filter": ["STORE"]}"#;
        let config = SimConfig::from_json(json).unwrap();
        assert!(config.event_logging);
        assert_eq!(config.event_filter, vec![Category::Store]);
    }

    #[test]
    fn test_unknown_category_rejected() {
        let yaml = "event_filter: [BOGUS]\n";
        assert!(SimConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_non_positive_interval_rejected() {
        let yaml = "ttl_scan_interval: 0\n";
        assert!(matches!(
            SimConfig::from_yaml(yaml),
            Err(ConfigError::Validation(_))
        ));
    }
}
