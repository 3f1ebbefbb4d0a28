//! Store configuration
//!
//! Defaults, TOML files and `STATEHIVE_*` environment overrides for the
//! store and its logging.

use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;

mod error;

pub use error::ConfigError;

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Panic when state changes outside a mutation handler
    pub strict: bool,

    /// Number of diagnostics kept by the store
    pub diagnostics_capacity: usize,

    /// Events buffered per event-hook receiver
    pub event_capacity: usize,

    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            strict: false,
            diagnostics_capacity: 256,
            event_capacity: 100,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json_format: false, with_target: true }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables
    ///
    /// Unset variables keep their defaults.
    /// Example: STATEHIVE_STRICT=true STATEHIVE_LOG_LEVEL=debug
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from the environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(strict) = parse_var("STATEHIVE_STRICT")? {
            self.strict = strict;
        }
        if let Some(capacity) = parse_var("STATEHIVE_DIAGNOSTICS_CAPACITY")? {
            self.diagnostics_capacity = capacity;
        }
        if let Some(capacity) = parse_var("STATEHIVE_EVENT_CAPACITY")? {
            self.event_capacity = capacity;
        }
        if let Ok(level) = env::var("STATEHIVE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = parse_var("STATEHIVE_LOG_JSON")? {
            self.logging.json_format = json;
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.diagnostics_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "diagnostics_capacity must be greater than 0".to_string(),
            ));
        }

        if self.event_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "event_capacity must be greater than 0".to_string(),
            ));
        }

        self.logging.log_level()?;
        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }
}

impl LoggingConfig {
    /// Parsed log level
    pub fn log_level(&self) -> Result<LogLevel, ConfigError> {
        LogLevel::from_str(&self.level)
            .map_err(|_| ConfigError::ValidationFailed(format!("Invalid log level: {}", self.level)))
    }
}

fn parse_var<T>(variable: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue { variable, reason: e.to_string() }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.strict);
    }

    #[test]
    fn test_config_validation() {
        let mut config = StoreConfig::default();
        config.diagnostics_capacity = 0;
        assert!(config.validate().is_err());

        config = StoreConfig::default();
        config.event_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_validation() {
        let mut config = StoreConfig::default();

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.log_level().unwrap(), LogLevel::Debug);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("statehive.toml");

        let mut config = StoreConfig::default();
        config.strict = true;
        config.logging.json_format = true;
        config.save_to_file(&path).unwrap();

        assert_eq!(StoreConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "strict = true\n\n[logging]\nlevel = \"warn\"\n").unwrap();

        let config = StoreConfig::from_file(&path).unwrap();
        assert!(config.strict);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.event_capacity, StoreConfig::default().event_capacity);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "diagnostics_capacity = 0\n").unwrap();
        assert!(matches!(StoreConfig::from_file(&path), Err(ConfigError::ValidationFailed(_))));

        std::fs::write(&path, "strict = \"maybe\"\n").unwrap();
        assert!(matches!(StoreConfig::from_file(&path), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            StoreConfig::from_file("/nonexistent/statehive.toml"),
            Err(ConfigError::FileReadError(_))
        ));
    }

    // All environment handling lives in one test: the process environment is shared.
    #[test]
    fn test_env_overrides() {
        env::set_var("STATEHIVE_STRICT", "true");
        env::set_var("STATEHIVE_EVENT_CAPACITY", "8");
        env::set_var("STATEHIVE_LOG_LEVEL", "debug");
        let config = StoreConfig::from_env().unwrap();
        assert!(config.strict);
        assert_eq!(config.event_capacity, 8);
        assert_eq!(config.logging.level, "debug");

        env::set_var("STATEHIVE_DIAGNOSTICS_CAPACITY", "lots");
        let err = StoreConfig::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { variable: "STATEHIVE_DIAGNOSTICS_CAPACITY", .. }
        ));

        for variable in [
            "STATEHIVE_STRICT",
            "STATEHIVE_EVENT_CAPACITY",
            "STATEHIVE_LOG_LEVEL",
            "STATEHIVE_DIAGNOSTICS_CAPACITY",
        ] {
            env::remove_var(variable);
        }
    }
}
