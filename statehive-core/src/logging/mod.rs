//! Logging setup
//!
//! The store logs through `tracing`; this installs a global subscriber for
//! applications and tests that want to see those logs.

use crate::config::LoggingConfig;
use std::str::FromStr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod error;
mod level;

pub use error::LoggingError;
pub use level::LogLevel;

/// Install a subscriber with default settings
///
/// # Example
/// ```
/// statehive_core::logging::init_default_logging().ok();
/// ```
pub fn init_default_logging() -> Result<(), LoggingError> {
    init_logging(&LoggingConfig::default())
}

/// Install a subscriber configured from `config`
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a global
/// subscriber is already set.
///
/// # Example
/// ```
/// use statehive_core::config::LoggingConfig;
/// use statehive_core::logging::init_logging;
///
/// let config = LoggingConfig { level: "debug".to_string(), ..Default::default() };
/// init_logging(&config).ok();
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let level = LogLevel::from_str(&config.level)?;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let fmt_layer = fmt::layer().with_target(config.with_target);

    if config.json_format {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .try_init()
            .map_err(|e| LoggingError::InitializationFailed(e.to_string()))?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| LoggingError::InitializationFailed(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_is_rejected_before_install() {
        let config = LoggingConfig { level: "loud".to_string(), ..Default::default() };
        assert!(matches!(init_logging(&config), Err(LoggingError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_second_init_fails() {
        // the first call may also fail if another test installed a subscriber
        let _ = init_default_logging();
        assert!(matches!(
            init_default_logging(),
            Err(LoggingError::InitializationFailed(_))
        ));
    }
}
