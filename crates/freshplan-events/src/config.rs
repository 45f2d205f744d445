//! Event bus configuration.
//!
//! Configuration is loaded from environment variables with defaults that
//! suit the browser-embedded application and tests.

use crate::error::ConfigError;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use serde::{Deserialize, Serialize};

/// Source label used when a publisher does not supply one.
pub const DEFAULT_SOURCE: &str = "app";

/// Event bus configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBusConfig {
    /// Number of emissions kept in the history buffer.
    pub history_capacity: usize,

    /// Whether the debug sink starts enabled.
    pub debug: bool,

    /// Source label for emissions without an explicit one.
    pub default_source: String,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            debug: false,
            default_source: DEFAULT_SOURCE.to_string(),
        }
    }
}

impl EventBusConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `EVENT_BUS_HISTORY_SIZE`: History buffer capacity (default: 100)
    /// - `EVENT_BUS_DEBUG`: Enable the debug sink (default: false)
    /// - `EVENT_BUS_SOURCE`: Default source label (default: app)
    ///
    /// Values that fail to parse or fail validation fall back to the default.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        Self {
            history_capacity: var("EVENT_BUS_HISTORY_SIZE")
                .and_then(|s| s.parse().ok())
                .filter(|&capacity: &usize| capacity > 0)
                .unwrap_or(default.history_capacity),
            debug: var("EVENT_BUS_DEBUG")
                .map(|s| s != "false" && s != "0")
                .unwrap_or(default.debug),
            default_source: var("EVENT_BUS_SOURCE")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(default.default_source),
        }
    }

    /// Set the history capacity.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Enable or disable the debug sink.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the default source label.
    pub fn with_default_source(mut self, source: impl Into<String>) -> Self {
        self.default_source = source.into();
        self
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "history_capacity".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.default_source.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "default_source".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EventBusConfig::default();
        assert_eq!(config.history_capacity, 100);
        assert!(!config.debug);
        assert_eq!(config.default_source, "app");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = EventBusConfig::default()
            .with_history_capacity(5)
            .with_debug(true)
            .with_default_source("calculator");

        assert_eq!(config.history_capacity, 5);
        assert!(config.debug);
        assert_eq!(config.default_source, "calculator");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = EventBusConfig::default().with_history_capacity(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "history_capacity"
        ));

        let config = EventBusConfig::default().with_default_source("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_vars() {
        let config = EventBusConfig::from_vars(|key| match key {
            "EVENT_BUS_HISTORY_SIZE" => Some("25".to_string()),
            "EVENT_BUS_DEBUG" => Some("true".to_string()),
            "EVENT_BUS_SOURCE" => Some("calculator".to_string()),
            _ => None,
        });

        assert_eq!(config.history_capacity, 25);
        assert!(config.debug);
        assert_eq!(config.default_source, "calculator");
    }

    #[test]
    fn test_from_vars_falls_back_on_invalid_values() {
        let config = EventBusConfig::from_vars(|key| match key {
            "EVENT_BUS_HISTORY_SIZE" => Some("0".to_string()),
            "EVENT_BUS_SOURCE" => Some(" ".to_string()),
            _ => None,
        });
        assert_eq!(config.history_capacity, 100);
        assert_eq!(config.default_source, "app");
        assert!(config.validate().is_ok());

        let config = EventBusConfig::from_vars(|key| {
            (key == "EVENT_BUS_HISTORY_SIZE").then(|| "lots".to_string())
        });
        assert_eq!(config.history_capacity, 100);
    }

    #[test]
    fn test_deserialize() {
        let config: EventBusConfig = serde_json::from_str(
            r#"{"history_capacity": 10, "debug": true, "default_source": "tests"}"#,
        )
        .unwrap();
        assert_eq!(config.history_capacity, 10);
        assert!(config.debug);
    }
}
