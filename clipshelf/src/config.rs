//! History configuration shared by both processes
//!
//! Both the host app and the keyboard extension must agree on `storage_key`
//! and `signal_name`, otherwise they never see each other's writes.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use validator::Validate;

pub const DEFAULT_MAX_ENTRIES: u32 = 50;
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 750;
pub const DEFAULT_MAX_TEXT_LENGTH: u32 = 10_000;
pub const DEFAULT_STORAGE_KEY: &str = "clipboard_history";
pub const DEFAULT_SIGNAL_NAME: &str = "com.clipshelf.history.changed";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("validation failed: {0}")]
    Invalid(#[from] validator::ValidationErrors),
    #[error("malformed config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, uniffi::Record)]
#[serde(default)]
pub struct HistoryConfig {
    /// Capacity bound; the tail entry is evicted past this
    #[validate(range(min = 1, max = 1000))]
    pub max_entries: u32,
    /// Period of the fallback reconciliation timer
    #[validate(range(min = 50, max = 60000))]
    pub polling_interval_ms: u64,
    /// Longest text the pasteboard monitor ingests; longer copies are truncated
    #[validate(range(min = 1, max = 1000000))]
    pub max_text_length: u32,
    /// Key of the history blob in the shared store
    #[validate(length(min = 1))]
    pub storage_key: String,
    /// Name of the cross-process change signal
    #[validate(length(min = 1))]
    pub signal_name: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            polling_interval_ms: DEFAULT_POLLING_INTERVAL_MS,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            signal_name: DEFAULT_SIGNAL_NAME.to_string(),
        }
    }
}

impl HistoryConfig {
    /// Return the config if every field is within range
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }

    /// Parse a (possibly partial) JSON document; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: HistoryConfig = serde_json::from_str(json)?;
        config.validated()
    }

    /// Replace every out-of-range field with its default.
    /// Records built in Swift never pass through `validated`.
    pub fn sanitized(self) -> Self {
        let errors = match self.validate() {
            Ok(()) => return self,
            Err(errors) => errors,
        };
        let defaults = HistoryConfig::default();
        let mut config = self;
        for field in errors.errors().keys() {
            match *field {
                "max_entries" => config.max_entries = defaults.max_entries,
                "polling_interval_ms" => config.polling_interval_ms = defaults.polling_interval_ms,
                "max_text_length" => config.max_text_length = defaults.max_text_length,
                "storage_key" => config.storage_key = defaults.storage_key.clone(),
                "signal_name" => config.signal_name = defaults.signal_name.clone(),
                _ => {}
            }
            warn!(field = *field, "Invalid history config value; using default");
        }
        config
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }
}

/// Defaults for Swift callers (records cannot carry methods across FFI)
#[uniffi::export]
pub fn default_history_config() -> HistoryConfig {
    HistoryConfig::default()
}

/// Parse and validate a JSON config shipped with the host app
#[uniffi::export]
pub fn parse_history_config(json: String) -> Result<HistoryConfig, crate::ClipshelfError> {
    Ok(HistoryConfig::from_json(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HistoryConfig::default().validated().unwrap();
        assert_eq!(config.max_entries, 50);
        assert_eq!(config.max_text_length, 10_000);
        assert_eq!(config.polling_interval(), Duration::from_millis(750));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = HistoryConfig::from_json(r#"{"max_entries": 2}"#).unwrap();
        assert_eq!(config.max_entries, 2);
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
        assert_eq!(config.signal_name, DEFAULT_SIGNAL_NAME);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let zero = HistoryConfig {
            max_entries: 0,
            ..HistoryConfig::default()
        };
        assert!(matches!(zero.validated(), Err(ConfigError::Invalid(_))));

        let fast = HistoryConfig {
            polling_interval_ms: 1,
            ..HistoryConfig::default()
        };
        assert!(fast.validated().is_err());
    }

    #[test]
    fn test_sanitized_replaces_only_bad_fields() {
        let config = HistoryConfig {
            max_entries: 0,
            polling_interval_ms: 0,
            max_text_length: 200,
            storage_key: "custom_key".to_string(),
            signal_name: String::new(),
        }
        .sanitized();

        assert_eq!(config.max_entries, DEFAULT_MAX_ENTRIES);
        assert_eq!(config.polling_interval_ms, DEFAULT_POLLING_INTERVAL_MS);
        assert_eq!(config.signal_name, DEFAULT_SIGNAL_NAME);
        // Valid fields survive
        assert_eq!(config.max_text_length, 200);
        assert_eq!(config.storage_key, "custom_key");
        assert!(config.validated().is_ok());
    }

    #[test]
    fn test_sanitized_keeps_valid_config() {
        let config = HistoryConfig {
            max_entries: 3,
            ..HistoryConfig::default()
        };
        assert_eq!(config.clone().sanitized(), config);
    }

    #[test]
    fn test_empty_names_rejected() {
        let config = HistoryConfig {
            storage_key: String::new(),
            ..HistoryConfig::default()
        };
        assert!(config.validated().is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            HistoryConfig::from_json("{"),
            Err(ConfigError::Json(_))
        ));
    }
}
