//! Host configuration.
//!
//! ```rust,ignore
//! let config = MusterConfig::from_json_str(r#"{
//!     "kinds": ["pvp", "race"],
//!     "default_capacity": 16,
//!     "update_interval": 1,
//!     "slow_callback_threshold": 50
//! }"#)?;
//! ```

use muster_core::ActivityKind;
use muster_std::DispatchConfig;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Errors from loading a [`MusterConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The document is not valid configuration JSON.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid configuration value for `{field}`: {message}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// Activity kinds known out of the box.
pub const DEFAULT_KINDS: &[&str] = &["pvp", "pve", "build", "race", "hunt", "custom"];

/// Participant limit applied when an activity does not set one.
pub const DEFAULT_CAPACITY: usize = 32;

/// Seconds between update ticks.
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 1;

/// Configuration for a [`Muster`](crate::Muster) instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MusterConfig {
    /// The activity kind catalog. Names are matched case-insensitively.
    pub kinds: Vec<ActivityKind>,
    /// Capacity for activities created without an explicit one.
    pub default_capacity: usize,
    /// Seconds between update ticks.
    pub update_interval: u64,
    /// Milliseconds after which a single callback is logged as slow.
    pub slow_callback_threshold: Option<u64>,
}

impl Default for MusterConfig {
    fn default() -> Self {
        Self {
            kinds: DEFAULT_KINDS.iter().map(|k| ActivityKind::new(k)).collect(),
            default_capacity: DEFAULT_CAPACITY,
            update_interval: DEFAULT_UPDATE_INTERVAL_SECS,
            slow_callback_threshold: None,
        }
    }
}

impl MusterConfig {
    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let mut config: MusterConfig = serde_json::from_str(json)?;
        // Deserializing bypasses ActivityKind::new.
        config.kinds = config.kinds.iter().map(|k| ActivityKind::new(k.as_str())).collect();
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "default_capacity",
                message: "must be at least 1".into(),
            });
        }
        if self.update_interval == 0 {
            return Err(ConfigError::Invalid {
                field: "update_interval",
                message: "must be at least 1 second".into(),
            });
        }
        if self.kinds.iter().any(|k| k.as_str().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "kinds",
                message: "kind names must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Replace the kind catalog.
    pub fn with_kinds<I, K>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.kinds = kinds.into_iter().map(ActivityKind::new).collect();
        self
    }

    /// Set the default capacity.
    pub fn with_default_capacity(mut self, capacity: usize) -> Self {
        self.default_capacity = capacity;
        self
    }

    /// Set the update interval.
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval.as_secs().max(1);
        self
    }

    /// Set the slow-callback warning threshold.
    pub fn with_slow_callback_threshold(mut self, threshold: Duration) -> Self {
        self.slow_callback_threshold = Some(threshold.as_millis() as u64);
        self
    }

    /// Whether `kind` is in the catalog.
    pub fn is_known_kind(&self, kind: &ActivityKind) -> bool {
        self.kinds.contains(kind)
    }

    /// The update interval as a [`Duration`].
    pub fn update_period(&self) -> Duration {
        Duration::from_secs(self.update_interval)
    }

    /// The dispatcher subset of this configuration.
    pub fn dispatch_config(&self) -> DispatchConfig {
        let mut dispatch = DispatchConfig::default();
        if let Some(ms) = self.slow_callback_threshold {
            dispatch = dispatch.with_slow_callback_threshold(Duration::from_millis(ms));
        }
        dispatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MusterConfig::default();
        assert!(config.is_known_kind(&"race".into()));
        assert!(!config.is_known_kind(&"karaoke".into()));
        assert_eq!(config.default_capacity, DEFAULT_CAPACITY);
        assert_eq!(config.dispatch_config(), DispatchConfig::default());
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let config = MusterConfig::from_json_str(
            r#"{ "kinds": ["PvP", " Race "], "slow_callback_threshold": 25 }"#,
        )
        .unwrap();

        assert!(config.is_known_kind(&"pvp".into()));
        assert!(config.is_known_kind(&"race".into()));
        assert!(!config.is_known_kind(&"build".into()));
        assert_eq!(config.update_interval, DEFAULT_UPDATE_INTERVAL_SECS);
        assert_eq!(
            config.dispatch_config().slow_callback_threshold,
            Some(Duration::from_millis(25))
        );
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = MusterConfig::from_json_str(r#"{ "default_capacity": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "default_capacity", .. }));
    }

    #[test]
    fn test_rejects_unknown_field() {
        let err = MusterConfig::from_json_str(r#"{ "capacity": 4 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
