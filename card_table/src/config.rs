//! Runtime configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Number of logical card values in a full tarot deck
pub const DEFAULT_TOTAL_CARDS: u32 = 78;

/// Default bound on a single store batch, in milliseconds
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// Default capacity of the table event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Required variable is not set
    #[error("Missing required environment variable {var} ({hint})")]
    MissingRequired { var: String, hint: String },

    /// Variable is set but unusable
    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Card table settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardTableConfig {
    /// Number of logical card values; a dealt deck holds one card per value
    pub total_cards: u32,

    /// Upper bound on every store batch
    pub store_timeout: Duration,

    /// Whether clearing ownership also drops the per-value indices
    pub cascade_clear_owned: bool,

    /// Buffered events per subscriber before lagging ones miss events
    pub event_channel_capacity: usize,
}

impl CardTableConfig {
    /// Create configuration from environment variables
    ///
    /// - `TOTAL_CARDS` (default: 78)
    /// - `STORE_TIMEOUT_MS` (default: 5000)
    /// - `CASCADE_CLEAR_OWNED` (default: false)
    /// - `EVENT_CHANNEL_CAPACITY` (default: 256)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Create configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let total_cards = parse_var(&lookup, "TOTAL_CARDS", DEFAULT_TOTAL_CARDS)?;
        if total_cards == 0 {
            return Err(ConfigError::Invalid {
                var: "TOTAL_CARDS".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let timeout_ms = parse_var(&lookup, "STORE_TIMEOUT_MS", DEFAULT_STORE_TIMEOUT_MS)?;
        if timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "STORE_TIMEOUT_MS".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let event_channel_capacity = parse_var(
            &lookup,
            "EVENT_CHANNEL_CAPACITY",
            DEFAULT_EVENT_CHANNEL_CAPACITY,
        )?;
        if event_channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "EVENT_CHANNEL_CAPACITY".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            total_cards,
            store_timeout: Duration::from_millis(timeout_ms),
            cascade_clear_owned: parse_var(&lookup, "CASCADE_CLEAR_OWNED", false)?,
            event_channel_capacity,
        })
    }
}

impl Default for CardTableConfig {
    fn default() -> Self {
        Self {
            total_cards: DEFAULT_TOTAL_CARDS,
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            cascade_clear_owned: false,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

fn parse_var<T, F>(lookup: &F, var: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: var.to_string(),
            reason: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}

/// Parse an environment variable, falling back to `default` when unset
pub(crate) fn parse_env_or<T>(var: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_var(&|name: &str| std::env::var(name).ok(), var, default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = CardTableConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, CardTableConfig::default());
        assert_eq!(config.total_cards, 78);
    }

    #[test]
    fn test_overrides() {
        let config = CardTableConfig::from_lookup(lookup(&[
            ("TOTAL_CARDS", "52"),
            ("STORE_TIMEOUT_MS", "250"),
            ("CASCADE_CLEAR_OWNED", "true"),
        ]))
        .unwrap();
        assert_eq!(config.total_cards, 52);
        assert_eq!(config.store_timeout, Duration::from_millis(250));
        assert!(config.cascade_clear_owned);
    }

    #[test]
    fn test_invalid_values() {
        let err = CardTableConfig::from_lookup(lookup(&[("TOTAL_CARDS", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "TOTAL_CARDS"));

        let err = CardTableConfig::from_lookup(lookup(&[("TOTAL_CARDS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err =
            CardTableConfig::from_lookup(lookup(&[("CASCADE_CLEAR_OWNED", "yes")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "CASCADE_CLEAR_OWNED"));
    }
}
