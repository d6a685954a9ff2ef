//! Configuration
//!
//! Runtime knobs for stores and template caches. Both structs deserialize
//! from JSON with every field optional.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Options for a store created with
/// [`create_state_with_config`](crate::reactive::create_state_with_config).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Skip effects that are already waiting in the pending queue.
    ///
    /// Off by default: an effect subscribed to several keys written in the
    /// same turn is queued, and runs, once per write.
    #[serde(default)]
    pub dedupe_pending: bool,

    /// Drop writes made by an effect to keys that the same effect reads.
    ///
    /// Off by default: such a write queues the running effect again and it
    /// re-runs later in the same flush.
    #[serde(default)]
    pub ignore_own_writes: bool,
}

impl StoreConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Options for a [`TemplateCache`](crate::template::TemplateCache).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Prefix of the stub markers embedded in compiled markup.
    ///
    /// Must be plain text: no markup characters, quotes or whitespace.
    #[serde(default = "default_stub_prefix")]
    pub stub_prefix: String,
}

fn default_stub_prefix() -> String {
    "stub".to_string()
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            stub_prefix: default_stub_prefix(),
        }
    }
}

impl TemplateConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        let valid = !config.stub_prefix.is_empty()
            && config
                .stub_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ConfigError::InvalidStubPrefix(config.stub_prefix));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_uses_defaults() {
        assert_eq!(StoreConfig::from_json("{}").unwrap(), StoreConfig::default());
        assert_eq!(
            TemplateConfig::from_json("{}").unwrap(),
            TemplateConfig::default()
        );
        assert!(!StoreConfig::default().dedupe_pending);
        assert!(!StoreConfig::default().ignore_own_writes);
        assert_eq!(TemplateConfig::default().stub_prefix, "stub");
    }

    #[test]
    fn fields_override_defaults() {
        let store = StoreConfig::from_json(r#"{"dedupe_pending": true}"#).unwrap();
        assert!(store.dedupe_pending);
        assert!(!store.ignore_own_writes);

        let store = StoreConfig::from_json(r#"{"ignore_own_writes": true}"#).unwrap();
        assert!(store.ignore_own_writes);

        let template = TemplateConfig::from_json(r#"{"stub_prefix": "slot"}"#).unwrap();
        assert_eq!(template.stub_prefix, "slot");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            StoreConfig::from_json("{not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn markup_in_stub_prefix_is_rejected() {
        assert!(matches!(
            TemplateConfig::from_json(r#"{"stub_prefix": "<b>"}"#),
            Err(ConfigError::InvalidStubPrefix(_))
        ));
    }
}
