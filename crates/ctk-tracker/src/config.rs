use serde::{Deserialize, Serialize};

use ctk_types::SecretKey;

use crate::error::{TrackerError, TrackerResult};

/// Tunables of a [`ConnectorTracker`](crate::ConnectorTracker).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Random bytes behind every channel secret key.
    pub secret_key_bytes: usize,
    /// Include the parent connector when describing a connector in logs.
    pub describe_parents: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            secret_key_bytes: SecretKey::DEFAULT_BYTES,
            describe_parents: true,
        }
    }
}

impl TrackerConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> TrackerResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| TrackerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as a TOML document.
    pub fn to_toml_string(&self) -> TrackerResult<String> {
        toml::to_string(self).map_err(|e| TrackerError::Config(e.to_string()))
    }

    pub fn validate(&self) -> TrackerResult<()> {
        if self.secret_key_bytes < SecretKey::MIN_BYTES {
            return Err(TrackerError::Config(format!(
                "secret_key_bytes must be at least {}, got {}",
                SecretKey::MIN_BYTES,
                self.secret_key_bytes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = TrackerConfig::default();
        assert_eq!(c.secret_key_bytes, 32);
        assert!(c.describe_parents);
        c.validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = TrackerConfig::from_toml_str("describe_parents = false").unwrap();
        assert!(!c.describe_parents);
        assert_eq!(c.secret_key_bytes, 32);
    }

    #[test]
    fn short_keys_are_rejected() {
        let err = TrackerConfig::from_toml_str("secret_key_bytes = 8").unwrap_err();
        assert!(matches!(err, TrackerError::Config(_)), "got: {err}");
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        assert!(matches!(
            TrackerConfig::from_toml_str("secret_key_bytes = \"many\""),
            Err(TrackerError::Config(_))
        ));
    }

    #[test]
    fn toml_round_trip() {
        let c = TrackerConfig {
            secret_key_bytes: 48,
            describe_parents: false,
        };
        let text = c.to_toml_string().unwrap();
        assert_eq!(TrackerConfig::from_toml_str(&text).unwrap(), c);
    }
}
