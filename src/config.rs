//! Container configuration.
//!
//! Settings can be built in code, read from prefixed environment variables,
//! or (with the `config` feature) parsed from JSON.

use std::env;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{DiError, DiResult};
use crate::internal::MAX_DEPTH;

/// Tunables for resolution.
///
/// ```rust
/// use depin::{Container, ContainerConfig};
///
/// let config = ContainerConfig::default().max_depth(64).detect_cycles(false);
/// let container = Container::builder().config(config).build();
/// assert_eq!(container.config().max_depth, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ContainerConfig {
    /// Longest chain of nested resolutions before `DepthExceeded`.
    pub max_depth: usize,
    /// Reject re-entry of a token already being resolved. Singleton and
    /// request re-entry is always rejected since their cache cells cannot be
    /// re-entered; turning this off only lets transient chains recurse until
    /// `max_depth`.
    pub detect_cycles: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            detect_cycles: true,
        }
    }
}

impl ContainerConfig {
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn detect_cycles(mut self, detect: bool) -> Self {
        self.detect_cycles = detect;
        self
    }

    /// Overlays `{PREFIX}_MAX_DEPTH` and `{PREFIX}_DETECT_CYCLES` onto the defaults.
    ///
    /// Unset variables keep their default; unparsable ones are an error.
    pub fn from_env(prefix: &str) -> DiResult<Self> {
        let mut config = Self::default();
        let prefix = prefix.to_uppercase();
        if let Ok(value) = env::var(format!("{}_MAX_DEPTH", prefix)) {
            config.max_depth = value.trim().parse().map_err(|_| {
                DiError::InvalidRegistration(format!("{}_MAX_DEPTH is not a number: {}", prefix, value))
            })?;
        }
        if let Ok(value) = env::var(format!("{}_DETECT_CYCLES", prefix)) {
            config.detect_cycles = value.trim().parse().map_err(|_| {
                DiError::InvalidRegistration(format!("{}_DETECT_CYCLES is not a boolean: {}", prefix, value))
            })?;
        }
        Ok(config)
    }

    /// Parses a JSON object; missing fields keep their default.
    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> DiResult<Self> {
        serde_json::from_str(json)
            .map_err(|err| DiError::InvalidRegistration(format!("invalid container configuration: {}", err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ContainerConfig::default();
        assert_eq!(config.max_depth, 1024);
        assert!(config.detect_cycles);
    }

    #[test]
    fn test_from_env_overlay() {
        env::set_var("DEPIN_CFG_TEST_MAX_DEPTH", "12");
        env::set_var("DEPIN_CFG_TEST_DETECT_CYCLES", "false");
        let config = ContainerConfig::from_env("depin_cfg_test").unwrap();
        assert_eq!(config, ContainerConfig::default().max_depth(12).detect_cycles(false));

        env::set_var("DEPIN_CFG_BAD_MAX_DEPTH", "deep");
        assert!(ContainerConfig::from_env("depin_cfg_bad").is_err());
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_from_json_keeps_missing_defaults() {
        let config = ContainerConfig::from_json_str(r#"{ "max_depth": 8 }"#).unwrap();
        assert_eq!(config.max_depth, 8);
        assert!(config.detect_cycles);
        assert!(ContainerConfig::from_json_str("[]").is_err());
    }
}
