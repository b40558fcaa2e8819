//! # Harness Configuration
//!
//! Settings for a harness run, read from an optional TOML file and then
//! overridden from the command line.
//!
//! ```toml
//! tick_ms = 100
//! settle_ms = 1000
//! sign_out_budget_ticks = 50
//! linger = false
//! password = "secret-pw"
//!
//! [loopback]
//! latency_ms = 150
//! provider_id = "loopback"
//! ```
//!
//! Every field is optional; missing fields take the defaults above (with no
//! sign-out bound).

use crate::error::{ConfigError, Result};
use crate::loopback::LOOPBACK_PROVIDER_ID;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_TICK_MS: u64 = 100;
pub const DEFAULT_SETTLE_MS: u64 = 1000;
pub const DEFAULT_LATENCY_MS: u64 = 150;
pub const DEFAULT_PASSWORD: &str = "testpw123!";

fn default_tick_ms() -> u64 {
    DEFAULT_TICK_MS
}

fn default_settle_ms() -> u64 {
    DEFAULT_SETTLE_MS
}

fn default_latency_ms() -> u64 {
    DEFAULT_LATENCY_MS
}

fn default_password() -> String {
    DEFAULT_PASSWORD.to_string()
}

fn default_provider_id() -> String {
    LOOPBACK_PROVIDER_ID.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    /// Time slice handed to the event pump on each tick.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Extra time after a sign-out for listener notifications to land.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Give up waiting for a sign-out after this many ticks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_out_budget_ticks: Option<u32>,
    /// Keep pumping after the scenarios until shutdown is requested.
    #[serde(default)]
    pub linger: bool,
    /// Password for generated accounts.
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default)]
    pub loopback: LoopbackConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoopbackConfig {
    /// How long each loopback request takes to settle.
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
    /// Provider id the service reports for its users; the profile checks
    /// expect the same value.
    #[serde(default = "default_provider_id")]
    pub provider_id: String,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            latency_ms: DEFAULT_LATENCY_MS,
            provider_id: default_provider_id(),
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            settle_ms: DEFAULT_SETTLE_MS,
            sign_out_budget_ticks: None,
            linger: false,
            password: default_password(),
            loopback: LoopbackConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: HarnessConfig =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        tracing::debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid("tick_ms must be greater than zero".into()));
        }
        if self.sign_out_budget_ticks == Some(0) {
            return Err(ConfigError::Invalid(
                "sign_out_budget_ticks must be greater than zero when set".into(),
            ));
        }
        if self.password.is_empty() {
            return Err(ConfigError::Invalid("password must not be empty".into()));
        }
        if self.loopback.provider_id.is_empty() {
            return Err(ConfigError::Invalid(
                "loopback.provider_id must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.loopback.latency_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: HarnessConfig = toml::from_str("").unwrap();
        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.tick(), Duration::from_millis(100));
        assert_eq!(config.settle(), Duration::from_secs(1));
        assert_eq!(config.latency(), Duration::from_millis(150));
        assert_eq!(config.loopback.provider_id, LOOPBACK_PROVIDER_ID);
    }

    #[test]
    fn test_partial_file_overrides() {
        let config: HarnessConfig = toml::from_str(
            "tick_ms = 25\nlinger = true\n\n[loopback]\nlatency_ms = 0\n",
        )
        .unwrap();
        assert_eq!(config.tick_ms, 25);
        assert!(config.linger);
        assert_eq!(config.loopback.latency_ms, 0);
        assert_eq!(config.settle_ms, DEFAULT_SETTLE_MS);
    }

    #[test]
    fn test_validate_rejects_zero_tick() {
        let config = HarnessConfig {
            tick_ms: 0,
            ..HarnessConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_empty_provider_id() {
        let config: HarnessConfig =
            toml::from_str("[loopback]\nprovider_id = \"\"\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(toml::from_str::<HarnessConfig>("tick = 5").is_err());
    }
}
