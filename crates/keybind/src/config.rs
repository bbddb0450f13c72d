//! Deployment configuration for the binding service.
//!
//! ```
//! use keybind::{BindingConfig, LockingPolicy};
//!
//! let config = BindingConfig::from_toml(r#"locking = "disabled""#).unwrap();
//! assert_eq!(config.locking, LockingPolicy::Disabled);
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Environment variable read by [`BindingConfig::from_env`].
pub const LOCKING_ENV: &str = "KEYBIND_LOCKING";

/// Whether operations take the per-key operation lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockingPolicy {
    #[default]
    Enabled,
    /// An outer layer already serializes access to keys.
    Disabled,
}

impl FromStr for LockingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enabled" => Ok(LockingPolicy::Enabled),
            "disabled" => Ok(LockingPolicy::Disabled),
            other => Err(Error::Config(format!(
                "invalid locking policy '{other}', expected 'enabled' or 'disabled'"
            ))),
        }
    }
}

/// Configuration for [`crate::BindingService`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BindingConfig {
    pub locking: LockingPolicy,
}

impl BindingConfig {
    /// Returns a configuration with locking disabled.
    pub fn without_locking() -> Self {
        Self {
            locking: LockingPolicy::Disabled,
        }
    }

    /// Returns true if operations should take the per-key lock.
    pub fn locking_enabled(&self) -> bool {
        self.locking == LockingPolicy::Enabled
    }

    /// Parses a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reads the configuration from the environment.
    ///
    /// `KEYBIND_LOCKING` accepts `enabled` or `disabled`; unset means enabled.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(value) = lookup(LOCKING_ENV) {
            config.locking = value.parse()?;
        }
        Ok(config)
    }
}
