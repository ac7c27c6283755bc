//! Backoff configuration loading
//!
//! Loads configuration with the following precedence (low to high):
//! 1. Built-in defaults
//! 2. Config file (YAML or JSON, picked by extension)
//! 3. Environment variables (EXBACKOFF_* prefix)
//!
//! Every config handed back has been validated.

use crate::error::{Error, Result};
use crate::types::{BackoffConfig, BackoffProfiles, DelayUnit};
use camino::Utf8Path;
use serde::de::DeserializeOwned;
use std::env;
use std::fs;

/// Overrides `max-attempts`
pub const ENV_MAX_ATTEMPTS: &str = "EXBACKOFF_MAX_ATTEMPTS";

/// Overrides `delay-unit`
pub const ENV_DELAY_UNIT: &str = "EXBACKOFF_DELAY_UNIT";

/// When truthy, forces a single attempt
pub const ENV_DISABLED: &str = "EXBACKOFF_DISABLED";

/// Loader for [`BackoffConfig`] and [`BackoffProfiles`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigLoader {
    /// Skip EXBACKOFF_* overrides
    ignore_env: bool,
}

impl ConfigLoader {
    /// Create a loader that honours environment overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loader that ignores the environment
    pub fn without_env() -> Self {
        Self { ignore_env: true }
    }

    /// Defaults plus environment overrides
    pub fn load_default(&self) -> Result<BackoffConfig> {
        self.finish(BackoffConfig::default())
    }

    /// Parse a single config from YAML
    pub fn from_yaml_str(&self, content: &str) -> Result<BackoffConfig> {
        let config: BackoffConfig = serde_yaml_ng::from_str(content)?;
        self.finish(config)
    }

    /// Parse a single config from JSON
    pub fn from_json_str(&self, content: &str) -> Result<BackoffConfig> {
        let config: BackoffConfig = serde_json::from_str(content)?;
        self.finish(config)
    }

    /// Load a single config from a YAML or JSON file
    pub fn load(&self, path: &Utf8Path) -> Result<BackoffConfig> {
        let config: BackoffConfig = Self::read_file(path)?;
        self.finish(config)
    }

    /// Load per-operation profiles from a YAML or JSON file
    ///
    /// Environment overrides apply to the default profile only.
    pub fn load_profiles(&self, path: &Utf8Path) -> Result<BackoffProfiles> {
        let mut profiles: BackoffProfiles = Self::read_file(path)?;
        profiles.default = self.apply_env_overrides(profiles.default)?;
        profiles.validate()?;
        Ok(profiles)
    }

    /// Apply EXBACKOFF_* environment overrides
    pub fn apply_env_overrides(&self, mut config: BackoffConfig) -> Result<BackoffConfig> {
        if self.ignore_env {
            return Ok(config);
        }

        if let Ok(val) = env::var(ENV_MAX_ATTEMPTS) {
            let parsed: i64 = val.trim().parse().map_err(|_| {
                Error::invalid_config(format!("{} must be a valid number", ENV_MAX_ATTEMPTS))
            })?;
            config.max_attempts = u32::try_from(parsed)
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| Error::invalid_max_attempts(parsed))?;
            tracing::debug!(max_attempts = config.max_attempts, "max attempts set from environment");
        }

        if let Ok(val) = env::var(ENV_DELAY_UNIT) {
            config.delay_unit = val.parse::<DelayUnit>()?;
            tracing::debug!(delay_unit = %config.delay_unit, "delay unit set from environment");
        }

        if let Ok(val) = env::var(ENV_DISABLED) {
            if is_truthy(&val) {
                config.max_attempts = 1;
                tracing::debug!("backoff disabled from environment");
            }
        }

        Ok(config)
    }

    fn finish(&self, config: BackoffConfig) -> Result<BackoffConfig> {
        let config = self.apply_env_overrides(config)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file<T: DeserializeOwned>(path: &Utf8Path) -> Result<T> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config_not_found(path.as_str())
            } else {
                Error::Io(e)
            }
        })?;

        tracing::debug!(path = %path, "loading backoff config");

        match path.extension() {
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some("yaml") | Some("yml") | None => Ok(serde_yaml_ng::from_str(&content)?),
            Some(other) => Err(Error::invalid_config(format!(
                "unsupported config file extension '.{}' for {}",
                other, path
            ))),
        }
    }
}

fn is_truthy(val: &str) -> bool {
    matches!(
        val.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
