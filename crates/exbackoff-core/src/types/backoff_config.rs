//! Backoff configuration types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Unit used by the backoff delay formula
///
/// `Microseconds` starts at 250ms and doubles; `Seconds` starts at 1s and
/// doubles, truncated to whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DelayUnit {
    /// Microsecond granularity (default)
    #[default]
    Microseconds,

    /// Whole-second granularity
    Seconds,
}

impl DelayUnit {
    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            DelayUnit::Microseconds => "microseconds",
            DelayUnit::Seconds => "seconds",
        }
    }
}

impl fmt::Display for DelayUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DelayUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "microseconds" | "us" | "usec" => Ok(DelayUnit::Microseconds),
            "seconds" | "s" | "sec" => Ok(DelayUnit::Seconds),
            _ => Err(Error::invalid_delay_unit(s)),
        }
    }
}

/// Configuration for a single backoff runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BackoffConfig {
    /// Maximum number of attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay unit
    #[serde(default)]
    pub delay_unit: DelayUnit,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_unit: DelayUnit::default(),
        }
    }
}

impl BackoffConfig {
    /// Config that makes exactly one attempt
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Check the invariants serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts < 1 {
            return Err(Error::invalid_max_attempts(self.max_attempts));
        }
        Ok(())
    }
}

fn default_max_attempts() -> u32 {
    4
}

/// A default backoff config plus per-operation overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BackoffProfiles {
    /// Used by operations without their own entry
    #[serde(default)]
    pub default: BackoffConfig,

    /// Per-operation configs, keyed by operation name
    #[serde(default)]
    pub operations: HashMap<String, BackoffConfig>,
}

impl BackoffProfiles {
    /// Config for the named operation, falling back to the default
    pub fn for_operation(&self, operation: &str) -> &BackoffConfig {
        self.operations.get(operation).unwrap_or(&self.default)
    }

    /// Validate the default and every per-operation config
    pub fn validate(&self) -> Result<()> {
        self.default.validate()?;
        for (name, config) in &self.operations {
            config.validate().map_err(|e| {
                Error::invalid_config(format!("operation '{}': {}", name, e))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_config_defaults() {
        let config = BackoffConfig::default();
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.delay_unit, DelayUnit::Microseconds);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_disabled_config() {
        let config = BackoffConfig::disabled();
        assert_eq!(config.max_attempts, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_invalid() {
        let config = BackoffConfig {
            max_attempts: 0,
            delay_unit: DelayUnit::Seconds,
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidMaxAttempts { value: 0 })
        ));
    }

    #[test]
    fn test_delay_unit_parse() {
        assert_eq!("seconds".parse::<DelayUnit>().unwrap(), DelayUnit::Seconds);
        assert_eq!(" Seconds ".parse::<DelayUnit>().unwrap(), DelayUnit::Seconds);
        assert_eq!(
            "microseconds".parse::<DelayUnit>().unwrap(),
            DelayUnit::Microseconds
        );
        assert_eq!("us".parse::<DelayUnit>().unwrap(), DelayUnit::Microseconds);

        let err = "hours".parse::<DelayUnit>().unwrap_err();
        assert!(matches!(err, Error::InvalidDelayUnit { ref value } if value == "hours"));
    }

    #[test]
    fn test_delay_unit_display_matches_serde() {
        for unit in [DelayUnit::Microseconds, DelayUnit::Seconds] {
            let yaml = serde_yaml_ng::to_string(&unit).unwrap();
            assert_eq!(yaml.trim(), unit.to_string());
        }
    }

    #[test]
    fn test_backoff_config_yaml_kebab_case() {
        let yaml = "max-attempts: 7\ndelay-unit: seconds\n";
        let config: BackoffConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.max_attempts, 7);
        assert_eq!(config.delay_unit, DelayUnit::Seconds);
    }

    #[test]
    fn test_profiles_fallback_to_default() {
        let yaml = r#"
default:
  max-attempts: 3
operations:
  fetch-token:
    max-attempts: 6
    delay-unit: seconds
"#;
        let profiles: BackoffProfiles = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(profiles.for_operation("fetch-token").max_attempts, 6);
        assert_eq!(
            profiles.for_operation("fetch-token").delay_unit,
            DelayUnit::Seconds
        );
        assert_eq!(profiles.for_operation("unknown").max_attempts, 3);
        assert!(profiles.validate().is_ok());
    }

    #[test]
    fn test_profiles_validate_names_operation() {
        let mut profiles = BackoffProfiles::default();
        profiles.operations.insert(
            "upload".to_string(),
            BackoffConfig {
                max_attempts: 0,
                delay_unit: DelayUnit::Microseconds,
            },
        );
        let err = profiles.validate().unwrap_err();
        assert!(err.to_string().contains("upload"));
    }
}
