//! Error types for exbackoff-core
//!
//! These are configuration errors: they are raised while a runner, a stop
//! condition or a config file is being set up, and they are never retried.
//! Errors produced by the retried operation itself are carried by
//! [`crate::retry::RetryError`].

use thiserror::Error;

/// Result type alias using exbackoff-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors
#[derive(Error, Debug)]
pub enum Error {
    /// Max attempts below 1
    #[error("maximum number of allowed attempts must be at least 1, got {value}")]
    InvalidMaxAttempts { value: i64 },

    /// Error type name that no registry entry knows about
    #[error("error type \"{name}\" does not exist")]
    UnknownErrorType { name: String },

    /// Registered type that is not an error type
    #[error("{name} is not an error type (it does not implement std::error::Error)")]
    NotAnErrorType { name: String },

    /// Unparseable delay unit
    #[error("invalid backoff delay unit '{value}' (expected 'microseconds' or 'seconds')")]
    InvalidDelayUnit { value: String },

    /// Invalid configuration content
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid max attempts error
    pub fn invalid_max_attempts(value: impl Into<i64>) -> Self {
        Self::InvalidMaxAttempts {
            value: value.into(),
        }
    }

    /// Create an unknown error type error
    pub fn unknown_error_type(name: impl Into<String>) -> Self {
        Self::UnknownErrorType { name: name.into() }
    }

    /// Create a not-an-error-type error
    pub fn not_an_error_type(name: impl Into<String>) -> Self {
        Self::NotAnErrorType { name: name.into() }
    }

    /// Create an invalid delay unit error
    pub fn invalid_delay_unit(value: impl Into<String>) -> Self {
        Self::InvalidDelayUnit {
            value: value.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Whether this error came from a bad error type identifier
    pub fn is_error_type_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownErrorType { .. } | Error::NotAnErrorType { .. }
        )
    }
}
