//! # exbackoff-core
//!
//! Exponential backoff for fallible operations:
//! - Retry runner with pluggable stop conditions
//! - Jittered exponential delays in microseconds or seconds
//! - Error type matching by type, name, or predicate
//! - Backoff configuration from YAML/JSON files and environment variables

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use config::ConfigLoader;
pub use error::{Error, Result};
pub use retry::{BackoffRunner, RetryError};
pub use types::{BackoffConfig, DelayUnit};
