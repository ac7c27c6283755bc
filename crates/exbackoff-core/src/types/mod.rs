//! Type definitions for backoff configuration

mod backoff_config;

pub use backoff_config::*;
