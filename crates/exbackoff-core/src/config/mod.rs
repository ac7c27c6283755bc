//! Configuration loading

mod loader;

pub use loader::{ConfigLoader, ENV_DELAY_UNIT, ENV_DISABLED, ENV_MAX_ATTEMPTS};
