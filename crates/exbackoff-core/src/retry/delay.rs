//! Backoff delay computation
//!
//! The delay doubles with every iteration and gets up to 10% of random
//! jitter on top, so that independent callers retrying against the same
//! service drift apart instead of colliding.

use rand::Rng;
use std::time::Duration;

use crate::types::DelayUnit;

/// Initial delay for [`DelayUnit::Microseconds`] (250ms)
pub const DEFAULT_INITIAL_MICROSECONDS: u64 = 250_000;

/// Initial delay for [`DelayUnit::Seconds`]
pub const DEFAULT_INITIAL_SECONDS: u64 = 1;

const MICROS_PER_SEC: u64 = 1_000_000;

/// Delay in microseconds before retry number `iteration` (1-indexed)
///
/// `base = initial * 2^(iteration - 1)`, and the result lies in
/// `[base, base + base / 10]`. Iteration 0 is treated as 1, and the base
/// saturates instead of overflowing.
///
/// # Example
///
/// ```rust
/// use exbackoff_core::retry::timeout_microseconds;
///
/// let delay = timeout_microseconds(1, 250_000);
/// assert!((250_000..=275_000).contains(&delay));
///
/// let delay = timeout_microseconds(5, 450_000);
/// assert!((7_200_000..=7_920_000).contains(&delay));
/// ```
pub fn timeout_microseconds(iteration: u32, initial_timeout: u64) -> u64 {
    let base = base_timeout(iteration, initial_timeout);
    let jitter_range = base / 10;
    let jitter = if jitter_range > 0 {
        rand::rng().random_range(0..=jitter_range)
    } else {
        0
    };
    base.saturating_add(jitter)
}

/// Delay in whole seconds before retry number `iteration` (1-indexed)
///
/// Computed in microseconds with `initial_timeout` seconds as the starting
/// point, then truncated to seconds.
pub fn timeout_seconds(iteration: u32, initial_timeout: u64) -> u64 {
    timeout_microseconds(iteration, initial_timeout.saturating_mul(MICROS_PER_SEC)) / MICROS_PER_SEC
}

/// Delay before retry number `iteration` using the default initial timeouts
pub fn delay_for(unit: DelayUnit, iteration: u32) -> Duration {
    match unit {
        DelayUnit::Microseconds => {
            Duration::from_micros(timeout_microseconds(iteration, DEFAULT_INITIAL_MICROSECONDS))
        }
        DelayUnit::Seconds => {
            Duration::from_secs(timeout_seconds(iteration, DEFAULT_INITIAL_SECONDS))
        }
    }
}

/// The jitter-free part of the delay
pub fn base_timeout(iteration: u32, initial_timeout: u64) -> u64 {
    let exponent = iteration.saturating_sub(1);
    let multiplier = 1u64.checked_shl(exponent).unwrap_or(0);
    if multiplier == 0 {
        return if initial_timeout == 0 { 0 } else { u64::MAX };
    }
    initial_timeout.saturating_mul(multiplier)
}
