//! Exponential backoff retry engine
//!
//! A [`BackoffRunner`] calls an operation, asks its [`StopCondition`] whether
//! the outcome is acceptable, and if not sleeps and tries again. The delay
//! doubles with every retry and carries up to 10% of random jitter.
//!
//! # Features
//!
//! - Built-in conditions: non-empty result, watched error types, closures,
//!   and a condition that never retries
//! - Error types matched by concrete type, by name through an
//!   [`ErrorTypeRegistry`], or by predicate
//! - Microsecond or second delay units
//! - Blocking and async runs; inside a tokio runtime the sleeps cooperate
//!   with the scheduler
//! - Observable attempts via the `RetryObserver` trait, with a
//!   `TracingObserver` for logging
//!
//! # Example
//!
//! ```rust,no_run
//! use exbackoff_core::retry::{BackoffRunner, EmptyResultCondition, RetryError, TracingObserver};
//!
//! fn fetch_token() -> Result<String, std::io::Error> {
//!     Ok("token".to_string())
//! }
//!
//! fn example() -> Result<Option<String>, RetryError<std::io::Error>> {
//!     let mut runner =
//!         BackoffRunner::new(EmptyResultCondition).with_observer(TracingObserver::new("token"));
//!     runner.run(fetch_token)
//! }
//! ```

mod conditions;
mod delay;
mod error;
mod error_types;
mod executor;
mod observer;
mod sleep;

pub use conditions::{
    BoxedErrorTypeCondition, EmptyResultCondition, ErrorSurfacing, ErrorTypeCondition, FunctionCondition, IsEmpty,
    NeverRetryCondition, StopCondition,
};
pub use delay::{
    base_timeout, delay_for, timeout_microseconds, timeout_seconds, DEFAULT_INITIAL_MICROSECONDS,
    DEFAULT_INITIAL_SECONDS,
};
pub use error::RetryError;
pub use error_types::{ErrorMatcher, ErrorType, ErrorTypeRegistry};
pub use executor::{run_with_backoff, BackoffRunner, DEFAULT_MAX_ATTEMPTS};
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use sleep::{
    cooperative_delay, detect as detect_sleeper, CooperativeSleeper, RecordingSleeper,
    SleepFuture, Sleeper, ThreadSleeper, MIN_COOPERATIVE_SLEEP,
};
