//! Hooks into the backoff loop
//!
//! Runners start with [`NoOpObserver`]. Install a [`TracingObserver`] to get
//! log events, or a [`StatsObserver`] to count them.

use std::fmt::Display;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Receives the events of a backoff loop
///
/// Attempts are 1-indexed. An `error` of `None` means the attempt returned a
/// value and the stop condition rejected it.
///
/// # Example
///
/// ```rust
/// use exbackoff_core::retry::RetryObserver;
/// use std::fmt::Display;
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct SlowestRetry(AtomicU64);
///
/// impl RetryObserver for SlowestRetry {
///     fn on_attempt_start(&self, _attempt: u32, _max_attempts: u32) {}
///
///     fn on_attempt_failed(&self, _attempt: u32, _error: Option<&dyn Display>, delay: Duration) {
///         self.0.fetch_max(delay.as_millis() as u64, Ordering::Relaxed);
///     }
///
///     fn on_success(&self, _attempt: u32, _total_duration: Duration) {}
///
///     fn on_exhausted(&self, _attempts: u32, _final_error: Option<&dyn Display>) {}
/// }
/// ```
pub trait RetryObserver: Send + Sync {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32);

    /// `attempt` was rejected; the next one starts after `delay`
    fn on_attempt_failed(&self, attempt: u32, error: Option<&dyn Display>, delay: Duration);

    /// The stop condition accepted a value
    fn on_success(&self, attempt: u32, total_duration: Duration);

    /// The budget ran out before the condition was met
    fn on_exhausted(&self, attempts: u32, final_error: Option<&dyn Display>);

    /// The condition ended the loop on an error it does not retry
    fn on_stopped_on_error(&self, attempt: u32, error: &dyn Display) {
        let _ = (attempt, error);
    }

    /// A final error was dropped because the condition does not surface it
    fn on_error_suppressed(&self, attempts: u32, error: &dyn Display) {
        let _ = (attempts, error);
    }
}

/// A no-op observer that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_start(&self, _attempt: u32, _max_attempts: u32) {}

    fn on_attempt_failed(&self, _attempt: u32, _error: Option<&dyn Display>, _delay: Duration) {}

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {}

    fn on_exhausted(&self, _attempts: u32, _final_error: Option<&dyn Display>) {}
}

/// An observer that logs retry events using the `tracing` crate
///
/// # Log Levels
///
/// - `on_attempt_start`: DEBUG
/// - `on_attempt_failed`: WARN
/// - `on_success`: INFO (if > 1 attempt) or DEBUG (first attempt)
/// - `on_exhausted`: ERROR
/// - `on_stopped_on_error`: WARN
/// - `on_error_suppressed`: WARN
///
/// # Example
///
/// ```rust
/// use exbackoff_core::retry::TracingObserver;
///
/// let observer = TracingObserver::new("fetch-token");
/// assert_eq!(observer.operation(), "fetch-token");
/// ```
#[derive(Debug, Clone)]
pub struct TracingObserver {
    /// Name of the operation being retried (for log context)
    operation: String,
}

impl TracingObserver {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }

    /// Get the operation name
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("backoff")
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        tracing::debug!(
            operation = %self.operation,
            attempt = attempt,
            max_attempts = max_attempts,
            "starting attempt"
        );
    }

    fn on_attempt_failed(&self, attempt: u32, error: Option<&dyn Display>, delay: Duration) {
        match error {
            Some(err) => tracing::warn!(
                operation = %self.operation,
                attempt = attempt,
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "attempt failed, will retry"
            ),
            None => tracing::warn!(
                operation = %self.operation,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                "attempt returned an unacceptable result, will retry"
            ),
        }
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        if attempt > 1 {
            tracing::info!(
                operation = %self.operation,
                attempt = attempt,
                total_duration_ms = total_duration.as_millis() as u64,
                "succeeded after retry"
            );
        } else {
            tracing::debug!(
                operation = %self.operation,
                duration_ms = total_duration.as_millis() as u64,
                "succeeded on first attempt"
            );
        }
    }

    fn on_exhausted(&self, attempts: u32, final_error: Option<&dyn Display>) {
        match final_error {
            Some(err) => tracing::error!(
                operation = %self.operation,
                attempts = attempts,
                error = %err,
                "all retry attempts exhausted"
            ),
            None => tracing::error!(
                operation = %self.operation,
                attempts = attempts,
                "all retry attempts exhausted without an acceptable result"
            ),
        }
    }

    fn on_stopped_on_error(&self, attempt: u32, error: &dyn Display) {
        tracing::warn!(
            operation = %self.operation,
            attempt = attempt,
            error = %error,
            "stopped on an error that is not retried"
        );
    }

    fn on_error_suppressed(&self, attempts: u32, error: &dyn Display) {
        tracing::warn!(
            operation = %self.operation,
            attempts = attempts,
            error = %error,
            "final error suppressed by stop condition"
        );
    }
}

/// Counts loop events; each counter is readable through its getter
///
/// Share it with a runner through an `Arc` and read the counters afterwards.
#[derive(Debug, Default)]
pub struct StatsObserver {
    attempt_starts: AtomicU32,
    failures: AtomicU32,
    successes: AtomicU32,
    exhaustions: AtomicU32,
    stops_on_error: AtomicU32,
    suppressions: AtomicU32,
    delay_us: AtomicU64,
}

impl StatsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempt_starts(&self) -> u32 {
        self.attempt_starts.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn exhaustions(&self) -> u32 {
        self.exhaustions.load(Ordering::SeqCst)
    }

    pub fn stops_on_error(&self) -> u32 {
        self.stops_on_error.load(Ordering::SeqCst)
    }

    pub fn suppressions(&self) -> u32 {
        self.suppressions.load(Ordering::SeqCst)
    }

    /// Total delay requested between attempts
    pub fn total_delay(&self) -> Duration {
        Duration::from_micros(self.delay_us.load(Ordering::SeqCst))
    }
}

impl RetryObserver for StatsObserver {
    fn on_attempt_start(&self, _attempt: u32, _max_attempts: u32) {
        self.attempt_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_attempt_failed(&self, _attempt: u32, _error: Option<&dyn Display>, delay: Duration) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        self.delay_us
            .fetch_add(delay.as_micros() as u64, Ordering::SeqCst);
    }

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_exhausted(&self, _attempts: u32, _final_error: Option<&dyn Display>) {
        self.exhaustions.fetch_add(1, Ordering::SeqCst);
    }

    fn on_stopped_on_error(&self, _attempt: u32, _error: &dyn Display) {
        self.stops_on_error.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error_suppressed(&self, _attempts: u32, _error: &dyn Display) {
        self.suppressions.fetch_add(1, Ordering::SeqCst);
    }
}

/// Lets a caller keep a handle on an observer it gives to a runner
impl<T: RetryObserver + ?Sized> RetryObserver for std::sync::Arc<T> {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        (**self).on_attempt_start(attempt, max_attempts)
    }

    fn on_attempt_failed(&self, attempt: u32, error: Option<&dyn Display>, delay: Duration) {
        (**self).on_attempt_failed(attempt, error, delay)
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        (**self).on_success(attempt, total_duration)
    }

    fn on_exhausted(&self, attempts: u32, final_error: Option<&dyn Display>) {
        (**self).on_exhausted(attempts, final_error)
    }

    fn on_stopped_on_error(&self, attempt: u32, error: &dyn Display) {
        (**self).on_stopped_on_error(attempt, error)
    }

    fn on_error_suppressed(&self, attempts: u32, error: &dyn Display) {
        (**self).on_error_suppressed(attempts, error)
    }
}
