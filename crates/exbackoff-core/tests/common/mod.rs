//! Common test helpers for exbackoff-core integration tests
//!
//! - `FlakyOperation`: fails a set number of times, then succeeds
//! - Error types to watch (or not) in stop conditions
//! - Tracing setup that writes through the test harness

use std::error::Error as StdError;
use std::fmt;
use std::sync::Once;

/// Value returned once a [`FlakyOperation`] stops failing
pub const SUCCESS_VALUE: &str = "Hello World!";

// ─── Error Types ─────────────────────────────────────────────────────────────

/// An error worth retrying
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientError {
    pub attempt: u32,
}

impl fmt::Display for TransientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transient failure on attempt {}", self.attempt)
    }
}

impl StdError for TransientError {}

/// An error no retry will fix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalError;

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fatal failure")
    }
}

impl StdError for FatalError {}

/// Error type of [`FlakyOperation`]
///
/// Wraps the concrete failure as its source, so conditions can match on
/// `TransientError` or `FatalError` through the chain.
#[derive(Debug)]
pub enum OperationError {
    Transient(TransientError),
    Fatal(FatalError),
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation failed")
    }
}

impl StdError for OperationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            OperationError::Transient(e) => Some(e),
            OperationError::Fatal(e) => Some(e),
        }
    }
}

// ─── Flaky Operation ─────────────────────────────────────────────────────────

/// How a [`FlakyOperation`] misbehaves before it succeeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Failure {
    /// Return an empty string
    Empty,
    /// Fail with a `TransientError`
    Transient,
    /// Fail with a `FatalError`
    Fatal,
}

/// Operation that fails `expected_failures` times, then returns [`SUCCESS_VALUE`]
#[derive(Debug, Clone)]
pub struct FlakyOperation {
    expected_failures: u32,
    failure: Failure,
    calls: u32,
}

#[allow(dead_code)]
impl FlakyOperation {
    pub fn new(expected_failures: u32, failure: Failure) -> Self {
        Self {
            expected_failures,
            failure,
            calls: 0,
        }
    }

    /// Returns empty strings before succeeding
    pub fn empty(expected_failures: u32) -> Self {
        Self::new(expected_failures, Failure::Empty)
    }

    /// Fails with transient errors before succeeding
    pub fn transient(expected_failures: u32) -> Self {
        Self::new(expected_failures, Failure::Transient)
    }

    pub fn call(&mut self) -> Result<String, OperationError> {
        self.calls += 1;
        if self.calls > self.expected_failures {
            return Ok(SUCCESS_VALUE.to_string());
        }
        match self.failure {
            Failure::Empty => Ok(String::new()),
            Failure::Transient => Err(OperationError::Transient(TransientError {
                attempt: self.calls,
            })),
            Failure::Fatal => Err(OperationError::Fatal(FatalError)),
        }
    }

    /// Number of times the operation has been called
    pub fn calls(&self) -> u32 {
        self.calls
    }
}

// ─── Tracing ─────────────────────────────────────────────────────────────────

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness's captured stdout
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    });
}
