//! Terminal failure of a backoff loop
//!
//! An operation error is held back while attempts remain. It reaches the
//! caller, wrapped in [`RetryError`], only once the loop is over and the stop
//! condition reports it as surfaceable.

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Operation error surfaced after the retry loop
///
/// Generic over `E`, the error type of the retried operation.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The attempt budget ran out while the operation was still failing
    Exhausted {
        /// Number of attempts made before giving up
        attempts: u32,
        /// The error from the final attempt
        source: E,
        /// Total duration spent across all attempts
        total_duration: Duration,
    },

    /// The stop condition ended the loop on an error it does not retry
    NonRetryable {
        /// Attempt on which the loop stopped
        attempts: u32,
        /// The error of that attempt
        source: E,
    },
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted {
                attempts,
                source,
                total_duration,
            } => {
                write!(
                    f,
                    "retry exhausted after {} attempts over {:.2}s: {}",
                    attempts,
                    total_duration.as_secs_f64(),
                    source
                )
            }
            RetryError::NonRetryable { attempts, source } => {
                write!(
                    f,
                    "non-retryable error on attempt {}: {}",
                    attempts, source
                )
            }
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::NonRetryable { source, .. } => {
                Some(source)
            }
        }
    }
}

impl<E> RetryError<E> {
    pub fn exhausted(attempts: u32, source: E, total_duration: Duration) -> Self {
        RetryError::Exhausted {
            attempts,
            source,
            total_duration,
        }
    }

    pub fn non_retryable(attempts: u32, source: E) -> Self {
        RetryError::NonRetryable { attempts, source }
    }

    /// Attempts made, including the one that produced the error
    pub fn attempts(&self) -> u32 {
        self.parts().0
    }

    /// Time spent in the loop, known only when the budget ran out
    pub fn total_duration(&self) -> Option<Duration> {
        match self {
            RetryError::Exhausted { total_duration, .. } => Some(*total_duration),
            RetryError::NonRetryable { .. } => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    pub fn is_non_retryable(&self) -> bool {
        matches!(self, RetryError::NonRetryable { .. })
    }

    /// The operation error
    pub fn source_ref(&self) -> &E {
        self.parts().1
    }

    /// Unwrap into the operation error
    pub fn into_source(self) -> E {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::NonRetryable { source, .. } => source,
        }
    }

    /// Convert the operation error, keeping attempts and duration
    pub fn map_err<E2>(self, f: impl FnOnce(E) -> E2) -> RetryError<E2> {
        match self {
            RetryError::Exhausted {
                attempts,
                source,
                total_duration,
            } => RetryError::exhausted(attempts, f(source), total_duration),
            RetryError::NonRetryable { attempts, source } => {
                RetryError::non_retryable(attempts, f(source))
            }
        }
    }

    fn parts(&self) -> (u32, &E) {
        match self {
            RetryError::Exhausted {
                attempts, source, ..
            }
            | RetryError::NonRetryable { attempts, source } => (*attempts, source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_exhausted_error() {
        let err: RetryError<io::Error> = RetryError::exhausted(
            3,
            io::Error::new(io::ErrorKind::TimedOut, "timeout"),
            Duration::from_secs(5),
        );

        assert!(err.is_exhausted());
        assert!(!err.is_non_retryable());
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.total_duration(), Some(Duration::from_secs(5)));
        assert_eq!(err.source_ref().kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_non_retryable_error() {
        let err: RetryError<io::Error> =
            RetryError::non_retryable(2, io::Error::new(io::ErrorKind::NotFound, "not found"));

        assert!(err.is_non_retryable());
        assert!(!err.is_exhausted());
        assert_eq!(err.attempts(), 2);
        assert_eq!(err.total_duration(), None);
    }

    #[test]
    fn test_into_source() {
        let err: RetryError<String> =
            RetryError::exhausted(3, "first failure".to_string(), Duration::from_secs(1));

        assert_eq!(err.into_source(), "first failure");
    }

    #[test]
    fn test_map_err() {
        let err: RetryError<i32> = RetryError::non_retryable(1, 42);

        let mapped = err.map_err(|n| format!("error code: {}", n));
        assert!(
            matches!(mapped, RetryError::NonRetryable { source, attempts: 1 } if source == "error code: 42")
        );
    }

    #[test]
    fn test_error_source_chain() {
        let err: RetryError<io::Error> =
            RetryError::exhausted(4, io::Error::other("inner"), Duration::ZERO);
        let source = Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "inner");
    }

    #[test]
    fn test_display() {
        let err: RetryError<io::Error> = RetryError::exhausted(
            3,
            io::Error::new(io::ErrorKind::TimedOut, "connection timeout"),
            Duration::from_secs(5),
        );

        let display = format!("{}", err);
        assert!(display.contains("retry exhausted"));
        assert!(display.contains("3 attempts"));
        assert!(display.contains("connection timeout"));

        let err: RetryError<&str> = RetryError::non_retryable(1, "bad input");
        assert_eq!(err.to_string(), "non-retryable error on attempt 1: bad input");
    }
}
