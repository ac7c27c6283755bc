//! Backoff runner
//!
//! [`BackoffRunner`] re-invokes an operation until its stop condition is
//! satisfied or the attempt budget is spent, sleeping with exponential
//! backoff in between.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::types::{BackoffConfig, DelayUnit};

use super::conditions::StopCondition;
use super::delay::delay_for;
use super::error::RetryError;
use super::observer::{NoOpObserver, RetryObserver};
use super::sleep::{self, Sleeper};

/// Default attempt budget
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Run an operation with a default runner
///
/// # Example
///
/// ```rust
/// use exbackoff_core::retry::{run_with_backoff, EmptyResultCondition};
///
/// let value = run_with_backoff(EmptyResultCondition, || Ok::<_, std::io::Error>("ready"));
/// assert_eq!(value.unwrap(), Some("ready"));
/// ```
pub fn run_with_backoff<T, E, C, F>(condition: C, operation: F) -> std::result::Result<Option<T>, RetryError<E>>
where
    C: StopCondition<T, E> + 'static,
    E: fmt::Display,
    F: FnMut() -> std::result::Result<T, E>,
{
    BackoffRunner::new(condition).run(operation)
}

/// What happens after an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// The stop condition accepted the outcome
    Stop,
    /// The condition rejected the outcome on the last allowed attempt
    Exhausted,
    /// Sleep, then make another attempt
    Retry(Duration),
}

/// Exponential backoff retry loop
///
/// The runner owns its stop condition. `run` may be called any number of
/// times; each call starts counting attempts from 1 again. A runner drives
/// one retry sequence at a time.
///
/// Outcomes of `run`:
///
/// - `Ok(Some(value))`: the value of the last attempt. If the budget ran out
///   this value did not satisfy the stop condition, so callers of conditions
///   that judge values should check it.
/// - `Ok(None)`: the last attempt failed and the condition does not surface
///   errors (see [`StopCondition::is_error_surfaceable`]).
/// - `Err(RetryError)`: the last attempt failed and the error is surfaced.
///
/// # Example
///
/// ```rust
/// use exbackoff_core::retry::{BackoffRunner, ErrorTypeCondition, RecordingSleeper};
/// use std::io;
///
/// let mut failures = 2;
/// let mut runner = BackoffRunner::new(ErrorTypeCondition::watching::<io::Error>())
///     .with_sleeper(RecordingSleeper::new());
/// runner.set_max_attempts(5).unwrap();
///
/// let value = runner
///     .run(|| {
///         if failures > 0 {
///             failures -= 1;
///             return Err(io::Error::other("not yet"));
///         }
///         Ok("done")
///     })
///     .unwrap();
///
/// assert_eq!(value, Some("done"));
/// assert_eq!(runner.current_attempt(), 3);
/// ```
pub struct BackoffRunner<T, E> {
    delay_unit: DelayUnit,
    max_attempts: u32,
    current_attempt: u32,
    condition: Box<dyn StopCondition<T, E>>,
    sleeper: Box<dyn Sleeper>,
    observer: Box<dyn RetryObserver>,
}

impl<T, E> BackoffRunner<T, E> {
    /// Create a runner with 4 max attempts and microsecond delays
    ///
    /// The sleeper is chosen here: cooperative inside a tokio runtime,
    /// blocking otherwise.
    pub fn new<C>(condition: C) -> Self
    where
        C: StopCondition<T, E> + 'static,
    {
        Self {
            delay_unit: DelayUnit::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            current_attempt: 1,
            condition: Box::new(condition),
            sleeper: sleep::detect(),
            observer: Box::new(NoOpObserver),
        }
    }

    /// Create a runner from a config
    pub fn from_config<C>(config: &BackoffConfig, condition: C) -> Result<Self>
    where
        C: StopCondition<T, E> + 'static,
    {
        let mut runner = Self::new(condition);
        runner.apply_config(config)?;
        Ok(runner)
    }

    /// Replace the sleeper
    pub fn with_sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.set_sleeper(sleeper);
        self
    }

    /// Replace the observer
    pub fn with_observer<O: RetryObserver + 'static>(mut self, observer: O) -> Self {
        self.set_observer(observer);
        self
    }

    pub fn set_sleeper<S: Sleeper + 'static>(&mut self, sleeper: S) -> &mut Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    pub fn set_observer<O: RetryObserver + 'static>(&mut self, observer: O) -> &mut Self {
        self.observer = Box::new(observer);
        self
    }

    /// Apply max attempts and delay unit from a config
    ///
    /// Nothing changes if the config is invalid.
    pub fn apply_config(&mut self, config: &BackoffConfig) -> Result<&mut Self> {
        config.validate()?;
        self.max_attempts = config.max_attempts;
        self.delay_unit = config.delay_unit;
        Ok(self)
    }

    pub fn delay_unit(&self) -> DelayUnit {
        self.delay_unit
    }

    pub fn set_delay_unit(&mut self, unit: DelayUnit) -> &mut Self {
        self.delay_unit = unit;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Set the attempt budget; fails when `max_attempts` is 0
    pub fn set_max_attempts(&mut self, max_attempts: u32) -> Result<&mut Self> {
        if max_attempts < 1 {
            return Err(Error::invalid_max_attempts(max_attempts));
        }
        self.max_attempts = max_attempts;
        Ok(self)
    }

    /// Allow a single attempt only
    pub fn disable(&mut self) -> &mut Self {
        self.max_attempts = 1;
        self
    }

    /// Attempt in progress, or the number of attempts the last `run` made
    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }

    pub fn stop_condition(&self) -> &dyn StopCondition<T, E> {
        &*self.condition
    }

    pub fn stop_condition_mut(&mut self) -> &mut dyn StopCondition<T, E> {
        &mut *self.condition
    }

    /// Replace the stop condition
    pub fn set_stop_condition<C>(&mut self, condition: C) -> &mut Self
    where
        C: StopCondition<T, E> + 'static,
    {
        self.condition = Box::new(condition);
        self
    }
}

impl<T, E: fmt::Display> BackoffRunner<T, E> {
    /// Run `operation` until the stop condition is met or attempts run out
    ///
    /// Blocks the calling thread for the whole sequence, including sleeps.
    /// Arguments for the operation are captured by the closure.
    ///
    /// Inside a multi-thread tokio runtime the worker's other tasks are moved
    /// off before each sleep. A current-thread runtime cannot do that, so
    /// every task on it waits out the delay; use [`run_async`](Self::run_async)
    /// there.
    pub fn run<F>(&mut self, mut operation: F) -> std::result::Result<Option<T>, RetryError<E>>
    where
        F: FnMut() -> std::result::Result<T, E>,
    {
        let start = Instant::now();
        self.current_attempt = 1;

        loop {
            self.observer
                .on_attempt_start(self.current_attempt, self.max_attempts);

            let (value, error) = split(operation());

            match self.next_step(value.as_ref(), error.as_ref()) {
                Step::Retry(delay) => {
                    self.sleeper.sleep(delay);
                    self.current_attempt += 1;
                }
                step => return self.finish(step, value, error, start.elapsed()),
            }
        }
    }

    /// Async form of [`run`](Self::run)
    ///
    /// The sleep between attempts is the only suspension point besides the
    /// operation itself, and goes through [`Sleeper::sleep_async`].
    pub async fn run_async<F, Fut>(
        &mut self,
        mut operation: F,
    ) -> std::result::Result<Option<T>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let start = Instant::now();
        self.current_attempt = 1;

        loop {
            self.observer
                .on_attempt_start(self.current_attempt, self.max_attempts);

            let (value, error) = split(operation().await);

            match self.next_step(value.as_ref(), error.as_ref()) {
                Step::Retry(delay) => {
                    // not held across the sleep
                    drop((value, error));
                    self.sleeper.sleep_async(delay).await;
                    self.current_attempt += 1;
                }
                step => return self.finish(step, value, error, start.elapsed()),
            }
        }
    }

    fn next_step(&mut self, value: Option<&T>, error: Option<&E>) -> Step {
        if self.condition.evaluate(value, error) {
            return Step::Stop;
        }

        let attempt = self.current_attempt;
        if attempt >= self.max_attempts {
            return Step::Exhausted;
        }

        // the first retry waits for iteration 1
        let delay = delay_for(self.delay_unit, attempt);
        self.observer
            .on_attempt_failed(attempt, error.map(|e| e as &dyn fmt::Display), delay);
        Step::Retry(delay)
    }

    fn finish(
        &self,
        step: Step,
        value: Option<T>,
        error: Option<E>,
        elapsed: Duration,
    ) -> std::result::Result<Option<T>, RetryError<E>> {
        let attempts = self.current_attempt;
        let exhausted = step == Step::Exhausted;

        let Some(err) = error else {
            if exhausted {
                self.observer.on_exhausted(attempts, None);
            } else {
                self.observer.on_success(attempts, elapsed);
            }
            return Ok(value);
        };

        if exhausted {
            self.observer
                .on_exhausted(attempts, Some(&err as &dyn fmt::Display));
        } else {
            self.observer.on_stopped_on_error(attempts, &err);
        }

        if !self.condition.is_error_surfaceable() {
            self.observer.on_error_suppressed(attempts, &err);
            return Ok(None);
        }

        if exhausted {
            Err(RetryError::exhausted(attempts, err, elapsed))
        } else {
            Err(RetryError::non_retryable(attempts, err))
        }
    }
}

impl<T, E> fmt::Debug for BackoffRunner<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackoffRunner")
            .field("delay_unit", &self.delay_unit)
            .field("max_attempts", &self.max_attempts)
            .field("current_attempt", &self.current_attempt)
            .finish_non_exhaustive()
    }
}

fn split<T, E>(outcome: std::result::Result<T, E>) -> (Option<T>, Option<E>) {
    match outcome {
        Ok(value) => (Some(value), None),
        Err(err) => (None, Some(err)),
    }
}
