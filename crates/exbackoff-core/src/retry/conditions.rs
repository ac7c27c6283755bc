//! Stop conditions
//!
//! A stop condition is asked after every attempt whether the outcome is
//! acceptable. Returning `true` ends the retry loop; returning `false` asks
//! for another attempt, budget permitting.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::Result;

use super::error_types::{ErrorType, ErrorTypeRegistry};

/// Decides when a [`BackoffRunner`](super::BackoffRunner) stops retrying
///
/// `result` is `None` when the attempt failed with an error, and `error` is
/// `None` when the attempt produced a value. Conditions take `&mut self`, so
/// they can keep state across attempts (counters, deadlines, flags flipped
/// from elsewhere).
///
/// Implement this trait directly for custom stopping logic.
///
/// Conditions must be `Send` so a runner can move to another thread or be
/// held across `.await` in a spawned task. State shared with the rest of the
/// program goes through `Arc` with an atomic or `Mutex`, not `Rc` or
/// `RefCell`.
///
/// # Example
///
/// ```rust
/// use exbackoff_core::retry::StopCondition;
///
/// /// Stop once a status code below 500 comes back.
/// struct HealthyStatus;
///
/// impl<E> StopCondition<u16, E> for HealthyStatus {
///     fn evaluate(&mut self, result: Option<&u16>, _error: Option<&E>) -> bool {
///         matches!(result, Some(code) if *code < 500)
///     }
/// }
/// ```
pub trait StopCondition<T, E>: Send {
    /// Return `true` when retrying should stop
    fn evaluate(&mut self, result: Option<&T>, error: Option<&E>) -> bool;

    /// Whether an error still outstanding after the loop is returned to the caller
    ///
    /// When this is `false` the runner discards the error and hands back
    /// `Ok(None)` instead, so callers only ever see results. That is a
    /// configuration choice; callers opting into it must check for `None`.
    fn is_error_surfaceable(&self) -> bool {
        true
    }
}

impl<T, E, C: StopCondition<T, E> + ?Sized> StopCondition<T, E> for Box<C> {
    fn evaluate(&mut self, result: Option<&T>, error: Option<&E>) -> bool {
        (**self).evaluate(result, error)
    }

    fn is_error_surfaceable(&self) -> bool {
        (**self).is_error_surfaceable()
    }
}

/// Values that can be empty
///
/// Empty strings and collections, numeric zero, `false`, `()` and `None` are
/// empty.
pub trait IsEmpty {
    /// Whether the value counts as empty
    fn is_empty_value(&self) -> bool;
}

impl IsEmpty for str {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl IsEmpty for String {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> IsEmpty for [T] {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T, const N: usize> IsEmpty for [T; N] {
    fn is_empty_value(&self) -> bool {
        N == 0
    }
}

impl<T> IsEmpty for Vec<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> IsEmpty for VecDeque<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V, S> IsEmpty for HashMap<K, V, S> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T, S> IsEmpty for HashSet<T, S> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> IsEmpty for BTreeMap<K, V> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> IsEmpty for BTreeSet<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: IsEmpty> IsEmpty for Option<T> {
    fn is_empty_value(&self) -> bool {
        self.as_ref().map_or(true, IsEmpty::is_empty_value)
    }
}

impl<T: IsEmpty + ?Sized> IsEmpty for &T {
    fn is_empty_value(&self) -> bool {
        (**self).is_empty_value()
    }
}

impl<T: IsEmpty + ?Sized> IsEmpty for Box<T> {
    fn is_empty_value(&self) -> bool {
        (**self).is_empty_value()
    }
}

impl<T: IsEmpty + ?Sized> IsEmpty for Rc<T> {
    fn is_empty_value(&self) -> bool {
        (**self).is_empty_value()
    }
}

impl<T: IsEmpty + ?Sized> IsEmpty for Arc<T> {
    fn is_empty_value(&self) -> bool {
        (**self).is_empty_value()
    }
}

impl IsEmpty for () {
    fn is_empty_value(&self) -> bool {
        true
    }
}

impl IsEmpty for bool {
    fn is_empty_value(&self) -> bool {
        !*self
    }
}

impl IsEmpty for char {
    fn is_empty_value(&self) -> bool {
        *self == '\0'
    }
}

macro_rules! impl_is_empty_for_ints {
    ($($t:ty),*) => {
        $(
            impl IsEmpty for $t {
                fn is_empty_value(&self) -> bool {
                    *self == 0
                }
            }
        )*
    };
}

impl_is_empty_for_ints!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl IsEmpty for f32 {
    fn is_empty_value(&self) -> bool {
        *self == 0.0
    }
}

impl IsEmpty for f64 {
    fn is_empty_value(&self) -> bool {
        *self == 0.0
    }
}

/// Stops once the operation returns a non-empty value
///
/// Errors are ignored; a failed attempt has no value and so counts as empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyResultCondition;

impl<T: IsEmpty, E> StopCondition<T, E> for EmptyResultCondition {
    fn evaluate(&mut self, result: Option<&T>, _error: Option<&E>) -> bool {
        result.is_some_and(|value| !value.is_empty_value())
    }
}

/// Keeps retrying while the operation fails with one of the watched error types
///
/// Stops when the attempt succeeded, or when it failed with an error that
/// none of the watched types match. An empty watch list never retries.
///
/// # Example
///
/// ```rust
/// use exbackoff_core::retry::{ErrorTypeCondition, ErrorTypeRegistry};
/// use std::io;
///
/// // Typed: checked at compile time
/// let condition = ErrorTypeCondition::watching::<io::Error>();
/// assert_eq!(condition.error_types().len(), 1);
///
/// // Named: checked against a registry at construction
/// let registry = ErrorTypeRegistry::with_std();
/// let condition =
///     ErrorTypeCondition::from_names(&registry, ["std::io::Error", "std::fmt::Error"]).unwrap();
/// assert_eq!(condition.type_names(), vec!["std::io::Error", "std::fmt::Error"]);
/// ```
#[derive(Debug, Clone)]
pub struct ErrorTypeCondition {
    types: Vec<ErrorType>,
}

impl Default for ErrorTypeCondition {
    fn default() -> Self {
        Self::any_error()
    }
}

impl ErrorTypeCondition {
    /// Watch the given error types; duplicates are dropped, order is kept
    pub fn new<I: IntoIterator<Item = ErrorType>>(types: I) -> Self {
        let mut condition = Self { types: Vec::new() };
        condition.set_error_types(types);
        condition
    }

    /// Watch a single concrete error type
    pub fn watching<E: StdError + 'static>() -> Self {
        Self::new([ErrorType::of::<E>()])
    }

    /// Retry on every error
    pub fn any_error() -> Self {
        Self::new([ErrorType::any()])
    }

    /// Resolve error type names through `registry`
    ///
    /// Fails on the first name that is unknown or that is not an error type.
    pub fn from_names<I, S>(registry: &ErrorTypeRegistry, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self::new(registry.resolve_all(names)?))
    }

    /// Builder form of [`add`](Self::add)
    pub fn with(mut self, error_type: ErrorType) -> Self {
        self.add(error_type);
        self
    }

    /// Watch one more error type
    pub fn add(&mut self, error_type: ErrorType) -> &mut Self {
        if !self.types.iter().any(|t| t.same_tag(&error_type)) {
            self.types.push(error_type);
        }
        self
    }

    /// Replace the watched error types
    pub fn set_error_types<I: IntoIterator<Item = ErrorType>>(&mut self, types: I) -> &mut Self {
        self.types.clear();
        for error_type in types {
            self.add(error_type);
        }
        self
    }

    /// Watched error types, in insertion order
    pub fn error_types(&self) -> &[ErrorType] {
        &self.types
    }

    /// Names of the watched error types
    pub fn type_names(&self) -> Vec<&str> {
        self.types.iter().map(ErrorType::name).collect()
    }

    /// Whether `err` is one of the watched types
    pub fn is_watched(&self, err: &(dyn StdError + 'static)) -> bool {
        self.types.iter().any(|t| t.matches(err))
    }

    /// Adapt this condition to operations failing with a boxed `dyn Error`
    pub fn boxed(self) -> BoxedErrorTypeCondition {
        BoxedErrorTypeCondition(self)
    }
}

impl<T, E: StdError + 'static> StopCondition<T, E> for ErrorTypeCondition {
    fn evaluate(&mut self, _result: Option<&T>, error: Option<&E>) -> bool {
        match error {
            None => true,
            Some(err) => !self.is_watched(err),
        }
    }
}

/// [`ErrorTypeCondition`] for operations returning `Box<dyn Error>`
///
/// `Box<dyn Error + Send + Sync>` is not itself an `Error`, so the plain
/// condition does not apply to it. This wrapper matches on the boxed error
/// and its source chain.
///
/// ```rust
/// use exbackoff_core::retry::{BackoffRunner, ErrorTypeCondition, RecordingSleeper};
/// use std::error::Error;
/// use std::io;
///
/// let mut runner = BackoffRunner::new(ErrorTypeCondition::watching::<io::Error>().boxed())
///     .with_sleeper(RecordingSleeper::new());
/// let mut calls = 0;
/// let result = runner.run(|| -> Result<u32, Box<dyn Error + Send + Sync>> {
///     calls += 1;
///     if calls < 3 {
///         return Err(io::Error::other("busy").into());
///     }
///     Ok(calls)
/// });
/// assert_eq!(result.unwrap(), Some(3));
/// ```
#[derive(Debug, Clone, Default)]
pub struct BoxedErrorTypeCondition(ErrorTypeCondition);

impl BoxedErrorTypeCondition {
    pub fn inner(&self) -> &ErrorTypeCondition {
        &self.0
    }

    pub fn inner_mut(&mut self) -> &mut ErrorTypeCondition {
        &mut self.0
    }

    pub fn into_inner(self) -> ErrorTypeCondition {
        self.0
    }
}

impl From<ErrorTypeCondition> for BoxedErrorTypeCondition {
    fn from(condition: ErrorTypeCondition) -> Self {
        Self(condition)
    }
}

impl<T> StopCondition<T, Box<dyn StdError + Send + Sync>> for BoxedErrorTypeCondition {
    fn evaluate(
        &mut self,
        _result: Option<&T>,
        error: Option<&Box<dyn StdError + Send + Sync>>,
    ) -> bool {
        match error {
            None => true,
            Some(err) => !self.0.is_watched(&**err),
        }
    }
}

impl<T> StopCondition<T, Box<dyn StdError>> for BoxedErrorTypeCondition {
    fn evaluate(&mut self, _result: Option<&T>, error: Option<&Box<dyn StdError>>) -> bool {
        match error {
            None => true,
            Some(err) => !self.0.is_watched(&**err),
        }
    }
}

/// Delegates the stop decision to a closure
pub struct FunctionCondition<F> {
    predicate: F,
}

impl<F> FunctionCondition<F> {
    /// Wrap a `(result, error) -> stop?` closure
    pub fn new<T, E>(predicate: F) -> Self
    where
        F: FnMut(Option<&T>, Option<&E>) -> bool,
    {
        Self { predicate }
    }
}

impl<F> fmt::Debug for FunctionCondition<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCondition").finish_non_exhaustive()
    }
}

impl<T, E, F> StopCondition<T, E> for FunctionCondition<F>
where
    F: FnMut(Option<&T>, Option<&E>) -> bool + Send,
{
    fn evaluate(&mut self, result: Option<&T>, error: Option<&E>) -> bool {
        (self.predicate)(result, error)
    }
}

/// Always stops: exactly one attempt, whatever the max attempts say
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRetryCondition;

impl<T, E> StopCondition<T, E> for NeverRetryCondition {
    fn evaluate(&mut self, _result: Option<&T>, _error: Option<&E>) -> bool {
        true
    }
}

/// Wraps a condition and overrides only its error surfacing flag
///
/// # Example
///
/// ```rust
/// use exbackoff_core::retry::{ErrorSurfacing, ErrorTypeCondition, StopCondition};
/// use std::io;
///
/// let quiet = ErrorSurfacing::suppress(ErrorTypeCondition::watching::<io::Error>());
/// assert!(!StopCondition::<(), io::Error>::is_error_surfaceable(&quiet));
/// ```
#[derive(Debug, Clone)]
pub struct ErrorSurfacing<C> {
    inner: C,
    surface: bool,
}

impl<C> ErrorSurfacing<C> {
    /// Wrap `inner` with an explicit surfacing flag
    pub fn new(inner: C, surface: bool) -> Self {
        Self { inner, surface }
    }

    /// Never return the final error; hand back `Ok(None)` instead
    pub fn suppress(inner: C) -> Self {
        Self::new(inner, false)
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<T, E, C: StopCondition<T, E>> StopCondition<T, E> for ErrorSurfacing<C> {
    fn evaluate(&mut self, result: Option<&T>, error: Option<&E>) -> bool {
        self.inner.evaluate(result, error)
    }

    fn is_error_surfaceable(&self) -> bool {
        self.surface
    }
}
