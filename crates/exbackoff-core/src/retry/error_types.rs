//! Error type tags and name-based error type resolution
//!
//! An [`ErrorType`] identifies a kind of error that an
//! [`ErrorTypeCondition`](super::ErrorTypeCondition) keeps retrying on.
//! Typed tags are checked by the compiler; names coming from configuration
//! go through an [`ErrorTypeRegistry`], which fails fast on names it does not
//! know and on names that denote something other than an error type.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::io;

use crate::error::{Error, Result};

/// Matcher deciding whether a single error value belongs to a type
pub type ErrorMatcher = fn(&(dyn StdError + 'static)) -> bool;

/// Identity of an error tag, used for de-duplication
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TagId {
    Concrete(TypeId),
    Family(String),
}

/// A watched error type
///
/// Matching walks the error and its `source()` chain, so a tag for `E`
/// matches an `E` as well as any error that wraps an `E`.
#[derive(Clone)]
pub struct ErrorType {
    name: String,
    id: TagId,
    matcher: ErrorMatcher,
}

impl ErrorType {
    /// Tag for a concrete error type
    pub fn of<E: StdError + 'static>() -> Self {
        Self {
            name: type_name::<E>().to_string(),
            id: TagId::Concrete(TypeId::of::<E>()),
            matcher: |err| err.is::<E>(),
        }
    }

    /// Tag matching every error
    pub fn any() -> Self {
        Self::family("std::error::Error", |_| true)
    }

    /// Caller-defined group of error types
    ///
    /// Two family tags with the same name are considered the same tag.
    pub fn family(name: impl Into<String>, matcher: ErrorMatcher) -> Self {
        let name = name.into();
        Self {
            id: TagId::Family(name.clone()),
            name,
            matcher,
        }
    }

    /// Display name of the tag
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the tag, keeping its identity
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Whether `err`, or any error in its source chain, has this type
    ///
    /// A payload wrapped in an `io::Error` (`io::Error::other(e)`) counts as
    /// part of the chain.
    pub fn matches(&self, err: &(dyn StdError + 'static)) -> bool {
        let mut current = Some(err);
        while let Some(e) = current {
            if (self.matcher)(e) {
                return true;
            }
            current = next_in_chain(e);
        }
        false
    }

    pub(crate) fn same_tag(&self, other: &ErrorType) -> bool {
        self.id == other.id
    }
}

/// `io::Error::source()` skips its own payload, so look through `get_ref`
fn next_in_chain<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a (dyn StdError + 'static)> {
    if let Some(payload) = err.downcast_ref::<io::Error>().and_then(io::Error::get_ref) {
        return Some(payload as &(dyn StdError + 'static));
    }
    err.source()
}

impl fmt::Debug for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorType").field(&self.name).finish()
    }
}

impl PartialEq for ErrorType {
    fn eq(&self, other: &Self) -> bool {
        self.same_tag(other)
    }
}

#[derive(Debug, Clone)]
enum Registered {
    Error(ErrorType),
    Other,
}

/// Name -> type lookup for error types named in configuration
///
/// # Example
///
/// ```rust
/// use exbackoff_core::retry::ErrorTypeRegistry;
///
/// let registry = ErrorTypeRegistry::with_std();
/// assert!(registry.resolve("std::io::Error").is_ok());
/// assert!(registry.resolve("std::string::String").is_err());
/// assert!(registry.resolve("no::such::Error").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ErrorTypeRegistry {
    entries: HashMap<String, Registered>,
}

impl ErrorTypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with common std types
    pub fn with_std() -> Self {
        let mut registry = Self::new();
        registry
            .register_family("std::error::Error", |_| true)
            .register_error::<std::io::Error>("std::io::Error")
            .register_error::<std::fmt::Error>("std::fmt::Error")
            .register_error::<std::num::ParseIntError>("std::num::ParseIntError")
            .register_error::<std::num::ParseFloatError>("std::num::ParseFloatError")
            .register_error::<std::num::TryFromIntError>("std::num::TryFromIntError")
            .register_error::<std::str::Utf8Error>("std::str::Utf8Error")
            .register_error::<std::string::FromUtf8Error>("std::string::FromUtf8Error")
            .register_error::<std::str::ParseBoolError>("std::str::ParseBoolError")
            .register_error::<std::time::SystemTimeError>("std::time::SystemTimeError")
            .register_type::<String>("std::string::String")
            .register_type::<std::time::Duration>("std::time::Duration")
            .register_type::<std::path::PathBuf>("std::path::PathBuf")
            .register_type::<std::io::ErrorKind>("std::io::ErrorKind");
        registry
    }

    /// Register a concrete error type under `name`
    pub fn register_error<E: StdError + 'static>(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        let tag = ErrorType::of::<E>().named(name.clone());
        self.entries.insert(name, Registered::Error(tag));
        self
    }

    /// Register an error family under `name`
    pub fn register_family(&mut self, name: impl Into<String>, matcher: ErrorMatcher) -> &mut Self {
        let name = name.into();
        let tag = ErrorType::family(name.clone(), matcher);
        self.entries.insert(name, Registered::Error(tag));
        self
    }

    /// Register a known type that is not an error
    ///
    /// Resolving its name fails with [`Error::NotAnErrorType`] instead of
    /// [`Error::UnknownErrorType`].
    pub fn register_type<T: ?Sized + 'static>(&mut self, name: impl Into<String>) -> &mut Self {
        self.entries.insert(name.into(), Registered::Other);
        self
    }

    /// Whether `name` is registered at all
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Resolve a name to an error type tag
    pub fn resolve(&self, name: &str) -> Result<ErrorType> {
        match self.entries.get(name) {
            Some(Registered::Error(tag)) => Ok(tag.clone()),
            Some(Registered::Other) => Err(Error::not_an_error_type(name)),
            None => Err(Error::unknown_error_type(name)),
        }
    }

    /// Resolve several names, failing on the first bad one
    pub fn resolve_all<I, S>(&self, names: I) -> Result<Vec<ErrorType>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| self.resolve(name.as_ref()))
            .collect()
    }
}
