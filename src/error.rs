//! Error types for the matching engine.
//!
//! Mirrors the manual, hand-written enum style used throughout this
//! codebase: each error kind gets its own small enum with explicit `From`
//! impls, rather than a derive-macro error crate.

use std::fmt;

use crate::template::Symbol;

/// Raised when a template fails to match data.
///
/// Caught by an enclosing repetition (to filter the offending element) or
/// by an enclosing error handler (to invoke its fallback policy). Never
/// caught anywhere else - see the propagation policy in the module docs.
#[derive(Debug, Clone)]
pub struct NoMatch {
    pub path: String,
}

impl NoMatch {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl fmt::Display for NoMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no match at {}", self.path)
    }
}

impl std::error::Error for NoMatch {}

/// Errors raised while walking a template against data.
#[derive(Debug)]
pub enum SolveError {
    /// The match failed; may be caught by a repetition or error handler.
    NoMatch(NoMatch),
    /// A transform's forward/inverse function raised, or the backing store failed.
    /// These must never be swallowed.
    User(Error),
    /// The relational store failed.
    Store(StoreError),
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveError::NoMatch(e) => write!(f, "{e}"),
            SolveError::User(e) => write!(f, "{e}"),
            SolveError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SolveError {}

impl From<NoMatch> for SolveError {
    fn from(value: NoMatch) -> Self {
        SolveError::NoMatch(value)
    }
}

impl From<StoreError> for SolveError {
    fn from(value: StoreError) -> Self {
        SolveError::Store(value)
    }
}

impl From<Error> for SolveError {
    fn from(value: Error) -> Self {
        SolveError::User(value)
    }
}

/// Errors raised by the relational intermediate store.
#[derive(Debug)]
pub enum StoreError {
    Pool(String),
    Sql(rusqlite::Error),
    Io(std::io::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Pool(msg) => write!(f, "pool error: {msg}"),
            StoreError::Sql(e) => write!(f, "sql error: {e}"),
            StoreError::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        StoreError::Sql(value)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        StoreError::Io(value)
    }
}

/// Errors raised while assigning bindings back into an output template.
#[derive(Debug)]
pub enum AssignError {
    /// A symbol had no entry in `known_values` at assign time.
    Unbound(Symbol),
    Store(StoreError),
    User(Error),
}

impl fmt::Display for AssignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignError::Unbound(sym) => write!(f, "unbound symbol '{}' at assign time", sym.name()),
            AssignError::Store(e) => write!(f, "{e}"),
            AssignError::User(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for AssignError {}

impl From<StoreError> for AssignError {
    fn from(value: StoreError) -> Self {
        AssignError::Store(value)
    }
}

impl From<Error> for AssignError {
    fn from(value: Error) -> Self {
        AssignError::User(value)
    }
}

/// Catch-all error type for user-supplied callbacks (transform forward/inverse
/// functions, error handler policies). Built on [`color_eyre`] the same way
/// the rest of this codebase's application errors are.
pub type Error = color_eyre::Report;

/// Result alias for user-facing fallible operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
