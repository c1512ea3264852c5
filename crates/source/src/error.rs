//! Source Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Malformed pages are not errors: adapters report them as `None` or as an
//! empty listing. What's left is failing to reach the site at all, and
//! misconfiguration.

use derive_more::{Display, Error};
use tome_fetch::error::{Error as FetchError, ErrorKind as FetchErrorKind};

/// A source error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for source operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The site could not be fetched (after any rate-limit retries).
    #[display("fetch error: {_0}")]
    Fetch(FetchErrorKind),
    #[display("invalid URL: {_0}")]
    InvalidUrl(#[error(not(source))] String),
    /// A configured CSS selector does not parse.
    #[display("invalid selector: {_0}")]
    InvalidSelector(#[error(not(source))] String),
    /// A Next.js site whose build id is neither configured nor discoverable.
    #[display("no Next.js build id found on {_0}")]
    MissingBuildId(#[error(not(source))] String),
    #[display("no source handles: {_0}")]
    UnknownSource(#[error(not(source))] String),
}

impl ErrorKind {
    /// Convert a fetch error into a source error, preserving the fetch
    /// crate's `Exn` frame (error tree) as a child in its own error tree.
    #[track_caller]
    pub fn fetch(err: FetchError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Fetch(inner))
    }

    /// Returns `true` if the operation stopped because it was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Fetch(FetchErrorKind::Cancelled))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch(inner) => inner.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_errors_keep_their_kind() {
        let error = ErrorKind::fetch(exn::Exn::from(FetchErrorKind::Cancelled));
        assert_eq!(&*error, &ErrorKind::Fetch(FetchErrorKind::Cancelled));
        assert!(error.is_cancelled());
        assert!(!ErrorKind::UnknownSource("x".to_string()).is_cancelled());
    }
}
