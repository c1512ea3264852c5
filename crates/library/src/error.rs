//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Most per-chapter problems are not errors at all: they are reported as
//! [`Skipped`](crate::IngestEvent::Skipped) events and ingestion carries on.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The source could not describe the series.
    #[display("source error")]
    Source,
    #[display("persistence error")]
    Persistence,
    /// The URL was fetched but doesn't look like a series landing page.
    #[display("not a series page: {_0}")]
    NotASeries(#[error(not(source))] String),
    #[display("could not stage chapters from: {_0}")]
    Staging(#[error(not(source))] String),
    /// The event stream ended before reporting.
    #[display("ingestion ended without a report")]
    Incomplete,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A rerun resumes from the tail, so anything but a bad URL is worth
        // another go.
        !matches!(self, Self::NotASeries(_))
    }
}
