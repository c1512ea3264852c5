//! Fetch Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A fetch error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
///
/// ### Retried by the [`RateLimiter`](crate::RateLimiter)
/// - [`ErrorKind::RateLimited`]
///
/// ### Fatal to the current request
/// - [`ErrorKind::Network`] - timeouts, connection failures, unreadable bodies.
/// - [`ErrorKind::Status`] - any other non-2xx status; through the anti-bot
///   proxy this usually means the session has expired and should be recreated.
/// - [`ErrorKind::Solver`] - the anti-bot proxy itself reported a failure.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("network error")]
    Network,
    #[display("rate limited (HTTP 429)")]
    RateLimited,
    #[display("unexpected HTTP status {_0}")]
    Status(#[error(not(source))] u16),
    #[display("anti-bot proxy error: {_0}")]
    Solver(#[error(not(source))] String),
    /// The anti-bot proxy answered with something that isn't its protocol.
    #[display("invalid anti-bot proxy response")]
    InvalidResponse,
    #[display("still rate limited after {_0} retries")]
    RetriesExhausted(#[error(not(source))] u32),
    #[display("invalid URL: {_0}")]
    InvalidUrl(#[error(not(source))] String),
    #[display("cancelled")]
    Cancelled,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network | Self::RateLimited => true,
            Self::Status(status) => *status >= 500,
            _ => false,
        }
    }

    /// Map an HTTP status onto an error, or `None` for success.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            429 => Some(Self::RateLimited),
            status => Some(Self::Status(status)),
        }
    }
}
