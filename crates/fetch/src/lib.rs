mod direct;
pub mod error;
mod limiter;
#[cfg(feature = "mock")]
mod mock;
pub mod proxy;

pub use crate::direct::DirectClient;
pub use crate::limiter::{RateLimiter, RateLimits};
#[cfg(feature = "mock")]
pub use crate::mock::MockFetch;
pub use crate::proxy::{ProxyClient, RequestOptions, Session};
pub use tokio_util::sync::CancellationToken;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub type FetchHandle = Arc<dyn Fetch>;

/// A cookie, as exchanged with the anti-bot proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// A successfully fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Final URL, after any redirects.
    pub url: String,
    pub status: u16,
    pub html: String,
    pub cookies: Vec<Cookie>,
    pub user_agent: Option<String>,
    pub headers: BTreeMap<String, String>,
}

/// Something that can fetch pages.
///
/// Implementations map HTTP 429 to [`ErrorKind::RateLimited`](error::ErrorKind::RateLimited)
/// and any other non-2xx status to [`ErrorKind::Status`](error::ErrorKind::Status)
/// so that a [`RateLimiter`] can apply its retry policy.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn get(&self, url: &str) -> Result<Response>;

    /// Fetch with extra request headers (API keys and the like).
    ///
    /// The default ignores the headers and sends a plain [`get`](Self::get),
    /// which is what transports that can't set headers, such as the anti-bot
    /// proxy, do. [`DirectClient`] sends them.
    async fn get_with_headers(&self, url: &str, _headers: &[(String, String)]) -> Result<Response> {
        self.get(url).await
    }

    /// Submit a URL-encoded form.
    async fn post(&self, url: &str, form: &[(String, String)]) -> Result<Response>;
}
