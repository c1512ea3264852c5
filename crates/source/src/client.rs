use crate::error::{ErrorKind, Result};
use tokio::sync::Mutex;
use tome_fetch::{FetchHandle, RateLimiter, Response};
use tracing::trace;

/// A fetcher paced by its own [`RateLimiter`].
///
/// Every request an adapter makes goes through here, so an adapter is never
/// more than one request in flight.
pub(crate) struct Limited {
    fetch: FetchHandle,
    limiter: Mutex<RateLimiter>,
}
impl Limited {
    pub(crate) fn new(fetch: FetchHandle, limiter: RateLimiter) -> Self {
        Self { fetch, limiter: Mutex::new(limiter) }
    }

    pub(crate) async fn get(&self, url: &str) -> Result<Response> {
        self.get_with_headers(url, &[]).await
    }

    pub(crate) async fn get_with_headers(&self, url: &str, headers: &[(String, String)]) -> Result<Response> {
        let mut limiter = self.limiter.lock().await;
        trace!(url, count = limiter.count(), "fetching");
        limiter
            .fetch(|| match headers.is_empty() {
                true => self.fetch.get(url),
                false => self.fetch.get_with_headers(url, headers),
            })
            .await
            .map_err(ErrorKind::fetch)
    }
}
