//! In-memory fetcher for testing.

use crate::error::{ErrorKind, Result};
use crate::{Fetch, Response};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// In-memory [`Fetch`] implementation for testing.
///
/// Pages are served from a `HashMap` keyed by exact URL; anything unknown is
/// a 404. Every requested URL is recorded, in order, so tests can assert on
/// what was (and wasn't) fetched.
///
/// # Examples
///
/// ```
/// use tome_fetch::{Fetch, MockFetch};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let fetch = MockFetch::with_pages([("https://site.com/c1", "<p>one</p>")]);
/// assert_eq!(fetch.get("https://site.com/c1").await.unwrap().html, "<p>one</p>");
/// assert!(fetch.get("https://site.com/c2").await.is_err());
/// assert_eq!(fetch.requests().await.len(), 2);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockFetch {
    pages: RwLock<HashMap<String, std::result::Result<String, u16>>>,
    requests: RwLock<Vec<String>>,
    headers: RwLock<HashMap<String, Vec<(String, String)>>>,
}

impl MockFetch {
    pub fn with_pages(pages: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        let pages = pages.into_iter().map(|(url, html)| (url.into(), Ok(html.into()))).collect();
        Self {
            pages: RwLock::new(pages),
            requests: RwLock::default(),
            headers: RwLock::default(),
        }
    }

    pub async fn insert(&self, url: impl Into<String>, html: impl Into<String>) {
        self.pages.write().await.insert(url.into(), Ok(html.into()));
    }

    /// Make `url` answer with an HTTP error status.
    pub async fn fail(&self, url: impl Into<String>, status: u16) {
        self.pages.write().await.insert(url.into(), Err(status));
    }

    pub async fn requests(&self) -> Vec<String> {
        self.requests.read().await.clone()
    }

    /// Headers sent with the most recent request for `url`, if any.
    pub async fn headers(&self, url: &str) -> Option<Vec<(String, String)>> {
        self.headers.read().await.get(url).cloned()
    }
}

#[async_trait]
impl Fetch for MockFetch {
    async fn get(&self, url: &str) -> Result<Response> {
        self.requests.write().await.push(url.to_string());
        let html = match self.pages.read().await.get(url) {
            Some(Ok(html)) => html.clone(),
            Some(Err(status)) => exn::bail!(ErrorKind::from_status(*status).unwrap_or(ErrorKind::Status(*status))),
            None => exn::bail!(ErrorKind::Status(404)),
        };
        Ok(Response {
            url: url.to_string(),
            status: 200,
            html,
            cookies: Vec::new(),
            user_agent: None,
            headers: BTreeMap::new(),
        })
    }

    async fn get_with_headers(&self, url: &str, headers: &[(String, String)]) -> Result<Response> {
        self.headers.write().await.insert(url.to_string(), headers.to_vec());
        self.get(url).await
    }

    async fn post(&self, url: &str, _form: &[(String, String)]) -> Result<Response> {
        self.get(url).await
    }
}
