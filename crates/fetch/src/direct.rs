use crate::error::{ErrorKind, Result};
use crate::{Fetch, Response};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{instrument, warn};
use url::Url;

/// Browser user agents, one picked at random per request.
const USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Plain HTTP fetching, for sources that don't sit behind a bot challenge
/// (and for `file://` URLs of staged chapters, which are read from disk).
#[derive(Debug, Clone)]
pub struct DirectClient {
    http: reqwest::Client,
}
impl DirectClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .or_raise(|| ErrorKind::Network)?;
        Ok(Self { http })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        let user_agent = USER_AGENTS[rand::random_range(0..USER_AGENTS.len())];
        let response = request.header(USER_AGENT, user_agent).send().await.or_raise(|| ErrorKind::Network)?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
            .collect();
        if let Some(kind) = ErrorKind::from_status(status) {
            warn!(status, %url, "page returned an error status");
            exn::bail!(kind);
        }
        let html = response.text().await.or_raise(|| ErrorKind::Network)?;
        Ok(Response {
            url,
            status,
            html,
            cookies: Vec::new(),
            user_agent: Some(user_agent.to_string()),
            headers,
        })
    }
}

#[async_trait]
impl Fetch for DirectClient {
    #[instrument(skip(self))]
    async fn get(&self, url: &str) -> Result<Response> {
        if let Ok(parsed) = Url::parse(url)
            && parsed.scheme() == "file"
        {
            let path = parsed.to_file_path().ok().ok_or_raise(|| ErrorKind::InvalidUrl(url.to_string()))?;
            let html = tokio::fs::read_to_string(&path).await.or_raise(|| ErrorKind::Status(404))?;
            return Ok(Response {
                url: url.to_string(),
                status: 200,
                html,
                cookies: Vec::new(),
                user_agent: None,
                headers: BTreeMap::new(),
            });
        }
        self.send(self.http.get(url)).await
    }

    #[instrument(skip(self, headers))]
    async fn get_with_headers(&self, url: &str, headers: &[(String, String)]) -> Result<Response> {
        let request = headers
            .iter()
            .fold(self.http.get(url), |request, (name, value)| request.header(name.as_str(), value.as_str()));
        self.send(request).await
    }

    #[instrument(skip(self, form))]
    async fn post(&self, url: &str, form: &[(String, String)]) -> Result<Response> {
        self.send(self.http.post(url).form(form)).await
    }
}
