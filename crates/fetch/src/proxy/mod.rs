//! Client for a browser-automation anti-bot proxy (FlareSolverr protocol).
//!
//! Every command is a JSON `POST` to a single control-plane endpoint,
//! `{solver_url}/{version}`. Pages are rendered by a real browser on the
//! proxy's side, which is what gets us past bot-detection challenges.
//!
//! Stateless [`ProxyClient::get`] and [`ProxyClient::post`] create and
//! destroy a browser session around every call. To keep cookies and
//! challenge clearance between requests, hold a [`Session`] instead.

mod session;
mod wire;

pub use self::session::Session;
use self::wire::{Command, Proxy, Reply};
use crate::error::{ErrorKind, Result};
use crate::{Cookie, Fetch, Response};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// Default time the proxy may spend on a single request.
pub const DEFAULT_MAX_TIMEOUT: Duration = Duration::from_secs(60);
/// Extra time allowed for the proxy to answer after its own timeout.
const HTTP_GRACE: Duration = Duration::from_secs(10);

/// Per-request overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub cookies: Vec<Cookie>,
    /// Upstream proxy the browser should connect through.
    pub proxy: Option<String>,
    /// Overrides the client's maximum solve time.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ProxyClient {
    http: reqwest::Client,
    endpoint: Url,
    max_timeout: Duration,
    proxy: Option<String>,
}
impl ProxyClient {
    pub fn new(solver_url: &str, version: &str) -> Result<Self> {
        let base = format!("{}/{}", solver_url.trim_end_matches('/'), version.trim_matches('/'));
        let endpoint = Url::parse(&base).or_raise(|| ErrorKind::InvalidUrl(base.clone()))?;
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            max_timeout: DEFAULT_MAX_TIMEOUT,
            proxy: None,
        })
    }

    pub fn with_max_timeout(mut self, max_timeout: Duration) -> Self {
        self.max_timeout = max_timeout;
        self
    }

    /// Upstream proxy used when a request doesn't specify its own.
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetch a page in a throwaway session.
    pub async fn get(&self, url: &str, options: &RequestOptions) -> Result<Response> {
        let session = self.create_session(options.proxy.as_deref()).await?;
        let result = session.get_with(url, options).await;
        close(session).await;
        result
    }

    /// Submit a URL-encoded form in a throwaway session.
    pub async fn post(&self, url: &str, form: &[(String, String)], options: &RequestOptions) -> Result<Response> {
        let session = self.create_session(options.proxy.as_deref()).await?;
        let result = session.post_with(url, form, options).await;
        close(session).await;
        result
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn create_session(&self, proxy: Option<&str>) -> Result<Session> {
        let reply = self
            .send(&Command {
                cmd: wire::SESSIONS_CREATE,
                proxy: proxy.or(self.proxy.as_deref()).map(|url| Proxy { url }),
                ..Default::default()
            })
            .await?;
        let id = reply.session.ok_or_raise(|| ErrorKind::InvalidResponse)?;
        debug!(session = %id, "created anti-bot session");
        Ok(Session::new(self.clone(), id))
    }

    pub async fn list_sessions(&self) -> Result<Vec<String>> {
        let reply = self
            .send(&Command {
                cmd: wire::SESSIONS_LIST,
                ..Default::default()
            })
            .await?;
        Ok(reply.sessions)
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn destroy_session(&self, id: &str) -> Result<()> {
        self.send(&Command {
            cmd: wire::SESSIONS_DESTROY,
            session: Some(id),
            ..Default::default()
        })
        .await?;
        debug!(session = %id, "destroyed anti-bot session");
        Ok(())
    }

    /// Issue `request.get`/`request.post`, optionally within a session.
    #[instrument(skip(self, post_data, options))]
    pub(crate) async fn request(
        &self,
        url: &str,
        session: Option<&str>,
        post_data: Option<String>,
        options: &RequestOptions,
    ) -> Result<Response> {
        let timeout = options.timeout.unwrap_or(self.max_timeout);
        // Sessions are already bound to an upstream proxy.
        let proxy = match session {
            Some(_) => None,
            None => options.proxy.as_deref().or(self.proxy.as_deref()),
        };
        let reply = self
            .send(&Command {
                cmd: if post_data.is_some() { wire::REQUEST_POST } else { wire::REQUEST_GET },
                url: Some(url),
                session,
                cookies: &options.cookies,
                proxy: proxy.map(|url| Proxy { url }),
                max_timeout: Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)),
                post_data,
                ..Default::default()
            })
            .await?;
        let solution = reply.solution.ok_or_raise(|| ErrorKind::InvalidResponse)?;
        if let Some(kind) = ErrorKind::from_status(solution.status) {
            warn!(status = solution.status, "page returned an error status");
            exn::bail!(kind);
        }
        Ok(Response {
            url: solution.url,
            status: solution.status,
            html: solution.response,
            cookies: solution.cookies,
            user_agent: solution.user_agent,
            headers: solution.headers,
        })
    }

    async fn send(&self, command: &Command<'_>) -> Result<Reply> {
        let timeout = command.max_timeout.map_or(self.max_timeout, Duration::from_millis) + HTTP_GRACE;
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(command)
            .timeout(timeout)
            .send()
            .await
            .or_raise(|| ErrorKind::Network)?;
        // Failures come back as JSON too (usually with HTTP 500), so the body
        // is authoritative rather than the status code.
        let reply: Reply = response.json().await.or_raise(|| ErrorKind::InvalidResponse)?;
        if reply.status != "ok" {
            warn!(cmd = command.cmd, message = %reply.message, version = %reply.version, "anti-bot proxy reported an error");
            exn::bail!(ErrorKind::Solver(reply.message));
        }
        Ok(reply)
    }
}

#[async_trait]
impl Fetch for ProxyClient {
    async fn get(&self, url: &str) -> Result<Response> {
        ProxyClient::get(self, url, &RequestOptions::default()).await
    }

    async fn post(&self, url: &str, form: &[(String, String)]) -> Result<Response> {
        ProxyClient::post(self, url, form, &RequestOptions::default()).await
    }
}

pub(crate) fn encode_form(form: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new()).extend_pairs(form).finish()
}

async fn close(session: Session) {
    let id = session.id().to_string();
    if let Err(error) = session.destroy().await {
        warn!(session = %id, error = %error, "could not destroy anti-bot session");
    }
}
