use super::{ProxyClient, RequestOptions, encode_form};
use crate::error::Result;
use crate::{Fetch, Response};
use async_trait::async_trait;
use tracing::{debug, warn};

/// A browser session on the anti-bot proxy, keeping cookies and challenge
/// clearance between requests.
///
/// Prefer [`destroy`](Self::destroy) when finished with it. A session that
/// is dropped without being destroyed schedules its own destruction on the
/// current Tokio runtime, if there is one.
#[derive(Debug)]
pub struct Session {
    client: ProxyClient,
    id: String,
    destroyed: bool,
}
impl Session {
    pub(crate) fn new(client: ProxyClient, id: String) -> Self {
        Self {
            client,
            id,
            destroyed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn get_with(&self, url: &str, options: &RequestOptions) -> Result<Response> {
        self.client.request(url, Some(&self.id), None, options).await
    }

    pub async fn post_with(&self, url: &str, form: &[(String, String)], options: &RequestOptions) -> Result<Response> {
        self.client.request(url, Some(&self.id), Some(encode_form(form)), options).await
    }

    pub async fn destroy(mut self) -> Result<()> {
        self.destroyed = true;
        self.client.destroy_session(&self.id).await
    }
}

#[async_trait]
impl Fetch for Session {
    async fn get(&self, url: &str) -> Result<Response> {
        self.get_with(url, &RequestOptions::default()).await
    }

    async fn post(&self, url: &str, form: &[(String, String)]) -> Result<Response> {
        self.post_with(url, form, &RequestOptions::default()).await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.destroyed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(session = %self.id, "no runtime to destroy anti-bot session on, leaking it");
            return;
        };
        let client = self.client.clone();
        let id = std::mem::take(&mut self.id);
        debug!(session = %id, "destroying dropped anti-bot session");
        runtime.spawn(async move {
            if let Err(error) = client.destroy_session(&id).await {
                warn!(session = %id, error = %error, "could not destroy anti-bot session");
            }
        });
    }
}
