//! JSON control-plane protocol of the anti-bot proxy.

use crate::Cookie;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub(crate) const REQUEST_GET: &str = "request.get";
pub(crate) const REQUEST_POST: &str = "request.post";
pub(crate) const SESSIONS_CREATE: &str = "sessions.create";
pub(crate) const SESSIONS_DESTROY: &str = "sessions.destroy";
pub(crate) const SESSIONS_LIST: &str = "sessions.list";

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Command<'a> {
    pub cmd: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<&'a str>,
    #[serde(skip_serializing_if = "<[Cookie]>::is_empty")]
    pub cookies: &'a [Cookie],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<Proxy<'a>>,
    /// Milliseconds the proxy may spend solving a challenge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_timeout: Option<u64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub return_only_cookies: bool,
    /// URL-encoded form body, for `request.post`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_data: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Proxy<'a> {
    pub url: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Reply {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub start_timestamp: u64,
    #[serde(default)]
    #[allow(dead_code)]
    pub end_timestamp: u64,
    #[serde(default)]
    pub version: String,
    pub solution: Option<Solution>,
    /// Set by `sessions.create`.
    pub session: Option<String>,
    /// Set by `sessions.list`.
    #[serde(default)]
    pub sessions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Solution {
    pub url: String,
    pub status: u16,
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    pub user_agent: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub response: String,
}
