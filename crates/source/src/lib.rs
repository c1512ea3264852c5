//! Per-site adapters for discovering what to ingest.
//!
//! Every site is different, so each gets a [`SourceProvider`] turning its
//! pages into the same normalized shapes: [`SeriesInfo`] from a landing page,
//! [`SourceVolume`]s from its table of contents, and [`SourceChapter`]s by
//! walking "next" links from a starting chapter.
//!
//! Adapters are lenient about structure (a page that doesn't look like they
//! expect yields `None` or nothing) and strict about transport: failing to
//! fetch is an error, after the adapter's [`RateLimiter`](tome_fetch::RateLimiter)
//! has had its say.

mod client;
mod consts;
pub mod error;
mod forum;
mod html;
mod models;
mod next;
mod registry;

pub use crate::forum::{ForumLayout, ForumSource};
pub use crate::models::{SeriesInfo, SourceChapter, SourceChapterItem, SourceVolume};
pub use crate::next::NextSource;
pub use crate::registry::SourceRegistry;

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use url::Url;

/// A site adapter.
///
/// The streams are lazy: nothing is fetched until they are polled, and
/// dropping them stops any further requests.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Whether `url` belongs to this source's site.
    fn matches(&self, url: &Url) -> bool;

    /// Series metadata, or `None` if the page doesn't look like a series.
    async fn series_info(&self, url: &str) -> Result<Option<SeriesInfo>>;

    /// The table of contents, volume by volume.
    fn volumes<'a>(&'a self, series_url: &'a str) -> BoxStream<'a, Result<SourceVolume>>;

    /// Chapters in reading order, starting at `first_url` and following
    /// "next" links until there are none, or until one leads somewhere
    /// already visited.
    fn chapters<'a>(&'a self, first_url: &'a str) -> BoxStream<'a, Result<SourceChapter>>;
}

/// Same host, ignoring a `www.` prefix, or a subdomain of it.
pub(crate) fn host_matches(base: &Url, url: &Url) -> bool {
    fn bare(host: &str) -> String {
        host.strip_prefix("www.").unwrap_or(host).to_ascii_lowercase()
    }
    match (base.host_str().map(bare), url.host_str().map(bare)) {
        (Some(base), Some(host)) => host == base || host.ends_with(&format!(".{base}")),
        _ => false,
    }
}
