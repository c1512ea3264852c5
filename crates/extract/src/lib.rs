mod consts;
pub mod error;
mod extract;
mod hash;
mod sanitize;

use tracing::instrument;

use crate::error::Result;
pub use crate::extract::{Article, DEFAULT_MIN_SCORE, DEFAULT_MIN_TEXT_LENGTH, Extractor};
pub use crate::hash::{canonical_hash, canonicalize};
pub use crate::sanitize::Sanitizer;

/// Easy, top-level entrypoint: isolate the main article of a page and
/// sanitize it.
///
/// Returns `Ok(None)` when the page has no confidently-readable article,
/// which is logged (with the page URL) rather than treated as an error.
#[instrument(skip(html), fields(html_size = html.len()))]
pub fn extract(html: &str, url: &str) -> Result<Option<Article>> {
    let sanitizer = Sanitizer::new(url)?;
    Ok(Extractor::from_html(html, url).article().map(|article| Article {
        html: sanitizer.sanitize(&article.html),
        ..article
    }))
}
