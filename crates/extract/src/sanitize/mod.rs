//! Deterministic cleanup of extracted chapter HTML.
//!
//! The pipeline runs in a fixed order:
//!
//! 1. flatten structural containers,
//! 2. absolutize `<img>` sources,
//! 3. purify anchors: donation blocks, junk links and footnotes go, and the
//!    chapter ends at its navigation links,
//! 4. convert to Markdown and absolutize Markdown image destinations,
//! 5. render back to HTML.
//!
//! Anchors are purified on the original block structure, before Markdown
//! gets a chance to merge anything. Output is serialized canonically (sorted
//! attributes, one top-level block per line), so that sanitizing
//! already-sanitized content is a no-op.

mod anchors;
mod flatten;
mod images;
mod markdown;
pub(crate) mod tree;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use tracing::instrument;
use url::Url;

#[derive(Debug, Clone)]
pub struct Sanitizer {
    root: Url,
}
impl Sanitizer {
    /// Construct a sanitizer for content that came from `page_url`; relative
    /// image sources resolve against its root.
    pub fn new(page_url: &str) -> Result<Self> {
        let url = Url::parse(page_url).or_raise(|| ErrorKind::InvalidUrl(page_url.to_string()))?;
        let mut root = url.clone();
        root.set_path("/");
        root.set_query(None);
        root.set_fragment(None);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    #[instrument(skip(self, html), fields(html_size = html.len(), root = %self.root))]
    pub fn sanitize(&self, html: &str) -> String {
        let nodes = flatten::flatten(tree::parse_fragment(html));
        let nodes = images::fix_tree(nodes, &self.root);
        let nodes = anchors::purify(nodes);
        let markdown = markdown::to_markdown(&nodes);
        let markdown = images::fix_markdown(&markdown, &self.root);
        let rendered = markdown::to_html(&markdown);
        tree::to_html(&tree::parse_fragment(&rendered))
    }
}
