//! Normalized, unpersisted output shared by every adapter.

use serde::{Deserialize, Serialize};

/// Series metadata as scraped from its landing page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesInfo {
    /// Canonical series URL (after redirects).
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub cover_url: Option<String>,
    /// Where reading starts, when the landing page says so.
    pub first_chapter_url: Option<String>,
}

/// An entry in a table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceChapterItem {
    pub title: String,
    pub url: String,
}

/// A volume of a table of contents, with its chapters in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceVolume {
    /// Strictly increasing within a series' table of contents.
    pub ordinal: i64,
    pub title: String,
    pub covers: Vec<String>,
    pub chapters: Vec<SourceChapterItem>,
}
impl SourceVolume {
    pub(crate) fn untitled(ordinal: i64) -> Self {
        Self {
            ordinal,
            title: String::new(),
            covers: Vec::new(),
            chapters: Vec::new(),
        }
    }
}

/// A fetched chapter page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceChapter {
    /// The URL the chapter was fetched from.
    pub url: String,
    pub title: Option<String>,
    /// The page, or just its content container when the adapter knows where
    /// that is. Either way it still has to go through extraction.
    pub html: String,
    pub next_url: Option<String>,
}
