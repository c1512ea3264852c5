//! Persisted entities, and the shapes used to create them.
//!
//! Identity is by content hash: series by the hash of their canonical URL,
//! chapters by the hash of (series, volume, title), pages by the hash of
//! their canonical URL. Re-ingesting the same source never duplicates rows.

mod rows;

pub(crate) use self::rows::{BookRow, ChapterRow, PageRow, SeriesRow, encode_list};
use time::UtcDateTime;

/// A series as discovered on a source, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSeries {
    pub hash: String,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub cover_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    pub id: i64,
    pub hash: String,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub cover_url: Option<String>,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

/// A volume. Books are unique per series by ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: i64,
    pub series_id: i64,
    pub ordinal: i64,
    pub title: String,
    pub covers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub ordinal: i64,
    /// An empty title keeps whatever title the book already has.
    pub title: String,
    /// Empty covers keep whatever covers the book already has.
    pub covers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub id: i64,
    pub book_id: i64,
    pub ordinal: f64,
    pub title: String,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewChapter {
    /// `None` places the chapter after the highest existing one in its book.
    pub ordinal: Option<f64>,
    pub title: String,
    pub hash: String,
}

/// The unit of fetched content.
///
/// Pages form a singly linked chain in fetch order through `next_url`; the
/// page without one is the tail, where ingestion resumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub id: i64,
    pub series_id: i64,
    pub hash: String,
    pub url: String,
    pub next_url: Option<String>,
    /// Unique and strictly increasing within the series.
    pub ordinal: i64,
    pub title: Option<String>,
    /// Extracted article, before sanitization.
    pub raw: String,
    /// Sanitized article.
    pub content: String,
    pub created_at: UtcDateTime,
}
impl Page {
    pub fn is_tail(&self) -> bool {
        self.next_url.as_deref().is_none_or(str::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPage {
    pub hash: String,
    pub url: String,
    pub title: Option<String>,
    pub raw: String,
    pub content: String,
}

/// Everything written by a single [`commit_chapter`](crate::Repository::commit_chapter).
#[derive(Debug, Clone, PartialEq)]
pub struct Committed {
    pub book_id: i64,
    pub chapter_id: i64,
    pub page: Page,
    /// The page that was the tail before this commit, now pointing at `page`.
    pub previous: Option<i64>,
}
