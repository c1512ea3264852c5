//! The narrow persistence contract ingestion needs.

use async_trait::async_trait;
use tome_cache::error::Result;
use tome_cache::{Book, Chapter, Committed, NewBook, NewChapter, NewPage, NewSeries, Page, Repository, Series};

/// Everything written for one chapter page, committed as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterCommit {
    pub book: NewBook,
    pub chapter: NewChapter,
    pub page: NewPage,
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn upsert_series(&self, series: &NewSeries) -> Result<i64>;
    async fn find_series_by_hash(&self, hash: &str) -> Result<Option<Series>>;
    async fn find_page_by_hash(&self, hash: &str) -> Result<Option<Page>>;
    /// The tail of the series' chain: where the next run resumes.
    async fn last_page(&self, series_id: i64) -> Result<Option<Page>>;
    async fn insert_page(&self, series_id: i64, page: &NewPage) -> Result<Page>;
    async fn upsert_book(&self, series_id: i64, book: &NewBook) -> Result<i64>;
    async fn upsert_chapter(&self, book_id: i64, chapter: &NewChapter) -> Result<i64>;
    async fn upsert_chapter_page(&self, chapter_id: i64, page_id: i64) -> Result<()>;
    async fn books_by_series(&self, series_id: i64) -> Result<Vec<Book>>;
    async fn chapters_by_book(&self, book_id: i64) -> Result<Vec<Chapter>>;
    async fn pages_by_series(&self, series_id: i64) -> Result<Vec<Page>>;
    /// Book, chapter, page, join row and tail update in one transaction.
    ///
    /// Fails with [`Duplicate`](tome_cache::error::ErrorKind::Duplicate),
    /// writing nothing, if the page is already stored.
    async fn commit_chapter(&self, series_id: i64, commit: &ChapterCommit) -> Result<Committed>;
}

#[async_trait]
impl Gateway for Repository {
    async fn upsert_series(&self, series: &NewSeries) -> Result<i64> {
        Repository::upsert_series(self, series).await
    }

    async fn find_series_by_hash(&self, hash: &str) -> Result<Option<Series>> {
        Repository::find_series_by_hash(self, hash).await
    }

    async fn find_page_by_hash(&self, hash: &str) -> Result<Option<Page>> {
        Repository::find_page_by_hash(self, hash).await
    }

    async fn last_page(&self, series_id: i64) -> Result<Option<Page>> {
        Repository::last_page(self, series_id).await
    }

    async fn insert_page(&self, series_id: i64, page: &NewPage) -> Result<Page> {
        Repository::insert_page(self, series_id, page).await
    }

    async fn upsert_book(&self, series_id: i64, book: &NewBook) -> Result<i64> {
        Repository::upsert_book(self, series_id, book).await
    }

    async fn upsert_chapter(&self, book_id: i64, chapter: &NewChapter) -> Result<i64> {
        Repository::upsert_chapter(self, book_id, chapter).await
    }

    async fn upsert_chapter_page(&self, chapter_id: i64, page_id: i64) -> Result<()> {
        Repository::upsert_chapter_page(self, chapter_id, page_id).await
    }

    async fn books_by_series(&self, series_id: i64) -> Result<Vec<Book>> {
        Repository::books_by_series(self, series_id).await
    }

    async fn chapters_by_book(&self, book_id: i64) -> Result<Vec<Chapter>> {
        Repository::chapters_by_book(self, book_id).await
    }

    async fn pages_by_series(&self, series_id: i64) -> Result<Vec<Page>> {
        Repository::pages_by_series(self, series_id).await
    }

    async fn commit_chapter(&self, series_id: i64, commit: &ChapterCommit) -> Result<Committed> {
        Repository::commit_chapter(self, series_id, &commit.book, &commit.chapter, &commit.page).await
    }
}
