//! Repository for the series → book → chapter → page hierarchy.
//!
//! Pages are the unit of progress: each one is committed, together with the
//! book, chapter and join row it belongs to, in a single transaction. The
//! page chain (`next_url`) is updated in that same transaction so a crash can
//! never leave two tails, or a tail pointing at a page that doesn't exist.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{
    Book, BookRow, Chapter, ChapterRow, Committed, NewBook, NewChapter, NewPage, NewSeries, Page, PageRow, Series,
    SeriesRow, encode_list,
};
use exn::ResultExt;
use sqlx::{SqliteConnection, SqlitePool};
use time::UtcDateTime;
use tracing::{debug, instrument};

fn now() -> i64 {
    UtcDateTime::now().unix_timestamp()
}

/// Repository for managing ingested content in the database.
///
/// # Relationships
///
/// - A series owns many books (volumes), unique by ordinal
/// - A book owns many chapters, unique (globally) by hash
/// - A series owns many pages, unique (globally) by hash and ordered by a
///   per-series ordinal
/// - Chapters and pages are joined many-to-many, ordered within the chapter
/// - Deleting a series cascades to everything beneath it
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
    dry_run: bool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone(), dry_run: false }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    ///
    /// A dry-run repository performs every write inside a transaction that is
    /// rolled back instead of committed.
    pub fn new(pool: SqlitePool, dry_run: bool) -> Self {
        Self { pool, dry_run }
    }

    // =========================================================================
    // Series
    // =========================================================================

    /// Create the series, or refresh its metadata if its hash is already known.
    ///
    /// Returns the series id either way.
    #[instrument(skip(self, series), fields(hash = %series.hash))]
    pub async fn upsert_series(&self, series: &NewSeries) -> Result<i64> {
        let authors = encode_list(&series.authors, "authors")?;
        let tags = encode_list(&series.tags, "tags")?;
        let now = now();
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let id: i64 = sqlx::query_scalar(include_str!("../queries/upsert_series.sql"))
            .bind(&series.hash)
            .bind(&series.title)
            .bind(&series.description)
            .bind(&series.url)
            .bind(authors)
            .bind(tags)
            .bind(&series.cover_url)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        self.finish(tx).await?;
        Ok(id)
    }

    pub async fn find_series_by_hash(&self, hash: impl AsRef<str>) -> Result<Option<Series>> {
        let row: Option<SeriesRow> = sqlx::query_as(include_str!("../queries/find_series_by_hash.sql"))
            .bind(hash.as_ref())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Series::try_from).transpose()
    }

    // =========================================================================
    // Pages
    // =========================================================================

    /// Get a page by the hash of its canonical URL, in any series.
    pub async fn find_page_by_hash(&self, hash: impl AsRef<str>) -> Result<Option<Page>> {
        find_page_by_hash(&mut *self.acquire().await?, hash.as_ref()).await
    }

    /// The tail of the series' page chain: where ingestion resumes.
    pub async fn last_page(&self, series_id: i64) -> Result<Option<Page>> {
        last_page(&mut *self.acquire().await?, series_id).await
    }

    /// Append a page to the series, as the new highest ordinal.
    ///
    /// This does NOT update the chain; see [`commit_chapter`](Self::commit_chapter).
    pub async fn insert_page(&self, series_id: i64, page: &NewPage) -> Result<Page> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let page = insert_page(&mut tx, series_id, page).await?;
        self.finish(tx).await?;
        Ok(page)
    }

    /// Point the page at the next one in fetch order.
    pub async fn set_next_url(&self, page_id: i64, next_url: impl AsRef<str>) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        set_next_url(&mut tx, page_id, next_url.as_ref()).await?;
        self.finish(tx).await
    }

    pub async fn pages_by_series(&self, series_id: i64) -> Result<Vec<Page>> {
        let rows: Vec<PageRow> = sqlx::query_as(include_str!("../queries/pages_by_series.sql"))
            .bind(series_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Page::try_from).collect()
    }

    pub async fn pages_by_chapter(&self, chapter_id: i64) -> Result<Vec<Page>> {
        let rows: Vec<PageRow> = sqlx::query_as(include_str!("../queries/pages_by_chapter.sql"))
            .bind(chapter_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Page::try_from).collect()
    }

    // =========================================================================
    // Books & Chapters
    // =========================================================================

    /// Returns the id of the series' book with this ordinal, creating it if needed.
    pub async fn upsert_book(&self, series_id: i64, book: &NewBook) -> Result<i64> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let id = upsert_book(&mut tx, series_id, book).await?;
        self.finish(tx).await?;
        Ok(id)
    }

    /// Returns the id of the chapter with this hash, creating it if needed.
    ///
    /// A chapter without an ordinal is placed after the book's last chapter.
    pub async fn upsert_chapter(&self, book_id: i64, chapter: &NewChapter) -> Result<i64> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let id = upsert_chapter(&mut tx, book_id, chapter).await?;
        self.finish(tx).await?;
        Ok(id)
    }

    /// Append the page to the chapter; linking the same pair twice is a no-op.
    pub async fn upsert_chapter_page(&self, chapter_id: i64, page_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        upsert_chapter_page(&mut tx, chapter_id, page_id).await?;
        self.finish(tx).await
    }

    pub async fn books_by_series(&self, series_id: i64) -> Result<Vec<Book>> {
        let rows: Vec<BookRow> = sqlx::query_as(include_str!("../queries/books_by_series.sql"))
            .bind(series_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Book::try_from).collect()
    }

    pub async fn chapters_by_book(&self, book_id: i64) -> Result<Vec<Chapter>> {
        let rows: Vec<ChapterRow> = sqlx::query_as(include_str!("../queries/chapters_by_book.sql"))
            .bind(book_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(rows.into_iter().map(Chapter::from).collect())
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Persist one fetched page as (part of) a chapter, atomically.
    ///
    /// Within a single transaction:
    /// 1. reject the page if its hash is already known ([`ErrorKind::Duplicate`]),
    /// 2. resolve or create the book, then the chapter,
    /// 3. append the page to the series and link it to the chapter,
    /// 4. point the previous tail of the chain at the new page.
    ///
    /// Either all of it is written or none of it is.
    #[instrument(skip_all, fields(series_id = series_id, url = %page.url))]
    pub async fn commit_chapter(
        &self,
        series_id: i64,
        book: &NewBook,
        chapter: &NewChapter,
        page: &NewPage,
    ) -> Result<Committed> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        if find_page_by_hash(&mut tx, &page.hash).await?.is_some() {
            exn::bail!(ErrorKind::Duplicate(page.hash.clone()));
        }
        let previous = last_page(&mut tx, series_id).await?;
        let book_id = upsert_book(&mut tx, series_id, book).await?;
        let chapter_id = upsert_chapter(&mut tx, book_id, chapter).await?;
        let page = insert_page(&mut tx, series_id, page).await?;
        upsert_chapter_page(&mut tx, chapter_id, page.id).await?;
        if let Some(previous) = &previous {
            set_next_url(&mut tx, previous.id, &page.url).await?;
        }
        self.finish(tx).await?;
        debug!(page_id = page.id, ordinal = page.ordinal, "committed chapter page");
        Ok(Committed {
            book_id,
            chapter_id,
            page,
            previous: previous.map(|p| p.id),
        })
    }

    async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Sqlite>> {
        self.pool.acquire().await.or_raise(|| ErrorKind::Database)
    }

    async fn finish(&self, tx: sqlx::Transaction<'_, sqlx::Sqlite>) -> Result<()> {
        match self.dry_run {
            true => tx.rollback().await.or_raise(|| ErrorKind::Database),
            false => tx.commit().await.or_raise(|| ErrorKind::Database),
        }
    }
}

async fn find_page_by_hash(conn: &mut SqliteConnection, hash: &str) -> Result<Option<Page>> {
    let row: Option<PageRow> = sqlx::query_as(include_str!("../queries/find_page_by_hash.sql"))
        .bind(hash)
        .fetch_optional(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    row.map(Page::try_from).transpose()
}

async fn last_page(conn: &mut SqliteConnection, series_id: i64) -> Result<Option<Page>> {
    let row: Option<PageRow> = sqlx::query_as(include_str!("../queries/last_page.sql"))
        .bind(series_id)
        .fetch_optional(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    row.map(Page::try_from).transpose()
}

async fn insert_page(conn: &mut SqliteConnection, series_id: i64, page: &NewPage) -> Result<Page> {
    let row: PageRow = sqlx::query_as(include_str!("../queries/insert_page.sql"))
        .bind(series_id)
        .bind(&page.hash)
        .bind(&page.url)
        .bind(series_id)
        .bind(&page.title)
        .bind(&page.raw)
        .bind(&page.content)
        .bind(now())
        .fetch_one(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    Page::try_from(row)
}

async fn set_next_url(conn: &mut SqliteConnection, page_id: i64, next_url: &str) -> Result<()> {
    sqlx::query(include_str!("../queries/set_next_url.sql"))
        .bind(next_url)
        .bind(page_id)
        .execute(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    Ok(())
}

async fn upsert_book(conn: &mut SqliteConnection, series_id: i64, book: &NewBook) -> Result<i64> {
    sqlx::query_scalar(include_str!("../queries/upsert_book.sql"))
        .bind(series_id)
        .bind(book.ordinal)
        .bind(&book.title)
        .bind(encode_list(&book.covers, "covers")?)
        .fetch_one(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)
}

async fn upsert_chapter(conn: &mut SqliteConnection, book_id: i64, chapter: &NewChapter) -> Result<i64> {
    sqlx::query_scalar(include_str!("../queries/upsert_chapter.sql"))
        .bind(book_id)
        .bind(chapter.ordinal)
        .bind(book_id)
        .bind(&chapter.title)
        .bind(&chapter.hash)
        .fetch_one(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)
}

async fn upsert_chapter_page(conn: &mut SqliteConnection, chapter_id: i64, page_id: i64) -> Result<()> {
    sqlx::query(include_str!("../queries/upsert_chapter_page.sql"))
        .bind(chapter_id)
        .bind(page_id)
        .bind(chapter_id)
        .execute(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    Ok(())
}
