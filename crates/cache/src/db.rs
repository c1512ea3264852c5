//! Opening the tome database.
//!
//! A [`Database`] owns the pool; [`Repository`] handles are cut from it, wet
//! or dry. Opening always brings the schema up to date and checks that the
//! tables ingestion writes to are all there.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

use crate::Repository;
use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
/// Tables every commit touches.
const TABLES: [&str; 5] = ["series", "books", "chapters", "pages", "chapter_pages"];
// Ingestion is sequential per series; a handful covers several series at once.
const MAX_CONNECTIONS: u32 = 5;
// Pages are large, so a chapter commit can hold the write lock a while.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The SQLite database ingested series live in.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the database file at `path`, creating it and its directory first
    /// if need be.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Database)?;
        }
        let options = options().filename(path).create_if_missing(true);
        Self::open(options, MAX_CONNECTIONS).await
    }

    /// A private, empty database that lives as long as the returned handle.
    ///
    /// Not test-only, so that downstream crates can use it in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        // Every connection to `:memory:` is a database of its own.
        Self::open(options().filename(":memory:"), 1).await
    }

    async fn open(options: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .after_connect(|conn, meta| Box::pin(async move { apply_pragmas(conn, meta).await }))
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        MIGRATOR.run(&db.pool).await.or_raise(|| ErrorKind::Migration)?;
        db.check_tables().await?;
        info!(schema = db.schema_version().await?, "opened database");
        Ok(db)
    }

    async fn check_tables(&self) -> Result<()> {
        let present: Vec<String> = sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        match TABLES.iter().find(|table| !present.iter().any(|name| name == *table)) {
            Some(missing) => exn::bail!(ErrorKind::InvalidData(*missing)),
            None => Ok(()),
        }
    }

    /// Version of the newest migration applied, or 0 for none.
    pub async fn schema_version(&self) -> Result<i64> {
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(version.unwrap_or_default())
    }

    /// A repository that commits its writes.
    pub fn repository(&self) -> Repository {
        Repository::new(self.pool.clone(), false)
    }

    /// A repository that rolls back every write, for dry runs: reads see the
    /// stored series, nothing it ingests is kept.
    pub fn dry_run(&self) -> Repository {
        Repository::new(self.pool.clone(), true)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for outstanding connections, then close the pool.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

fn options() -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT)
}

/// Settings `SqliteConnectOptions` has no builder for, applied to every
/// pooled connection.
async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
    sqlx::query("PRAGMA wal_autocheckpoint = 800; PRAGMA cache_size = -8192; PRAGMA temp_store = MEMORY;")
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewBook, NewChapter, NewPage, NewSeries};

    fn series() -> NewSeries {
        NewSeries {
            hash: "series".to_string(),
            title: "The Long Road".to_string(),
            description: None,
            url: "https://site.com/novel".to_string(),
            authors: Vec::new(),
            tags: Vec::new(),
            cover_url: None,
        }
    }

    fn page(name: &str) -> NewPage {
        NewPage {
            hash: format!("page:{name}"),
            url: format!("https://site.com/{name}"),
            title: None,
            raw: "<p>raw</p>".to_string(),
            content: "<p>content</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn opens_a_migrated_schema() {
        let db = Database::connect_in_memory().await.unwrap();
        let latest = MIGRATOR.iter().map(|migration| migration.version).max().unwrap();
        assert_eq!(db.schema_version().await.unwrap(), latest);
        db.check_tables().await.unwrap();
        // Migrating an up-to-date database changes nothing.
        MIGRATOR.run(db.pool()).await.unwrap();
        assert_eq!(db.schema_version().await.unwrap(), latest);
        db.close().await;
    }

    #[tokio::test]
    async fn missing_tables_are_invalid() {
        let db = Database::connect_in_memory().await.unwrap();
        sqlx::query("DROP TABLE chapter_pages").execute(db.pool()).await.unwrap();
        let error = db.check_tables().await.unwrap_err();
        assert!(matches!(&*error, ErrorKind::InvalidData("chapter_pages")));
    }

    #[tokio::test]
    async fn pragmas_apply_to_every_connection() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path().join("tome.sqlite")).await.unwrap();
        let (first, second) = (db.pool().acquire().await.unwrap(), db.pool().acquire().await.unwrap());
        for mut conn in [first, second] {
            let foreign_keys: i64 = sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(&mut *conn).await.unwrap();
            let checkpoint: i64 = sqlx::query_scalar("PRAGMA wal_autocheckpoint").fetch_one(&mut *conn).await.unwrap();
            assert_eq!((foreign_keys, checkpoint), (1, 800));
        }
        db.close().await;
    }

    #[tokio::test]
    async fn ingested_series_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("tome.sqlite");
        let db = Database::connect(&path).await.unwrap();
        let id = db.repository().upsert_series(&series()).await.unwrap();
        db.repository().insert_page(id, &page("a")).await.unwrap();
        db.close().await;
        assert!(path.exists());

        let db = Database::connect(&path).await.unwrap();
        let pages = db.repository().pages_by_series(id).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, "https://site.com/a");
        db.close().await;
    }

    #[tokio::test]
    async fn dry_runs_see_stored_data_but_keep_nothing() {
        let db = Database::connect_in_memory().await.unwrap();
        let id = db.repository().upsert_series(&series()).await.unwrap();
        let book = NewBook { ordinal: 1, title: "Volume 1".to_string(), covers: Vec::new() };
        let chapter = NewChapter { ordinal: Some(1.0), title: "Chapter 1".to_string(), hash: "c1".to_string() };

        let dry = db.dry_run();
        assert!(dry.pages_by_series(id).await.unwrap().is_empty());
        dry.commit_chapter(id, &book, &chapter, &page("c1")).await.unwrap();
        assert!(db.repository().pages_by_series(id).await.unwrap().is_empty());
    }
}
