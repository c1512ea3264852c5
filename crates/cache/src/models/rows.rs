use super::{Book, Chapter, Page, Series};
use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use serde_json::{from_str as from_json, to_string as to_json};
use time::UtcDateTime;

fn timestamp(seconds: i64, field: &'static str) -> Result<UtcDateTime, Error> {
    UtcDateTime::from_unix_timestamp(seconds).or_raise(|| ErrorKind::InvalidData(field))
}

pub(crate) fn encode_list(list: &[String], field: &'static str) -> Result<String, Error> {
    to_json(list).or_raise(|| ErrorKind::InvalidData(field))
}

#[derive(sqlx::FromRow)]
pub(crate) struct SeriesRow {
    pub(crate) id: i64,
    pub(crate) hash: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) url: String,
    pub(crate) authors: String,
    pub(crate) tags: String,
    pub(crate) cover_url: Option<String>,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}
impl TryFrom<SeriesRow> for Series {
    type Error = Error;
    fn try_from(row: SeriesRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            hash: row.hash,
            title: row.title,
            description: row.description,
            url: row.url,
            authors: from_json(&row.authors).or_raise(|| ErrorKind::InvalidData("authors"))?,
            tags: from_json(&row.tags).or_raise(|| ErrorKind::InvalidData("tags"))?,
            cover_url: row.cover_url,
            created_at: timestamp(row.created_at, "created at")?,
            updated_at: timestamp(row.updated_at, "updated at")?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct BookRow {
    pub(crate) id: i64,
    pub(crate) series_id: i64,
    pub(crate) ordinal: i64,
    pub(crate) title: String,
    pub(crate) covers: String,
}
impl TryFrom<BookRow> for Book {
    type Error = Error;
    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            series_id: row.series_id,
            ordinal: row.ordinal,
            title: row.title,
            covers: from_json(&row.covers).or_raise(|| ErrorKind::InvalidData("covers"))?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ChapterRow {
    pub(crate) id: i64,
    pub(crate) book_id: i64,
    pub(crate) ordinal: f64,
    pub(crate) title: String,
    pub(crate) hash: String,
}
impl From<ChapterRow> for Chapter {
    fn from(row: ChapterRow) -> Self {
        Self {
            id: row.id,
            book_id: row.book_id,
            ordinal: row.ordinal,
            title: row.title,
            hash: row.hash,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PageRow {
    pub(crate) id: i64,
    pub(crate) series_id: i64,
    pub(crate) hash: String,
    pub(crate) url: String,
    pub(crate) next_url: Option<String>,
    pub(crate) ordinal: i64,
    pub(crate) title: Option<String>,
    pub(crate) raw: String,
    pub(crate) content: String,
    pub(crate) created_at: i64,
}
impl TryFrom<PageRow> for Page {
    type Error = Error;
    fn try_from(row: PageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            series_id: row.series_id,
            hash: row.hash,
            url: row.url,
            next_url: row.next_url,
            ordinal: row.ordinal,
            title: row.title,
            raw: row.raw,
            content: row.content,
            created_at: timestamp(row.created_at, "created at")?,
        })
    }
}
