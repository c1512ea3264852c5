//! SQLite persistence for ingested content.
//!
//! This crate stores the series → book (volume) → chapter → page hierarchy
//! produced by ingestion. Every entity is keyed by a content hash so that
//! re-ingesting a source is idempotent, and pages form a chain in fetch order
//! whose tail marks where the next run resumes.
//!
//! # Architecture
//! - **Series**: keyed by the hash of their canonical URL, refreshed on rescrape.
//! - **Books**: one per (series, volume ordinal), with cover images.
//! - **Chapters**: keyed by the hash of (series, volume, title); ordinals may
//!   be fractional.
//! - **Pages**: raw and sanitized content, keyed by the hash of their
//!   canonical URL, linked to chapters through an ordered join table.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{Book, Chapter, Committed, NewBook, NewChapter, NewPage, NewSeries, Page, Series};
pub use crate::repo::Repository;
