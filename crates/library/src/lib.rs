//! Ingestion of light-novel series into the tome cache.
//!
//! An [`IngestionCoordinator`] walks a series chapter by chapter, following
//! the chain of "next" links a [`SourceProvider`](tome_source::SourceProvider)
//! discovers, and commits each readable chapter through a [`Gateway`] before
//! moving on. Progress is the stored chain itself: every run resumes from its
//! tail, and content that is already stored is skipped by hash, so a run can
//! be interrupted at any point and simply started again.
//!
//! Chapters saved by hand can be ingested the same way with
//! [`IngestionCoordinator::ingest_staged`].

mod coordinator;
pub mod error;
mod events;
mod gateway;
mod staged;
mod toc;

pub use crate::coordinator::IngestionCoordinator;
pub use crate::events::{IngestEvent, Report, SkipReason};
pub use crate::gateway::{ChapterCommit, Gateway};
pub use crate::staged::{StagedChapter, stage_directory};
