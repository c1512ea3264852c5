use derive_more::Display;

/// Why a chapter wasn't ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SkipReason {
    /// Its page is already stored.
    #[display("duplicate")]
    Duplicate,
    /// No readable article could be isolated from it.
    #[display("unreadable")]
    Unreadable,
    /// It couldn't be read or persisted.
    #[display("failed")]
    Failed,
}

/// Progress events emitted while ingesting a series.
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started): exactly once.
/// 2. [`SeriesResolved`](Self::SeriesResolved): exactly once.
/// 3. [`Resuming`](Self::Resuming): exactly once, for remote sources.
/// 4. [`Ingested`](Self::Ingested) and [`Skipped`](Self::Skipped): zero or
///    more times, one per chapter, in reading order.
/// 5. [`Aborted`](Self::Aborted): at most once, when the source stopped
///    answering.
/// 6. [`Complete`](Self::Complete): exactly once, signalling the stream is
///    finished.
///
/// An error resolving the series terminates the stream early, in which case
/// [`Complete`](Self::Complete) is never emitted.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    Started { url: String },
    SeriesResolved { id: i64, title: String },
    /// Where the chapter walk starts: the stored tail, or `None` when starting
    /// from the source's first chapter.
    Resuming(Option<String>),
    Ingested {
        url: String,
        book_id: i64,
        chapter_id: i64,
        page_id: i64,
        /// The page's position in the series chain.
        ordinal: i64,
    },
    Skipped { url: String, reason: SkipReason },
    /// Fetching failed; everything ingested before it stays committed.
    Aborted { ingested: u64 },
    Complete(Report),
}

/// What a finished (or aborted) run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub series_id: i64,
    pub ingested: u64,
    pub duplicates: u64,
    pub unreadable: u64,
    pub failed: u64,
    pub aborted: bool,
    /// URL of the chain's tail after the run.
    pub tail: Option<String>,
}
impl Report {
    pub(crate) fn new(series_id: i64) -> Self {
        Self { series_id, ..Default::default() }
    }

    pub(crate) fn record(&mut self, event: &IngestEvent) {
        match event {
            IngestEvent::Ingested { url, .. } => {
                self.ingested += 1;
                self.tail = Some(url.clone());
            },
            IngestEvent::Skipped { reason, .. } => match reason {
                SkipReason::Duplicate => self.duplicates += 1,
                SkipReason::Unreadable => self.unreadable += 1,
                SkipReason::Failed => self.failed += 1,
            },
            IngestEvent::Aborted { .. } => self.aborted = true,
            _ => {},
        }
    }
}
