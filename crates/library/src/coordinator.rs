use crate::error::{ErrorKind, Result};
use crate::events::{IngestEvent, Report, SkipReason};
use crate::gateway::{ChapterCommit, Gateway};
use crate::toc::{Placement, TableOfContents, chapter_number};
use async_stream::stream;
use exn::ResultExt;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use tome_cache::error::ErrorKind as CacheErrorKind;
use tome_cache::{NewBook, NewChapter, NewPage, NewSeries};
use tome_extract::canonical_hash;
use tome_source::{SeriesInfo, SourceProvider, SourceVolume};
use tracing::{info, instrument, warn};

/// Drives ingestion of a series into a [`Gateway`].
///
/// Progress lives in the gateway, not here: the stored chain's tail is where
/// every run resumes, and page hashes make rerunning over content that is
/// already stored a no-op. A coordinator is cheap; make one per series if
/// ingesting several concurrently, but never run two over the same series.
#[derive(Debug, Clone)]
pub struct IngestionCoordinator<G> {
    pub(crate) gateway: G,
}

impl<G: Gateway> IngestionCoordinator<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Streams [`IngestEvent`]s while ingesting the series at `series_url`
    /// from `source`, in the order documented on [`IngestEvent`].
    ///
    /// Chapters that can't be read or stored are skipped. Failing to fetch
    /// from the source ends the run with [`Aborted`](IngestEvent::Aborted),
    /// keeping everything committed before it.
    pub fn ingest<'a>(
        &'a self,
        source: &'a dyn SourceProvider,
        series_url: &'a str,
    ) -> BoxStream<'a, Result<IngestEvent>> {
        // `rustfmt` does not format macros that use braces. Wrap in parentheses!
        Box::pin(stream!({
            yield Ok(IngestEvent::Started { url: series_url.to_string() });

            let info = match source.series_info(series_url).await.or_raise(|| ErrorKind::Source) {
                Ok(Some(info)) => info,
                Ok(None) => {
                    yield Err(exn::Exn::from(ErrorKind::NotASeries(series_url.to_string())));
                    return;
                },
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            let (series_id, series_hash) = match self.resolve_series(&info).await {
                Ok(resolved) => resolved,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            yield Ok(IngestEvent::SeriesResolved { id: series_id, title: info.title.clone() });
            let mut report = Report::new(series_id);

            let volumes: Vec<SourceVolume> = match source.volumes(&info.url).try_collect::<Vec<_>>().await {
                Ok(volumes) => volumes,
                Err(e) => {
                    warn!(url = %info.url, error = %e, "could not fetch table of contents");
                    let event = IngestEvent::Aborted { ingested: 0 };
                    report.record(&event);
                    yield Ok(event);
                    yield Ok(IngestEvent::Complete(report));
                    return;
                },
            };
            let toc = TableOfContents::new(&volumes);

            let tail = match self.gateway.last_page(series_id).await.or_raise(|| ErrorKind::Persistence) {
                Ok(tail) => tail.map(|page| page.url),
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            // The tail is fetched again (and skipped as a duplicate) to find
            // out whether anything has been published after it.
            let start = tail
                .clone()
                .or_else(|| info.first_chapter_url.clone())
                .or_else(|| toc.first_chapter().map(str::to_string));
            info!(series_id, tail = ?tail, listed = toc.len(), "resuming series");
            report.tail = tail.clone();
            yield Ok(IngestEvent::Resuming(tail));
            let Some(start) = start else {
                warn!(url = %info.url, "series has no chapters to start from");
                yield Ok(IngestEvent::Complete(report));
                return;
            };

            let mut previous: Option<Placement> = None;
            let mut chapters = source.chapters(&start);
            while let Some(chapter) = chapters.next().await {
                let chapter = match chapter {
                    Ok(chapter) => chapter,
                    Err(e) => {
                        match e.is_cancelled() {
                            true => info!(ingested = report.ingested, "ingestion cancelled"),
                            false => warn!(ingested = report.ingested, error = %e, "could not fetch chapter, aborting"),
                        }
                        let event = IngestEvent::Aborted { ingested: report.ingested };
                        report.record(&event);
                        yield Ok(event);
                        break;
                    },
                };
                let placement = toc.place(&canonical_hash(&chapter.url), previous.as_ref());
                let event = self
                    .ingest_chapter(series_id, &series_hash, &chapter.url, &chapter.html, chapter.title.as_deref(), &placement)
                    .await;
                previous = Some(placement);
                report.record(&event);
                yield Ok(event);
            }

            info!(
                series_id,
                ingested = report.ingested,
                duplicates = report.duplicates,
                unreadable = report.unreadable,
                failed = report.failed,
                "series ingestion finished"
            );
            yield Ok(IngestEvent::Complete(report));
        }))
    }

    /// Ingest, returning only the final [`Report`].
    pub async fn run(&self, source: &dyn SourceProvider, series_url: &str) -> Result<Report> {
        drain(self.ingest(source, series_url)).await
    }

    /// Create the series, or refresh its metadata, returning its id and hash.
    #[instrument(skip(self, info), fields(url = %info.url))]
    pub(crate) async fn resolve_series(&self, info: &SeriesInfo) -> Result<(i64, String)> {
        let hash = canonical_hash(&info.url);
        let series = NewSeries {
            hash: hash.clone(),
            title: info.title.clone(),
            description: info.description.clone(),
            url: info.url.clone(),
            authors: info.authors.clone(),
            tags: info.tags.clone(),
            cover_url: info.cover_url.clone(),
        };
        let id = self.gateway.upsert_series(&series).await.or_raise(|| ErrorKind::Persistence)?;
        info!(series_id = id, title = %info.title, "resolved series");
        Ok((id, hash))
    }

    /// Extract, sanitize and commit one chapter page.
    ///
    /// Never fails: whatever goes wrong is logged and reported as a skip.
    #[instrument(skip(self, series_hash, html, placement), fields(html_size = html.len(), volume = placement.volume))]
    pub(crate) async fn ingest_chapter(
        &self,
        series_id: i64,
        series_hash: &str,
        url: &str,
        html: &str,
        title: Option<&str>,
        placement: &Placement,
    ) -> IngestEvent {
        let skipped = |reason| IngestEvent::Skipped { url: url.to_string(), reason };
        let page_hash = canonical_hash(url);
        match self.gateway.find_page_by_hash(&page_hash).await {
            Ok(Some(_)) => {
                info!("chapter already ingested");
                return skipped(SkipReason::Duplicate);
            },
            Ok(None) => {},
            Err(e) => {
                warn!(error = %e, "could not look up chapter");
                return skipped(SkipReason::Failed);
            },
        }

        let article = match tome_extract::extract(html, url) {
            Ok(Some(article)) if article.html.trim().is_empty() => {
                warn!("nothing left after sanitizing, skipping chapter");
                return skipped(SkipReason::Unreadable);
            },
            Ok(Some(article)) => article,
            Ok(None) => {
                warn!("no readable content, skipping chapter");
                return skipped(SkipReason::Unreadable);
            },
            Err(e) => {
                warn!(error = %e, "could not extract chapter");
                return skipped(SkipReason::Failed);
            },
        };
        let title = title
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_string)
            .or(article.title)
            .unwrap_or_else(|| url.to_string());
        let ordinal = chapter_number(&title).or(placement.position.map(|position| position as f64));
        let commit = ChapterCommit {
            book: NewBook {
                ordinal: placement.volume,
                title: placement.title.clone(),
                covers: placement.covers.clone(),
            },
            chapter: NewChapter {
                ordinal,
                hash: canonical_hash(&format!("{series_hash}/{}/{title}", placement.volume)),
                title: title.clone(),
            },
            page: NewPage {
                hash: page_hash,
                url: url.to_string(),
                title: Some(title),
                raw: html.to_string(),
                content: article.html,
            },
        };

        match self.gateway.commit_chapter(series_id, &commit).await {
            Ok(committed) => {
                info!(page_id = committed.page.id, ordinal = committed.page.ordinal, "ingested chapter");
                IngestEvent::Ingested {
                    url: url.to_string(),
                    book_id: committed.book_id,
                    chapter_id: committed.chapter_id,
                    page_id: committed.page.id,
                    ordinal: committed.page.ordinal,
                }
            },
            // Lost a race with another writer.
            Err(e) if matches!(&*e, CacheErrorKind::Duplicate(_)) => skipped(SkipReason::Duplicate),
            Err(e) => {
                warn!(error = %e, "could not store chapter");
                skipped(SkipReason::Failed)
            },
        }
    }
}

pub(crate) async fn drain(mut events: BoxStream<'_, Result<IngestEvent>>) -> Result<Report> {
    while let Some(event) = events.try_next().await? {
        if let IngestEvent::Complete(report) = event {
            return Ok(report);
        }
    }
    exn::bail!(ErrorKind::Incomplete)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tome_cache::{Database, Repository};
    use tome_fetch::error::ErrorKind as FetchErrorKind;
    use tome_source::error::{ErrorKind as SourceErrorKind, Result as SourceResult};
    use tome_source::{SourceChapter, SourceChapterItem};
    use url::Url;

    pub(crate) const SERIES_URL: &str = "https://site.com/novel";

    fn paragraph(word: &str) -> String {
        format!(
            "The {word} came slowly over the hills, grey and cold, and the caravan set out again \
             before the guards had finished their breakfast, grumbling about the road."
        )
    }

    /// A chapter page the extractor will accept, mentioning `word`, with the
    /// donation, navigation and sharing cruft chapter pages end with.
    pub(crate) fn readable(word: &str) -> String {
        let paragraph = paragraph(word);
        let body = (0..5).map(|_| format!("<p>{paragraph}</p>")).collect::<Vec<_>>().join("\n");
        format!(
            r#"<html><body><div class="chapter-content">
{body}
<p>Enjoying it? Support me on <a href="https://www.patreon.com/tl">Patreon</a>!</p>
<p><a href="https://site.com/prev">&lt;&lt; Previous</a> | <a href="https://site.com/next">Next &gt;&gt;</a></p>
<p>Share this chapter!</p>
</div></body></html>"#
        )
    }

    /// A site with a fixed set of chapters, linked in the given order.
    #[derive(Default)]
    struct Fixture {
        volumes: Vec<SourceVolume>,
        chapters: HashMap<String, SourceChapter>,
        failing: Option<String>,
        not_a_series: bool,
    }
    impl Fixture {
        fn new(chapters: &[(&str, &str)]) -> Self {
            let mut fixture = Self::default();
            fixture.chain(chapters);
            fixture
        }

        /// Chapters by (url, title), each linking to the next.
        fn chain(&mut self, chapters: &[(&str, &str)]) {
            for (index, (url, title)) in chapters.iter().enumerate() {
                self.chapters.insert(
                    url.to_string(),
                    SourceChapter {
                        url: url.to_string(),
                        title: Some(title.to_string()),
                        html: readable(title),
                        next_url: chapters.get(index + 1).map(|(next, _)| next.to_string()),
                    },
                );
            }
        }

        fn volume(mut self, ordinal: i64, title: &str, urls: &[&str]) -> Self {
            self.volumes.push(SourceVolume {
                ordinal,
                title: title.to_string(),
                covers: Vec::new(),
                chapters: urls
                    .iter()
                    .map(|url| SourceChapterItem { title: String::new(), url: url.to_string() })
                    .collect(),
            });
            self
        }
    }

    #[async_trait]
    impl SourceProvider for Fixture {
        fn name(&self) -> &str {
            "fixture"
        }

        fn matches(&self, url: &Url) -> bool {
            url.host_str() == Some("site.com")
        }

        async fn series_info(&self, url: &str) -> SourceResult<Option<SeriesInfo>> {
            if self.not_a_series {
                return Ok(None);
            }
            Ok(Some(SeriesInfo {
                url: url.to_string(),
                title: "The Long Road".to_string(),
                authors: vec!["Someone".to_string()],
                first_chapter_url: Some("https://site.com/a".to_string()),
                ..Default::default()
            }))
        }

        fn volumes<'a>(&'a self, _series_url: &'a str) -> BoxStream<'a, SourceResult<SourceVolume>> {
            futures::stream::iter(self.volumes.iter().cloned().map(Ok)).boxed()
        }

        fn chapters<'a>(&'a self, first_url: &'a str) -> BoxStream<'a, SourceResult<SourceChapter>> {
            Box::pin(stream!({
                let mut url = Some(first_url.to_string());
                while let Some(current) = url {
                    if self.failing.as_deref() == Some(current.as_str()) {
                        yield Err(SourceErrorKind::fetch(exn::Exn::from(FetchErrorKind::Status(503))));
                        return;
                    }
                    let Some(chapter) = self.chapters.get(&current) else {
                        yield Err(SourceErrorKind::fetch(exn::Exn::from(FetchErrorKind::Status(404))));
                        return;
                    };
                    url = chapter.next_url.clone();
                    yield Ok(chapter.clone());
                }
            }))
        }
    }

    pub(crate) async fn coordinator() -> IngestionCoordinator<Repository> {
        let db = Database::connect_in_memory().await.unwrap();
        IngestionCoordinator::new(db.repository())
    }

    fn urls(pages: &[tome_cache::Page]) -> Vec<&str> {
        pages.iter().map(|page| page.url.as_str()).collect()
    }

    #[tokio::test]
    async fn ingests_new_chapters_and_skips_stored_ones() {
        let coordinator = coordinator().await;
        let repo = coordinator.gateway();
        // "c" was already stored, under another series.
        let other = repo
            .upsert_series(&NewSeries {
                hash: canonical_hash("https://site.com/other"),
                title: "Other".to_string(),
                description: None,
                url: "https://site.com/other".to_string(),
                authors: Vec::new(),
                tags: Vec::new(),
                cover_url: None,
            })
            .await
            .unwrap();
        let stored = NewPage {
            hash: canonical_hash("https://site.com/c"),
            url: "https://site.com/c".to_string(),
            title: None,
            raw: String::new(),
            content: String::new(),
        };
        let book = NewBook { ordinal: 1, title: "Volume 1".to_string(), covers: Vec::new() };
        let chapter = NewChapter { ordinal: None, title: "C".to_string(), hash: "c".to_string() };
        repo.commit_chapter(other, &book, &chapter, &stored).await.unwrap();

        let source = Fixture::new(&[
            ("https://site.com/a", "Chapter 1"),
            ("https://site.com/b", "Chapter 2"),
            ("https://site.com/c", "Chapter 3"),
        ]);
        let events: Vec<IngestEvent> = coordinator.ingest(&source, SERIES_URL).try_collect().await.unwrap();
        assert_eq!(events[0], IngestEvent::Started { url: SERIES_URL.to_string() });
        assert!(matches!(&events[1], IngestEvent::SeriesResolved { title, .. } if title == "The Long Road"));
        assert_eq!(events[2], IngestEvent::Resuming(None));
        assert!(matches!(&events[3], IngestEvent::Ingested { url, ordinal: 1, .. } if url == "https://site.com/a"));
        assert!(matches!(&events[4], IngestEvent::Ingested { url, ordinal: 2, .. } if url == "https://site.com/b"));
        assert_eq!(
            events[5],
            IngestEvent::Skipped { url: "https://site.com/c".to_string(), reason: SkipReason::Duplicate }
        );
        let IngestEvent::Complete(report) = &events[6] else {
            panic!("expected a report, got {:?}", events[6]);
        };
        assert_eq!((report.ingested, report.duplicates, report.aborted), (2, 1, false));
        assert_eq!(report.tail.as_deref(), Some("https://site.com/b"));

        let pages = repo.pages_by_series(report.series_id).await.unwrap();
        assert_eq!(urls(&pages), vec!["https://site.com/a", "https://site.com/b"]);
        assert_eq!(pages[0].next_url.as_deref(), Some("https://site.com/b"));
        assert!(pages[1].is_tail());
        assert_eq!(pages[0].content.matches("<p>The Chapter 1 came slowly").count(), 5, "{}", pages[0].content);
        for cruft in ["Patreon", "Next", "Previous", "Share"] {
            assert!(!pages[0].content.contains(cruft), "{}", pages[0].content);
        }
        assert!(pages[0].raw.contains("chapter-content"));
        let tail = repo.last_page(report.series_id).await.unwrap().unwrap();
        assert_eq!(tail.url, "https://site.com/b");
    }

    #[tokio::test]
    async fn rerunning_changes_nothing() {
        let coordinator = coordinator().await;
        let repo = coordinator.gateway();
        let source = Fixture::new(&[("https://site.com/a", "Chapter 1"), ("https://site.com/b", "Chapter 2")])
            .volume(1, "Arrival", &["https://site.com/a", "https://site.com/b"]);

        let first = coordinator.run(&source, SERIES_URL).await.unwrap();
        let pages = repo.pages_by_series(first.series_id).await.unwrap();
        let books = repo.books_by_series(first.series_id).await.unwrap();
        let chapters = repo.chapters_by_book(books[0].id).await.unwrap();

        let second = coordinator.run(&source, SERIES_URL).await.unwrap();
        assert_eq!(second.series_id, first.series_id);
        assert_eq!((second.ingested, second.duplicates), (0, 1));
        assert_eq!(repo.pages_by_series(first.series_id).await.unwrap(), pages);
        assert_eq!(repo.books_by_series(first.series_id).await.unwrap(), books);
        assert_eq!(repo.chapters_by_book(books[0].id).await.unwrap(), chapters);
    }

    #[tokio::test]
    async fn resumes_from_the_tail() {
        let coordinator = coordinator().await;
        let repo = coordinator.gateway();
        let mut source = Fixture::new(&[("https://site.com/a", "Chapter 1"), ("https://site.com/b", "Chapter 2")]);
        let first = coordinator.run(&source, SERIES_URL).await.unwrap();
        assert_eq!(first.ingested, 2);

        // A new chapter is published after the tail.
        source.chain(&[
            ("https://site.com/a", "Chapter 1"),
            ("https://site.com/b", "Chapter 2"),
            ("https://site.com/c", "Chapter 3"),
        ]);
        let events: Vec<IngestEvent> = coordinator.ingest(&source, SERIES_URL).try_collect().await.unwrap();
        assert_eq!(events[2], IngestEvent::Resuming(Some("https://site.com/b".to_string())));
        assert_eq!(
            events[3],
            IngestEvent::Skipped { url: "https://site.com/b".to_string(), reason: SkipReason::Duplicate }
        );
        assert!(matches!(&events[4], IngestEvent::Ingested { url, ordinal: 3, .. } if url == "https://site.com/c"));

        let pages = repo.pages_by_series(first.series_id).await.unwrap();
        assert_eq!(urls(&pages), vec!["https://site.com/a", "https://site.com/b", "https://site.com/c"]);
        assert_eq!(pages[1].next_url.as_deref(), Some("https://site.com/c"));
        assert!(pages[2].is_tail());
    }

    #[tokio::test]
    async fn places_chapters_into_volumes() {
        let coordinator = coordinator().await;
        let repo = coordinator.gateway();
        let source = Fixture::new(&[
            ("https://site.com/a", "Prologue"),
            ("https://site.com/b", "Chapter 1"),
            ("https://site.com/side", "Side Story"),
        ])
        .volume(1, "Arrival", &["https://site.com/a"])
        .volume(2, "", &["https://site.com/b"]);
        let report = coordinator.run(&source, SERIES_URL).await.unwrap();
        assert_eq!(report.ingested, 3);

        let books = repo.books_by_series(report.series_id).await.unwrap();
        let titles: Vec<(i64, &str)> = books.iter().map(|book| (book.ordinal, book.title.as_str())).collect();
        assert_eq!(titles, vec![(1, "Arrival"), (2, "Volume 2")]);
        let first: Vec<(f64, String)> = repo
            .chapters_by_book(books[0].id)
            .await
            .unwrap()
            .into_iter()
            .map(|chapter| (chapter.ordinal, chapter.title))
            .collect();
        // Ordinal from the table of contents position.
        assert_eq!(first, vec![(1.0, "Prologue".to_string())]);
        let second: Vec<(f64, String)> = repo
            .chapters_by_book(books[1].id)
            .await
            .unwrap()
            .into_iter()
            .map(|chapter| (chapter.ordinal, chapter.title))
            .collect();
        // The side story isn't listed, so it stays in volume 2 after chapter 1.
        assert_eq!(second, vec![(1.0, "Chapter 1".to_string()), (2.0, "Side Story".to_string())]);
    }

    #[tokio::test]
    async fn fetch_failures_abort_and_keep_progress() {
        let coordinator = coordinator().await;
        let mut source = Fixture::new(&[
            ("https://site.com/a", "Chapter 1"),
            ("https://site.com/b", "Chapter 2"),
            ("https://site.com/c", "Chapter 3"),
        ]);
        source.failing = Some("https://site.com/b".to_string());
        let events: Vec<IngestEvent> = coordinator.ingest(&source, SERIES_URL).try_collect().await.unwrap();
        assert_eq!(events[4], IngestEvent::Aborted { ingested: 1 });
        let IngestEvent::Complete(report) = &events[5] else {
            panic!("expected a report, got {:?}", events[5]);
        };
        assert!(report.aborted);
        assert_eq!(report.tail.as_deref(), Some("https://site.com/a"));

        // Once the site recovers, the next run picks up after "a".
        source.failing = None;
        let report = coordinator.run(&source, SERIES_URL).await.unwrap();
        assert_eq!((report.ingested, report.duplicates, report.aborted), (2, 1, false));
        assert_eq!(report.tail.as_deref(), Some("https://site.com/c"));
    }

    #[tokio::test]
    async fn unreadable_chapters_are_skipped() {
        let coordinator = coordinator().await;
        let mut source = Fixture::new(&[
            ("https://site.com/a", "Chapter 1"),
            ("https://site.com/b", "Chapter 2"),
            ("https://site.com/c", "Chapter 3"),
        ]);
        if let Some(chapter) = source.chapters.get_mut("https://site.com/b") {
            chapter.html = "<html><body><p>Coming soon!</p></body></html>".to_string();
        }
        let events: Vec<IngestEvent> = coordinator.ingest(&source, SERIES_URL).try_collect().await.unwrap();
        assert_eq!(
            events[4],
            IngestEvent::Skipped { url: "https://site.com/b".to_string(), reason: SkipReason::Unreadable }
        );
        let IngestEvent::Complete(report) = events.last().unwrap() else {
            panic!("expected a report");
        };
        assert_eq!((report.ingested, report.unreadable), (2, 1));
        let pages = coordinator.gateway().pages_by_series(report.series_id).await.unwrap();
        // The chain skips straight over the unreadable chapter.
        assert_eq!(pages[0].next_url.as_deref(), Some("https://site.com/c"));
    }

    #[tokio::test]
    async fn chapters_sanitized_to_nothing_are_unreadable() {
        let coordinator = coordinator().await;
        let mut source = Fixture::new(&[("https://site.com/a", "Chapter 1"), ("https://site.com/b", "Chapter 2")]);
        // Every paragraph asks for donations, so sanitizing removes them all.
        let paragraph = paragraph("Chapter 2");
        let body = (0..5)
            .map(|_| format!(r#"<p>{paragraph} Support me on <a href="https://ko-fi.com/tl">Ko-fi</a>.</p>"#))
            .collect::<Vec<_>>()
            .join("\n");
        if let Some(chapter) = source.chapters.get_mut("https://site.com/b") {
            chapter.html = format!(r#"<html><body><div class="chapter-content">{body}</div></body></html>"#);
        }
        let report = coordinator.run(&source, SERIES_URL).await.unwrap();
        assert_eq!((report.ingested, report.unreadable), (1, 1));
        assert_eq!(report.tail.as_deref(), Some("https://site.com/a"));
        let repo = coordinator.gateway();
        let stored = repo.find_page_by_hash(&canonical_hash("https://site.com/b")).await.unwrap();
        assert_eq!(stored, None);
    }

    #[tokio::test]
    async fn pages_that_are_not_series_are_errors() {
        let coordinator = coordinator().await;
        let source = Fixture { not_a_series: true, ..Default::default() };
        let mut events = coordinator.ingest(&source, SERIES_URL);
        assert!(matches!(events.next().await, Some(Ok(IngestEvent::Started { .. }))));
        let error = events.next().await.unwrap().unwrap_err();
        assert_eq!(&*error, &ErrorKind::NotASeries(SERIES_URL.to_string()));
        assert!(events.next().await.is_none());
        assert!(coordinator.run(&source, SERIES_URL).await.is_err());
    }

    #[tokio::test]
    async fn missing_first_chapter_aborts() {
        let coordinator = coordinator().await;
        let source = Fixture::default();
        let report = coordinator.run(&source, SERIES_URL).await.unwrap();
        // The fixture points at a first chapter that doesn't exist.
        assert!(report.aborted);
        assert_eq!(report.ingested, 0);
        assert_eq!(report.tail, None);
    }
}
