//! Manual ingestion of chapters saved as local HTML files.

use crate::coordinator::{IngestionCoordinator, drain};
use crate::error::{ErrorKind, Result};
use crate::events::{IngestEvent, Report, SkipReason};
use crate::gateway::Gateway;
use crate::toc::Placement;
use async_stream::stream;
use exn::ResultExt;
use futures::stream::BoxStream;
use std::path::{Path, PathBuf};
use tome_fetch::Fetch;
use tome_source::SeriesInfo;
use tracing::{debug, info, warn};
use url::Url;

/// A local HTML file to ingest as a chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedChapter {
    pub path: PathBuf,
    pub volume: i64,
    pub title: String,
}

/// List the `*.html` and `*.htm` files in `dir`, in name order, as chapters
/// of `volume` titled after their file names.
pub async fn stage_directory(dir: &Path, volume: i64) -> Result<Vec<StagedChapter>> {
    let staging = || ErrorKind::Staging(dir.display().to_string());
    let mut entries = tokio::fs::read_dir(dir).await.or_raise(staging)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.or_raise(staging)? {
        let path = entry.path();
        let is_html = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"));
        if is_html && entry.file_type().await.or_raise(staging)?.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    debug!(dir = %dir.display(), count = paths.len(), "staged chapters");
    Ok(paths
        .into_iter()
        .map(|path| StagedChapter {
            title: path.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_default(),
            volume,
            path,
        })
        .collect())
}

impl<G: Gateway> IngestionCoordinator<G> {
    /// Streams [`IngestEvent`]s while ingesting local files into `series`,
    /// in the given order, read through `fetch` by their `file://` URLs.
    ///
    /// There is no chain to resume, so no [`Resuming`](IngestEvent::Resuming)
    /// event, and a file that can't be read is skipped rather than aborting.
    pub fn ingest_staged<'a>(
        &'a self,
        series: &'a SeriesInfo,
        files: Vec<StagedChapter>,
        fetch: &'a dyn Fetch,
    ) -> BoxStream<'a, Result<IngestEvent>> {
        Box::pin(stream!({
            yield Ok(IngestEvent::Started { url: series.url.clone() });
            let (series_id, series_hash) = match self.resolve_series(series).await {
                Ok(resolved) => resolved,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            yield Ok(IngestEvent::SeriesResolved { id: series_id, title: series.title.clone() });
            let mut report = Report::new(series_id);
            report.tail = match self.gateway.last_page(series_id).await.or_raise(|| ErrorKind::Persistence) {
                Ok(tail) => tail.map(|page| page.url),
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };

            for file in files {
                let Some(url) = file_url(&file.path) else {
                    warn!(path = %file.path.display(), "could not resolve staged file");
                    let event = IngestEvent::Skipped { url: file.path.display().to_string(), reason: SkipReason::Failed };
                    report.record(&event);
                    yield Ok(event);
                    continue;
                };
                let event = match fetch.get(url.as_str()).await {
                    Ok(response) => {
                        let placement = Placement::untitled(file.volume);
                        self.ingest_chapter(series_id, &series_hash, url.as_str(), &response.html, Some(&file.title), &placement)
                            .await
                    },
                    Err(e) => {
                        warn!(url = %url, error = %e, "could not read staged file");
                        IngestEvent::Skipped { url: url.to_string(), reason: SkipReason::Failed }
                    },
                };
                report.record(&event);
                yield Ok(event);
            }

            info!(series_id, ingested = report.ingested, duplicates = report.duplicates, "staged ingestion finished");
            yield Ok(IngestEvent::Complete(report));
        }))
    }

    /// Ingest local files, returning only the final [`Report`].
    pub async fn run_staged(&self, series: &SeriesInfo, files: Vec<StagedChapter>, fetch: &dyn Fetch) -> Result<Report> {
        drain(self.ingest_staged(series, files, fetch)).await
    }
}

fn file_url(path: &Path) -> Option<Url> {
    let path = std::path::absolute(path).ok()?;
    Url::from_file_path(path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::tests::{coordinator, readable};
    use std::time::Duration;
    use tome_fetch::DirectClient;

    fn series() -> SeriesInfo {
        SeriesInfo {
            url: "https://site.com/novel".to_string(),
            title: "The Long Road".to_string(),
            ..Default::default()
        }
    }

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[tokio::test]
    async fn stages_html_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "02 Chapter 2.htm", "");
        write(dir.path(), "01 Chapter 1.html", "");
        write(dir.path(), "notes.txt", "");
        std::fs::create_dir(dir.path().join("images.html")).unwrap();

        let staged = stage_directory(dir.path(), 3).await.unwrap();
        let titles: Vec<&str> = staged.iter().map(|chapter| chapter.title.as_str()).collect();
        assert_eq!(titles, vec!["01 Chapter 1", "02 Chapter 2"]);
        assert!(staged.iter().all(|chapter| chapter.volume == 3));
        assert_eq!(staged[0].path, dir.path().join("01 Chapter 1.html"));

        assert!(stage_directory(&dir.path().join("missing"), 1).await.is_err());
    }

    #[tokio::test]
    async fn ingests_staged_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "01 Chapter 1.html", &readable("first"));
        write(dir.path(), "02 Chapter 2.html", &readable("second"));
        let mut files = stage_directory(dir.path(), 1).await.unwrap();
        files.push(StagedChapter { path: dir.path().join("03 Chapter 3.html"), volume: 1, title: "Chapter 3".to_string() });

        let coordinator = coordinator().await;
        let fetch = DirectClient::new(Duration::from_secs(5)).unwrap();
        let series = series();
        let report = coordinator.run_staged(&series, files.clone(), &fetch).await.unwrap();
        assert_eq!((report.ingested, report.failed), (2, 1));

        let repo = coordinator.gateway();
        let pages = repo.pages_by_series(report.series_id).await.unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages.iter().all(|page| page.url.starts_with("file://")));
        assert!(pages[0].content.contains("The first came slowly"));
        assert_eq!(pages[0].next_url.as_deref(), Some(pages[1].url.as_str()));
        assert_eq!(report.tail.as_deref(), Some(pages[1].url.as_str()));
        let books = repo.books_by_series(report.series_id).await.unwrap();
        let chapters = repo.chapters_by_book(books[0].id).await.unwrap();
        let ordinals: Vec<f64> = chapters.iter().map(|chapter| chapter.ordinal).collect();
        assert_eq!(ordinals, vec![1.0, 2.0]);

        // Staging the same files again stores nothing new.
        let again = coordinator.run_staged(&series, files, &fetch).await.unwrap();
        assert_eq!((again.ingested, again.duplicates, again.failed), (0, 2, 1));
        assert_eq!(again.tail, report.tail);
        assert_eq!(repo.pages_by_series(report.series_id).await.unwrap(), pages);
    }

    #[tokio::test]
    async fn empty_runs_report_the_stored_tail() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "01 Chapter 1.html", &readable("first"));
        let files = stage_directory(dir.path(), 1).await.unwrap();
        let coordinator = coordinator().await;
        let fetch = DirectClient::new(Duration::from_secs(5)).unwrap();
        let first = coordinator.run_staged(&series(), files, &fetch).await.unwrap();
        assert!(first.tail.is_some());

        let empty = coordinator.run_staged(&series(), Vec::new(), &fetch).await.unwrap();
        assert_eq!((empty.series_id, empty.ingested), (first.series_id, 0));
        assert_eq!(empty.tail, first.tail);
    }
}
