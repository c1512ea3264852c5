//! Structured JSON from Next.js data routes.
//!
//! A Next.js site serves the props of every server-rendered page as JSON at
//! `{origin}/_next/data/{build_id}/{path}.json`. The build id changes on
//! every deploy; unless configured it is read from the `__NEXT_DATA__`
//! script embedded in any rendered page.

use crate::client::Limited;
use crate::consts::NEXT_DATA_SELECTOR;
use crate::error::{ErrorKind, Result};
use crate::html::resolve;
use crate::{SeriesInfo, SourceChapter, SourceChapterItem, SourceProvider, SourceVolume, host_matches};
use async_stream::stream;
use async_trait::async_trait;
use exn::OptionExt;
use futures::stream::BoxStream;
use scraper::Html;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use tokio::sync::OnceCell;
use tome_extract::canonicalize;
use tome_fetch::{FetchHandle, RateLimiter};
use tracing::{debug, info, instrument, warn};
use url::Url;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NextData {
    build_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataRoute<T> {
    page_props: T,
}

#[derive(Deserialize)]
struct SeriesProps {
    series: SeriesData,
    #[serde(default)]
    volumes: Vec<VolumeData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeriesData {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    cover: Option<String>,
    #[serde(default)]
    first_chapter: Option<String>,
}

#[derive(Deserialize)]
struct VolumeData {
    #[serde(default)]
    number: Option<i64>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    covers: Vec<String>,
    #[serde(default)]
    chapters: Vec<ChapterLink>,
}

#[derive(Deserialize)]
struct ChapterLink {
    title: String,
    #[serde(alias = "url")]
    slug: String,
}

#[derive(Deserialize)]
struct ChapterProps {
    chapter: ChapterData,
}

#[derive(Deserialize)]
struct ChapterData {
    #[serde(default)]
    title: Option<String>,
    content: String,
    #[serde(default)]
    next: Option<String>,
}

/// [`SourceProvider`] for sites built on Next.js.
pub struct NextSource {
    name: String,
    origin: Url,
    build_id: OnceCell<String>,
    api_key: Option<String>,
    client: Limited,
}
impl NextSource {
    pub fn new(name: impl Into<String>, base_url: &str, fetch: FetchHandle, limiter: RateLimiter) -> Result<Self> {
        let origin = Url::parse(base_url)
            .ok()
            .filter(|url| url.has_host())
            .ok_or_raise(|| ErrorKind::InvalidUrl(base_url.to_string()))?;
        Ok(Self {
            name: name.into(),
            origin,
            build_id: OnceCell::new(),
            api_key: None,
            client: Limited::new(fetch, limiter),
        })
    }

    /// Use a known build id instead of discovering it.
    pub fn with_build_id(mut self, build_id: impl Into<String>) -> Self {
        self.build_id = OnceCell::new_with(Some(build_id.into()));
        self
    }

    /// Send an API key header with every data route request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    async fn build_id(&self) -> Result<&str> {
        let build_id = self
            .build_id
            .get_or_try_init(|| async {
                let response = self.client.get(self.origin.as_str()).await?;
                let build_id = discover_build_id(&response.html)
                    .ok_or_raise(|| ErrorKind::MissingBuildId(self.origin.to_string()))?;
                debug!(source = %self.name, %build_id, "discovered build id");
                Ok::<_, crate::error::Error>(build_id)
            })
            .await?;
        Ok(build_id.as_str())
    }

    /// The data route serving the props of the page at `url`.
    fn data_url(&self, build_id: &str, url: &Url) -> String {
        let path = url.path().trim_matches('/');
        let path = if path.is_empty() { "index" } else { path };
        let mut data = format!("{}_next/data/{build_id}/{path}.json", self.origin_root());
        if let Some(query) = url.query() {
            data.push('?');
            data.push_str(query);
        }
        data
    }

    fn origin_root(&self) -> String {
        self.origin.origin().ascii_serialization() + "/"
    }

    /// Fetch the props of the page at `url`. `None` if they aren't shaped like `T`.
    async fn props<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        let url = Url::parse(url).ok().ok_or_raise(|| ErrorKind::InvalidUrl(url.to_string()))?;
        let data_url = self.data_url(self.build_id().await?, &url);
        let headers: Vec<(String, String)> = match &self.api_key {
            Some(key) => vec![(API_KEY_HEADER.to_string(), key.clone())],
            None => Vec::new(),
        };
        let response = self.client.get_with_headers(&data_url, &headers).await?;
        match serde_json::from_str::<DataRoute<T>>(&response.html) {
            Ok(data) => Ok(Some(data.page_props)),
            Err(error) => {
                warn!(url = %data_url, %error, "unexpected page props");
                Ok(None)
            },
        }
    }

    fn resolve(&self, link: &str) -> Option<String> {
        resolve(&self.origin, Some(link))
    }
}

fn discover_build_id(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let script = document.select(&NEXT_DATA_SELECTOR).next()?;
    let json = script.text().collect::<String>();
    serde_json::from_str::<NextData>(&json).ok().map(|data| data.build_id)
}

#[async_trait]
impl SourceProvider for NextSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, url: &Url) -> bool {
        host_matches(&self.origin, url)
    }

    #[instrument(skip(self), fields(source = %self.name))]
    async fn series_info(&self, url: &str) -> Result<Option<SeriesInfo>> {
        let Some(props) = self.props::<SeriesProps>(url).await? else {
            return Ok(None);
        };
        let series = props.series;
        info!(title = %series.title, "found series");
        Ok(Some(SeriesInfo {
            url: url.to_string(),
            title: series.title,
            description: series.description,
            authors: series.authors,
            tags: series.tags,
            cover_url: series.cover.as_deref().and_then(|cover| self.resolve(cover)),
            first_chapter_url: series.first_chapter.as_deref().and_then(|link| self.resolve(link)),
        }))
    }

    fn volumes<'a>(&'a self, series_url: &'a str) -> BoxStream<'a, Result<SourceVolume>> {
        Box::pin(stream!({
            let props = match self.props::<SeriesProps>(series_url).await {
                Ok(props) => props,
                Err(error) => {
                    yield Err(error);
                    return;
                },
            };
            let mut previous = 0;
            for volume in props.map(|props| props.volumes).unwrap_or_default() {
                let chapters: Vec<_> = volume
                    .chapters
                    .into_iter()
                    .filter_map(|link| Some(SourceChapterItem { url: self.resolve(&link.slug)?, title: link.title }))
                    .collect();
                if chapters.is_empty() {
                    continue;
                }
                let ordinal = volume.number.filter(|number| *number > previous).unwrap_or(previous + 1);
                previous = ordinal;
                yield Ok(SourceVolume {
                    ordinal,
                    title: volume.title,
                    covers: volume.covers.iter().filter_map(|cover| self.resolve(cover)).collect(),
                    chapters,
                });
            }
        }))
    }

    fn chapters<'a>(&'a self, first_url: &'a str) -> BoxStream<'a, Result<SourceChapter>> {
        Box::pin(stream!({
            let mut visited = HashSet::new();
            let mut next = Some(first_url.to_string());
            while let Some(url) = next.take() {
                if !visited.insert(canonicalize(&url)) {
                    warn!(url, "chapter links loop back, stopping");
                    break;
                }
                let chapter = match self.props::<ChapterProps>(&url).await {
                    Ok(Some(props)) => props.chapter,
                    Ok(None) => break,
                    Err(error) => {
                        yield Err(error);
                        break;
                    },
                };
                next = chapter.next.as_deref().and_then(|link| self.resolve(link));
                yield Ok(SourceChapter {
                    url,
                    title: chapter.title,
                    html: format!("<article>{}</article>", chapter.content),
                    next_url: next.clone(),
                });
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use serde_json::json;
    use std::sync::Arc;
    use tome_fetch::{MockFetch, RateLimits};

    const DATA: &str = "https://novels.site/_next/data/b42";

    fn source(fetch: Arc<MockFetch>) -> NextSource {
        let limiter = RateLimiter::new(RateLimits { duration: (0, 0), ..Default::default() });
        NextSource::new("next", "https://novels.site", fetch, limiter).unwrap()
    }

    fn series() -> String {
        json!({
            "pageProps": {
                "series": {
                    "title": "The Novel",
                    "description": "A boy finds a sword.",
                    "authors": ["Jane Doe"],
                    "tags": ["fantasy"],
                    "cover": "/covers/novel.jpg",
                    "firstChapter": "/novel/c1"
                },
                "volumes": [
                    {"number": 1, "title": "Volume 1", "covers": ["/covers/v1.jpg"], "chapters": [
                        {"title": "Chapter 1", "slug": "/novel/c1"},
                        {"title": "Chapter 2", "slug": "/novel/c2"}
                    ]},
                    {"title": "Extras", "chapters": []},
                    {"title": "Side Stories", "chapters": [{"title": "Interlude", "url": "https://novels.site/novel/s1"}]}
                ]
            },
            "__N_SSP": true
        })
        .to_string()
    }

    fn chapter(n: u32, next: Option<&str>) -> String {
        json!({"pageProps": {"chapter": {"title": format!("Chapter {n}"), "content": format!("<p>Text {n}</p>"), "next": next}}})
            .to_string()
    }

    #[test]
    fn discovers_build_id() {
        let html = r#"<html><body><div id="__next"></div>
            <script id="__NEXT_DATA__" type="application/json">{"props":{"pageProps":{}},"page":"/","buildId":"b42"}</script>
            </body></html>"#;
        assert_eq!(discover_build_id(html).as_deref(), Some("b42"));
        assert_eq!(discover_build_id("<html></html>"), None);
    }

    #[tokio::test]
    async fn reads_series_with_discovered_build_id() {
        let fetch = Arc::new(MockFetch::with_pages([
            (
                "https://novels.site/".to_string(),
                r#"<script id="__NEXT_DATA__" type="application/json">{"buildId":"b42"}</script>"#.to_string(),
            ),
            (format!("{DATA}/novel.json"), series()),
        ]));
        let source = source(fetch.clone());
        let info = source.series_info("https://novels.site/novel").await.unwrap().unwrap();
        assert_eq!(info.title, "The Novel");
        assert_eq!(info.cover_url.as_deref(), Some("https://novels.site/covers/novel.jpg"));
        assert_eq!(info.first_chapter_url.as_deref(), Some("https://novels.site/novel/c1"));

        // The build id is only discovered once.
        source.series_info("https://novels.site/novel").await.unwrap();
        let requests = fetch.requests().await;
        assert_eq!(requests.iter().filter(|url| *url == "https://novels.site/").count(), 1);
    }

    #[tokio::test]
    async fn lists_volumes() {
        let fetch = Arc::new(MockFetch::with_pages([(format!("{DATA}/novel.json"), series())]));
        let source = source(fetch).with_build_id("b42");
        let volumes: Vec<_> = source.volumes("https://novels.site/novel").try_collect().await.unwrap();
        assert_eq!(volumes.len(), 2);
        assert_eq!((volumes[0].ordinal, volumes[1].ordinal), (1, 2));
        assert_eq!(volumes[0].covers, vec!["https://novels.site/covers/v1.jpg"]);
        assert_eq!(volumes[1].chapters[0].url, "https://novels.site/novel/s1");
    }

    #[tokio::test]
    async fn walks_chapters_with_api_key() {
        let fetch = Arc::new(MockFetch::with_pages([
            (format!("{DATA}/novel/c1.json"), chapter(1, Some("/novel/c2"))),
            (format!("{DATA}/novel/c2.json"), chapter(2, None)),
        ]));
        let source = source(fetch.clone()).with_build_id("b42").with_api_key("secret");
        let chapters: Vec<_> = source.chapters("https://novels.site/novel/c1").try_collect().await.unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].url, "https://novels.site/novel/c1");
        assert_eq!(chapters[0].next_url.as_deref(), Some("https://novels.site/novel/c2"));
        assert_eq!(chapters[1].html, "<article><p>Text 2</p></article>");
        let headers = fetch.headers(&format!("{DATA}/novel/c2.json")).await.unwrap();
        assert_eq!(headers, vec![("x-api-key".to_string(), "secret".to_string())]);
    }

    #[tokio::test]
    async fn malformed_props_are_none() {
        let fetch = Arc::new(MockFetch::with_pages([(format!("{DATA}/novel.json"), "<html>not json</html>")]));
        let source = source(fetch).with_build_id("b42");
        assert_eq!(source.series_info("https://novels.site/novel").await.unwrap(), None);
        let volumes: Vec<_> = source.volumes("https://novels.site/novel").try_collect().await.unwrap();
        assert!(volumes.is_empty());
    }

    #[rstest::rstest]
    #[case("https://novels.site/", "https://novels.site/_next/data/b1/index.json")]
    #[case("https://novels.site/novel/c1/", "https://novels.site/_next/data/b1/novel/c1.json")]
    #[case("https://novels.site/read?id=4", "https://novels.site/_next/data/b1/read.json?id=4")]
    fn builds_data_routes(#[case] url: &str, #[case] expected: &str) {
        let fetch: FetchHandle = Arc::new(MockFetch::default());
        let source = NextSource::new("next", "https://novels.site/app", fetch, RateLimiter::new(RateLimits::default()))
            .unwrap();
        assert_eq!(source.data_url("b1", &Url::parse(url).unwrap()), expected);
    }
}
