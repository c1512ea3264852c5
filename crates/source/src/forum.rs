//! HTML table-of-contents scraping, driven by CSS selectors.
//!
//! Most translation sites are a WordPress (or similar) install: a landing
//! page with the series metadata and a table of contents, where headings
//! introduce each volume, and chapter pages that link to the next one. A
//! [`ForumLayout`] says where each of those pieces lives on a given site.

use crate::client::Limited;
use crate::consts::{ANCHOR_SELECTOR, IMAGE_SELECTOR, NEXT_TEXT_REGEX, TITLE_SELECTOR, VOLUME_NUMBER_REGEX};
use crate::error::{ErrorKind, Result};
use crate::html::{first_text, image, resolve, text};
use crate::{SeriesInfo, SourceChapter, SourceChapterItem, SourceProvider, SourceVolume, host_matches};
use async_stream::stream;
use async_trait::async_trait;
use exn::OptionExt;
use futures::stream::BoxStream;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tome_extract::canonicalize;
use tome_fetch::{FetchHandle, RateLimiter};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Where things are on a site, as CSS selectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForumLayout {
    pub title: String,
    pub description: String,
    pub author: String,
    pub tags: String,
    pub cover: String,
    /// Link to the first chapter. Falls back to the first table of contents entry.
    pub first_chapter: Option<String>,
    /// Headings that start a new volume in the table of contents.
    pub volume_heading: String,
    /// Chapter links in the table of contents.
    pub chapter_link: String,
    /// Chapter title on a chapter page. Falls back to the document title.
    pub chapter_title: String,
    /// The chapter's content container. Falls back to the whole page.
    pub content: String,
    /// Link to the next chapter. Falls back to a link reading "Next".
    pub next_link: String,
}
impl Default for ForumLayout {
    fn default() -> Self {
        Self {
            title: "h1.entry-title, h1".to_string(),
            description: ".entry-content > p:first-of-type, .description, .summary".to_string(),
            author: ".author, a[rel=author]".to_string(),
            tags: "a[rel=tag], .tags a, .genres a".to_string(),
            cover: ".cover img, .entry-content img".to_string(),
            first_chapter: None,
            volume_heading: ".entry-content h2, .entry-content h3".to_string(),
            chapter_link: ".entry-content li a, .entry-content p a".to_string(),
            chapter_title: "h1.entry-title, h1".to_string(),
            content: ".entry-content, .chapter-content".to_string(),
            next_link: "a[rel=next], a.next".to_string(),
        }
    }
}

/// A [`ForumLayout`] with every selector parsed.
struct Selectors {
    title: Selector,
    description: Selector,
    author: Selector,
    tags: Selector,
    cover: Selector,
    first_chapter: Option<Selector>,
    volume_heading: Selector,
    chapter_link: Selector,
    /// Headings and chapter links, in document order.
    contents: Selector,
    chapter_title: Selector,
    content: Selector,
    next_link: Selector,
}
impl TryFrom<&ForumLayout> for Selectors {
    type Error = crate::error::Error;
    fn try_from(layout: &ForumLayout) -> Result<Self> {
        fn parse(css: &str) -> Result<Selector> {
            Selector::parse(css).ok().ok_or_raise(|| ErrorKind::InvalidSelector(css.to_string()))
        }
        Ok(Self {
            title: parse(&layout.title)?,
            description: parse(&layout.description)?,
            author: parse(&layout.author)?,
            tags: parse(&layout.tags)?,
            cover: parse(&layout.cover)?,
            first_chapter: layout.first_chapter.as_deref().map(parse).transpose()?,
            volume_heading: parse(&layout.volume_heading)?,
            chapter_link: parse(&layout.chapter_link)?,
            contents: parse(&format!("{}, {}", layout.volume_heading, layout.chapter_link))?,
            chapter_title: parse(&layout.chapter_title)?,
            content: parse(&layout.content)?,
            next_link: parse(&layout.next_link)?,
        })
    }
}

/// [`SourceProvider`] for sites described by a [`ForumLayout`].
pub struct ForumSource {
    name: String,
    base: Url,
    selectors: Selectors,
    client: Limited,
}
impl ForumSource {
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        layout: &ForumLayout,
        fetch: FetchHandle,
        limiter: RateLimiter,
    ) -> Result<Self> {
        let base = Url::parse(base_url).ok().ok_or_raise(|| ErrorKind::InvalidUrl(base_url.to_string()))?;
        Ok(Self {
            name: name.into(),
            base,
            selectors: Selectors::try_from(layout)?,
            client: Limited::new(fetch, limiter),
        })
    }

    fn parse_series(&self, url: &Url, html: &str) -> Option<SeriesInfo> {
        let document = Html::parse_document(html);
        let selectors = &self.selectors;
        let title = first_text(&document, &selectors.title)?;
        let authors = document
            .select(&selectors.author)
            .map(text)
            .flat_map(|names| names.split([',', '&']).map(|name| name.trim().to_string()).collect::<Vec<_>>())
            .filter(|name| !name.is_empty())
            .fold(Vec::new(), dedupe);
        let tags = document
            .select(&selectors.tags)
            .map(text)
            .filter(|tag| !tag.is_empty())
            .fold(Vec::new(), dedupe);
        let cover_url = document.select(&selectors.cover).find_map(|img| image(url, img));
        let first_chapter_url = selectors
            .first_chapter
            .as_ref()
            .and_then(|selector| document.select(selector).find_map(|a| resolve(url, a.value().attr("href"))));
        Some(SeriesInfo {
            url: url.to_string(),
            title,
            description: first_text(&document, &selectors.description),
            authors,
            tags,
            cover_url,
            first_chapter_url,
        })
    }

    /// Partition the table of contents into volumes.
    ///
    /// Links before the first heading belong to an untitled first volume.
    /// Headings without any links are ignored.
    fn parse_volumes(&self, url: &Url, html: &str) -> Vec<SourceVolume> {
        let document = Html::parse_document(html);
        let mut volumes: Vec<SourceVolume> = Vec::new();
        let mut seen = HashSet::new();
        for element in document.select(&self.selectors.contents) {
            if self.selectors.volume_heading.matches(&element) {
                if volumes.last().is_some_and(|volume| volume.chapters.is_empty()) {
                    volumes.pop();
                }
                let title = text(element);
                let previous = volumes.last().map_or(0, |volume| volume.ordinal);
                let ordinal = VOLUME_NUMBER_REGEX
                    .captures(&title)
                    .and_then(|captures| captures[1].parse::<i64>().ok())
                    .filter(|ordinal| *ordinal > previous)
                    .unwrap_or(previous + 1);
                let covers = element.select(&IMAGE_SELECTOR).filter_map(|img| image(url, img)).collect();
                volumes.push(SourceVolume { ordinal, title, covers, chapters: Vec::new() });
            } else if self.selectors.chapter_link.matches(&element)
                && let Some(href) = resolve(url, element.value().attr("href"))
                && seen.insert(canonicalize(&href))
            {
                if volumes.is_empty() {
                    volumes.push(SourceVolume::untitled(1));
                }
                if let Some(volume) = volumes.last_mut() {
                    volume.chapters.push(SourceChapterItem { title: text(element), url: href });
                }
            }
        }
        volumes.retain(|volume| !volume.chapters.is_empty());
        volumes
    }

    fn parse_chapter(&self, url: &Url, html: String) -> SourceChapter {
        let document = Html::parse_document(&html);
        let selectors = &self.selectors;
        let title =
            first_text(&document, &selectors.chapter_title).or_else(|| first_text(&document, &TITLE_SELECTOR));
        let next_url = document
            .select(&selectors.next_link)
            .find_map(|a| resolve(url, a.value().attr("href")))
            .or_else(|| {
                document
                    .select(&ANCHOR_SELECTOR)
                    .filter(|a| NEXT_TEXT_REGEX.is_match(&text(*a)))
                    .find_map(|a| resolve(url, a.value().attr("href")))
            });
        let content = document.select(&selectors.content).next().map(|element| element.html());
        SourceChapter {
            url: url.to_string(),
            title,
            html: content.unwrap_or(html),
            next_url,
        }
    }
}

fn dedupe(mut list: Vec<String>, item: String) -> Vec<String> {
    if !list.contains(&item) {
        list.push(item);
    }
    list
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).ok().ok_or_raise(|| ErrorKind::InvalidUrl(url.to_string()))
}

#[async_trait]
impl SourceProvider for ForumSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, url: &Url) -> bool {
        host_matches(&self.base, url)
    }

    #[instrument(skip(self), fields(source = %self.name))]
    async fn series_info(&self, url: &str) -> Result<Option<SeriesInfo>> {
        let response = self.client.get(url).await?;
        let info = self.parse_series(&parse_url(&response.url)?, &response.html);
        match &info {
            Some(info) => info!(title = %info.title, "found series"),
            None => warn!(url, "series page does not match the layout"),
        }
        Ok(info)
    }

    fn volumes<'a>(&'a self, series_url: &'a str) -> BoxStream<'a, Result<SourceVolume>> {
        Box::pin(stream!({
            let response = match self.client.get(series_url).await {
                Ok(response) => response,
                Err(error) => {
                    yield Err(error);
                    return;
                },
            };
            let url = match parse_url(&response.url) {
                Ok(url) => url,
                Err(error) => {
                    yield Err(error);
                    return;
                },
            };
            let volumes = self.parse_volumes(&url, &response.html);
            debug!(source = %self.name, volumes = volumes.len(), "parsed table of contents");
            for volume in volumes {
                yield Ok(volume);
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
                let response = match self.client.get(&url).await {
                    Ok(response) => response,
                    Err(error) => {
                        yield Err(error);
                        break;
                    },
                };
                // Keep the requested URL: that's the one the chain links to.
                let base = match parse_url(&url) {
                    Ok(base) => base,
                    Err(error) => {
                        yield Err(error);
                        break;
                    },
                };
                let chapter = self.parse_chapter(&base, response.html);
                next = chapter.next_url.clone();
                yield Ok(chapter);
            }
        }))
    }
}
