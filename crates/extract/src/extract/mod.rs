//! Readability-style isolation of the main article in a chapter page.

mod score;

use crate::consts;
use scraper::{ElementRef, Html};
use tracing::{instrument, warn};

/// Candidates scoring below this are not trusted to be the article.
pub const DEFAULT_MIN_SCORE: f64 = 20.0;
/// Candidates with less visible text than this are not trusted to be the article.
pub const DEFAULT_MIN_TEXT_LENGTH: usize = 250;

/// The main content of a page, as isolated by the [`Extractor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: Option<String>,
    /// Outer HTML of the winning container, unsanitized.
    pub html: String,
}

#[derive(Debug)]
pub struct Extractor {
    document: Html,
    url: String,
    min_score: f64,
    min_text_length: usize,
}
impl Extractor {
    pub fn from_document(document: Html, url: impl Into<String>) -> Self {
        Self {
            document,
            url: url.into(),
            min_score: DEFAULT_MIN_SCORE,
            min_text_length: DEFAULT_MIN_TEXT_LENGTH,
        }
    }

    pub fn from_html(html: &str, url: impl Into<String>) -> Self {
        Self::from_document(Html::parse_document(html), url)
    }

    pub fn with_thresholds(mut self, min_score: f64, min_text_length: usize) -> Self {
        self.min_score = min_score;
        self.min_text_length = min_text_length;
        self
    }

    /// Isolate the main article.
    ///
    /// Returns `None` when no container is confidently the article; the
    /// reason is logged against the page URL rather than returned.
    #[instrument(skip(self), fields(url = %self.url))]
    pub fn article(&self) -> Option<Article> {
        let Some((candidate, score)) = score::best_candidate(&self.document) else {
            warn!("no scorable content found");
            return None;
        };
        if score < self.min_score {
            warn!(score, "best candidate scored too low");
            return None;
        }
        let text_length = score::text_length(candidate);
        if text_length < self.min_text_length {
            warn!(text_length, "best candidate has too little text");
            return None;
        }
        Some(Article {
            title: self.title(),
            html: candidate.html(),
        })
    }

    /// Page title, preferring OpenGraph metadata over headings over `<title>`.
    pub fn title(&self) -> Option<String> {
        let og = self
            .document
            .select(&consts::OG_TITLE_SELECTOR)
            .filter_map(|meta| meta.value().attr("content"))
            .map(|content| content.trim().to_string())
            .find(|content| !content.is_empty());
        og.or_else(|| first_text(&self.document, &consts::H1_SELECTOR))
            .or_else(|| first_text(&self.document, &consts::TITLE_SELECTOR))
    }
}

fn first_text(document: &Html, selector: &scraper::Selector) -> Option<String> {
    document
        .select(selector)
        .map(|element: ElementRef<'_>| collapse_whitespace(&element.text().collect::<String>()))
        .find(|text| !text.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const PARAGRAPH: &str = "The rain had not stopped for three days, and the village elders, \
        who had seen many storms, were beginning to whisper about omens in the low mist.";

    fn chapter_page(container: &str, paragraphs: usize) -> String {
        let body = (0..paragraphs).map(|_| format!("<p>{PARAGRAPH}</p>")).collect::<String>();
        format!(
            r#"<html><head><title>Site Name</title>
            <meta property="og:title" content="Chapter 3: The Storm"></head>
            <body>
            <nav class="menu"><a href="/">Home</a><a href="/novels">Novels</a></nav>
            <div class="{container}"><h1>Chapter 3</h1>{body}</div>
            <div id="comments"><p>Great chapter! Thanks for the translation, keep it up.</p></div>
            </body></html>"#
        )
    }

    #[test]
    fn finds_main_article() {
        let html = chapter_page("entry-content", 6);
        let article = Extractor::from_html(&html, "https://site.com/c3").article().unwrap();
        assert_eq!(article.title.as_deref(), Some("Chapter 3: The Storm"));
        assert!(article.html.starts_with(r#"<div class="entry-content">"#));
        assert!(article.html.contains("omens in the low mist"));
        assert!(!article.html.contains("Great chapter"));
        assert!(!article.html.contains("Novels"));
    }

    #[rstest]
    #[case::no_paragraphs("<html><body><div>short</div></body></html>")]
    #[case::too_short("<html><body><div><p>Only a single line of text sits here, nothing more.</p></div></body></html>")]
    fn low_confidence_is_none(#[case] html: &str) {
        assert_eq!(Extractor::from_html(html, "https://site.com/x").article(), None);
    }

    #[test]
    fn thresholds_are_configurable() {
        let html = chapter_page("plain", 1);
        let extractor = Extractor::from_html(&html, "https://site.com/c3");
        assert!(extractor.article().is_none());
        let article = extractor.with_thresholds(0.0, 10).article().unwrap();
        assert!(article.html.contains("omens"));
    }

    #[rstest]
    #[case::og(r#"<meta property="og:title" content=" OG "><h1>H</h1><title>T</title>"#, Some("OG"))]
    #[case::heading(r#"<h1>  Heading   One </h1><title>T</title>"#, Some("Heading One"))]
    #[case::title(r#"<title>Only Title</title>"#, Some("Only Title"))]
    #[case::none(r#"<p>text</p>"#, None)]
    fn title_preference(#[case] html: &str, #[case] expected: Option<&str>) {
        let extractor = Extractor::from_html(html, "https://site.com/");
        assert_eq!(extractor.title().as_deref(), expected);
    }
}
