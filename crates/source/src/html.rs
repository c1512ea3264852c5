use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Text content with whitespace collapsed.
pub(crate) fn text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// Text of the first match that has any.
pub(crate) fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).map(text).find(|text| !text.is_empty())
}

/// Resolve a link against the page it was found on. Only web links survive.
pub(crate) fn resolve(base: &Url, href: Option<&str>) -> Option<String> {
    let href = href.map(str::trim).filter(|href| !href.is_empty() && !href.starts_with('#'))?;
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

/// The absolute source of an image, preferring lazy-loaded sources.
pub(crate) fn image(base: &Url, element: ElementRef<'_>) -> Option<String> {
    let element = element.value();
    ["data-src", "data-lazy-src", "src"]
        .into_iter()
        .filter_map(|attr| element.attr(attr))
        .find(|src| !src.trim().is_empty() && !src.starts_with("data:"))
        .and_then(|src| resolve(base, Some(src)))
}
