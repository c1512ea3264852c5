use super::tree::{Element, Node};
use crate::consts;
use regex::Captures;
use std::borrow::Cow;
use url::Url;

/// Rewrite protocol-relative (`//host/x`) and root-relative (`/x`) sources
/// against the page root. Anything else is left as it is.
pub(crate) fn absolutize(src: &str, root: &Url) -> Option<String> {
    let src = src.trim();
    if src.starts_with("//") {
        Some(format!("{}:{}", root.scheme(), src))
    } else if src.starts_with('/') {
        root.join(src).ok().map(String::from)
    } else {
        None
    }
}

/// Fix `<img>` sources in the tree, promoting lazy-loading `data-src` when
/// there is no usable `src`.
pub(crate) fn fix_tree(nodes: Vec<Node>, root: &Url) -> Vec<Node> {
    nodes
        .into_iter()
        .map(|node| match node {
            Node::Element(element) if element.name == "img" => Node::Element(fix_img(element, root)),
            Node::Element(element) => Node::Element(Element {
                children: fix_tree(element.children, root),
                ..element
            }),
            text => text,
        })
        .collect()
}

fn fix_img(mut img: Element, root: &Url) -> Element {
    let lazy = img.attrs.remove("data-src");
    let src = match img.attrs.remove("src") {
        Some(src) if !src.trim().is_empty() && !src.starts_with("data:") => Some(src),
        _ => lazy,
    };
    if let Some(src) = src {
        let fixed = absolutize(&src, root).unwrap_or(src);
        img.attrs.insert("src".to_string(), fixed);
    }
    img
}

/// Fix destinations of markdown image syntax.
pub(crate) fn fix_markdown<'a>(markdown: &'a str, root: &Url) -> Cow<'a, str> {
    consts::MARKDOWN_IMAGE_REGEX.replace_all(markdown, |caps: &Captures<'_>| {
        let src = absolutize(&caps["src"], root).unwrap_or_else(|| caps["src"].to_string());
        let title = caps.name("title").map_or("", |title| title.as_str());
        format!("![{}]({}{})", &caps["alt"], src, title)
    })
}
