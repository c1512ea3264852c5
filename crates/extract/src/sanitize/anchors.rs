use super::tree::{self, Element, Node};
use crate::consts;

/// Anchors pointing here are removed, leaving their siblings.
const JUNK_HREFS: [&str; 2] = ["cdn-cgi/l/email-protection", "#respond"];
/// Anchors pointing here are replaced by their content.
const VOID_HREFS: [&str; 3] = ["javascript:void(0)", "#fn-", "#easy-footnote"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Keep,
    Unwrap,
    Remove,
    RemoveBlock,
}

/// Signals that the nearest enclosing block must be dropped.
struct RemoveBlock;

/// Apply the anchor rules to a flattened fragment.
///
/// Top-level inline nodes render as a single paragraph, so a donation link
/// among them takes the whole run with it.
pub(crate) fn purify(nodes: Vec<Node>) -> Vec<Node> {
    let mut purified = Vec::with_capacity(nodes.len());
    let mut run = Vec::new();
    for node in truncate_at_navigation(nodes) {
        match node {
            Node::Element(element) if tree::is_block(&element.name) => {
                purified.extend(purify_nodes(std::mem::take(&mut run)).unwrap_or_default());
                purified.extend(purify_nodes(vec![Node::Element(element)]).unwrap_or_default());
            },
            inline => run.push(inline),
        }
    }
    purified.extend(purify_nodes(run).unwrap_or_default());
    purified
}

fn classify(anchor: &Element) -> Verdict {
    let href = anchor.attr("href").map(str::trim).unwrap_or_default();
    if href.is_empty() {
        Verdict::Unwrap
    } else if consts::DONATION_HREF_REGEX.is_match(href) {
        Verdict::RemoveBlock
    } else if JUNK_HREFS.iter().any(|junk| href.contains(junk)) {
        Verdict::Remove
    } else if VOID_HREFS.iter().any(|void| href.contains(void)) {
        Verdict::Unwrap
    } else {
        Verdict::Keep
    }
}

fn purify_nodes(nodes: Vec<Node>) -> Result<Vec<Node>, RemoveBlock> {
    let mut purified = Vec::with_capacity(nodes.len());
    for node in nodes {
        let Node::Element(element) = node else {
            purified.push(node);
            continue;
        };
        if element.name == "a" {
            match classify(&element) {
                Verdict::RemoveBlock => return Err(RemoveBlock),
                Verdict::Remove => {},
                Verdict::Unwrap => purified.extend(purify_nodes(element.children)?),
                Verdict::Keep => purified.push(Node::Element(Element {
                    children: purify_nodes(element.children)?,
                    ..element
                })),
            }
            continue;
        }
        let block = tree::is_block(&element.name);
        match purify_nodes(element.children) {
            Ok(children) => purified.push(Node::Element(Element { children, ..element })),
            Err(_) if block => {},
            Err(remove) => return Err(remove),
        }
    }
    Ok(purified)
}

/// Drop the first top-level node containing navigation once the chapter has
/// started, and everything after it. Navigation above the chapter's text is
/// dropped on its own.
fn truncate_at_navigation(nodes: Vec<Node>) -> Vec<Node> {
    let mut kept = Vec::with_capacity(nodes.len());
    let mut started = false;
    for node in nodes {
        if contains_navigation(&node) {
            if started {
                break;
            }
            continue;
        }
        let content = is_content(&node);
        // Separators left between leading navigation links.
        if !started && !content && matches!(node, Node::Text(_)) {
            continue;
        }
        started |= content;
        kept.push(node);
    }
    kept
}

fn is_content(node: &Node) -> bool {
    let has_words = |text: &str| text.chars().any(char::is_alphanumeric);
    match node {
        Node::Text(text) => has_words(text),
        Node::Element(element) => {
            !matches!(element.name.as_str(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6") && has_words(&element.text())
        },
    }
}

fn contains_navigation(node: &Node) -> bool {
    match node {
        Node::Element(element) if element.name == "a" => consts::NAVIGATION_TEXT_REGEX.is_match(element.text().trim()),
        Node::Element(element) => element.children.iter().any(contains_navigation),
        Node::Text(_) => false,
    }
}
