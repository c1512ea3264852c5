//! Owned HTML tree the sanitizer passes operate on.
//!
//! Parsing goes through `scraper`, but its tree is immutable; every pass
//! here consumes a `Vec<Node>` and produces a new one.

use scraper::Html;
use std::collections::BTreeMap;
use std::fmt::Write;

const VOID_ELEMENTS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];
/// Containers in which whitespace-only text carries no meaning.
const BLOCK_CONTAINERS: [&str; 10] = ["blockquote", "ul", "ol", "dl", "table", "thead", "tbody", "tfoot", "tr", "hr"];
/// Elements that start a new block rather than flowing with text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "blockquote", "caption", "dd", "details", "div", "dl", "dt", "fieldset", "figcaption", "h1", "h2",
    "h3", "h4", "h5", "h6", "hr", "legend", "li", "menu", "ol", "p", "pre", "summary", "table", "tbody", "td",
    "tfoot", "th", "thead", "tr", "ul",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Element {
    pub name: String,
    /// Sorted, so serialization is deterministic.
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<Node>,
}
impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Concatenated text of all descendants.
    pub fn text(&self) -> String {
        let mut text = String::new();
        collect_text(&self.children, &mut text);
        text
    }
}

pub(crate) fn is_block(name: &str) -> bool {
    BLOCK_ELEMENTS.contains(&name)
}

pub(crate) fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

fn collect_text(nodes: &[Node], text: &mut String) {
    for node in nodes {
        match node {
            Node::Text(content) => text.push_str(content),
            Node::Element(element) => collect_text(&element.children, text),
        }
    }
}

pub(crate) fn parse_fragment(html: &str) -> Vec<Node> {
    let fragment = Html::parse_fragment(html);
    let root = fragment.root_element();
    prune_whitespace(convert_children(*root), true)
}

fn convert_children(node: ego_tree::NodeRef<'_, scraper::Node>) -> Vec<Node> {
    node.children()
        .filter_map(|child| match child.value() {
            scraper::Node::Text(text) => Some(Node::Text((**text).to_owned())),
            scraper::Node::Element(element) => Some(Node::Element(Element {
                name: element.name().to_string(),
                attrs: element.attrs().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                children: convert_children(child),
            })),
            // Comments, doctypes and processing instructions never survive.
            _ => None,
        })
        .collect()
}

/// Drop whitespace-only text at the top level and directly inside block
/// containers, recursively.
fn prune_whitespace(nodes: Vec<Node>, block_context: bool) -> Vec<Node> {
    nodes
        .into_iter()
        .filter_map(|node| match node {
            Node::Text(text) if block_context && text.trim().is_empty() => None,
            Node::Text(text) => Some(Node::Text(text)),
            Node::Element(element) => {
                let block = BLOCK_CONTAINERS.contains(&element.name.as_str());
                Some(Node::Element(Element {
                    children: prune_whitespace(element.children, block),
                    ..element
                }))
            },
        })
        .collect()
}

/// Serialize a forest, one top-level node per line.
pub(crate) fn to_html(nodes: &[Node]) -> String {
    let mut html = String::new();
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            html.push('\n');
        }
        write_node(node, &mut html);
    }
    html
}

fn write_node(node: &Node, html: &mut String) {
    match node {
        Node::Text(text) => html.push_str(&escape(text, false)),
        Node::Element(element) => {
            write_open_tag(element, html);
            if is_void(&element.name) {
                return;
            }
            for child in &element.children {
                write_node(child, html);
            }
            let _ = write!(html, "</{}>", element.name);
        },
    }
}

/// `<name attr="value">`, or `<name />` for void elements.
pub(crate) fn write_open_tag(element: &Element, html: &mut String) {
    let _ = write!(html, "<{}", element.name);
    for (name, value) in &element.attrs {
        let _ = write!(html, " {}=\"{}\"", name, escape(value, true));
    }
    html.push_str(if is_void(&element.name) { " />" } else { ">" });
}

fn escape(text: &str, attribute: bool) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' if attribute => escaped.push_str("&quot;"),
            '\u{a0}' => escaped.push_str("&nbsp;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::sorted_attributes(r#"<img src="a.png" alt="A">"#, r#"<img alt="A" src="a.png" />"#)]
    #[case::block_whitespace("<p>one</p>\n\n  <p>two</p>", "<p>one</p>\n<p>two</p>")]
    #[case::inline_whitespace("<p><em>a</em> <strong>b</strong></p>", "<p><em>a</em> <strong>b</strong></p>")]
    #[case::list_whitespace("<ul>\n<li>a</li>\n</ul>", "<ul><li>a</li></ul>")]
    #[case::escaping("<p>a &amp; b &lt; c</p>", "<p>a &amp; b &lt; c</p>")]
    #[case::comments("<p>a<!-- hidden --></p>", "<p>a</p>")]
    fn round_trip(#[case] input: &str, #[case] expected: &str) {
        let html = to_html(&parse_fragment(input));
        assert_eq!(html, expected);
        // Serialized output parses back to itself.
        assert_eq!(to_html(&parse_fragment(&html)), html);
    }

    #[test]
    fn text_collects_descendants() {
        let nodes = parse_fragment("<a href='#'>next <b>&gt;&gt;</b></a>");
        let Node::Element(anchor) = &nodes[0] else { panic!("expected element") };
        assert_eq!(anchor.text(), "next >>");
        assert_eq!(anchor.attr("href"), Some("#"));
    }
}
