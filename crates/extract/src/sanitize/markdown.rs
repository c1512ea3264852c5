//! The Markdown leg of the round trip.
//!
//! Block structure is read off the tree rather than recovered from line
//! breaks, and text is escaped so that rendering it gives back the same text.
//! Anything rendered from this Markdown converts back to the same Markdown.

use super::tree::{self, Element, Node};
use pulldown_cmark::{Options, Parser, html};
use std::fmt::Write;

pub(crate) fn to_markdown(nodes: &[Node]) -> String {
    blocks(nodes).join("\n\n")
}

pub(crate) fn to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH);
    let mut output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}

/// Render `nodes` as Markdown blocks. Runs of inline nodes become paragraphs.
fn blocks(nodes: &[Node]) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut paragraph = Inline::new(true);
    // Adjacent lists alternate markers, or they would merge into one.
    let mut previous_marker = None;
    for node in nodes {
        let element = match node {
            Node::Element(element) if tree::is_block(&element.name) => element,
            inline => {
                paragraph.node(inline);
                continue;
            },
        };
        let (rendered, marker) = match element.name.as_str() {
            "ul" | "ol" => {
                let marker = list_marker(&element.name, previous_marker);
                (list(element, marker), Some(marker))
            },
            _ => (block(element), None),
        };
        let Some(rendered) = rendered else {
            paragraph.gap(Gap::Newline);
            continue;
        };
        if let Some(text) = paragraph.take() {
            blocks.push(text);
        }
        blocks.push(rendered);
        previous_marker = marker;
    }
    blocks.extend(paragraph.take());
    blocks
}

fn block(element: &Element) -> Option<String> {
    match element.name.as_str() {
        "p" => inline(&element.children, true),
        name @ ("h1" | "h2" | "h3" | "h4" | "h5" | "h6") => {
            let level = usize::from(name.as_bytes()[1] - b'0');
            inline(&element.children, false).map(|text| format!("{} {text}", "#".repeat(level)))
        },
        "hr" => Some("***".to_string()),
        "pre" => code_block(element),
        "blockquote" => {
            let quoted = blocks(&element.children).join("\n\n");
            (!quoted.is_empty()).then(|| indent(&quoted, "> ", "> "))
        },
        "table" => table(element),
        _ => Some(blocks(&element.children).join("\n\n")).filter(|inner| !inner.is_empty()),
    }
}

fn inline(nodes: &[Node], breaks: bool) -> Option<String> {
    let mut inline = Inline::new(breaks);
    inline.nodes(nodes);
    inline.take()
}

fn list_marker(name: &str, previous: Option<char>) -> char {
    match (name, previous) {
        ("ul", Some('-')) => '*',
        ("ul", _) => '-',
        (_, Some('.')) => ')',
        _ => '.',
    }
}

fn list(list: &Element, marker: char) -> Option<String> {
    let items: Vec<Vec<String>> = list
        .children
        .iter()
        .map(|item| match item {
            Node::Element(item) => blocks(&item.children),
            text => blocks(std::slice::from_ref(text)),
        })
        .filter(|item| !item.is_empty())
        .collect();
    if items.is_empty() {
        return None;
    }
    // A paragraph in any item makes the whole list loose.
    let loose = list.children.iter().any(|item| match item {
        Node::Element(item) => item.children.iter().any(|child| matches!(child, Node::Element(p) if p.name == "p")),
        Node::Text(_) => false,
    });
    let separator = if loose { "\n\n" } else { "\n" };
    let start: u64 = list.attr("start").and_then(|start| start.trim().parse().ok()).unwrap_or(1);

    let items: Vec<String> = items
        .iter()
        .zip(start..)
        .map(|(blocks, number)| {
            let bullet = match marker {
                '-' | '*' => format!("{marker} "),
                _ => format!("{number}{marker} "),
            };
            indent(&blocks.join(separator), &bullet, &" ".repeat(bullet.len()))
        })
        .collect();
    Some(items.join(separator))
}

/// Prefix the first line with `first` and the rest with `rest`. Blank lines
/// only get the prefix's non-whitespace part.
fn indent(text: &str, first: &str, rest: &str) -> String {
    let mut indented = String::with_capacity(text.len() + first.len());
    for (i, line) in text.split('\n').enumerate() {
        let prefix = if i == 0 { first } else { rest };
        if i > 0 {
            indented.push('\n');
        }
        if line.is_empty() {
            indented.push_str(prefix.trim_end());
        } else {
            indented.push_str(prefix);
            indented.push_str(line);
        }
    }
    indented
}

fn code_block(pre: &Element) -> Option<String> {
    let text = pre.text();
    let code = text.strip_suffix('\n').unwrap_or(&text);
    if code.trim().is_empty() {
        return None;
    }
    let language = pre
        .children
        .iter()
        .find_map(|child| match child {
            Node::Element(code) if code.name == "code" => code.attr("class"),
            _ => None,
        })
        .and_then(|class| class.split_whitespace().find_map(|class| class.strip_prefix("language-")))
        .filter(|language| !language.is_empty() && !language.contains('`'))
        .unwrap_or_default();
    let fence = "`".repeat(longest_run(code, '`').max(2) + 1);
    Some(format!("{fence}{language}\n{code}\n{fence}"))
}

fn table(table: &Element) -> Option<String> {
    let rows: Vec<Vec<String>> = table_rows(table)
        .into_iter()
        .map(|row| {
            row.children
                .iter()
                .filter_map(|cell| match cell {
                    Node::Element(cell) if cell.name == "td" || cell.name == "th" => {
                        Some(inline(&cell.children, false).unwrap_or_default())
                    },
                    _ => None,
                })
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();
    let columns = rows.iter().map(Vec::len).max()?;
    if rows.iter().flatten().all(String::is_empty) {
        return None;
    }
    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (i, row) in rows.iter().enumerate() {
        let cells: Vec<&str> = (0..columns).map(|column| row.get(column).map_or("", String::as_str)).collect();
        lines.push(format!("| {} |", cells.join(" | ")));
        if i == 0 {
            lines.push(format!("|{}", " --- |".repeat(columns)));
        }
    }
    Some(lines.join("\n"))
}

fn table_rows(table: &Element) -> Vec<&Element> {
    let mut rows: Vec<&Element> = rows_of(table).collect();
    for child in &table.children {
        if let Node::Element(section) = child
            && matches!(section.name.as_str(), "thead" | "tbody" | "tfoot")
        {
            rows.extend(rows_of(section));
        }
    }
    rows
}

fn rows_of(parent: &Element) -> impl Iterator<Item = &Element> {
    parent.children.iter().filter_map(|row| match row {
        Node::Element(row) if row.name == "tr" => Some(row),
        _ => None,
    })
}

fn longest_run(text: &str, c: char) -> usize {
    text.split(|other: char| other != c).map(str::len).max().unwrap_or(0)
}

/// Whitespace owed before the next piece of inline content, strongest wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
enum Gap {
    #[default]
    None,
    Space,
    Newline,
    Break,
}

/// Inline Markdown writer. Whitespace is held back until more content
/// follows, so nothing leads or trails.
#[derive(Debug, Default)]
struct Inline {
    out: String,
    pending: Gap,
    /// Whitespace seen before any content.
    leading: Gap,
    /// Whether line breaks are allowed; headings and table cells are one line.
    breaks: bool,
    in_link: bool,
}
impl Inline {
    fn new(breaks: bool) -> Self {
        Self { breaks, ..Self::default() }
    }

    fn nested(&self) -> Self {
        Self { breaks: self.breaks, in_link: self.in_link, ..Self::default() }
    }

    fn take(&mut self) -> Option<String> {
        self.pending = Gap::None;
        self.leading = Gap::None;
        let out = std::mem::take(&mut self.out);
        (!out.is_empty()).then_some(out)
    }

    fn gap(&mut self, gap: Gap) {
        let gap = match gap {
            Gap::Newline | Gap::Break if !self.breaks => Gap::Space,
            gap => gap,
        };
        self.pending = self.pending.max(gap);
    }

    fn flush(&mut self) {
        let gap = std::mem::take(&mut self.pending);
        if self.out.is_empty() {
            self.leading = self.leading.max(gap);
            return;
        }
        match gap {
            Gap::None => {},
            Gap::Space => self.out.push(' '),
            Gap::Newline => self.out.push('\n'),
            Gap::Break => self.out.push_str("\\\n"),
        }
    }

    fn push(&mut self, markdown: &str) {
        self.flush();
        self.out.push_str(markdown);
    }

    fn nodes(&mut self, nodes: &[Node]) {
        nodes.iter().for_each(|node| self.node(node));
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::Text(text) => self.text(text),
            Node::Element(element) => self.element(element),
        }
    }

    fn element(&mut self, element: &Element) {
        match element.name.as_str() {
            "br" => self.gap(Gap::Break),
            "img" => self.image(element),
            "a" => self.link(element),
            "em" | "i" => self.emphasis(element, "*", "em"),
            "strong" | "b" => self.emphasis(element, "**", "strong"),
            "del" | "s" | "strike" => self.emphasis(element, "~~", "del"),
            "code" => self.code(&element.text()),
            name if tree::is_block(name) => {
                self.gap(Gap::Newline);
                self.nodes(&element.children);
                self.gap(Gap::Newline);
            },
            name if tree::is_void(name) => {},
            _ => self.raw(element),
        }
    }

    fn text(&mut self, text: &str) {
        for c in text.chars() {
            match c {
                '\n' => self.gap(Gap::Newline),
                c if c.is_ascii_whitespace() => self.gap(Gap::Space),
                c => {
                    self.flush();
                    self.escaped(c);
                },
            }
        }
    }

    fn escaped(&mut self, c: char) {
        match c {
            '\\' | '`' | '*' | '_' | '[' | ']' | '~' | '|' | '#' | '+' | '-' | '=' | '!' => {
                self.out.push('\\');
                self.out.push(c);
            },
            // "1." and "1)" open ordered lists.
            '.' | ')' if self.out.ends_with(|last: char| last.is_ascii_digit()) => {
                self.out.push('\\');
                self.out.push(c);
            },
            '<' => self.out.push_str("&lt;"),
            '>' => self.out.push_str("&gt;"),
            '&' => self.out.push_str("&amp;"),
            '\u{a0}' => self.out.push_str("&nbsp;"),
            c => self.out.push(c),
        }
    }

    /// Surround rendered content, moving its outer whitespace outside.
    fn enclose(&mut self, inner: Inline, open: &str, close: &str) {
        self.gap(inner.leading);
        if !inner.out.is_empty() {
            self.flush();
            self.out.push_str(open);
            self.out.push_str(&inner.out);
            self.out.push_str(close);
        }
        self.gap(inner.pending);
    }

    fn render(&self, nodes: &[Node]) -> Self {
        let mut inner = self.nested();
        inner.nodes(nodes);
        inner
    }

    fn emphasis(&mut self, element: &Element, delimiter: &str, tag: &str) {
        let inner = self.render(&element.children);
        let word = |c: Option<char>| c.is_some_and(char::is_alphanumeric);
        let flanked = word(inner.out.chars().next()) && word(inner.out.chars().last());
        let adjacent = inner.leading == Gap::None
            && self.pending == Gap::None
            && self.out.ends_with(|last: char| last == '*' || last == '~');
        // Delimiters only pair up against word characters; otherwise keep the tag.
        if flanked && !adjacent {
            self.enclose(inner, delimiter, delimiter);
        } else {
            self.enclose(inner, &format!("<{tag}>"), &format!("</{tag}>"));
        }
    }

    fn link(&mut self, anchor: &Element) {
        let href = anchor.attr("href").map(str::trim).unwrap_or_default();
        if self.in_link || href.is_empty() {
            self.nodes(&anchor.children);
            return;
        }
        let mut inner = self.nested();
        inner.in_link = true;
        inner.nodes(&anchor.children);
        let close = format!("]({})", destination(href, anchor.attr("title")));
        self.enclose(inner, "[", &close);
    }

    fn image(&mut self, img: &Element) {
        let Some(src) = img.attr("src").map(str::trim).filter(|src| !src.is_empty()) else {
            return;
        };
        let mut alt = Inline::new(false);
        alt.text(img.attr("alt").unwrap_or_default());
        let alt = alt.take().unwrap_or_default();
        self.push(&format!("![{alt}]({})", destination(src, img.attr("title"))));
    }

    fn code(&mut self, code: &str) {
        // Code spans turn line endings into spaces anyway.
        let code = code.replace(['\n', '\r'], " ");
        if code.trim().is_empty() {
            self.gap(Gap::Space);
            return;
        }
        let fence = "`".repeat(longest_run(&code, '`') + 1);
        let padded = code.starts_with('`') || code.ends_with('`') || (code.starts_with(' ') && code.ends_with(' '));
        let pad = if padded { " " } else { "" };
        self.push(&format!("{fence}{pad}{code}{pad}{fence}"));
    }

    /// Elements Markdown has no syntax for pass through as inline HTML.
    fn raw(&mut self, element: &Element) {
        let inner = self.render(&element.children);
        if !is_tag_name(&element.name) {
            self.enclose(inner, "", "");
            return;
        }
        let tag = Element {
            name: element.name.clone(),
            attrs: element
                .attrs
                .iter()
                .filter(|(name, _)| is_tag_name(name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            children: Vec::new(),
        };
        let mut open = String::new();
        tree::write_open_tag(&tag, &mut open);
        self.enclose(inner, &open, &format!("</{}>", element.name));
    }
}

fn is_tag_name(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_alphabetic()) && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// A link or image destination, with an optional title.
fn destination(url: &str, title: Option<&str>) -> String {
    let mut destination = String::with_capacity(url.len());
    for c in url.trim().chars() {
        match c {
            ' ' => destination.push_str("%20"),
            '\t' | '\n' | '\r' => {},
            '<' => destination.push_str("%3C"),
            '>' => destination.push_str("%3E"),
            '(' => destination.push_str("%28"),
            ')' => destination.push_str("%29"),
            '\\' => destination.push_str("%5C"),
            '&' => destination.push_str("&amp;"),
            c => destination.push(c),
        }
    }
    if let Some(title) = title.map(str::trim).filter(|title| !title.is_empty()) {
        let title = title
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('&', "&amp;")
            .replace('\n', " ");
        let _ = write!(destination, " \"{title}\"");
    }
    destination
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::tree::parse_fragment;
    use rstest::rstest;

    fn markdown(html: &str) -> String {
        to_markdown(&parse_fragment(html))
    }

    #[test]
    fn images_render_with_alt() {
        assert_eq!(
            to_html("![alt](https://site.com/img/a.png)"),
            "<p><img src=\"https://site.com/img/a.png\" alt=\"alt\" /></p>\n"
        );
    }

    #[rstest]
    #[case::paragraphs("<p>one</p>\n<p>two</p>", "one\n\ntwo")]
    #[case::soft_breaks("<p>one\n   two</p>", "one\ntwo")]
    #[case::hard_breaks("<p>one<br>\ntwo</p>", "one\\\ntwo")]
    #[case::emphasis("<p>Some <em>quiet</em> <b>loud</b> words.</p>", "Some *quiet* **loud** words.")]
    #[case::emphasis_whitespace("<p>a<em> b </em>c</p>", "a *b* c")]
    #[case::emphasis_punctuation(r#"<p>x<em>"a"</em></p>"#, r#"x<em>"a"</em>"#)]
    #[case::list_markers("<p>1. not a list</p><p># x</p>", "1\\. not a list\n\n\\# x")]
    #[case::entities("<p>a&nbsp;b &amp; c &lt; d</p>", "a&nbsp;b &amp; c &lt; d")]
    #[case::headings("<h2>Chapter 4</h2>", "## Chapter 4")]
    #[case::links(
        r#"<p><a href="/a b" title="T">x</a></p>"#,
        r#"[x](/a%20b "T")"#
    )]
    #[case::raw_inline("<p>a<sup class=\"n\">1</sup></p>", "a<sup class=\"n\">1</sup>")]
    #[case::code_span("<p>run <code>a`b</code></p>", "run ``a`b``")]
    #[case::code_block(
        "<pre><code class=\"language-rust\">let x = 1;\n  y</code></pre>",
        "```rust\nlet x = 1;\n  y\n```"
    )]
    #[case::blockquote("<blockquote><p>q</p><p>r</p></blockquote>", "> q\n>\n> r")]
    #[case::nested_list("<ul><li>a<ul><li>b</li></ul></li><li>c</li></ul>", "- a\n  - b\n- c")]
    #[case::loose_list("<ol start=\"3\"><li><p>a</p></li><li><p>b</p></li></ol>", "3. a\n\n4. b")]
    #[case::adjacent_lists("<ul><li>a</li></ul><ul><li>b</li></ul>", "- a\n\n* b")]
    #[case::rule("<p>a</p><hr><p>b</p>", "a\n\n***\n\nb")]
    #[case::table(
        "<table><tr><th>a</th><th>b</th></tr><tr><td>1</td></tr></table>",
        "| a | b |\n| --- | --- |\n| 1 |  |"
    )]
    #[case::empty_blocks("<p> </p><pre></pre><ul><li></li></ul><p>x</p>", "x")]
    fn converts(#[case] html: &str, #[case] expected: &str) {
        assert_eq!(markdown(html), expected);
    }

    #[test]
    fn stray_inline_content_is_one_paragraph() {
        assert_eq!(markdown("text <em>here</em><br>more<p>after</p>"), "text *here*\\\nmore\n\nafter");
    }
}
