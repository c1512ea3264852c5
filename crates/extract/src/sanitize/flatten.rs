use super::tree::{Element, Node};

/// Structural wrappers whose children are promoted in their place.
const UNWRAP: [&str; 16] = [
    "html", "body", "div", "section", "article", "main", "header", "footer", "aside", "figure", "span", "font",
    "center", "picture", "ins", "o:p",
];
/// Elements removed along with everything inside them.
const DROP: [&str; 15] = [
    "head", "script", "style", "noscript", "iframe", "form", "button", "input", "select", "textarea", "svg",
    "nav", "template", "object", "canvas",
];

/// Depth-first walk that unwraps structural containers, keeping their
/// content in document order.
pub(crate) fn flatten(nodes: Vec<Node>) -> Vec<Node> {
    nodes.into_iter().flat_map(flatten_node).collect()
}

fn flatten_node(node: Node) -> Vec<Node> {
    match node {
        Node::Text(_) => vec![node],
        Node::Element(element) if DROP.contains(&element.name.as_str()) => Vec::new(),
        Node::Element(element) if UNWRAP.contains(&element.name.as_str()) => flatten(element.children),
        Node::Element(element) => vec![Node::Element(Element {
            children: flatten(element.children),
            ..element
        })],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::tree::{parse_fragment, to_html};
    use rstest::rstest;

    #[rstest]
    #[case::nested_divs("<div><div><p>a</p></div><p>b</p></div>", "<p>a</p>\n<p>b</p>")]
    #[case::spans_in_paragraphs(r#"<p><span style="x">a</span> <font>b</font></p>"#, "<p>a b</p>")]
    #[case::scripts_dropped("<div><script>alert(1)</script><p>a</p></div>", "<p>a</p>")]
    #[case::leaf_kept("<blockquote><div><p>q</p></div></blockquote>", "<blockquote><p>q</p></blockquote>")]
    fn flattens(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(to_html(&flatten(parse_fragment(input))), expected);
    }

    #[test]
    fn does_not_touch_input() {
        let tree = parse_fragment("<div><p>a</p></div>");
        let flattened = flatten(tree.clone());
        assert_ne!(tree, flattened);
        assert_eq!(to_html(&tree), "<div><p>a</p></div>");
    }
}
