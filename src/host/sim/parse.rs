//! HTML fragment parsing with `tl`.

use super::tree::{Document, NodeId};
use crate::utils::html::{is_raw_text_element, open_tag_attributes, parse_attributes, unescape};

/// Parse `html` into detached nodes owned by `doc`, returning the
/// top-level nodes in order.
pub(crate) fn parse_fragment(doc: &mut Document, html: &str) -> Vec<NodeId> {
    let Ok(dom) = tl::parse(html, tl::ParserOptions::default()) else {
        // Unparsable markup is kept as text
        return vec![doc.create_text(html)];
    };

    let parser = dom.parser();
    dom.children()
        .iter()
        .filter_map(|handle| convert(doc, *handle, parser, false))
        .collect()
}

fn convert(
    doc: &mut Document,
    handle: tl::NodeHandle,
    parser: &tl::Parser,
    raw_text: bool,
) -> Option<NodeId> {
    match handle.get(parser)? {
        tl::Node::Tag(tag) => {
            let tag_name = tag.name().as_utf8_str().to_ascii_lowercase();
            let id = doc.create_element(&tag_name);

            // Attributes come from the raw tag text: tl's attribute map loses
            // their order and misreads names that follow a valueless one
            let raw = tag.raw().as_utf8_str();
            for (name, value) in parse_attributes(open_tag_attributes(&raw)) {
                // First occurrence wins, as in browsers
                if doc.attr(id, &name).is_none() {
                    doc.set_attr(id, &name, &unescape(&value));
                }
            }

            let raw = is_raw_text_element(&tag_name);
            for child in tag.children().top().iter() {
                if let Some(child) = convert(doc, *child, parser, raw) {
                    doc.append(id, child);
                }
            }
            Some(id)
        }
        tl::Node::Raw(bytes) => {
            let text = bytes.as_utf8_str();
            if raw_text {
                Some(doc.create_text(&text))
            } else {
                Some(doc.create_text(&unescape(&text)))
            }
        }
        tl::Node::Comment(bytes) => {
            let text = bytes.as_utf8_str();
            let body = text
                .strip_prefix("<!--")
                .and_then(|t| t.strip_suffix("-->"))
                .unwrap_or(&text);
            Some(doc.create_comment(body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_fragment() {
        let mut doc = Document::new();
        let nodes = parse_fragment(
            &mut doc,
            r#"<section id="s"><img data-lazy="a.jpg&amp;w=2"><p>hi &amp; bye</p></section>"#,
        );
        assert_eq!(nodes.len(), 1);
        let section = nodes[0];
        assert_eq!(doc.tag(section), Some("section"));
        assert_eq!(doc.children(section).len(), 2);

        let img = doc.children(section)[0];
        assert_eq!(doc.attr(img, "data-lazy"), Some("a.jpg&w=2"));
        assert_eq!(
            doc.inner_html(section),
            "<img data-lazy=\"a.jpg&amp;w=2\"><p>hi &amp; bye</p>"
        );
    }

    #[test]
    fn test_parse_sibling_nodes() {
        let mut doc = Document::new();
        let nodes = parse_fragment(&mut doc, "<p>one</p>and<div>two</div>");
        assert_eq!(nodes.len(), 3);
        assert!(doc.is_element(nodes[0]));
        assert!(!doc.is_element(nodes[1]));
        assert_eq!(doc.tag(nodes[2]), Some("div"));
    }

    #[test]
    fn test_parse_valueless_attributes_in_any_position() {
        let mut doc = Document::new();
        let nodes = parse_fragment(
            &mut doc,
            concat!(
                r#"<script async id="an" data-lazy="/js/analytics.js" data-lazy-delay="50"></script>"#,
                r#"<video controls src="clip.mp4" muted></video>"#,
                r#"<img src="a.jpg" hidden>"#,
                r#"<input disabled>"#,
            ),
        );
        assert_eq!(nodes.len(), 4);

        assert_eq!(
            doc.attr_names(nodes[0]),
            vec!["async", "id", "data-lazy", "data-lazy-delay"]
        );
        assert_eq!(doc.attr(nodes[0], "async"), Some(""));
        assert_eq!(doc.attr(nodes[0], "data-lazy"), Some("/js/analytics.js"));

        assert_eq!(doc.attr_names(nodes[1]), vec!["controls", "src", "muted"]);
        assert_eq!(doc.attr(nodes[1], "src"), Some("clip.mp4"));

        assert_eq!(doc.attr_names(nodes[2]), vec!["src", "hidden"]);
        assert_eq!(doc.attr_names(nodes[3]), vec!["disabled"]);
    }

    #[test]
    fn test_parse_keeps_first_duplicate_and_quoted_brackets() {
        let mut doc = Document::new();
        let nodes = parse_fragment(&mut doc, r#"<img alt="a > b" src="1.jpg" src="2.jpg">"#);
        assert_eq!(doc.attr(nodes[0], "alt"), Some("a > b"));
        assert_eq!(doc.attr(nodes[0], "src"), Some("1.jpg"));
    }

    #[test]
    fn test_parse_lowercases_names() {
        let mut doc = Document::new();
        let nodes = parse_fragment(&mut doc, r#"<IMG SRC="x.jpg">"#);
        assert_eq!(doc.tag(nodes[0]), Some("img"));
        assert_eq!(doc.attr(nodes[0], "src"), Some("x.jpg"));
    }
}
