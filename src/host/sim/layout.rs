//! Block layout for bounding rectangles.
//!
//! Every rendered element is a full-width block stacked below its previous
//! sibling. Height comes from `style="height: Npx"`, the `height`
//! attribute, a 150px default for replaced elements, or the sum of the
//! children. Widths follow the same rule with the viewport width as the
//! default. Rectangles are in document coordinates.

use super::style;
use super::tree::{Document, NodeId};
use crate::core::Rect;
use crate::utils::html::is_replaced_element;
use rustc_hash::FxHashMap;

/// Default box height of replaced elements (img, video, ...).
pub(crate) const REPLACED_HEIGHT: f64 = 150.0;

/// Elements that never generate a box.
fn is_hidden_tag(tag: &str) -> bool {
    matches!(
        tag,
        "head" | "script" | "style" | "link" | "meta" | "title" | "template" | "source" | "track"
    )
}

/// Lay out the whole document.
pub(crate) fn layout(doc: &Document, width: f64) -> FxHashMap<NodeId, Rect> {
    let mut rects = FxHashMap::default();
    place(doc, doc.root(), 0.0, width, &mut rects);
    rects
}

fn dimension(doc: &Document, node: NodeId, name: &str) -> Option<f64> {
    let from_style = doc
        .attr(node, "style")
        .map(|decls| style::get(decls, name))
        .and_then(|value| style::parse_px(&value));
    from_style.or_else(|| doc.attr(node, name).and_then(style::parse_px))
}

/// Place `node` at `y` and return its height.
fn place(doc: &Document, node: NodeId, y: f64, width: f64, rects: &mut FxHashMap<NodeId, Rect>) -> f64 {
    let Some(tag) = doc.tag(node) else {
        return 0.0;
    };
    let hidden = doc
        .attr(node, "style")
        .is_some_and(|decls| style::get(decls, "display") == "none");
    if hidden || is_hidden_tag(tag) {
        return 0.0;
    }

    let own_width = dimension(doc, node, "width").unwrap_or(width);
    let mut cursor = y;
    for child in doc.children(node) {
        cursor += place(doc, *child, cursor, own_width, rects);
    }

    let height = dimension(doc, node, "height").unwrap_or(if is_replaced_element(tag) {
        REPLACED_HEIGHT
    } else {
        cursor - y
    });
    rects.insert(node, Rect::from_xywh(0.0, y, own_width, height));
    height
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::sim::parse::parse_fragment;

    fn page(html: &str) -> (Document, Vec<NodeId>) {
        let mut doc = Document::new();
        let nodes = parse_fragment(&mut doc, html);
        for node in &nodes {
            doc.append(doc.body(), *node);
        }
        (doc, nodes)
    }

    #[test]
    fn test_blocks_stack_vertically() {
        let (doc, nodes) = page(r#"<div height="1000"></div><img src="a.jpg"><p style="height: 40px"></p>"#);
        let rects = layout(&doc, 1024.0);

        assert_eq!(rects[&nodes[0]], Rect::from_xywh(0.0, 0.0, 1024.0, 1000.0));
        assert_eq!(rects[&nodes[1]].top, 1000.0);
        assert_eq!(rects[&nodes[1]].height(), REPLACED_HEIGHT);
        assert_eq!(rects[&nodes[2]].top, 1150.0);
        assert_eq!(rects[&doc.body()].height(), 1190.0);
    }

    #[test]
    fn test_containers_wrap_children() {
        let (doc, nodes) = page(r#"<section><img><img height="20"></section>"#);
        let rects = layout(&doc, 800.0);
        assert_eq!(rects[&nodes[0]].height(), 170.0);
        assert_eq!(rects[&nodes[0]].width(), 800.0);
    }

    #[test]
    fn test_hidden_elements_have_no_box() {
        let (doc, nodes) = page(r#"<script src="a.js"></script><div style="display: none"><img></div><img>"#);
        let rects = layout(&doc, 800.0);
        assert!(!rects.contains_key(&nodes[0]));
        assert!(!rects.contains_key(&nodes[1]));
        assert_eq!(rects[&nodes[2]].top, 0.0);
    }
}
