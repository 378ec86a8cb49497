//! Arena document tree.

use super::style;
use crate::utils::html::{escape, escape_attr, is_raw_text_element, is_void_element};
use smallvec::SmallVec;

/// Handle to a node of a [`SimPage`](super::SimPage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

pub(crate) type Attrs = SmallVec<[(String, String); 4]>;

#[derive(Debug)]
pub(crate) struct ElementData {
    pub tag: String,
    pub attrs: Attrs,
}

#[derive(Debug)]
pub(crate) enum NodeData {
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug)]
pub(crate) struct Node {
    pub data: NodeData,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Nodes are never freed; detached subtrees stay addressable.
#[derive(Debug)]
pub(crate) struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
        };
        doc.root = doc.create_element("html");
        doc.head = doc.create_element("head");
        doc.body = doc.create_element("body");
        doc.append(doc.root, doc.head);
        doc.append(doc.root, doc.body);
        doc
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn head(&self) -> NodeId {
        self.head
    }

    #[inline]
    pub fn body(&self) -> NodeId {
        self.body
    }

    // ========================================================================
    // Creation
    // ========================================================================

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: Attrs::new(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Comment(text.to_string()))
    }

    // ========================================================================
    // Access
    // ========================================================================

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes.get(id.0)?.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(id.0)?.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    #[inline]
    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Attached to the document root through its ancestors.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Descendants of `id` in document order, `id` excluded.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(el) = self.element_mut(id) else {
            return;
        };
        let name = name.to_ascii_lowercase();
        match el.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => el.attrs.push((name, value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> bool {
        let Some(el) = self.element_mut(id) else {
            return false;
        };
        let before = el.attrs.len();
        el.attrs.retain(|(key, _)| key != name);
        el.attrs.len() != before
    }

    pub fn attr_names(&self, id: NodeId) -> Vec<String> {
        self.element(id)
            .map(|el| el.attrs.iter().map(|(key, _)| key.clone()).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|list| list.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if self.has_class(id, class) || !self.is_element(id) {
            return;
        }
        let list = match self.attr(id, "class").map(str::trim) {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.set_attr(id, "class", &list);
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        if !self.has_class(id, class) {
            return;
        }
        let list = self
            .attr(id, "class")
            .unwrap_or_default()
            .split_whitespace()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attr(id, "class", &list);
    }

    pub fn style(&self, id: NodeId, property: &str) -> String {
        self.attr(id, "style")
            .map(|decls| style::get(decls, property))
            .unwrap_or_default()
    }

    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) {
        let decls = style::set(self.attr(id, "style").unwrap_or_default(), property, value);
        self.set_attr(id, "style", &decls);
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Detach `id` from its parent, if any.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        self.nodes[parent.0].children.retain(|child| *child != id);
        self.nodes[id.0].parent = None;
    }

    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Insert `child` into `parent` at `index`, clamped to the child count.
    pub fn insert_at(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(id)?;
        let index = self.children(parent).iter().position(|child| *child == id)?;
        Some((parent, index))
    }

    /// Detach every child of `id`.
    pub fn clear_children(&mut self, id: NodeId) {
        for child in std::mem::take(&mut self.nodes[id.0].children) {
            self.nodes[child.0].parent = None;
        }
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        let raw = self.tag(id).is_some_and(is_raw_text_element);
        for child in self.children(id) {
            self.write_node(*child, raw, &mut out);
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, false, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, raw_text: bool, out: &mut String) {
        match &self.node(id).data {
            NodeData::Text(text) if raw_text => out.push_str(text),
            NodeData::Text(text) => out.push_str(&escape(text)),
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (key, value) in &el.attrs {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
                out.push('>');
                if is_void_element(&el.tag) {
                    return;
                }
                out.push_str(&self.inner_html(id));
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skeleton() {
        let doc = Document::new();
        assert_eq!(
            doc.outer_html(doc.root()),
            "<html><head></head><body></body></html>"
        );
        assert!(doc.is_connected(doc.body()));
    }

    #[test]
    fn test_insert_and_detach() {
        let mut doc = Document::new();
        let a = doc.create_element("p");
        let b = doc.create_element("span");
        doc.append(doc.body(), a);
        doc.insert_at(doc.body(), 0, b);
        assert_eq!(doc.inner_html(doc.body()), "<span></span><p></p>");
        assert_eq!(doc.index_in_parent(a), Some((doc.body(), 1)));

        doc.detach(b);
        assert!(!doc.is_connected(b));
        assert_eq!(doc.inner_html(doc.body()), "<p></p>");
    }

    #[test]
    fn test_class_list() {
        let mut doc = Document::new();
        let el = doc.create_element("img");
        doc.add_class(el, "autolazy");
        doc.add_class(el, "lazy-loading");
        doc.add_class(el, "autolazy");
        assert_eq!(doc.attr(el, "class"), Some("autolazy lazy-loading"));

        doc.remove_class(el, "autolazy");
        assert_eq!(doc.attr(el, "class"), Some("lazy-loading"));
        assert!(doc.has_class(el, "lazy-loading"));
        assert!(!doc.has_class(el, "lazy"));
    }

    #[test]
    fn test_serialization_escapes() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        doc.set_attr(p, "title", "a \"b\"");
        let text = doc.create_text("1 < 2");
        doc.append(p, text);
        assert_eq!(doc.outer_html(p), "<p title=\"a &quot;b&quot;\">1 &lt; 2</p>");

        let script = doc.create_element("script");
        let code = doc.create_text("if (a < b) {}");
        doc.append(script, code);
        assert_eq!(doc.inner_html(script), "if (a < b) {}");
    }
}
