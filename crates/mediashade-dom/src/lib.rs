//! # MediaShade DOM
//!
//! A live, mutable DOM tree for the MediaShade concealment engine.
//! Uses html5ever for HTML parsing and constructs a traversable tree that
//! the host can keep mutating while observers watch it.
//!
//! ## Design Goals
//!
//! 1. **Host-owned structure**: the host inserts and removes nodes; annotators only touch attributes
//! 2. **Shared-ownership tree**: `Rc` children with weak parent links, single-threaded
//! 3. **Query support**: lookup by ID, class, tag name, and declarative [`Pattern`]s
//! 4. **Mutation records**: child-list and attribute changes queued per observer
//! 5. **Ready state**: loading/interactive/complete with a watch signal

pub mod lifecycle;
pub mod mutation;
pub mod pattern;

pub use lifecycle::DocumentReadyState;
pub use mutation::{MutationKind, MutationObserver, MutationRecord, ObserveOptions, ObserverId};
pub use pattern::{AttrOp, Pattern, PatternError};

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use mutation::MutationRecorder;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Notify};
use tracing::debug;

/// Elements serialized without an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Errors that can occur in DOM operations.
#[derive(Error, Debug)]
pub enum DomError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Node not found")]
    NodeNotFound,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Unique identifier for a DOM node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Create a new NodeId.
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> usize {
        self.0
    }
}

/// Type of DOM node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeType {
    Document,
    DocumentType { name: String },
    Element { tag_name: String, namespace: String },
    Text(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
}

/// A layout box in CSS pixels, as reported by the host's renderer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A box of the given size at the origin.
    pub fn sized(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }
}

/// A DOM node.
pub struct Node {
    /// Unique ID for this node.
    pub id: NodeId,
    /// Node type and associated data.
    pub node_type: NodeType,
    /// Attributes in source order.
    attributes: RefCell<Vec<(String, String)>>,
    /// Parent node (weak reference to avoid cycles).
    parent: RefCell<Option<Weak<Node>>>,
    /// Child nodes.
    children: RefCell<Vec<Rc<Node>>>,
    /// Box supplied by the host renderer, if any.
    layout: Cell<Option<Rect>>,
    /// Mutation sink of the owning document.
    recorder: Weak<MutationRecorder>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("node_type", &self.node_type)
            .field("attributes", &self.attributes.borrow())
            .finish()
    }
}

impl Node {
    fn new(id: NodeId, node_type: NodeType, recorder: Weak<MutationRecorder>) -> Rc<Self> {
        Rc::new(Self {
            id,
            node_type,
            attributes: RefCell::new(Vec::new()),
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
            layout: Cell::new(None),
            recorder,
        })
    }

    /// Get the tag name for element nodes (always lowercase).
    pub fn tag_name(&self) -> Option<&str> {
        match &self.node_type {
            NodeType::Element { tag_name, .. } => Some(tag_name),
            _ => None,
        }
    }

    /// Check the tag name, ignoring ASCII case.
    pub fn is_tag(&self, name: &str) -> bool {
        self.tag_name()
            .map(|t| t.eq_ignore_ascii_case(name))
            .unwrap_or(false)
    }

    /// Check if this is an element node.
    pub fn is_element(&self) -> bool {
        matches!(self.node_type, NodeType::Element { .. })
    }

    /// Check if this is a text node.
    pub fn is_text(&self) -> bool {
        matches!(self.node_type, NodeType::Text(_))
    }

    /// Get an attribute value.
    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.attributes
            .borrow()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    /// Check whether an attribute is present.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.borrow().iter().any(|(k, _)| k == name)
    }

    /// Snapshot of all attributes in source order.
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.attributes.borrow().clone()
    }

    /// Set an attribute, queueing a mutation record when the value changes.
    pub fn set_attribute(self: &Rc<Self>, name: &str, value: &str) {
        if !self.is_element() {
            return;
        }

        let old_value = {
            let mut attrs = self.attributes.borrow_mut();
            match attrs.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) if v == value => return,
                Some((_, v)) => Some(std::mem::replace(v, value.to_string())),
                None => {
                    attrs.push((name.to_string(), value.to_string()));
                    None
                }
            }
        };

        self.record(MutationKind::Attributes {
            name: name.to_string(),
            old_value,
        });
    }

    /// Remove an attribute, queueing a mutation record when it was present.
    pub fn remove_attribute(self: &Rc<Self>, name: &str) {
        let old_value = {
            let mut attrs = self.attributes.borrow_mut();
            match attrs.iter().position(|(k, _)| k == name) {
                Some(index) => attrs.remove(index).1,
                None => return,
            }
        };

        self.record(MutationKind::Attributes {
            name: name.to_string(),
            old_value: Some(old_value),
        });
    }

    /// Class tokens in order.
    pub fn class_list(&self) -> Vec<String> {
        self.get_attribute("class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Check for a class token.
    pub fn has_class(&self, class_name: &str) -> bool {
        self.attributes
            .borrow()
            .iter()
            .find(|(k, _)| k == "class")
            .map(|(_, v)| v.split_whitespace().any(|c| c == class_name))
            .unwrap_or(false)
    }

    /// Add a class token. Returns false when it was already present.
    pub fn add_class(self: &Rc<Self>, class_name: &str) -> bool {
        if !self.is_element() || self.has_class(class_name) {
            return false;
        }

        let mut tokens = self.class_list();
        tokens.push(class_name.to_string());
        self.set_attribute("class", &tokens.join(" "));
        true
    }

    /// Remove a class token. Returns false when it was not present.
    pub fn remove_class(self: &Rc<Self>, class_name: &str) -> bool {
        if !self.has_class(class_name) {
            return false;
        }

        let tokens: Vec<String> = self
            .class_list()
            .into_iter()
            .filter(|c| c != class_name)
            .collect();
        self.set_attribute("class", &tokens.join(" "));
        true
    }

    /// Record the box the host rendered this node into.
    pub fn set_layout(&self, rect: Rect) {
        self.layout.set(Some(rect));
    }

    /// Rendered box, falling back to the `width`/`height` attributes.
    pub fn layout_box(&self) -> Option<Rect> {
        if let Some(rect) = self.layout.get() {
            return Some(rect);
        }

        let width = parse_dimension(&self.get_attribute("width")?)?;
        let height = parse_dimension(&self.get_attribute("height")?)?;
        Some(Rect::sized(width, height))
    }

    /// Get the text content.
    pub fn text_content(&self) -> String {
        let mut result = String::new();
        self.collect_text(&mut result);
        result
    }

    fn collect_text(&self, result: &mut String) {
        match &self.node_type {
            NodeType::Text(text) => result.push_str(text),
            _ => {
                for child in self.children.borrow().iter() {
                    child.collect_text(result);
                }
            }
        }
    }

    /// Get parent node.
    pub fn parent(&self) -> Option<Rc<Node>> {
        self.parent.borrow().as_ref().and_then(|w| w.upgrade())
    }

    /// Get the parent if it is an element (the document node is not).
    pub fn parent_element(&self) -> Option<Rc<Node>> {
        self.parent().filter(|p| p.is_element())
    }

    /// Get child nodes.
    pub fn children(&self) -> Vec<Rc<Node>> {
        self.children.borrow().clone()
    }

    /// Get child elements.
    pub fn element_children(&self) -> Vec<Rc<Node>> {
        self.children
            .borrow()
            .iter()
            .filter(|c| c.is_element())
            .cloned()
            .collect()
    }

    /// Ancestors from the parent upwards, including the document node.
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            next: self.parent(),
        }
    }

    /// Descendants in document order, excluding this node.
    pub fn descendants(&self) -> Vec<Rc<Node>> {
        let mut out = Vec::new();
        for child in self.children.borrow().iter() {
            collect_preorder(child, &mut out);
        }
        out
    }

    /// This node followed by its descendants in document order.
    pub fn inclusive_descendants(self: &Rc<Self>) -> Vec<Rc<Node>> {
        let mut out = Vec::new();
        collect_preorder(self, &mut out);
        out
    }

    /// Whether `other` is this node or one of its descendants.
    pub fn contains(&self, other: &Node) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        other.ancestors().any(|a| std::ptr::eq(Rc::as_ptr(&a), self))
    }

    /// Whether this node is attached to a document root.
    pub fn is_connected(&self) -> bool {
        matches!(self.node_type, NodeType::Document)
            || self
                .ancestors()
                .any(|a| matches!(a.node_type, NodeType::Document))
    }

    /// Append a child node, detaching it from any previous parent.
    pub fn append_child(self: &Rc<Self>, child: Rc<Node>) -> Result<(), DomError> {
        if child.contains(self) {
            return Err(DomError::InvalidOperation(
                "cannot append a node to its own subtree".into(),
            ));
        }

        if let Some(old_parent) = child.parent() {
            old_parent.remove_child(&child)?;
        }

        *child.parent.borrow_mut() = Some(Rc::downgrade(self));
        self.children.borrow_mut().push(child.clone());

        self.record(MutationKind::ChildList {
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    /// Remove a direct child.
    pub fn remove_child(self: &Rc<Self>, child: &Rc<Node>) -> Result<Rc<Node>, DomError> {
        let removed = {
            let mut children = self.children.borrow_mut();
            let index = children
                .iter()
                .position(|c| Rc::ptr_eq(c, child))
                .ok_or(DomError::NodeNotFound)?;
            children.remove(index)
        };
        *removed.parent.borrow_mut() = None;

        self.record(MutationKind::ChildList {
            added: Vec::new(),
            removed: vec![removed.clone()],
        });
        Ok(removed)
    }

    /// Serialize this node and its subtree.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        self.serialize_into(&mut out);
        out
    }

    fn serialize_into(&self, out: &mut String) {
        match &self.node_type {
            NodeType::Document => {
                for child in self.children.borrow().iter() {
                    child.serialize_into(out);
                }
            }
            NodeType::DocumentType { name } => {
                out.push_str("<!DOCTYPE ");
                out.push_str(name);
                out.push('>');
            }
            NodeType::Element { tag_name, .. } => {
                out.push('<');
                out.push_str(tag_name);
                for (name, value) in self.attributes.borrow().iter() {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape(value, true));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag_name.as_str()) {
                    return;
                }
                for child in self.children.borrow().iter() {
                    child.serialize_into(out);
                }
                out.push_str("</");
                out.push_str(tag_name);
                out.push('>');
            }
            NodeType::Text(text) => out.push_str(&escape(text, false)),
            NodeType::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeType::ProcessingInstruction { target, data } => {
                out.push_str("<?");
                out.push_str(target);
                out.push(' ');
                out.push_str(data);
                out.push('>');
            }
        }
    }

    fn record(self: &Rc<Self>, kind: MutationKind) {
        if let Some(recorder) = self.recorder.upgrade() {
            recorder.queue(MutationRecord {
                target: self.clone(),
                kind,
            });
        }
    }
}

/// Iterator over a node's ancestors.
pub struct Ancestors {
    next: Option<Rc<Node>>,
}

impl Iterator for Ancestors {
    type Item = Rc<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = current.parent();
        Some(current)
    }
}

fn collect_preorder(node: &Rc<Node>, out: &mut Vec<Rc<Node>>) {
    out.push(node.clone());
    for child in node.children.borrow().iter() {
        collect_preorder(child, out);
    }
}

fn parse_dimension(raw: &str) -> Option<f32> {
    raw.trim()
        .trim_end_matches("px")
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
    out
}

/// A complete DOM document.
pub struct Document {
    /// Root node of the document.
    root: Rc<Node>,
    /// Shared mutation sink for every node created here.
    recorder: Rc<MutationRecorder>,
    /// Next node ID.
    next_id: Cell<usize>,
    /// Ready state broadcast.
    ready: watch::Sender<DocumentReadyState>,
}

impl Document {
    /// Create a new empty document in the `Loading` state.
    pub fn new() -> Self {
        let recorder = Rc::new(MutationRecorder::new());
        let root = Node::new(NodeId::new(0), NodeType::Document, Rc::downgrade(&recorder));
        let (ready, _) = watch::channel(DocumentReadyState::Loading);

        Self {
            root,
            recorder,
            next_id: Cell::new(1),
            ready,
        }
    }

    /// Parse HTML and create a document in the `Complete` state.
    pub fn parse_html(html: &str) -> Result<Self, DomError> {
        debug!(len = html.len(), "Parsing HTML");

        let dom = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut html.as_bytes())
            .map_err(|e| DomError::ParseError(e.to_string()))?;

        let doc = Document::new();
        doc.convert_rcdom(&dom.document, &doc.root.clone());
        doc.set_ready_state(DocumentReadyState::Complete);

        debug!(node_count = doc.next_id.get(), "HTML parsed");
        Ok(doc)
    }

    /// Parse an HTML fragment and return its top-level nodes, unattached.
    pub fn parse_fragment(&self, html: &str) -> Result<Vec<Rc<Node>>, DomError> {
        let parsed = Document::parse_html(&format!("<html><body>{html}</body></html>"))?;
        let body = parsed.body().ok_or(DomError::NodeNotFound)?;
        Ok(body
            .children()
            .iter()
            .map(|child| self.import_node(child))
            .collect())
    }

    /// Deep-copy a node from another document into this one.
    pub fn import_node(&self, node: &Rc<Node>) -> Rc<Node> {
        let copy = self.create_node(node.node_type.clone());
        *copy.attributes.borrow_mut() = node.attributes();
        copy.layout.set(node.layout.get());
        for child in node.children() {
            let child_copy = self.import_node(&child);
            *child_copy.parent.borrow_mut() = Some(Rc::downgrade(&copy));
            copy.children.borrow_mut().push(child_copy);
        }
        copy
    }

    fn convert_rcdom(&self, handle: &Handle, parent: &Rc<Node>) {
        for child_handle in handle.children.borrow().iter() {
            let (node_type, attrs) = match &child_handle.data {
                NodeData::Document => continue,
                NodeData::Doctype { name, .. } => (
                    NodeType::DocumentType {
                        name: name.to_string(),
                    },
                    Vec::new(),
                ),
                NodeData::Element { name, attrs, .. } => (
                    NodeType::Element {
                        tag_name: name.local.to_string().to_ascii_lowercase(),
                        namespace: name.ns.to_string(),
                    },
                    attrs
                        .borrow()
                        .iter()
                        .map(|a| (a.name.local.to_string(), a.value.to_string()))
                        .collect(),
                ),
                NodeData::Text { contents } => {
                    (NodeType::Text(contents.borrow().to_string()), Vec::new())
                }
                NodeData::Comment { contents } => {
                    (NodeType::Comment(contents.to_string()), Vec::new())
                }
                NodeData::ProcessingInstruction { target, contents } => (
                    NodeType::ProcessingInstruction {
                        target: target.to_string(),
                        data: contents.to_string(),
                    },
                    Vec::new(),
                ),
            };

            let node = self.create_node(node_type);
            *node.attributes.borrow_mut() = attrs;
            *node.parent.borrow_mut() = Some(Rc::downgrade(parent));
            parent.children.borrow_mut().push(node.clone());

            self.convert_rcdom(child_handle, &node);
        }
    }

    fn create_node(&self, node_type: NodeType) -> Rc<Node> {
        let id = NodeId::new(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        Node::new(id, node_type, Rc::downgrade(&self.recorder))
    }

    /// Create a detached element.
    pub fn create_element(&self, tag_name: &str) -> Rc<Node> {
        self.create_node(NodeType::Element {
            tag_name: tag_name.to_ascii_lowercase(),
            namespace: "http://www.w3.org/1999/xhtml".to_string(),
        })
    }

    /// Create a detached element with attributes, without queueing records.
    pub fn create_element_with(&self, tag_name: &str, attrs: &[(&str, &str)]) -> Rc<Node> {
        let element = self.create_element(tag_name);
        *element.attributes.borrow_mut() = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        element
    }

    /// Create a detached text node.
    pub fn create_text(&self, text: &str) -> Rc<Node> {
        self.create_node(NodeType::Text(text.to_string()))
    }

    /// Create a mutation observer bound to this document.
    pub fn create_observer(&self) -> MutationObserver {
        MutationObserver::new(Rc::downgrade(&self.recorder))
    }

    /// Wakes whenever a record is queued for any observer.
    pub fn mutation_signal(&self) -> Arc<Notify> {
        self.recorder.signal()
    }

    /// Get the document root.
    pub fn root(&self) -> &Rc<Node> {
        &self.root
    }

    /// Get the document element (<html>).
    pub fn document_element(&self) -> Option<Rc<Node>> {
        self.root.children().into_iter().find(|n| n.is_tag("html"))
    }

    /// Get the <head> element.
    pub fn head(&self) -> Option<Rc<Node>> {
        self.document_element()?
            .children()
            .into_iter()
            .find(|n| n.is_tag("head"))
    }

    /// Get the <body> element.
    pub fn body(&self) -> Option<Rc<Node>> {
        self.document_element()?
            .children()
            .into_iter()
            .find(|n| n.is_tag("body"))
    }

    /// Get element by ID.
    pub fn get_element_by_id(&self, id: &str) -> Option<Rc<Node>> {
        self.root
            .descendants()
            .into_iter()
            .find(|n| n.get_attribute("id").as_deref() == Some(id))
    }

    /// Get elements by tag name.
    pub fn get_elements_by_tag_name(&self, tag_name: &str) -> Vec<Rc<Node>> {
        self.root
            .descendants()
            .into_iter()
            .filter(|n| n.is_tag(tag_name))
            .collect()
    }

    /// Get elements by class name.
    pub fn get_elements_by_class_name(&self, class_name: &str) -> Vec<Rc<Node>> {
        self.root
            .descendants()
            .into_iter()
            .filter(|n| n.has_class(class_name))
            .collect()
    }

    /// Current ready state.
    pub fn ready_state(&self) -> DocumentReadyState {
        *self.ready.borrow()
    }

    /// Advance the ready state. Moving backwards is ignored.
    pub fn set_ready_state(&self, state: DocumentReadyState) {
        self.ready.send_if_modified(|current| {
            if state > *current {
                debug!(from = current.as_str(), to = state.as_str(), "Ready state change");
                *current = state;
                true
            } else {
                false
            }
        });
    }

    /// Subscribe to ready state changes.
    pub fn ready_signal(&self) -> watch::Receiver<DocumentReadyState> {
        self.ready.subscribe()
    }

    /// Serialize the whole document.
    pub fn to_html(&self) -> String {
        self.root.outer_html()
    }

    /// Traverse all nodes depth-first.
    pub fn traverse<F>(&self, mut callback: F)
    where
        F: FnMut(&Rc<Node>),
    {
        for node in self.root.inclusive_descendants() {
            callback(&node);
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_html() {
        let html = r#"<!DOCTYPE html>
<html>
<head><title>Test</title></head>
<body><p id="main">Hello, world!</p></body>
</html>"#;

        let doc = Document::parse_html(html).unwrap();

        assert!(doc.document_element().is_some());
        assert!(doc.head().is_some());
        assert!(doc.body().is_some());
        assert_eq!(doc.ready_state(), DocumentReadyState::Complete);

        let main = doc.get_element_by_id("main").unwrap();
        assert_eq!(main.tag_name(), Some("p"));
        assert_eq!(main.text_content(), "Hello, world!");
    }

    #[test]
    fn test_lookups() {
        let html = r#"<html><body>
            <div class="feed">
                <img id="first" class="photo wide">
                <p class="photo">caption</p>
            </div>
        </body></html>"#;
        let doc = Document::parse_html(html).unwrap();

        assert_eq!(doc.get_elements_by_class_name("photo").len(), 2);
        assert_eq!(doc.get_elements_by_tag_name("IMG").len(), 1);
        let img = doc.get_element_by_id("first").unwrap();
        assert_eq!(img.class_list(), vec!["photo", "wide"]);
    }

    #[test]
    fn test_class_tokens() {
        let doc = Document::parse_html(r#"<div id="a" class="one two"></div>"#).unwrap();
        let div = doc.get_element_by_id("a").unwrap();

        assert!(div.add_class("three"));
        assert!(!div.add_class("three"));
        assert_eq!(div.get_attribute("class").as_deref(), Some("one two three"));

        assert!(div.remove_class("one"));
        assert!(!div.remove_class("one"));
        assert!(div.has_class("two"));
        assert!(!div.has_class("one"));
    }

    #[test]
    fn test_layout_box_falls_back_to_attributes() {
        let doc = Document::parse_html(
            r#"<img id="sized" width="48" height="48px"><img id="bare">"#,
        )
        .unwrap();

        let sized = doc.get_element_by_id("sized").unwrap();
        assert_eq!(sized.layout_box(), Some(Rect::sized(48.0, 48.0)));

        sized.set_layout(Rect::new(10.0, 10.0, 16.0, 16.0));
        assert_eq!(sized.layout_box().map(|r| r.width), Some(16.0));

        let bare = doc.get_element_by_id("bare").unwrap();
        assert_eq!(bare.layout_box(), None);
    }

    #[test]
    fn test_ancestry() {
        let doc =
            Document::parse_html(r#"<article id="a"><div id="b"><img id="c"></div></article>"#)
                .unwrap();
        let a = doc.get_element_by_id("a").unwrap();
        let c = doc.get_element_by_id("c").unwrap();

        assert!(a.contains(&c));
        assert!(!c.contains(&a));
        assert!(c.contains(&c));
        assert_eq!(c.parent_element().unwrap().get_attribute("id").as_deref(), Some("b"));
        assert!(c.is_connected());

        let ids: Vec<_> = a
            .descendants()
            .iter()
            .filter_map(|n| n.get_attribute("id"))
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_append_and_remove() {
        let doc = Document::parse_html("<html><body></body></html>").unwrap();
        let body = doc.body().unwrap();
        let div = doc.create_element_with("div", &[("id", "x")]);
        div.append_child(doc.create_text("hi")).unwrap();

        body.append_child(div.clone()).unwrap();
        assert!(div.is_connected());
        assert!(div.append_child(body.clone()).is_err());

        body.remove_child(&div).unwrap();
        assert!(!div.is_connected());
        assert!(matches!(body.remove_child(&div), Err(DomError::NodeNotFound)));
    }

    #[test]
    fn test_outer_html() {
        let doc = Document::parse_html(r#"<div class="a"><img src="x.png">a &amp; b</div>"#)
            .unwrap();
        let div = doc.get_elements_by_tag_name("div").remove(0);
        assert_eq!(
            div.outer_html(),
            r#"<div class="a"><img src="x.png">a &amp; b</div>"#
        );
    }

    #[test]
    fn test_parse_fragment_imports_nodes() {
        let doc = Document::parse_html("<html><body></body></html>").unwrap();
        let nodes = doc
            .parse_fragment(r#"<section><img src="a.jpg"></section>"#)
            .unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].parent().is_none());

        doc.body().unwrap().append_child(nodes[0].clone()).unwrap();
        assert_eq!(doc.get_elements_by_tag_name("img").len(), 1);
    }

    #[test]
    fn test_ready_state_only_advances() {
        let doc = Document::new();
        let mut signal = doc.ready_signal();
        assert!(doc.ready_state().is_loading());

        doc.set_ready_state(DocumentReadyState::Interactive);
        assert!(signal.has_changed().unwrap());
        signal.borrow_and_update();

        doc.set_ready_state(DocumentReadyState::Loading);
        assert_eq!(doc.ready_state(), DocumentReadyState::Interactive);
        assert!(!signal.has_changed().unwrap());
    }
}
