//! The concealment engine: classifier plus marker plus container depth.
//!
//! Concealment, repair and sweeps live in their own modules as further
//! `impl ConcealEngine` blocks.

use std::rc::Rc;

use mediashade_core::ShieldConfig;
use mediashade_dom::Node;

use crate::classifier::Classifier;

/// The one class token that means "concealed".
///
/// Presence of this class is the only state the engine keeps per element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker(String);

impl Marker {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self(class_name.into())
    }

    pub fn class_name(&self) -> &str {
        &self.0
    }

    pub fn is_on(&self, node: &Node) -> bool {
        node.has_class(&self.0)
    }

    /// Returns `true` if the marker was newly attached.
    pub fn attach(&self, node: &Rc<Node>) -> bool {
        node.add_class(&self.0)
    }

    /// Returns `true` if the marker was present.
    pub fn detach(&self, node: &Rc<Node>) -> bool {
        node.remove_class(&self.0)
    }

    /// Marked elements in the inclusive subtree of `root`, document order.
    pub fn marked_in(&self, root: &Rc<Node>) -> Vec<Rc<Node>> {
        root.inclusive_descendants()
            .into_iter()
            .filter(|n| self.is_on(n))
            .collect()
    }

    /// Remove the marker from `root` and everything below it.
    pub fn strip_subtree(&self, root: &Rc<Node>) -> usize {
        self.marked_in(root)
            .iter()
            .filter(|n| self.detach(n))
            .count()
    }
}

/// Everything the synchronous concealment paths need.
#[derive(Debug, Clone)]
pub struct ConcealEngine {
    pub(crate) classifier: Classifier,
    pub(crate) marker: Marker,
    pub(crate) container_depth: usize,
}

impl ConcealEngine {
    pub fn new(config: &ShieldConfig) -> Self {
        Self {
            classifier: Classifier::from_config(config),
            marker: Marker::new(config.marker_class.clone()),
            container_depth: config.container_depth,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn marker(&self) -> &Marker {
        &self.marker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediashade_dom::Document;

    #[test]
    fn test_marker_attach_detach() {
        let doc = Document::parse_html(r#"<div id="a" class="x"><span id="b"></span></div>"#).unwrap();
        let marker = Marker::new("hidden");
        let a = doc.get_element_by_id("a").unwrap();
        let b = doc.get_element_by_id("b").unwrap();

        assert!(marker.attach(&a));
        assert!(!marker.attach(&a));
        assert!(marker.attach(&b));
        assert_eq!(a.get_attribute("class").as_deref(), Some("x hidden"));
        assert_eq!(marker.marked_in(doc.root()).len(), 2);

        assert_eq!(marker.strip_subtree(&a), 2);
        assert_eq!(marker.strip_subtree(&a), 0);
        assert!(a.has_class("x"));
    }
}
