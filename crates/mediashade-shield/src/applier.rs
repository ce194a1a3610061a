//! Attaching and removing the marker.

use std::rc::Rc;

use mediashade_dom::Node;
use tracing::{debug, trace};

use crate::engine::ConcealEngine;

/// Never marked as containers; hiding them hides the whole page.
const PAGE_ROOTS: &[&str] = &["html", "body"];

/// Result of one [`ConcealEngine::conceal`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Concealed {
    /// The element itself was newly marked.
    pub element: bool,
    /// Ancestor containers marked on the way up.
    pub containers: usize,
}

impl Concealed {
    pub fn total(&self) -> usize {
        usize::from(self.element) + self.containers
    }
}

impl ConcealEngine {
    /// Mark `el`, then up to `container_depth` media-container ancestors.
    ///
    /// Already-marked elements are left alone. The walk stops at the first
    /// ancestor that is marked, protected, a page root, or holds a protected
    /// zone. Protected elements are refused.
    pub fn conceal(&self, el: &Rc<Node>) -> Concealed {
        if self.marker.is_on(el) {
            return Concealed::default();
        }
        if self.classifier.is_protected(el) {
            debug!(node = el.id.raw(), "Refusing to conceal protected element");
            return Concealed::default();
        }

        self.marker.attach(el);
        let mut outcome = Concealed {
            element: true,
            containers: 0,
        };

        let mut current = el.parent_element();
        for _ in 0..self.container_depth {
            let Some(ancestor) = current else { break };
            if self.marker.is_on(&ancestor)
                || self.classifier.is_protected(&ancestor)
                || PAGE_ROOTS.iter().any(|tag| ancestor.is_tag(tag))
                || self.classifier.holds_zone(&ancestor)
            {
                break;
            }
            if self.classifier.is_media_container(&ancestor) && self.marker.attach(&ancestor) {
                outcome.containers += 1;
            }
            current = ancestor.parent_element();
        }

        trace!(
            node = el.id.raw(),
            tag = el.tag_name().unwrap_or(""),
            containers = outcome.containers,
            "Concealed element"
        );
        outcome
    }

    /// Remove the marker from every element under `root`.
    pub fn reveal_all(&self, root: &Rc<Node>) -> usize {
        let revealed = self.marker.strip_subtree(root);
        debug!(revealed, "Revealed all concealed elements");
        revealed
    }
}
