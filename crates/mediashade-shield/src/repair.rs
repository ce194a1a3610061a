//! Protected-zone repair.
//!
//! Any marker found inside a protected zone is a bug somewhere upstream
//! (a race, a stale sweep, markup that changed underneath). Repair is the
//! unconditional fix-up and runs after every sweep.

use std::rc::Rc;

use mediashade_dom::Node;
use tracing::debug;

use crate::engine::ConcealEngine;

impl ConcealEngine {
    /// Strip markers that sit inside protected zones under `root`.
    ///
    /// Two passes: marked elements whose ancestry is protected, then every
    /// zone root in scope together with its whole subtree. Returns the
    /// number of markers removed; a second call on an unchanged tree
    /// returns zero.
    pub fn repair(&self, root: &Rc<Node>) -> usize {
        let mut stripped = 0;

        for el in self.marker.marked_in(root) {
            if self.classifier.is_protected(&el) && self.marker.detach(&el) {
                stripped += 1;
            }
        }

        for zone in self.classifier.zones_in(root) {
            stripped += self.marker.strip_subtree(&zone);
        }

        if stripped > 0 {
            debug!(stripped, scope = root.id.raw(), "Repaired protected zones");
        }
        stripped
    }
}
