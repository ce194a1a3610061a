//! Protected-zone guard.
//!
//! A second, narrower observer attached only to current zone roots. It
//! undoes any marker that lands inside a zone, independent of the enabled
//! flag and of the document-wide watcher. Zones come and go as the feed
//! re-renders, so the attachment set is refreshed on a timer.

use mediashade_dom::{Document, DomError, MutationKind, MutationObserver, MutationRecord, ObserveOptions};
use tracing::{debug, trace};

use crate::classifier::Classifier;
use crate::engine::Marker;

pub struct ZoneGuard {
    observer: MutationObserver,
}

impl ZoneGuard {
    pub fn new(doc: &Document) -> Self {
        Self {
            observer: doc.create_observer(),
        }
    }

    /// Observe every zone root currently in the document.
    ///
    /// Zones already observed keep a single registration.
    pub fn refresh(&self, doc: &Document, classifier: &Classifier) -> Result<usize, DomError> {
        let zones = classifier.zones_in(doc.root());
        for zone in &zones {
            self.observer
                .observe(zone, ObserveOptions::subtree_with_attributes(&["class"]))?;
        }
        trace!(zones = zones.len(), observed = self.observed(), "Guard refreshed");
        Ok(zones.len())
    }

    /// Number of live zone registrations.
    pub fn observed(&self) -> usize {
        self.observer.observed_targets()
    }

    pub fn take_records(&self) -> Vec<MutationRecord> {
        self.observer.take_records()
    }

    /// Strip markers reported by one batch. Returns how many were removed.
    pub fn process(&self, marker: &Marker, records: &[MutationRecord]) -> usize {
        let mut stripped = 0;
        for record in records {
            match &record.kind {
                MutationKind::Attributes { name, .. } if name == "class" => {
                    if marker.detach(&record.target) {
                        stripped += 1;
                    }
                }
                MutationKind::Attributes { .. } => {}
                MutationKind::ChildList { .. } => {
                    for added in record.added_elements() {
                        stripped += marker.strip_subtree(added);
                    }
                }
            }
        }

        if stripped > 0 {
            debug!(stripped, "Guard stripped markers inside protected zones");
        }
        stripped
    }
}
