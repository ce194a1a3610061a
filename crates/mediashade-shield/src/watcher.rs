//! Mutation watcher: reacts to inserted content and class changes across
//! the whole document.

use mediashade_dom::{Document, DomError, MutationObserver, MutationRecord, ObserveOptions};
use tracing::{debug, info, trace};

use crate::engine::ConcealEngine;
use crate::sweep::SweepReport;

/// Lifecycle of the document-wide observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Not started, or torn down.
    Inactive,
    /// Started while the document was still loading; waiting for readiness.
    Deferred,
    /// Attached to the document element.
    Observing,
}

/// What one batch of records led to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchReport {
    pub sweep: SweepReport,
    /// Markers stripped by scoped repair and by class-change checks.
    pub repaired: usize,
}

/// Document-wide observer for child-list and `class` changes.
pub struct MutationWatcher {
    state: WatcherState,
    observer: Option<MutationObserver>,
}

impl MutationWatcher {
    pub fn new() -> Self {
        Self {
            state: WatcherState::Inactive,
            observer: None,
        }
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    /// Attach now, or defer while the document is still loading.
    pub fn start(&mut self, doc: &Document) -> Result<WatcherState, DomError> {
        if self.state != WatcherState::Inactive {
            return Ok(self.state);
        }
        if doc.ready_state().is_loading() {
            debug!("Document still loading; deferring mutation watcher");
            self.state = WatcherState::Deferred;
            return Ok(self.state);
        }
        self.attach(doc)
    }

    /// Complete a deferred start once the document has left `Loading`.
    pub fn on_ready_state_change(&mut self, doc: &Document) -> Result<WatcherState, DomError> {
        if self.state == WatcherState::Deferred && !doc.ready_state().is_loading() {
            return self.attach(doc);
        }
        Ok(self.state)
    }

    fn attach(&mut self, doc: &Document) -> Result<WatcherState, DomError> {
        let target = doc
            .document_element()
            .unwrap_or_else(|| doc.root().clone());

        let observer = doc.create_observer();
        observer.observe(&target, ObserveOptions::subtree_with_attributes(&["class"]))?;
        self.observer = Some(observer);
        self.state = WatcherState::Observing;

        info!(target = target.id.raw(), "Mutation watcher attached");
        Ok(self.state)
    }

    /// Drain pending records.
    pub fn take_records(&self) -> Vec<MutationRecord> {
        self.observer
            .as_ref()
            .map(MutationObserver::take_records)
            .unwrap_or_default()
    }

    /// Act on one batch. Batches that arrive while disabled are dropped.
    pub fn process(
        &self,
        engine: &ConcealEngine,
        records: &[MutationRecord],
        enabled: bool,
    ) -> WatchReport {
        let mut report = WatchReport::default();
        if !enabled {
            trace!(records = records.len(), "Dropping mutation batch while disabled");
            return report;
        }

        for record in records {
            for added in record.added_elements() {
                if !added.is_connected() {
                    continue;
                }
                report.sweep += engine.sweep(added);
                report.repaired += engine.repair(added);
            }

            if record.attribute_name() == Some("class") {
                let el = &record.target;
                if engine.marker().is_on(el)
                    && engine.classifier().is_protected(el)
                    && engine.marker().detach(el)
                {
                    report.repaired += 1;
                }
            }
        }

        if report.sweep.concealed > 0 || report.repaired > 0 {
            debug!(
                records = records.len(),
                concealed = report.sweep.concealed,
                repaired = report.repaired,
                "Processed mutation batch"
            );
        }
        report
    }

    /// Stop observing. Only used at teardown.
    pub fn stop(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.disconnect();
        }
        self.state = WatcherState::Inactive;
    }
}

impl Default for MutationWatcher {
    fn default() -> Self {
        Self::new()
    }
}
