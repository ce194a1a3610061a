//! # Mutation Observers
//!
//! Queues records of tree changes for registered observers, after the DOM
//! `MutationObserver` model:
//!
//! - an observer registers interest in a target with [`ObserveOptions`]
//! - with `subtree`, changes anywhere below the target are reported too
//! - observing the same target again replaces the previous options
//! - records accumulate until [`MutationObserver::take_records`] drains them
//!
//! Records are only produced for effective changes; writing an attribute
//! with its current value queues nothing.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::trace;

use crate::{DomError, Node};

/// Identifies one observer within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// What an observer wants to hear about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Report child insertions and removals.
    pub child_list: bool,
    /// Report attribute changes.
    pub attributes: bool,
    /// Extend interest to all descendants of the target.
    pub subtree: bool,
    /// Restrict attribute reports to these names.
    pub attribute_filter: Option<Vec<String>>,
}

impl ObserveOptions {
    /// Child-list plus filtered attribute changes across the whole subtree.
    pub fn subtree_with_attributes(names: &[&str]) -> Self {
        Self {
            child_list: true,
            attributes: true,
            subtree: true,
            attribute_filter: Some(names.iter().map(|n| n.to_string()).collect()),
        }
    }

    fn validate(&self) -> Result<(), DomError> {
        if !self.child_list && !self.attributes {
            return Err(DomError::InvalidOperation(
                "observe() needs child_list or attributes".into(),
            ));
        }
        if self.attribute_filter.is_some() && !self.attributes {
            return Err(DomError::InvalidOperation(
                "attribute_filter requires attributes".into(),
            ));
        }
        Ok(())
    }

    fn wants(&self, kind: &MutationKind) -> bool {
        match kind {
            MutationKind::ChildList { .. } => self.child_list,
            MutationKind::Attributes { name, .. } => {
                self.attributes
                    && self
                        .attribute_filter
                        .as_ref()
                        .map(|names| names.iter().any(|n| n == name))
                        .unwrap_or(true)
            }
        }
    }
}

/// The change a record describes.
#[derive(Debug, Clone)]
pub enum MutationKind {
    /// Children were inserted or removed.
    ChildList {
        added: Vec<Rc<Node>>,
        removed: Vec<Rc<Node>>,
    },
    /// An attribute value changed.
    Attributes {
        name: String,
        old_value: Option<String>,
    },
}

/// One queued change.
#[derive(Debug, Clone)]
pub struct MutationRecord {
    /// The node whose children or attributes changed.
    pub target: Rc<Node>,
    pub kind: MutationKind,
}

impl MutationRecord {
    /// Added nodes that are elements.
    pub fn added_elements(&self) -> impl Iterator<Item = &Rc<Node>> {
        let added: &[Rc<Node>] = match &self.kind {
            MutationKind::ChildList { added, .. } => added,
            MutationKind::Attributes { .. } => &[],
        };
        added.iter().filter(|n| n.is_element())
    }

    /// The changed attribute, for attribute records.
    pub fn attribute_name(&self) -> Option<&str> {
        match &self.kind {
            MutationKind::Attributes { name, .. } => Some(name),
            MutationKind::ChildList { .. } => None,
        }
    }
}

struct Registration {
    observer: ObserverId,
    target: Weak<Node>,
    options: ObserveOptions,
}

/// Per-document record router shared by every node.
pub(crate) struct MutationRecorder {
    registrations: RefCell<Vec<Registration>>,
    queues: RefCell<HashMap<ObserverId, Vec<MutationRecord>>>,
    next_observer: Cell<u64>,
    signal: Arc<Notify>,
}

impl MutationRecorder {
    pub(crate) fn new() -> Self {
        Self {
            registrations: RefCell::new(Vec::new()),
            queues: RefCell::new(HashMap::new()),
            next_observer: Cell::new(1),
            signal: Arc::new(Notify::new()),
        }
    }

    pub(crate) fn signal(&self) -> Arc<Notify> {
        self.signal.clone()
    }

    fn allocate(&self) -> ObserverId {
        let id = ObserverId(self.next_observer.get());
        self.next_observer.set(id.0 + 1);
        id
    }

    /// Route a record to every interested observer, at most once each.
    pub(crate) fn queue(&self, record: MutationRecord) {
        let interested: Vec<ObserverId> = {
            let mut registrations = self.registrations.borrow_mut();
            registrations.retain(|r| r.target.strong_count() > 0);

            let mut out: Vec<ObserverId> = Vec::new();
            for reg in registrations.iter() {
                if out.contains(&reg.observer) || !reg.options.wants(&record.kind) {
                    continue;
                }
                let Some(target) = reg.target.upgrade() else {
                    continue;
                };
                let in_scope = Rc::ptr_eq(&target, &record.target)
                    || (reg.options.subtree && target.contains(&record.target));
                if in_scope {
                    out.push(reg.observer);
                }
            }
            out
        };

        if interested.is_empty() {
            return;
        }

        trace!(
            target = record.target.id.raw(),
            observers = interested.len(),
            "Queued mutation record"
        );

        let mut queues = self.queues.borrow_mut();
        for observer in interested {
            queues.entry(observer).or_default().push(record.clone());
        }
        drop(queues);

        self.signal.notify_one();
    }

    fn observe(&self, observer: ObserverId, target: &Rc<Node>, options: ObserveOptions) {
        let mut registrations = self.registrations.borrow_mut();
        let existing = registrations.iter_mut().find(|r| {
            r.observer == observer
                && r.target
                    .upgrade()
                    .map(|t| Rc::ptr_eq(&t, target))
                    .unwrap_or(false)
        });

        match existing {
            Some(reg) => reg.options = options,
            None => registrations.push(Registration {
                observer,
                target: Rc::downgrade(target),
                options,
            }),
        }
    }

    fn take(&self, observer: ObserverId) -> Vec<MutationRecord> {
        self.queues
            .borrow_mut()
            .remove(&observer)
            .unwrap_or_default()
    }

    fn disconnect(&self, observer: ObserverId) {
        self.registrations
            .borrow_mut()
            .retain(|r| r.observer != observer);
        self.queues.borrow_mut().remove(&observer);
    }

    fn live_targets(&self, observer: ObserverId) -> usize {
        self.registrations
            .borrow()
            .iter()
            .filter(|r| r.observer == observer && r.target.strong_count() > 0)
            .count()
    }
}

/// Handle for one observer. Dropping it disconnects.
pub struct MutationObserver {
    id: ObserverId,
    recorder: Weak<MutationRecorder>,
}

impl MutationObserver {
    pub(crate) fn new(recorder: Weak<MutationRecorder>) -> Self {
        let id = recorder
            .upgrade()
            .map(|r| r.allocate())
            .unwrap_or(ObserverId(0));
        Self { id, recorder }
    }

    /// This observer's ID.
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Start (or update) observing `target`.
    pub fn observe(&self, target: &Rc<Node>, options: ObserveOptions) -> Result<(), DomError> {
        options.validate()?;
        let recorder = self
            .recorder
            .upgrade()
            .ok_or_else(|| DomError::InvalidOperation("document is gone".into()))?;
        recorder.observe(self.id, target, options);
        Ok(())
    }

    /// Drain the pending records.
    pub fn take_records(&self) -> Vec<MutationRecord> {
        self.recorder
            .upgrade()
            .map(|r| r.take(self.id))
            .unwrap_or_default()
    }

    /// Stop observing everything and drop pending records.
    pub fn disconnect(&self) {
        if let Some(recorder) = self.recorder.upgrade() {
            recorder.disconnect(self.id);
        }
    }

    /// Number of targets still alive and observed.
    pub fn observed_targets(&self) -> usize {
        self.recorder
            .upgrade()
            .map(|r| r.live_targets(self.id))
            .unwrap_or(0)
    }
}

impl Drop for MutationObserver {
    fn drop(&mut self) {
        self.disconnect();
    }
}
