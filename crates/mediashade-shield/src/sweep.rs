//! Sweeps: evaluate candidates in a subtree and conceal what qualifies.

use std::rc::Rc;

use mediashade_dom::Node;
use serde::Serialize;
use tracing::debug;

use crate::engine::ConcealEngine;

/// Counters from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Candidates evaluated.
    pub candidates: usize,
    /// Candidates newly marked.
    pub concealed: usize,
    /// Containers marked on their behalf.
    pub containers: usize,
}

impl std::ops::AddAssign for SweepReport {
    fn add_assign(&mut self, other: Self) {
        self.candidates += other.candidates;
        self.concealed += other.concealed;
        self.containers += other.containers;
    }
}

impl SweepReport {
    fn absorb(&mut self, outcome: crate::applier::Concealed) {
        if outcome.element {
            self.concealed += 1;
        }
        self.containers += outcome.containers;
    }
}

impl ConcealEngine {
    /// Light sweep over the media candidate table, scoped to the inclusive
    /// subtree of `root`.
    ///
    /// Each candidate pattern is evaluated on its own; one that fails to
    /// evaluate contributes nothing and the rest still run.
    pub fn sweep(&self, root: &Rc<Node>) -> SweepReport {
        let mut report = SweepReport::default();

        for pattern in &self.classifier.tables().media_candidates {
            for el in self.classifier.select(root, pattern) {
                if self.marker.is_on(&el) {
                    continue;
                }
                report.candidates += 1;
                if self.classifier.should_conceal(&el) {
                    report.absorb(self.conceal(&el));
                }
            }
        }

        if report.concealed > 0 {
            debug!(
                scope = root.id.raw(),
                candidates = report.candidates,
                concealed = report.concealed,
                containers = report.containers,
                "Light sweep"
            );
        }
        report
    }

    /// Aggressive sweep: every unmarked image, video or media-named element
    /// under `root`, protected ones skipped outright.
    ///
    /// Cost grows with document size.
    pub fn sweep_aggressive(&self, root: &Rc<Node>) -> SweepReport {
        let mut report = SweepReport::default();
        let candidates = self
            .classifier
            .select_any(root, &self.classifier.tables().aggressive_candidates);

        for el in candidates {
            if self.marker.is_on(&el) || self.classifier.is_protected(&el) {
                continue;
            }
            report.candidates += 1;
            if self.classifier.should_conceal(&el) {
                report.absorb(self.conceal(&el));
            }
        }

        debug!(
            candidates = report.candidates,
            concealed = report.concealed,
            containers = report.containers,
            "Aggressive sweep"
        );
        report
    }
}
