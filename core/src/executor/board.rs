use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use crate::state::{composite_status, TaskStatus};

use super::graph::TaskGraph;
use super::traits::StatusReporter;

fn encode(status: TaskStatus) -> u8 {
    match status {
        TaskStatus::NotStarted => 0,
        TaskStatus::Running => 1,
        TaskStatus::WaitingForHuman => 2,
        TaskStatus::Done => 3,
        TaskStatus::Skipped => 4,
        TaskStatus::Failed => 5,
    }
}

fn decode(raw: u8) -> TaskStatus {
    match raw {
        1 => TaskStatus::Running,
        2 => TaskStatus::WaitingForHuman,
        3 => TaskStatus::Done,
        4 => TaskStatus::Skipped,
        5 => TaskStatus::Failed,
        _ => TaskStatus::NotStarted,
    }
}

/// Latest status of every leaf, written only by the owning worker.
///
/// Composite statuses are derived from snapshot reads and reported when they
/// change. A leaf that can never run counts as failed for its composites.
pub(crate) struct StatusBoard {
    graph: Arc<TaskGraph>,
    cells: Vec<AtomicU8>,
    unreachable: Vec<AtomicBool>,
    composites: Option<Mutex<HashMap<String, TaskStatus>>>,
}

impl StatusBoard {
    pub fn new(graph: Arc<TaskGraph>, report_composites: bool) -> Self {
        let cells = (0..graph.len())
            .map(|_| AtomicU8::new(encode(TaskStatus::NotStarted)))
            .collect();
        let unreachable = (0..graph.len()).map(|_| AtomicBool::new(false)).collect();
        let composites = report_composites.then(|| {
            Mutex::new(
                graph
                    .composites()
                    .iter()
                    .map(|c| (c.name.clone(), TaskStatus::NotStarted))
                    .collect(),
            )
        });
        Self {
            graph,
            cells,
            unreachable,
            composites,
        }
    }

    pub fn get(&self, leaf: &str) -> TaskStatus {
        self.graph
            .leaf(leaf)
            .map(|l| decode(self.cells[l.index - 1].load(Ordering::Acquire)))
            .unwrap_or(TaskStatus::NotStarted)
    }

    fn is_unreachable(&self, leaf: &str) -> bool {
        self.graph
            .leaf(leaf)
            .is_some_and(|l| self.unreachable[l.index - 1].load(Ordering::Acquire))
    }

    pub fn composite(&self, name: &str) -> Option<TaskStatus> {
        let node = self.graph.composite(name)?;
        Some(composite_status(node.leaves.iter().map(|l| {
            if self.is_unreachable(l) {
                TaskStatus::Failed
            } else {
                self.get(l)
            }
        })))
    }

    /// Announce every composite as NotStarted.
    pub fn report_initial(&self, reporter: &dyn StatusReporter) {
        if self.composites.is_none() {
            return;
        }
        for c in self.graph.composites() {
            reporter.report_status(&c.name, None, TaskStatus::NotStarted, "");
        }
    }

    /// Record a leaf status and report composites whose status changed.
    pub fn set(&self, leaf: &str, status: TaskStatus, reporter: &dyn StatusReporter) {
        let Some(node) = self.graph.leaf(leaf) else {
            return;
        };
        self.cells[node.index - 1].store(encode(status), Ordering::Release);
        self.report_ancestors(leaf, reporter);
    }

    /// Record that a leaf will never run because a prerequisite did not complete.
    pub fn mark_unreachable(&self, leaf: &str, reporter: &dyn StatusReporter) {
        let Some(node) = self.graph.leaf(leaf) else {
            return;
        };
        self.unreachable[node.index - 1].store(true, Ordering::Release);
        self.report_ancestors(leaf, reporter);
    }

    fn report_ancestors(&self, leaf: &str, reporter: &dyn StatusReporter) {
        let Some(composites) = &self.composites else {
            return;
        };
        // Held while reporting so composite updates reach the reporter in order.
        let Ok(mut last) = composites.lock() else {
            return;
        };
        for ancestor in self.graph.ancestors_of(leaf) {
            let Some(current) = self.composite(ancestor) else {
                continue;
            };
            if last.get(ancestor) != Some(&current) {
                last.insert(ancestor.clone(), current);
                reporter.report_status(ancestor, None, current, "");
            }
        }
    }
}
