use serde::Serialize;

use crate::state::TaskStatus;

/// Final state of one leaf task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskResult {
    /// Task name
    pub name: String,

    /// 1-based execution-order index
    pub index: usize,

    /// Status when the run ended
    pub status: TaskStatus,

    /// Number of retries requested by a human
    pub attempts: u32,
}

/// Result of running a task graph
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,

    /// Every leaf, in index order
    pub tasks: Vec<TaskResult>,

    /// Tasks that never started because a prerequisite did not succeed
    pub unreachable: Vec<String>,

    /// Whether cancellation was requested during the run
    pub cancelled: bool,

    /// Total execution duration in milliseconds
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn status_of(&self, name: &str) -> Option<TaskStatus> {
        self.tasks.iter().find(|t| t.name == name).map(|t| t.status)
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    /// True when every leaf ended Done or Skipped.
    pub fn all_satisfied(&self) -> bool {
        self.tasks.iter().all(|t| t.status.satisfies_prerequisite())
    }
}
