use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::cancel::CancellationToken;

/// Cancels the running attempt of one task without stopping the run.
///
/// The task then asks a human what to do, with Retry offered.
#[derive(Debug, Clone, Default)]
pub struct TaskCanceller {
    running: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl TaskCanceller {
    /// Returns `false` if `task` has no action running right now.
    pub fn cancel(&self, task: &str) -> bool {
        let token = self
            .running
            .lock()
            .ok()
            .and_then(|running| running.get(task).cloned());
        match token {
            Some(token) => {
                tracing::info!(task = %task, "cancelling task");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Tasks whose action is currently running.
    pub fn running(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .running
            .lock()
            .map(|running| running.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub(crate) fn register(&self, task: &str, token: CancellationToken) {
        if let Ok(mut running) = self.running.lock() {
            running.insert(task.to_string(), token);
        }
    }

    pub(crate) fn unregister(&self, task: &str) {
        if let Ok(mut running) = self.running.lock() {
            running.remove(task);
        }
    }
}
