use std::sync::Arc;
use std::time::Duration;

use crate::cancel::{self, Cancelled, CancellationToken};
use crate::executor::traits::{ProgressKey, StatusReporter};
use crate::state::ProblemLevel;

use super::deps::DependencyRegistry;

struct Inner {
    task: String,
    index: usize,
    attempt: u32,
    deps: Arc<DependencyRegistry>,
    reporter: Arc<dyn StatusReporter>,
    token: CancellationToken,
}

/// Everything an action gets to see while it runs.
#[derive(Clone)]
pub struct ActionContext {
    inner: Arc<Inner>,
}

impl ActionContext {
    pub(crate) fn new(
        task: &str,
        index: usize,
        attempt: u32,
        deps: Arc<DependencyRegistry>,
        reporter: Arc<dyn StatusReporter>,
        token: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                task: task.to_string(),
                index,
                attempt,
                deps,
                reporter,
                token,
            }),
        }
    }

    pub fn task(&self) -> &str {
        &self.inner.task
    }

    pub fn index(&self) -> usize {
        self.inner.index
    }

    /// Number of retries before this invocation (0 on the first run).
    pub fn attempt(&self) -> u32 {
        self.inner.attempt
    }

    /// Fires when the run is cancelled or when a human cancels this attempt.
    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// `Err(Cancelled)` once the attempt has been cancelled, for use with `?`
    /// between steps of a long action.
    pub fn check_cancelled(&self) -> Result<(), Cancelled> {
        Cancelled::check(&self.inner.token)
    }

    /// Let a human cancel this attempt from the front end.
    ///
    /// A cancelled attempt that does not succeed hands the task to a human
    /// with Retry offered.
    pub fn allow_cancel(&self) {
        tracing::debug!(task = %self.inner.task, "cancellation offered");
        self.inner
            .reporter
            .allow_cancel(&self.inner.task, self.inner.token.clone());
    }

    /// Fetch a dependency declared in the action's `requires()`.
    pub fn dep<T: ?Sized + Send + Sync + 'static>(&self) -> anyhow::Result<Arc<T>> {
        self.inner.deps.get::<T>().ok_or_else(|| {
            anyhow::anyhow!(
                "no dependency of type '{}' is registered",
                std::any::type_name::<T>()
            )
        })
    }

    /// Cancellation-aware sleep.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        cancel::sleep_attentively(duration, &self.inner.token).await
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(task = %self.inner.task, "{message}");
        self.inner
            .reporter
            .report_problem(&self.inner.task, ProblemLevel::Warn, message, None);
    }

    /// Show a progress indicator until the returned handle is dropped.
    pub fn progress(&self, label: &str, max: f64, unit: &str) -> ProgressHandle {
        let key = self
            .inner
            .reporter
            .create_progress(&self.inner.task, label, max, unit);
        ProgressHandle {
            key,
            reporter: self.inner.reporter.clone(),
        }
    }
}

impl std::fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("task", &self.inner.task)
            .field("index", &self.inner.index)
            .field("attempt", &self.inner.attempt)
            .finish()
    }
}

pub struct ProgressHandle {
    key: ProgressKey,
    reporter: Arc<dyn StatusReporter>,
}

impl ProgressHandle {
    pub fn key(&self) -> ProgressKey {
        self.key
    }

    pub fn set(&self, current: f64) {
        self.reporter.update_progress(self.key, current);
    }
}

impl Drop for ProgressHandle {
    fn drop(&mut self) {
        self.reporter.delete_progress(self.key);
    }
}
