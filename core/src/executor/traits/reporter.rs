use async_trait::async_trait;

use crate::cancel::CancellationToken;
use crate::executor::types::RunSummary;
use crate::state::{ProblemLevel, TaskStatus, UserResponse};

/// Handle for a progress indicator, allocated by the reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressKey(pub u64);

/// 状态输出接口（所有调用都可能来自并发的 worker）
///
/// Implementations serialize concurrent calls themselves. The engine never
/// retries a call and never reads state back from the reporter.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    fn name(&self) -> &str;

    /// A task moved to `status`. `index` orders leaves; composites pass `None`.
    fn report_status(&self, task: &str, index: Option<usize>, status: TaskStatus, message: &str);

    fn report_problem(&self, task: &str, level: ProblemLevel, message: &str, detail: Option<&str>);

    /// Block until a human picks one of `allowed`. Must return a member of `allowed`.
    async fn wait_for_human(
        &self,
        task: &str,
        index: Option<usize>,
        prompt: &str,
        allowed: &[UserResponse],
    ) -> UserResponse;

    fn create_progress(&self, task: &str, label: &str, max: f64, unit: &str) -> ProgressKey;

    fn update_progress(&self, key: ProgressKey, current: f64);

    fn delete_progress(&self, key: ProgressKey);

    /// The running action of `task` accepts cancellation through `token`
    /// until the task leaves Running.
    fn allow_cancel(&self, _task: &str, _token: CancellationToken) {}

    /// Run-level lifecycle events.
    fn report_run(&self, _event: &RunEvent) {}
}

/// 运行级事件
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStart {
        run_id: String,
        total_tasks: usize,
    },
    Cancelling {
        run_id: String,
    },
    RunEnd {
        run_id: String,
        summary: RunSummary,
    },
}
