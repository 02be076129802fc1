use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{watch, Semaphore};
use uuid::Uuid;

use crate::action::{ActionContext, ActionOutcome, Binding, DependencyRegistry, ResolvedPlan};
use crate::cancel::CancellationToken;
use crate::state::{ProblemLevel, StatusTransition, TaskEvent, TaskStatus, UserResponse};

use super::board::StatusBoard;
use super::canceller::TaskCanceller;
use super::graph::{LeafNode, TaskGraph};
use super::traits::{RunEvent, StatusReporter};
use super::types::{ExecutionOpts, RunSummary, TaskResult};

const NOT_AUTOMATED: &str = "This task is not automated.";
const NOT_WHITELISTED: &str = "Task automation skipped because this task is not in the list of tasks to automate. You can retry if you want the task to be automated after all.";
const CANCELLED_BY_USER: &str = "The task was cancelled by the user. Requesting user input.";
/// Task name used for problems that belong to the run rather than a task.
const STARTUP_TASK: &str = "startup";

/// What dependents observe about a task.
#[derive(Debug, Clone, Copy)]
struct Signal {
    status: TaskStatus,
    /// The worker has exited; `status` will not change again.
    settled: bool,
}

/// Execution engine for a resolved task graph
///
/// Starts one worker per leaf. Each worker waits for its prerequisites,
/// runs its action, and falls back to a human when the action cannot finish
/// the task.
pub struct ExecutionEngine {
    graph: Arc<TaskGraph>,
    plan: Arc<ResolvedPlan>,
    deps: Arc<DependencyRegistry>,
    reporter: Arc<dyn StatusReporter>,
    token: CancellationToken,
    canceller: TaskCanceller,
    opts: ExecutionOpts,
}

pub struct ExecutionEngineBuilder {
    graph: Arc<TaskGraph>,
    plan: Arc<ResolvedPlan>,
    reporter: Arc<dyn StatusReporter>,
    deps: Option<Arc<DependencyRegistry>>,
    token: Option<CancellationToken>,
    opts: ExecutionOpts,
}

impl ExecutionEngineBuilder {
    pub fn new(
        graph: Arc<TaskGraph>,
        plan: Arc<ResolvedPlan>,
        reporter: Arc<dyn StatusReporter>,
    ) -> Self {
        Self {
            graph,
            plan,
            reporter,
            deps: None,
            token: None,
            opts: ExecutionOpts::default(),
        }
    }

    pub fn dependencies(mut self, deps: Arc<DependencyRegistry>) -> Self {
        self.deps = Some(deps);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn opts(mut self, opts: ExecutionOpts) -> Self {
        self.opts = opts;
        self
    }

    pub fn max_parallel(mut self, max: usize) -> Self {
        self.opts.max_parallel = Some(max).filter(|n| *n > 0);
        self
    }

    pub fn build(self) -> ExecutionEngine {
        ExecutionEngine {
            graph: self.graph,
            plan: self.plan,
            deps: self.deps.unwrap_or_default(),
            reporter: self.reporter,
            token: self.token.unwrap_or_default(),
            canceller: TaskCanceller::default(),
            opts: self.opts,
        }
    }
}

impl ExecutionEngine {
    pub fn builder(
        graph: Arc<TaskGraph>,
        plan: Arc<ResolvedPlan>,
        reporter: Arc<dyn StatusReporter>,
    ) -> ExecutionEngineBuilder {
        ExecutionEngineBuilder::new(graph, plan, reporter)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Handle for cancelling a single task's running action.
    pub fn task_canceller(&self) -> TaskCanceller {
        self.canceller.clone()
    }

    /// Run every leaf to a terminal state (or until it is found unreachable).
    pub async fn run(&self) -> RunSummary {
        let start = Instant::now();
        let run_id = self
            .opts
            .run_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        tracing::info!(run_id = %run_id, tasks = self.graph.len(), "run started");
        self.reporter.report_run(&RunEvent::RunStart {
            run_id: run_id.clone(),
            total_tasks: self.graph.len(),
        });

        let board = Arc::new(StatusBoard::new(
            self.graph.clone(),
            self.opts.report_composites,
        ));
        for leaf in self.graph.leaves() {
            self.reporter
                .report_status(&leaf.name, Some(leaf.index), TaskStatus::NotStarted, "-");
        }
        board.report_initial(self.reporter.as_ref());

        if self.plan.warn_unused && !self.plan.unused_actions.is_empty() {
            self.reporter.report_problem(
                STARTUP_TASK,
                ProblemLevel::Warn,
                &format!(
                    "The following actions are not used by any task: {}",
                    self.plan.unused_actions.join(", ")
                ),
                None,
            );
        }

        let shared = Arc::new(Shared {
            reporter: self.reporter.clone(),
            deps: self.deps.clone(),
            token: self.token.clone(),
            canceller: self.canceller.clone(),
            semaphore: self.opts.max_parallel.map(|n| Arc::new(Semaphore::new(n))),
            board,
        });

        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for leaf in self.graph.leaves() {
            let (tx, rx) = watch::channel(Signal {
                status: TaskStatus::NotStarted,
                settled: false,
            });
            senders.insert(leaf.name.clone(), tx);
            receivers.insert(leaf.name.clone(), rx);
        }

        let mut workers = FuturesUnordered::new();
        for leaf in self.graph.leaves() {
            let Some(tx) = senders.remove(&leaf.name) else {
                continue;
            };
            let (binding, only_auto) = match self.plan.get(&leaf.name) {
                Some(bound) => (bound.binding.clone(), bound.only_auto),
                None => (Binding::Manual, leaf.only_auto),
            };
            let prerequisites = leaf
                .prerequisites
                .iter()
                .filter_map(|p| receivers.get(p).map(|rx| (p.clone(), rx.clone())))
                .collect();

            let worker = Worker {
                leaf: leaf.clone(),
                binding,
                only_auto,
                prerequisites,
                tx,
                attempts: 0,
                gate_open: false,
                shared: shared.clone(),
            };
            let name = leaf.name.clone();
            let index = leaf.index;
            let handle = tokio::spawn(worker.run());
            workers.push(async move { (name, index, handle.await) });
        }
        drop(receivers);

        let mut tasks = Vec::with_capacity(self.graph.len());
        let mut unreachable = Vec::new();
        while let Some((name, index, joined)) = workers.next().await {
            match joined {
                Ok(report) => {
                    if report.unreachable {
                        unreachable.push((report.result.index, report.result.name.clone()));
                    }
                    tasks.push(report.result);
                }
                Err(e) => {
                    tracing::error!(task = %name, error = %e, "task worker aborted");
                    tasks.push(TaskResult {
                        name,
                        index,
                        status: TaskStatus::Failed,
                        attempts: 0,
                    });
                }
            }
        }
        tasks.sort_by_key(|t| t.index);
        unreachable.sort();

        let summary = RunSummary {
            run_id: run_id.clone(),
            tasks,
            unreachable: unreachable.into_iter().map(|(_, name)| name).collect(),
            cancelled: self.token.is_cancelled(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        tracing::info!(
            run_id = %run_id,
            done = summary.count(TaskStatus::Done),
            skipped = summary.count(TaskStatus::Skipped),
            failed = summary.count(TaskStatus::Failed),
            unreachable = summary.unreachable.len(),
            cancelled = summary.cancelled,
            duration_ms = summary.duration_ms,
            "run finished"
        );
        self.reporter.report_run(&RunEvent::RunEnd {
            run_id,
            summary: summary.clone(),
        });
        summary
    }
}

struct Shared {
    reporter: Arc<dyn StatusReporter>,
    deps: Arc<DependencyRegistry>,
    token: CancellationToken,
    canceller: TaskCanceller,
    semaphore: Option<Arc<Semaphore>>,
    board: Arc<StatusBoard>,
}

struct WorkerReport {
    result: TaskResult,
    unreachable: bool,
}

enum Attempt {
    Finished(ActionOutcome),
    /// A human cancelled this attempt and the action did not succeed.
    CancelledByUser,
    /// The run was cancelled before the action could start.
    NotStarted,
}

enum PrerequisiteWait {
    Ready,
    Blocked(String),
    Cancelled,
}

struct Worker {
    leaf: LeafNode,
    binding: Binding,
    only_auto: bool,
    prerequisites: Vec<(String, watch::Receiver<Signal>)>,
    tx: watch::Sender<Signal>,
    attempts: u32,
    /// A gated action runs only after the first Retry.
    gate_open: bool,
    shared: Arc<Shared>,
}

impl Worker {
    async fn run(mut self) -> WorkerReport {
        let (status, unreachable) = match self.wait_for_prerequisites().await {
            PrerequisiteWait::Ready => (self.drive().await, false),
            PrerequisiteWait::Blocked(prerequisite) => {
                tracing::warn!(task = %self.leaf.name, prerequisite = %prerequisite, "task unreachable");
                self.shared.reporter.report_problem(
                    &self.leaf.name,
                    ProblemLevel::Warn,
                    &format!(
                        "This task will not run because its prerequisite '{prerequisite}' did not complete."
                    ),
                    None,
                );
                self.shared
                    .board
                    .mark_unreachable(&self.leaf.name, self.shared.reporter.as_ref());
                (TaskStatus::NotStarted, true)
            }
            PrerequisiteWait::Cancelled => {
                let status = self.step(TaskStatus::NotStarted, TaskEvent::Cancelled);
                tracing::info!(task = %self.leaf.name, "task cancelled before it started");
                self.publish(status, "Task cancelled before it started.");
                (status, false)
            }
        };

        self.tx.send_replace(Signal {
            status,
            settled: true,
        });

        WorkerReport {
            result: TaskResult {
                name: self.leaf.name.clone(),
                index: self.leaf.index,
                status,
                attempts: self.attempts,
            },
            unreachable,
        }
    }

    async fn wait_for_prerequisites(&mut self) -> PrerequisiteWait {
        let token = self.shared.token.clone();
        for (name, rx) in &mut self.prerequisites {
            let observed = tokio::select! {
                biased;
                _ = token.cancelled() => return PrerequisiteWait::Cancelled,
                r = rx.wait_for(|s| s.settled) => r.map(|s| s.status),
            };
            match observed {
                Ok(status) if status.satisfies_prerequisite() => continue,
                _ if token.is_cancelled() => return PrerequisiteWait::Cancelled,
                _ => return PrerequisiteWait::Blocked(name.clone()),
            }
        }
        PrerequisiteWait::Ready
    }

    /// Drive the state machine from NotStarted to a terminal state.
    async fn drive(&mut self) -> TaskStatus {
        let mut status = TaskStatus::NotStarted;
        let (mut event, mut message) = match self.binding {
            Binding::Manual => (TaskEvent::StartManual, NOT_AUTOMATED.to_string()),
            _ => (TaskEvent::Start, String::new()),
        };
        let mut allow_retry = false;

        loop {
            // Safe point: never start (or restart) work after cancellation.
            if self.shared.token.is_cancelled()
                && matches!(
                    event,
                    TaskEvent::Start
                        | TaskEvent::StartManual
                        | TaskEvent::NotImplemented
                        | TaskEvent::Raised
                        | TaskEvent::Responded(UserResponse::Retry)
                )
            {
                tracing::info!(task = %self.leaf.name, "task cancelled");
                event = TaskEvent::Cancelled;
                message = "Task cancelled.".to_string();
            }

            if status == TaskStatus::NotStarted
                && matches!(event, TaskEvent::StartManual)
                && self.only_auto
            {
                message = "This task has no automation and cannot be completed manually.".into();
            }

            status = self.step(status, event);
            match status {
                TaskStatus::Running => {
                    let started = if self.attempts == 0 {
                        "Task started.".to_string()
                    } else {
                        format!("Task restarted (retry {}).", self.attempts)
                    };
                    self.publish(status, &started);

                    match self.invoke().await {
                        Attempt::NotStarted => {
                            event = TaskEvent::Cancelled;
                            message = "Task cancelled before its action could start.".into();
                        }
                        Attempt::Finished(outcome)
                            if !outcome.is_success() && self.shared.token.is_cancelled() =>
                        {
                            tracing::info!(task = %self.leaf.name, ?outcome, "action stopped after cancellation");
                            event = TaskEvent::Cancelled;
                            message = "Task cancelled.".into();
                        }
                        Attempt::CancelledByUser => {
                            tracing::info!(task = %self.leaf.name, attempt = self.attempts, "task cancelled by the user");
                            event = TaskEvent::NotImplemented;
                            message = if self.only_auto {
                                "The task was cancelled by the user and cannot be completed manually.".into()
                            } else {
                                CANCELLED_BY_USER.into()
                            };
                            allow_retry = true;
                        }
                        Attempt::Finished(outcome) => {
                            (event, message, allow_retry) = self.interpret(outcome);
                        }
                    }
                }
                TaskStatus::WaitingForHuman => {
                    self.publish(status, &message);
                    match self.ask_human(allow_retry).await {
                        Some(response) => {
                            tracing::info!(task = %self.leaf.name, response = response.as_str(), "human responded");
                            event = TaskEvent::Responded(response);
                            match response {
                                UserResponse::Done => message = "Task completed manually.".into(),
                                UserResponse::Skip => message = "Task skipped.".into(),
                                UserResponse::Retry => self.attempts += 1,
                            }
                        }
                        None => {
                            tracing::info!(task = %self.leaf.name, "cancelled while waiting for a human");
                            event = TaskEvent::Cancelled;
                            message = "Task cancelled while waiting for a response.".into();
                        }
                    }
                }
                TaskStatus::Done | TaskStatus::Skipped | TaskStatus::Failed => {
                    self.publish(status, &message);
                    return status;
                }
                TaskStatus::NotStarted => {
                    self.publish(TaskStatus::Failed, "Task could not be started.");
                    return TaskStatus::Failed;
                }
            }
        }
    }

    fn step(&self, from: TaskStatus, event: TaskEvent) -> TaskStatus {
        match StatusTransition::apply(from, event, self.only_auto) {
            Ok(next) => next,
            Err(e) => {
                tracing::error!(task = %self.leaf.name, error = %e, "illegal task transition");
                TaskStatus::Failed
            }
        }
    }

    fn interpret(&self, outcome: ActionOutcome) -> (TaskEvent, String, bool) {
        let name = &self.leaf.name;
        match outcome {
            ActionOutcome::Success => (
                TaskEvent::Succeeded,
                "Task completed automatically.".into(),
                false,
            ),
            ActionOutcome::NotImplemented {
                message,
                allow_retry,
            } => {
                tracing::warn!(task = %name, %message, "action not implemented");
                let message = if message.trim().is_empty() {
                    NOT_AUTOMATED.to_string()
                } else {
                    message
                };
                let message = if self.only_auto {
                    format!("{message} This task cannot be completed manually.")
                } else {
                    message
                };
                (TaskEvent::NotImplemented, message, allow_retry)
            }
            ActionOutcome::Failure { message, detail } => {
                tracing::error!(task = %name, %message, detail = ?detail, attempt = self.attempts, "action failed");
                self.shared.reporter.report_problem(
                    name,
                    ProblemLevel::Error,
                    &format!(
                        "An error occurred while trying to complete the task automatically: {message}"
                    ),
                    detail.as_deref(),
                );
                let next = if self.only_auto {
                    "The task automation failed and this task cannot be completed manually."
                } else {
                    "The task automation failed. Requesting user input."
                };
                (TaskEvent::Raised, next.into(), true)
            }
        }
    }

    /// Run the bound action on its own task so a panic stays contained.
    ///
    /// Each attempt gets a child of the run token that the task canceller
    /// can fire on its own.
    async fn invoke(&mut self) -> Attempt {
        let action = match &self.binding {
            Binding::Gated(_) if !self.gate_open => {
                self.gate_open = true;
                return Attempt::Finished(ActionOutcome::NotImplemented {
                    message: NOT_WHITELISTED.into(),
                    allow_retry: true,
                });
            }
            Binding::Automatic(a) | Binding::Gated(a) => a.clone(),
            Binding::Manual => {
                return Attempt::Finished(ActionOutcome::not_implemented(NOT_AUTOMATED))
            }
        };

        let _permit = match &self.shared.semaphore {
            Some(semaphore) => tokio::select! {
                biased;
                _ = self.shared.token.cancelled() => return Attempt::NotStarted,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            },
            None => None,
        };

        let attempt_token = self.shared.token.child_token();
        let ctx = ActionContext::new(
            &self.leaf.name,
            self.leaf.index,
            self.attempts,
            self.shared.deps.clone(),
            self.shared.reporter.clone(),
            attempt_token.clone(),
        );
        self.shared
            .canceller
            .register(&self.leaf.name, attempt_token.clone());
        tracing::debug!(task = %self.leaf.name, attempt = self.attempts, "invoking action");
        let joined = tokio::spawn(async move { action.run(ctx).await }).await;
        self.shared.canceller.unregister(&self.leaf.name);

        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                ActionOutcome::Failure {
                    message: format!("the action panicked: {message}"),
                    detail: None,
                }
            }
            Err(e) => ActionOutcome::failure(e.to_string()),
        };
        if !outcome.is_success()
            && attempt_token.is_cancelled()
            && !self.shared.token.is_cancelled()
        {
            return Attempt::CancelledByUser;
        }
        Attempt::Finished(outcome)
    }

    /// Returns `None` when the run is cancelled first.
    async fn ask_human(&self, allow_retry: bool) -> Option<UserResponse> {
        let allowed = UserResponse::allowed(allow_retry);
        loop {
            let response = tokio::select! {
                biased;
                _ = self.shared.token.cancelled() => return None,
                r = self.shared.reporter.wait_for_human(
                    &self.leaf.name,
                    Some(self.leaf.index),
                    &self.leaf.description,
                    &allowed,
                ) => r,
            };
            if allowed.contains(&response) {
                return Some(response);
            }
            tracing::warn!(
                task = %self.leaf.name,
                response = response.as_str(),
                reporter = self.shared.reporter.name(),
                "reporter returned a response that was not offered; asking again"
            );
        }
    }

    fn publish(&self, status: TaskStatus, message: &str) {
        tracing::debug!(task = %self.leaf.name, status = %status, "{message}");
        self.tx.send_replace(Signal {
            status,
            settled: false,
        });
        let reporter = self.shared.reporter.as_ref();
        reporter.report_status(&self.leaf.name, Some(self.leaf.index), status, message);
        self.shared.board.set(&self.leaf.name, status, reporter);
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
