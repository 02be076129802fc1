#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use autocheck_core::action::{ActionRegistry, ActionResolver, DependencyRegistry};
use autocheck_core::executor::{ExecutionEngine, ExecutionOpts, ProgressKey, RunSummary};
use autocheck_core::state::{ProblemLevel, TaskStatus, UserResponse};
use autocheck_core::task::{self, TaskDefinition};
use autocheck_core::{CancellationToken, StatusReporter};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Status {
        task: String,
        index: Option<usize>,
        status: TaskStatus,
        message: String,
    },
    Problem {
        task: String,
        level: ProblemLevel,
        message: String,
        detail: Option<String>,
    },
    Prompt {
        task: String,
        allowed: Vec<UserResponse>,
    },
    ProgressCreate {
        task: String,
        key: ProgressKey,
        max: f64,
    },
    ProgressUpdate {
        key: ProgressKey,
        current: f64,
    },
    ProgressDelete {
        key: ProgressKey,
    },
    CancelOffered {
        task: String,
    },
}

/// Records every call and answers prompts from a per-task script.
/// Tasks without a scripted answer wait forever.
#[derive(Default)]
pub struct ScriptedReporter {
    calls: Mutex<Vec<Call>>,
    answers: Mutex<HashMap<String, VecDeque<UserResponse>>>,
    next_key: AtomicU64,
    prompted: Notify,
    /// Tasks whose attempt is cancelled as soon as cancellation is offered.
    cancel_on_offer: Mutex<HashSet<String>>,
}

impl ScriptedReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answer(self: &Arc<Self>, task: &str, responses: &[UserResponse]) -> Arc<Self> {
        self.answers
            .lock()
            .unwrap()
            .entry(task.to_string())
            .or_default()
            .extend(responses.iter().copied());
        self.clone()
    }

    /// Cancel the first attempt of `task` that offers cancellation.
    pub fn cancel_when_offered(self: &Arc<Self>, task: &str) -> Arc<Self> {
        self.cancel_on_offer
            .lock()
            .unwrap()
            .insert(task.to_string());
        self.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    /// Statuses reported for `task`, in order, without the initial NotStarted.
    pub fn statuses(&self, task: &str) -> Vec<TaskStatus> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Status { task: t, status, .. } if t == task => Some(status),
                _ => None,
            })
            .skip(1)
            .collect()
    }

    /// Statuses reported for the composite `task`, including the initial one.
    pub fn composite_statuses(&self, task: &str) -> Vec<TaskStatus> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Status {
                    task: t,
                    index: None,
                    status,
                    ..
                } if t == task => Some(status),
                _ => None,
            })
            .collect()
    }

    pub fn problems(&self, task: &str) -> Vec<(ProblemLevel, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Problem {
                    task: t,
                    level,
                    message,
                    ..
                } if t == task => Some((level, message)),
                _ => None,
            })
            .collect()
    }

    pub fn prompts(&self, task: &str) -> Vec<Vec<UserResponse>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Prompt { task: t, allowed } if t == task => Some(allowed),
                _ => None,
            })
            .collect()
    }

    pub fn total_prompts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Prompt { .. }))
            .count()
    }

    /// Position in the call log of the first `status` report for `task`.
    pub fn position(&self, task: &str, status: TaskStatus) -> Option<usize> {
        self.calls().iter().position(|c| {
            matches!(c, Call::Status { task: t, status: s, .. } if t == task && *s == status)
        })
    }

    /// Wait until some worker is blocked on a human.
    pub async fn wait_for_prompt(&self) {
        self.prompted.notified().await;
    }
}

#[async_trait]
impl StatusReporter for ScriptedReporter {
    fn name(&self) -> &str {
        "scripted"
    }

    fn report_status(&self, task: &str, index: Option<usize>, status: TaskStatus, message: &str) {
        self.record(Call::Status {
            task: task.to_string(),
            index,
            status,
            message: message.to_string(),
        });
    }

    fn report_problem(&self, task: &str, level: ProblemLevel, message: &str, detail: Option<&str>) {
        self.record(Call::Problem {
            task: task.to_string(),
            level,
            message: message.to_string(),
            detail: detail.map(str::to_string),
        });
    }

    async fn wait_for_human(
        &self,
        task: &str,
        _index: Option<usize>,
        _prompt: &str,
        allowed: &[UserResponse],
    ) -> UserResponse {
        self.record(Call::Prompt {
            task: task.to_string(),
            allowed: allowed.to_vec(),
        });
        let scripted = self
            .answers
            .lock()
            .unwrap()
            .get_mut(task)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(response) => response,
            None => {
                self.prompted.notify_one();
                std::future::pending().await
            }
        }
    }

    fn create_progress(&self, task: &str, _label: &str, max: f64, _unit: &str) -> ProgressKey {
        let key = ProgressKey(self.next_key.fetch_add(1, Ordering::SeqCst));
        self.record(Call::ProgressCreate {
            task: task.to_string(),
            key,
            max,
        });
        key
    }

    fn update_progress(&self, key: ProgressKey, current: f64) {
        self.record(Call::ProgressUpdate { key, current });
    }

    fn delete_progress(&self, key: ProgressKey) {
        self.record(Call::ProgressDelete { key });
    }

    fn allow_cancel(&self, task: &str, token: CancellationToken) {
        self.record(Call::CancelOffered {
            task: task.to_string(),
        });
        if self.cancel_on_offer.lock().unwrap().remove(task) {
            token.cancel();
        }
    }
}

pub fn definition(json: &str) -> TaskDefinition {
    task::from_str(json).expect("test definition should load")
}

/// `{"name": "root", "subtasks": [...]}` from `(name, prerequisites)` pairs.
pub fn flat(leaves: &[(&str, &[&str])]) -> TaskDefinition {
    let subtasks: Vec<serde_json::Value> = leaves
        .iter()
        .map(|(name, prereqs)| {
            serde_json::json!({
                "name": name,
                "description": format!("Do {name} by hand."),
                "prerequisites": prereqs,
            })
        })
        .collect();
    definition(&serde_json::json!({"name": "root", "subtasks": subtasks}).to_string())
}

pub struct Harness {
    pub def: TaskDefinition,
    pub actions: ActionRegistry,
    pub deps: DependencyRegistry,
    pub opts: ExecutionOpts,
    pub auto: Option<Vec<String>>,
    pub only_auto: Vec<String>,
    pub token: CancellationToken,
}

impl Harness {
    pub fn new(def: TaskDefinition) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("autocheck_core=debug")
            .try_init();
        Self {
            def,
            actions: ActionRegistry::new(),
            deps: DependencyRegistry::new(),
            opts: ExecutionOpts::default(),
            auto: None,
            only_auto: Vec::new(),
            token: CancellationToken::new(),
        }
    }

    pub fn engine(self, reporter: Arc<ScriptedReporter>) -> ExecutionEngine {
        let plan = ActionResolver::new(&self.actions, &self.deps)
            .auto_whitelist(self.auto)
            .force_only_auto(self.only_auto)
            .resolve(&self.def.graph)
            .expect("test actions should resolve");
        ExecutionEngine::builder(Arc::new(self.def.graph), Arc::new(plan), reporter)
            .dependencies(Arc::new(self.deps))
            .cancellation(self.token)
            .opts(self.opts)
            .build()
    }

    pub async fn run(self, reporter: Arc<ScriptedReporter>) -> RunSummary {
        let engine = self.engine(reporter);
        tokio::time::timeout(Duration::from_secs(10), engine.run())
            .await
            .expect("run should finish")
    }
}
