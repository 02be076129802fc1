use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use autocheck_core::executor::{ProgressKey, RunEvent, StatusReporter};
use autocheck_core::state::{ProblemLevel, TaskStatus, UserResponse};
use autocheck_core::CancellationToken;
use chrono::Local;
use serde_json::{json, Value};

use super::input::{self, LineInput};

/// Machine-readable reporter: one JSON object per line on stdout, answers
/// read line by line from stdin.
///
/// An answer is either a bare word (`done`, `retry`, `skip`) or an object
/// such as `{"task": "start_stream", "response": "retry"}`. A task that
/// emitted `task.cancellable` is cancelled by
/// `{"action": "cancel", "task": "start_stream"}`.
pub struct JsonlReporter {
    out: Mutex<Box<dyn Write + Send>>,
    run_id: Mutex<Option<String>>,
    next_key: AtomicU64,
    prompt_lock: tokio::sync::Mutex<()>,
    input: LineInput,
}

impl JsonlReporter {
    pub fn new() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self::with_io(out, LineInput::stdin())
    }

    pub fn with_io(out: Box<dyn Write + Send>, input: LineInput) -> Self {
        Self {
            out: Mutex::new(out),
            run_id: Mutex::new(None),
            next_key: AtomicU64::new(1),
            prompt_lock: tokio::sync::Mutex::new(()),
            input,
        }
    }

    fn envelope(&self, event_type: &str, body: Value) -> Value {
        let run_id = self.run_id.lock().ok().and_then(|r| r.clone());
        let mut value = json!({
            "v": 1,
            "event_type": event_type,
            "ts": Local::now().to_rfc3339(),
            "run_id": run_id,
        });
        if let (Some(obj), Value::Object(body)) = (value.as_object_mut(), body) {
            obj.extend(body);
        }
        value
    }

    fn emit(&self, event_type: &str, body: Value) {
        let value = self.envelope(event_type, body);
        let line = serde_json::to_string(&value).unwrap_or_else(|_| "{}".into());
        if let Ok(mut out) = self.out.lock() {
            if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
                tracing::warn!(error = %e, "failed to write jsonl event");
            }
        }
    }

    fn run_event_to_json(event: &RunEvent) -> (&'static str, Value) {
        match event {
            RunEvent::RunStart { total_tasks, .. } => (
                "run.start",
                json!({ "metadata": { "total_tasks": total_tasks } }),
            ),
            RunEvent::Cancelling { .. } => ("run.cancelling", json!({})),
            RunEvent::RunEnd { summary, .. } => (
                "run.end",
                json!({
                    "metadata": {
                        "total_tasks": summary.tasks.len(),
                        "done": summary.count(TaskStatus::Done),
                        "skipped": summary.count(TaskStatus::Skipped),
                        "failed": summary.count(TaskStatus::Failed),
                        "unreachable": summary.unreachable,
                        "cancelled": summary.cancelled,
                        "duration_ms": summary.duration_ms,
                        "tasks": summary.tasks,
                    }
                }),
            ),
        }
    }
}

impl Default for JsonlReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Accept `retry` or `{"response": "retry"}` for the prompt of `task`.
///
/// An object naming a different task is rejected.
pub fn parse_response(
    line: &str,
    task: &str,
    allowed: &[UserResponse],
) -> Result<UserResponse, String> {
    let line = line.trim();
    let word = match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(obj)) => {
            match obj.get("task") {
                None | Some(Value::Null) => {}
                Some(Value::String(named)) if named == task => {}
                Some(Value::String(named)) => {
                    return Err(format!(
                        "the open prompt is for task '{task}', not '{named}'"
                    ))
                }
                Some(_) => return Err("field 'task' must be a string".to_string()),
            }
            obj.get("response")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| "missing string field 'response'".to_string())?
        }
        _ => line.to_string(),
    };
    input::parse_choice(&word, allowed)
}

#[async_trait]
impl StatusReporter for JsonlReporter {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn report_status(&self, task: &str, index: Option<usize>, status: TaskStatus, message: &str) {
        tracing::info!(task = %task, status = %status, "{message}");
        if index.is_some() && status != TaskStatus::Running {
            self.input.disallow_cancel(task);
        }
        self.emit(
            "task.status",
            json!({
                "task": task,
                "index": index,
                "status": status,
                "message": message,
            }),
        );
    }

    fn report_problem(&self, task: &str, level: ProblemLevel, message: &str, detail: Option<&str>) {
        match level {
            ProblemLevel::Warn => tracing::warn!(task = %task, "{message}"),
            _ => tracing::error!(task = %task, level = level.as_str(), "{message}"),
        }
        self.emit(
            "task.problem",
            json!({
                "task": task,
                "level": level,
                "message": message,
                "detail": detail,
            }),
        );
    }

    async fn wait_for_human(
        &self,
        task: &str,
        index: Option<usize>,
        prompt: &str,
        allowed: &[UserResponse],
    ) -> UserResponse {
        let _turn = self.prompt_lock.lock().await;
        loop {
            self.emit(
                "human.prompt",
                json!({
                    "task": task,
                    "index": index,
                    "prompt": prompt,
                    "allowed": allowed,
                }),
            );
            let Some(line) = self.input.next_line().await else {
                tracing::warn!(task = %task, "stdin closed while waiting for a response");
                return std::future::pending().await;
            };
            match parse_response(&line, task, allowed) {
                Ok(response) => return response,
                Err(e) => self.emit(
                    "human.invalid",
                    json!({ "task": task, "input": line.trim(), "error": e }),
                ),
            }
        }
    }

    fn create_progress(&self, task: &str, label: &str, max: f64, unit: &str) -> ProgressKey {
        let key = ProgressKey(self.next_key.fetch_add(1, Ordering::Relaxed));
        self.emit(
            "progress.create",
            json!({ "key": key.0, "task": task, "label": label, "max": max, "unit": unit }),
        );
        key
    }

    fn update_progress(&self, key: ProgressKey, current: f64) {
        self.emit("progress.update", json!({ "key": key.0, "current": current }));
    }

    fn delete_progress(&self, key: ProgressKey) {
        self.emit("progress.delete", json!({ "key": key.0 }));
    }

    fn allow_cancel(&self, task: &str, token: CancellationToken) {
        self.input.allow_cancel(task, token);
        self.emit("task.cancellable", json!({ "task": task }));
    }

    fn report_run(&self, event: &RunEvent) {
        if let RunEvent::RunStart { run_id, .. } = event {
            if let Ok(mut current) = self.run_id.lock() {
                *current = Some(run_id.clone());
            }
        }
        let (event_type, body) = Self::run_event_to_json(event);
        self.emit(event_type, body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autocheck_core::executor::{RunSummary, TaskResult};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn lines(&self) -> Vec<Value> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    #[test]
    fn test_events_carry_run_id_after_start() {
        let buf = SharedBuf::default();
        let reporter = JsonlReporter::with_writer(Box::new(buf.clone()));

        reporter.report_status("early", Some(1), TaskStatus::NotStarted, "-");
        reporter.report_run(&RunEvent::RunStart {
            run_id: "run-7".into(),
            total_tasks: 1,
        });
        reporter.report_status("early", Some(1), TaskStatus::Running, "Task started.");

        let lines = buf.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["run_id"], Value::Null);
        assert_eq!(lines[1]["event_type"], "run.start");
        assert_eq!(lines[1]["metadata"]["total_tasks"], 1);
        assert_eq!(lines[2]["run_id"], "run-7");
        assert_eq!(lines[2]["status"], "running");
        assert_eq!(lines[2]["v"], 1);
    }

    #[test]
    fn test_problem_and_progress_events() {
        let buf = SharedBuf::default();
        let reporter = JsonlReporter::with_writer(Box::new(buf.clone()));

        reporter.report_problem("x", ProblemLevel::Error, "boom", Some("stack"));
        let key = reporter.create_progress("x", "Uploading", 4.0, "files");
        reporter.update_progress(key, 2.0);
        reporter.delete_progress(key);

        let lines = buf.lines();
        assert_eq!(lines[0]["event_type"], "task.problem");
        assert_eq!(lines[0]["level"], "error");
        assert_eq!(lines[0]["detail"], "stack");
        assert_eq!(lines[1]["event_type"], "progress.create");
        assert_eq!(lines[2]["current"], 2.0);
        assert_eq!(lines[3]["key"], lines[1]["key"]);
    }

    #[test]
    fn test_run_end_metadata() {
        let summary = RunSummary {
            run_id: "r".into(),
            tasks: vec![TaskResult {
                name: "a".into(),
                index: 1,
                status: TaskStatus::Skipped,
                attempts: 1,
            }],
            unreachable: vec![],
            cancelled: true,
            duration_ms: 12,
        };
        let (kind, body) = JsonlReporter::run_event_to_json(&RunEvent::RunEnd {
            run_id: "r".into(),
            summary,
        });
        assert_eq!(kind, "run.end");
        assert_eq!(body["metadata"]["skipped"], 1);
        assert_eq!(body["metadata"]["cancelled"], true);
        assert_eq!(body["metadata"]["tasks"][0]["status"], "skipped");
    }

    #[test]
    fn test_parse_response_forms() {
        let allowed = UserResponse::allowed(true);
        assert_eq!(parse_response("retry\n", "a", &allowed), Ok(UserResponse::Retry));
        assert_eq!(
            parse_response(r#"{"task": "a", "response": "skip"}"#, "a", &allowed),
            Ok(UserResponse::Skip)
        );
        assert_eq!(
            parse_response(r#"{"response": "done"}"#, "a", &allowed),
            Ok(UserResponse::Done)
        );
        assert!(parse_response(r#"{"task": "a"}"#, "a", &allowed).is_err());
        assert!(parse_response("retry", "a", &UserResponse::allowed(false)).is_err());
    }

    #[test]
    fn test_parse_response_rejects_answer_for_another_task() {
        let allowed = UserResponse::allowed(true);
        let err = parse_response(
            r#"{"task": "some_other_task", "response": "skip"}"#,
            "start_stream",
            &allowed,
        )
        .unwrap_err();
        assert!(err.contains("some_other_task"));
        assert!(parse_response(r#"{"task": 3, "response": "skip"}"#, "start_stream", &allowed).is_err());
    }

    #[tokio::test]
    async fn test_prompt_ignores_answers_for_other_tasks() {
        let buf = SharedBuf::default();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let reporter = JsonlReporter::with_io(Box::new(buf.clone()), LineInput::from_channel(rx));
        tx.send(r#"{"task": "some_other_task", "response": "skip"}"#.to_string())
            .unwrap();
        tx.send(r#"{"task": "start_stream", "response": "retry"}"#.to_string())
            .unwrap();

        let response = reporter
            .wait_for_human("start_stream", Some(3), "Start the stream.", &UserResponse::allowed(true))
            .await;

        assert_eq!(response, UserResponse::Retry);
        let kinds: Vec<String> = buf
            .lines()
            .iter()
            .map(|l| l["event_type"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(kinds, vec!["human.prompt", "human.invalid", "human.prompt"]);
        assert!(buf.lines()[1]["error"]
            .as_str()
            .unwrap()
            .contains("some_other_task"));
    }

    #[test]
    fn test_cancellable_task_is_announced_and_released() {
        let buf = SharedBuf::default();
        let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let reporter = JsonlReporter::with_io(Box::new(buf.clone()), LineInput::from_channel(rx));
        let token = CancellationToken::new();

        reporter.allow_cancel("wait_for_doors", token.clone());
        assert!(reporter.input.is_cancellable("wait_for_doors"));
        assert_eq!(
            reporter.input.dispatch(r#"{"action": "cancel", "task": "wait_for_doors"}"#.into()),
            None
        );
        assert!(token.is_cancelled());

        reporter.report_status("wait_for_doors", Some(5), TaskStatus::WaitingForHuman, "x");
        assert!(!reporter.input.is_cancellable("wait_for_doors"));
        assert_eq!(buf.lines()[0]["event_type"], "task.cancellable");
        assert_eq!(buf.lines()[0]["task"], "wait_for_doors");
    }
}
