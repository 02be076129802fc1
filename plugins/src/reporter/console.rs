use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use autocheck_core::executor::{ProgressKey, RunEvent, RunSummary, StatusReporter};
use autocheck_core::state::{ProblemLevel, TaskStatus, UserResponse};
use autocheck_core::task::markup::{self, Segment};
use autocheck_core::CancellationToken;

use super::input::{self, LineInput};
use super::progress::ProgressBars;

/// Interactive terminal reporter.
///
/// Status lines and problems are printed as they arrive; prompts are asked
/// one at a time on stdin. `cancel <task>` typed at any time cancels a task
/// that offered cancellation.
pub struct ConsoleReporter {
    verbose: bool,
    ascii: bool,
    bars: ProgressBars,
    /// Tasks currently waiting, so a prompt can say how many are queued.
    waiting: Mutex<HashMap<String, usize>>,
    /// Only one prompt owns stdin at a time.
    prompt_lock: tokio::sync::Mutex<()>,
    input: LineInput,
}

impl ConsoleReporter {
    pub fn new(verbose: bool, ascii: bool) -> Self {
        let interactive = atty::is(atty::Stream::Stdout);
        Self {
            verbose,
            ascii,
            bars: ProgressBars::new(interactive, ascii),
            waiting: Mutex::new(HashMap::new()),
            prompt_lock: tokio::sync::Mutex::new(()),
            input: LineInput::stdin(),
        }
    }

    fn marker(&self, status: TaskStatus) -> &'static str {
        match (status, self.ascii) {
            (TaskStatus::NotStarted, true) => "[ ]",
            (TaskStatus::Running, true) => "[>]",
            (TaskStatus::WaitingForHuman, true) => "[?]",
            (TaskStatus::Done, true) => "[x]",
            (TaskStatus::Skipped, true) => "[-]",
            (TaskStatus::Failed, true) => "[!]",
            (TaskStatus::NotStarted, false) => "○",
            (TaskStatus::Running, false) => "▶",
            (TaskStatus::WaitingForHuman, false) => "⏸",
            (TaskStatus::Done, false) => "✅",
            (TaskStatus::Skipped, false) => "⏭",
            (TaskStatus::Failed, false) => "❌",
        }
    }

    /// Non-verbose output keeps only what a human has to look at.
    fn should_print(&self, index: Option<usize>, status: TaskStatus) -> bool {
        if self.verbose {
            return true;
        }
        index.is_some()
            && matches!(
                status,
                TaskStatus::WaitingForHuman | TaskStatus::Done | TaskStatus::Skipped | TaskStatus::Failed
            )
    }

    fn format_status(
        &self,
        task: &str,
        index: Option<usize>,
        status: TaskStatus,
        message: &str,
    ) -> String {
        let position = match index {
            Some(i) => format!("{i:>3}. "),
            None => "     ".to_string(),
        };
        let mut line = format!("{} {position}{task}: {}", self.marker(status), status);
        if !message.is_empty() && message != "-" {
            line.push_str(" - ");
            line.push_str(message);
        }
        line
    }

    fn format_problem(&self, task: &str, level: ProblemLevel, message: &str) -> String {
        let tag = match level {
            ProblemLevel::Warn => "WARN",
            ProblemLevel::Error => "ERROR",
            ProblemLevel::Fatal => "FATAL",
        };
        format!("[{tag}] {task}: {message}")
    }

    pub fn format_summary(&self, summary: &RunSummary) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "\nRun {} finished in {:.1}s\n",
            summary.run_id,
            summary.duration_ms as f64 / 1000.0
        ));
        for task in &summary.tasks {
            let retries = if task.attempts > 0 {
                format!(" (retries: {})", task.attempts)
            } else {
                String::new()
            };
            out.push_str(&format!(
                "{} {:>3}. {}: {}{}\n",
                self.marker(task.status),
                task.index,
                task.name,
                task.status,
                retries
            ));
        }
        out.push_str(&format!(
            "done {}, skipped {}, failed {}, not started {}\n",
            summary.count(TaskStatus::Done),
            summary.count(TaskStatus::Skipped),
            summary.count(TaskStatus::Failed),
            summary.count(TaskStatus::NotStarted),
        ));
        if !summary.unreachable.is_empty() {
            out.push_str(&format!(
                "Unreachable (a prerequisite did not complete): {}\n",
                summary.unreachable.join(", ")
            ));
        }
        if summary.cancelled {
            out.push_str("The run was cancelled.\n");
        }
        out
    }

    fn set_waiting(&self, task: &str, index: Option<usize>, status: TaskStatus) {
        if let Ok(mut waiting) = self.waiting.lock() {
            if status == TaskStatus::WaitingForHuman {
                waiting.insert(task.to_string(), index.unwrap_or(0));
            } else {
                waiting.remove(task);
            }
        }
    }

    fn waiting_count(&self) -> usize {
        self.waiting.lock().map(|w| w.len()).unwrap_or(0)
    }
}

/// Render description directives for a plain terminal: links become
/// `label <href>` and styled text is printed plain.
pub fn render_description(text: &str) -> String {
    let Ok(segments) = markup::parse(text) else {
        return text.to_string();
    };
    segments
        .into_iter()
        .map(|s| match s {
            Segment::Text(t) => t.to_string(),
            Segment::Link {
                href,
                label: Some(label),
            } => format!("{label} <{href}>"),
            Segment::Link { href, label: None } => format!("<{href}>"),
            Segment::Styled { text, .. } => text.to_string(),
        })
        .collect()
}

#[async_trait]
impl StatusReporter for ConsoleReporter {
    fn name(&self) -> &str {
        "console"
    }

    fn report_status(&self, task: &str, index: Option<usize>, status: TaskStatus, message: &str) {
        tracing::info!(task = %task, status = %status, "{message}");
        self.set_waiting(task, index, status);
        if index.is_some() && status != TaskStatus::Running {
            self.input.disallow_cancel(task);
        }
        if self.should_print(index, status) {
            self.bars
                .println(&self.format_status(task, index, status, message));
        }
    }

    fn report_problem(&self, task: &str, level: ProblemLevel, message: &str, detail: Option<&str>) {
        match level {
            ProblemLevel::Warn => tracing::warn!(task = %task, detail = ?detail, "{message}"),
            ProblemLevel::Error | ProblemLevel::Fatal => {
                tracing::error!(task = %task, level = level.as_str(), detail = ?detail, "{message}")
            }
        }
        self.bars.println(&self.format_problem(task, level, message));
        if let (true, Some(detail)) = (self.verbose, detail) {
            for line in detail.lines() {
                self.bars.println(&format!("    {line}"));
            }
        }
    }

    async fn wait_for_human(
        &self,
        task: &str,
        index: Option<usize>,
        prompt: &str,
        allowed: &[UserResponse],
    ) -> UserResponse {
        let _turn = self.prompt_lock.lock().await;
        let queued = self.waiting_count().saturating_sub(1);

        let header = match index {
            Some(i) => format!("\n=== {i}. {task} ==="),
            None => format!("\n=== {task} ==="),
        };
        let mut text = format!("{header}\n{}\n", render_description(prompt));
        if queued > 0 {
            text.push_str(&format!("({queued} more task(s) waiting)\n"));
        }
        self.bars.println(&text);

        loop {
            let hint = input::choices_hint(allowed);
            self.bars.suspend(|| {
                use std::io::Write;
                print!("{hint} > ");
                let _ = std::io::stdout().flush();
            });

            let Some(line) = self.input.next_line().await else {
                // stdin is gone; only cancellation can release this task now.
                tracing::warn!(task = %task, "stdin closed while waiting for a response");
                return std::future::pending().await;
            };
            match input::parse_choice(&line, allowed) {
                Ok(response) => return response,
                Err(e) => self.bars.println(&format!("  {e}")),
            }
        }
    }

    fn create_progress(&self, task: &str, label: &str, max: f64, unit: &str) -> ProgressKey {
        tracing::debug!(task = %task, label = %label, max, "progress created");
        self.bars.create(task, label, max, unit)
    }

    fn update_progress(&self, key: ProgressKey, current: f64) {
        self.bars.update(key, current);
    }

    fn delete_progress(&self, key: ProgressKey) {
        self.bars.delete(key);
    }

    fn allow_cancel(&self, task: &str, token: CancellationToken) {
        self.input.allow_cancel(task, token);
        self.bars
            .println(&format!("     {task}: type 'cancel {task}' to cancel this task."));
    }

    fn report_run(&self, event: &RunEvent) {
        match event {
            RunEvent::RunStart {
                run_id,
                total_tasks,
            } => {
                if self.verbose {
                    self.bars
                        .println(&format!("Run {run_id} started ({total_tasks} tasks)"));
                }
            }
            RunEvent::Cancelling { .. } => {
                self.bars
                    .println("Cancelling: waiting for running tasks to stop...");
            }
            RunEvent::RunEnd { summary, .. } => {
                self.bars.println(&self.format_summary(summary));
            }
        }
    }
}
