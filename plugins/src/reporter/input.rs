use std::collections::HashMap;
use std::io::BufRead;
use std::sync::{Arc, Mutex, OnceLock};

use autocheck_core::state::UserResponse;
use autocheck_core::CancellationToken;
use serde_json::Value;
use tokio::sync::mpsc;

type Cancellable = Arc<Mutex<HashMap<String, CancellationToken>>>;

/// What one line typed by the operator asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `cancel <task>` or `{"action": "cancel", "task": "<task>"}`
    Cancel(String),
    /// Anything else is an answer to the current prompt.
    Answer(String),
}

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(trimmed) {
        if obj.get("action").and_then(Value::as_str) == Some("cancel") {
            if let Some(task) = obj.get("task").and_then(Value::as_str) {
                return Command::Cancel(task.trim().to_string());
            }
        }
        return Command::Answer(line.to_string());
    }
    match trimmed.split_once(char::is_whitespace) {
        Some((word, task)) if word.eq_ignore_ascii_case("cancel") && !task.trim().is_empty() => {
            Command::Cancel(task.trim().to_string())
        }
        _ => Command::Answer(line.to_string()),
    }
}

/// Route one line: cancel commands fire the task's token, answers are
/// handed back.
fn dispatch(cancellable: &Cancellable, line: String) -> Option<String> {
    match parse_command(&line) {
        Command::Answer(answer) => Some(answer),
        Command::Cancel(task) => {
            let token = cancellable
                .lock()
                .ok()
                .and_then(|map| map.get(&task).cloned());
            match token {
                Some(token) => {
                    tracing::info!(task = %task, "Cancelling task...");
                    token.cancel();
                }
                None => tracing::warn!(task = %task, "no cancellable task with that name"),
            }
            None
        }
    }
}

/// Operator input shared by a reporter's prompts and cancel commands.
///
/// A background thread reads stdin line by line, so `cancel <task>` works
/// while no prompt is open.
pub struct LineInput {
    cancellable: Cancellable,
    lines: OnceLock<tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>>,
}

impl LineInput {
    /// Read from stdin once the first prompt or cancellable task shows up.
    pub fn stdin() -> Self {
        Self {
            cancellable: Arc::default(),
            lines: OnceLock::new(),
        }
    }

    /// Read lines from a channel instead of stdin. Cancel commands must go
    /// through [`LineInput::dispatch`].
    pub fn from_channel(rx: mpsc::UnboundedReceiver<String>) -> Self {
        let lines = OnceLock::new();
        let _ = lines.set(tokio::sync::Mutex::new(rx));
        Self {
            cancellable: Arc::default(),
            lines,
        }
    }

    pub fn allow_cancel(&self, task: &str, token: CancellationToken) {
        if let Ok(mut map) = self.cancellable.lock() {
            map.insert(task.to_string(), token);
        }
        self.lines();
    }

    pub fn disallow_cancel(&self, task: &str) {
        if let Ok(mut map) = self.cancellable.lock() {
            map.remove(task);
        }
    }

    pub fn is_cancellable(&self, task: &str) -> bool {
        self.cancellable
            .lock()
            .map(|map| map.contains_key(task))
            .unwrap_or(false)
    }

    pub fn dispatch(&self, line: String) -> Option<String> {
        dispatch(&self.cancellable, line)
    }

    /// Next answer line. `None` once the input is closed.
    pub async fn next_line(&self) -> Option<String> {
        self.lines().lock().await.recv().await
    }

    fn lines(&self) -> &tokio::sync::Mutex<mpsc::UnboundedReceiver<String>> {
        self.lines.get_or_init(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            let cancellable = self.cancellable.clone();
            let spawned = std::thread::Builder::new()
                .name("autocheck-stdin".into())
                .spawn(move || {
                    for line in std::io::stdin().lock().lines() {
                        let line = match line {
                            Ok(line) => line,
                            Err(e) => {
                                tracing::warn!(error = %e, "failed to read from stdin");
                                break;
                            }
                        };
                        if let Some(answer) = dispatch(&cancellable, line) {
                            if tx.send(answer).is_err() {
                                break;
                            }
                        }
                    }
                });
            if let Err(e) = spawned {
                tracing::warn!(error = %e, "could not start the stdin reader");
            }
            tokio::sync::Mutex::new(rx)
        })
    }
}

impl Default for LineInput {
    fn default() -> Self {
        Self::stdin()
    }
}

/// Parse a typed answer, accepting only the offered responses.
pub fn parse_choice(input: &str, allowed: &[UserResponse]) -> Result<UserResponse, String> {
    let response: UserResponse = input.parse()?;
    if allowed.contains(&response) {
        Ok(response)
    } else {
        Err(format!("'{}' is not available for this task", response.as_str()))
    }
}

/// e.g. `[d]one / [r]etry / [s]kip`
pub fn choices_hint(allowed: &[UserResponse]) -> String {
    allowed
        .iter()
        .map(|r| {
            let name = r.as_str();
            format!("[{}]{}", &name[..1], &name[1..])
        })
        .collect::<Vec<_>>()
        .join(" / ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_choice_respects_allowed() {
        let allowed = UserResponse::allowed(false);
        assert_eq!(parse_choice(" D\n", &allowed), Ok(UserResponse::Done));
        assert_eq!(parse_choice("skip", &allowed), Ok(UserResponse::Skip));
        assert!(parse_choice("r", &allowed).unwrap_err().contains("not available"));
        assert!(parse_choice("later", &allowed).is_err());
    }

    #[test]
    fn test_choices_hint() {
        assert_eq!(
            choices_hint(&UserResponse::allowed(true)),
            "[d]one / [r]etry / [s]kip"
        );
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(
            parse_command("cancel upload_slides\n"),
            Command::Cancel("upload_slides".into())
        );
        assert_eq!(
            parse_command(r#"{"action": "cancel", "task": "wait_for_doors"}"#),
            Command::Cancel("wait_for_doors".into())
        );
        assert_eq!(parse_command("cancel"), Command::Answer("cancel".into()));
        assert_eq!(parse_command("retry"), Command::Answer("retry".into()));
        assert_eq!(
            parse_command(r#"{"task": "a", "response": "skip"}"#),
            Command::Answer(r#"{"task": "a", "response": "skip"}"#.into())
        );
    }

    #[tokio::test]
    async fn test_cancel_lines_fire_the_task_token() {
        let (tx, rx) = mpsc::unbounded_channel();
        let input = LineInput::from_channel(rx);
        let token = CancellationToken::new();
        input.allow_cancel("wait_for_doors", token.clone());
        assert!(input.is_cancellable("wait_for_doors"));

        assert_eq!(input.dispatch("cancel check_mics".into()), None);
        assert!(!token.is_cancelled());
        assert_eq!(input.dispatch("cancel wait_for_doors".into()), None);
        assert!(token.is_cancelled());
        assert_eq!(input.dispatch("done".into()), Some("done".into()));

        input.disallow_cancel("wait_for_doors");
        assert!(!input.is_cancellable("wait_for_doors"));

        tx.send("skip".into()).unwrap();
        drop(tx);
        assert_eq!(input.next_line().await, Some("skip".into()));
        assert_eq!(input.next_line().await, None);
    }
}
