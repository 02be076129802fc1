//! 任务状态类型定义

use serde::{Deserialize, Serialize};

/// Status of a single leaf task during one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NotStarted,
    Running,
    WaitingForHuman,
    Done,
    Skipped,
    Failed,
}

impl TaskStatus {
    /// Done, Skipped and Failed never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Skipped | Self::Failed)
    }

    /// Whether a dependent task may start once this status is reached.
    pub fn satisfies_prerequisite(self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::WaitingForHuman)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::WaitingForHuman => "waiting_for_human",
            Self::Done => "done",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 问题严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemLevel {
    Warn,
    Error,
    Fatal,
}

impl ProblemLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

/// 人工决策
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserResponse {
    Done,
    Retry,
    Skip,
}

impl UserResponse {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Retry => "retry",
            Self::Skip => "skip",
        }
    }

    /// Responses offered to a human for a task in WaitingForHuman.
    pub fn allowed(allow_retry: bool) -> Vec<UserResponse> {
        if allow_retry {
            vec![Self::Done, Self::Retry, Self::Skip]
        } else {
            vec![Self::Done, Self::Skip]
        }
    }
}

impl std::str::FromStr for UserResponse {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "done" | "d" => Ok(Self::Done),
            "retry" | "r" => Ok(Self::Retry),
            "skip" | "s" => Ok(Self::Skip),
            other => Err(format!("unknown response '{other}'")),
        }
    }
}
