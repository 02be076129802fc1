//! 状态转换规则和验证

use super::types::{TaskStatus, UserResponse};
use thiserror::Error;

/// 状态转换错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition from {from:?} on {event:?}")]
    InvalidTransition { from: TaskStatus, event: TaskEvent },
    #[error("Cannot transition from terminal state {state:?}")]
    FromTerminalState { state: TaskStatus },
}

/// Something that happened to a task, as seen by its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    /// Prerequisites satisfied and an action is bound.
    Start,
    /// Prerequisites satisfied but the task has no action.
    StartManual,
    Succeeded,
    NotImplemented,
    Raised,
    Cancelled,
    Responded(UserResponse),
}

/// 状态转换
pub struct StatusTransition;

impl StatusTransition {
    /// Apply `event` to a task currently in `from`.
    ///
    /// `only_auto` tasks never wait for a human: anything that would have
    /// prompted lands in Failed instead.
    pub fn apply(
        from: TaskStatus,
        event: TaskEvent,
        only_auto: bool,
    ) -> Result<TaskStatus, TransitionError> {
        if from.is_terminal() {
            return Err(TransitionError::FromTerminalState { state: from });
        }

        let human_or_failed = if only_auto {
            TaskStatus::Failed
        } else {
            TaskStatus::WaitingForHuman
        };

        let next = match (from, event) {
            (TaskStatus::NotStarted, TaskEvent::Start) => TaskStatus::Running,
            (TaskStatus::NotStarted, TaskEvent::StartManual) => human_or_failed,

            (TaskStatus::Running, TaskEvent::Succeeded) => TaskStatus::Done,
            (TaskStatus::Running, TaskEvent::NotImplemented)
            | (TaskStatus::Running, TaskEvent::Raised) => human_or_failed,

            (_, TaskEvent::Cancelled) => TaskStatus::Failed,

            (TaskStatus::WaitingForHuman, TaskEvent::Responded(response)) => match response {
                UserResponse::Done => TaskStatus::Done,
                UserResponse::Skip => TaskStatus::Skipped,
                UserResponse::Retry => TaskStatus::Running,
            },

            _ => return Err(TransitionError::InvalidTransition { from, event }),
        };

        Ok(next)
    }

    /// 判断是否为终态
    pub fn is_terminal(status: TaskStatus) -> bool {
        status.is_terminal()
    }
}
