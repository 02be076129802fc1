use thiserror::Error;

use super::code::ErrorCode;

/// Errors raised while binding leaf tasks to registered actions.
#[derive(Error, Debug)]
pub enum BindingError {
    #[error("action '{action}' requires a dependency of type '{type_name}', but none was registered")]
    MissingDependency {
        action: String,
        type_name: &'static str,
    },

    #[error("task '{0}' has only_auto=true, but no action was registered for it")]
    OnlyAutoWithoutAction(String),

    #[error("the list of tasks to automate includes '{0}', which is not a valid task name")]
    UnknownAutoTask(String),

    #[error("the list of tasks to automate includes '{0}', but that task has no action")]
    AutoTaskWithoutAction(String),

    #[error("'none' must be the only value in the list of tasks to automate")]
    NoneNotAlone,

    #[error("task '{0}' has only_auto=true, but it is not in the list of tasks to automate")]
    OnlyAutoNotAutomated(String),

    #[error("cannot force only_auto on '{0}': no such task")]
    UnknownOnlyAutoTask(String),
}

impl BindingError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingDependency { .. } => ErrorCode::MissingDependency,
            Self::UnknownAutoTask(_) | Self::UnknownOnlyAutoTask(_) => ErrorCode::TaskNotFound,
            Self::OnlyAutoWithoutAction(_)
            | Self::OnlyAutoNotAutomated(_)
            | Self::AutoTaskWithoutAction(_)
            | Self::NoneNotAlone => ErrorCode::BindingError,
        }
    }
}
