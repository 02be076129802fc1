use thiserror::Error;

use super::code::ErrorCode;

/// Errors raised while loading and validating a task definition.
///
/// All of them are fatal: a run never starts from a definition that failed
/// validation.
#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("failed to read task file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("task file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("every task must have a non-blank name")]
    BlankName,

    #[error("'none' cannot be used as a task name")]
    ReservedName,

    #[error("task '{0}' has no description; tasks without subtasks must have a description")]
    MissingDescription(String),

    #[error(
        "task '{0}' has subtasks and a description; prefix the field with an underscore to keep it as a comment"
    )]
    CompositeDescription(String),

    #[error("task '{0}' has subtasks and only_auto=true; tasks with subtasks are never automated")]
    CompositeOnlyAuto(String),

    #[error("task '{task}' has unknown fields: {fields}; prefix them with an underscore if they are meant as comments")]
    UnknownFields { task: String, fields: String },

    #[error("the name '{0}' is used by more than one task")]
    DuplicateName(String),

    #[error("prerequisite not found: task '{task}' depends on '{missing}'")]
    PrerequisiteNotFound { task: String, missing: String },

    #[error("the task graph contains a cycle: {0}")]
    Cycle(String),

    #[error("task '{task}' has a malformed description: {reason} (at byte {offset})")]
    Markup {
        task: String,
        reason: String,
        offset: usize,
    },
}

impl DefinitionError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Io { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::FileAccessDenied,
                _ => ErrorCode::GeneralError,
            },
            Self::Parse(_) => ErrorCode::ParseError,
            Self::BlankName
            | Self::ReservedName
            | Self::MissingDescription(_)
            | Self::CompositeDescription(_)
            | Self::CompositeOnlyAuto(_)
            | Self::UnknownFields { .. }
            | Self::DuplicateName(_) => ErrorCode::ValidationError,
            Self::PrerequisiteNotFound { .. } => ErrorCode::DependencyError,
            Self::Cycle(_) => ErrorCode::CircularDependency,
            Self::Markup { .. } => ErrorCode::MarkupError,
        }
    }
}
