use thiserror::Error;

use super::binding::BindingError;
use super::definition::DefinitionError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("invalid task definition: {0}")]
    Definition(#[from] DefinitionError),
    #[error("cannot bind actions: {0}")]
    Binding(#[from] BindingError),
    #[error("config error: {0}")]
    Config(String),
    #[error("command failed: {0}")]
    Command(String),
    #[error("run interrupted")]
    Interrupted,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}
