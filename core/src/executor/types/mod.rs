pub mod config;
pub mod result;

pub use config::ExecutionOpts;
pub use result::{RunSummary, TaskResult};
