use crate::config::ExecutorConfig;

/// Execution options for one run of the engine.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOpts {
    /// Maximum number of actions running at once. Human waits never hold a slot.
    pub max_parallel: Option<usize>,

    /// Report aggregate status of composite tasks
    pub report_composites: bool,

    /// Run identifier passed to reporters (generated when empty)
    pub run_id: Option<String>,
}

impl ExecutionOpts {
    pub fn from_config(cfg: &ExecutorConfig) -> Self {
        Self {
            max_parallel: cfg.max_parallel.filter(|n| *n > 0),
            report_composites: cfg.report_composites,
            run_id: None,
        }
    }
}
