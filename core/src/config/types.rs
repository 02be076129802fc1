use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub reporter: ReporterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "autocheck_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

// The console reporter owns stderr/stdout while a run is interactive.
fn default_logging_console() -> bool {
    false
}

fn default_logging_file() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Cap on concurrently running actions. Unset or 0 means no cap.
    #[serde(default)]
    pub max_parallel: Option<usize>,

    #[serde(default = "default_report_composites")]
    pub report_composites: bool,

    /// How long to wait for workers after cancellation before giving up.
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,

    /// Silence the warning about registered actions no task uses.
    #[serde(default)]
    pub allow_unused_actions: bool,
}

fn default_report_composites() -> bool {
    true
}

fn default_cancel_grace_ms() -> u64 {
    30_000
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel: None,
            report_composites: default_report_composites(),
            cancel_grace_ms: default_cancel_grace_ms(),
            allow_unused_actions: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReporterConfig {
    /// "console" or "jsonl"
    #[serde(default = "default_ui")]
    pub ui: String,

    /// Show every status change, not only problems and prompts.
    #[serde(default)]
    pub verbose: bool,

    /// ASCII-only markers (no Unicode)
    #[serde(default)]
    pub ascii: bool,
}

fn default_ui() -> String {
    "console".to_string()
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            ui: default_ui(),
            verbose: false,
            ascii: false,
        }
    }
}
