use std::sync::Arc;

use anyhow::{bail, Result};

use autocheck_core::config::ReporterConfig;
use autocheck_core::StatusReporter;

use crate::reporter::{ConsoleReporter, JsonlReporter};

pub fn build_reporter(cfg: &ReporterConfig) -> Result<Arc<dyn StatusReporter>> {
    match cfg.ui.trim().to_ascii_lowercase().as_str() {
        "console" | "" => Ok(Arc::new(ConsoleReporter::new(cfg.verbose, cfg.ascii))),
        "jsonl" => Ok(Arc::new(JsonlReporter::new())),
        other => bail!("unknown ui '{other}' (expected 'console' or 'jsonl')"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(ui: &str) -> ReporterConfig {
        ReporterConfig {
            ui: ui.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_reporter_by_name() {
        assert_eq!(build_reporter(&cfg("jsonl")).unwrap().name(), "jsonl");
        assert_eq!(build_reporter(&cfg("Console")).unwrap().name(), "console");
        let err = build_reporter(&cfg("gui")).err().unwrap();
        assert!(err.to_string().contains("unknown ui 'gui'"));
    }
}
