use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Get the default autocheck data directory: ~/.autocheck
pub fn get_data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".autocheck"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.autocheck/config.toml (highest)
    let data_dir = get_data_dir()?;
    let user_config = data_dir.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let mut cfg = if user_config.exists() {
        load_file(&user_config)?
    } else if local_config.exists() {
        load_file(local_config)?
    } else {
        AppConfig::default()
    };

    // Keep logs next to the user config unless a directory was given.
    if cfg
        .logging
        .directory
        .as_deref()
        .map(|s| s.trim().is_empty())
        .unwrap_or(true)
    {
        cfg.logging.directory = Some(data_dir.join("logs").to_string_lossy().to_string());
    }

    apply_env_overrides(&mut cfg, |k| std::env::var(k).ok());
    Ok(cfg)
}

pub fn load_file(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("read {} failed: {e}", path.display()))?;
    let cfg = toml::from_str::<AppConfig>(&s)
        .map_err(|e| anyhow::anyhow!("parse {} failed: {e}", path.display()))?;
    Ok(cfg)
}

/// Environment variable overrides (Priority 0: highest)
fn apply_env_overrides(cfg: &mut AppConfig, get: impl Fn(&str) -> Option<String>) {
    if let Some(v) = get("AUTOCHECK_UI").filter(|v| !v.trim().is_empty()) {
        cfg.reporter.ui = v.trim().to_string();
    }
    if let Some(v) = get("AUTOCHECK_LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
        cfg.logging.level = v.trim().to_string();
    }
    if let Some(n) = get("AUTOCHECK_MAX_PARALLEL").and_then(|v| v.trim().parse::<usize>().ok()) {
        cfg.executor.max_parallel = Some(n);
    }
}
