use autocheck_cli::app;
use autocheck_cli::commands::cli;
use autocheck_core::error;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    // A prompt may still be blocked on stdin; do not wait for it.
    std::process::exit(exit);
}

async fn real_main() -> Result<i32, error::CliError> {
    let args = cli::Args::parse();
    let cfg = autocheck_core::config::load_default()
        .map_err(|e| error::CliError::Config(format!("{e:#}")))?;
    init_tracing(&cfg.logging).map_err(error::CliError::Command)?;

    let result = app::run_app_with_config(args, cfg).await;
    match &result {
        Err(error::CliError::Definition(e)) => {
            tracing::error!(code = e.error_code().as_u16(), "{e}");
        }
        Err(error::CliError::Binding(e)) => {
            tracing::error!(code = e.error_code().as_u16(), "{e}");
        }
        Err(e) => tracing::error!("{e}"),
        Ok(code) => tracing::info!(exit = code, "autocheck finished"),
    }
    result
}

fn exit_code_for_error(e: &error::CliError) -> i32 {
    // 0: run finished
    // 11: config error
    // 12: task definition error
    // 13: action binding error
    // 20: IO error
    // 130: interrupted
    // 50: internal/uncategorized
    match e {
        error::CliError::Config(_) => 11,
        error::CliError::Definition(error::DefinitionError::Io { .. }) => 20,
        error::CliError::Definition(_) => 12,
        error::CliError::Binding(_) => 13,
        error::CliError::Io(_) => 20,
        error::CliError::Command(_) => 20,
        error::CliError::Interrupted => app::EXIT_INTERRUPTED,
        error::CliError::Anyhow(_) => 50,
    }
}

fn init_tracing(logging: &autocheck_core::config::LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => std::path::PathBuf::from(d),
            None => std::env::temp_dir().join("autocheck"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("autocheck.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Ok(());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
