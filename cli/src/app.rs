//! CLI 应用装配层：合并配置覆盖、加载任务、绑定 actions，然后运行引擎。
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use autocheck_core::action::{ActionRegistry, ActionResolver, DependencyRegistry, ResolvedPlan};
use autocheck_core::config::AppConfig;
use autocheck_core::context::RunContext;
use autocheck_core::error::CliError;
use autocheck_core::executor::{ExecutionEngine, ExecutionOpts, RunEvent, TaskGraph};
use autocheck_core::task::{self, TaskDefinition};
use autocheck_core::CancellationToken;
use autocheck_plugins::{demo, factory};

use crate::commands::cli::Args;

/// Exit code for a run stopped with Ctrl+C.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Fold command-line overrides into the loaded config.
pub fn apply_args(cfg: &mut AppConfig, args: &Args) {
    if let Some(ui) = args.ui {
        cfg.reporter.ui = ui.as_str().to_string();
    }
    if args.verbose {
        cfg.reporter.verbose = true;
    }
    if args.ascii {
        cfg.reporter.ascii = true;
    }
    if let Some(n) = args.max_parallel {
        cfg.executor.max_parallel = Some(n);
    }
}

fn load_definition(args: &Args) -> Result<TaskDefinition, CliError> {
    if args.demo {
        return Ok(task::from_str(demo::DEMO_TASKS)?);
    }
    let path = args
        .tasks
        .as_deref()
        .ok_or_else(|| CliError::Command("either --tasks or --demo is required".to_string()))?;
    tracing::info!(path = %path.display(), "loading task definition");
    Ok(task::load(path)?)
}

/// Human-readable plan for `--no-run`.
pub fn format_plan(graph: &TaskGraph, plan: &ResolvedPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} tasks", graph.len());
    for leaf in graph.leaves() {
        let (kind, only_auto) = plan
            .get(&leaf.name)
            .map(|b| (b.binding.kind(), b.only_auto))
            .unwrap_or(("manual", leaf.only_auto));
        let _ = write!(out, "{:>3}. {} [{kind}", leaf.index, leaf.name);
        if only_auto {
            out.push_str(", only auto");
        }
        out.push(']');
        if !leaf.prerequisites.is_empty() {
            let _ = write!(out, " after {}", leaf.prerequisites.join(", "));
        }
        out.push('\n');
    }
    if !plan.unused_actions.is_empty() {
        let _ = writeln!(out, "unused actions: {}", plan.unused_actions.join(", "));
    }
    out
}

#[tracing::instrument(name = "cli.run_app", skip(args, cfg))]
pub async fn run_app_with_config(args: Args, mut cfg: AppConfig) -> Result<i32, CliError> {
    apply_args(&mut cfg, &args);

    let def = load_definition(&args)?;
    let run_ctx = RunContext::new(args.date, cfg.reporter.verbose);
    tracing::info!(run_id = %run_ctx.run_id, date = %run_ctx.run_date, "checklist loaded");

    let mut actions = ActionRegistry::new();
    let mut deps = DependencyRegistry::new();
    deps.insert(Arc::new(run_ctx.clone()));
    deps.insert(Arc::new(cfg.clone()));
    if args.demo {
        demo::register(&mut actions, &mut deps);
    }

    let auto = (!args.auto.is_empty()).then(|| args.auto.clone());
    let plan = ActionResolver::new(&actions, &deps)
        .auto_whitelist(auto)
        .force_only_auto(args.only_auto.clone())
        .warn_unused(!cfg.executor.allow_unused_actions)
        .resolve(&def.graph)?;
    tracing::info!(
        automatic = plan.count("automatic"),
        gated = plan.count("gated"),
        manual = plan.count("manual"),
        "actions bound"
    );

    if args.no_run {
        print!("{}", format_plan(&def.graph, &plan));
        return Ok(0);
    }

    let reporter =
        factory::build_reporter(&cfg.reporter).map_err(|e| CliError::Config(e.to_string()))?;
    let opts = ExecutionOpts {
        run_id: Some(run_ctx.run_id.clone()),
        ..ExecutionOpts::from_config(&cfg.executor)
    };
    let token = CancellationToken::new();
    let engine = ExecutionEngine::builder(Arc::new(def.graph), Arc::new(plan), reporter.clone())
        .dependencies(Arc::new(deps))
        .cancellation(token.clone())
        .opts(opts)
        .build();

    let grace = Duration::from_millis(cfg.executor.cancel_grace_ms);
    let run = engine.run();
    tokio::pin!(run);

    let summary = tokio::select! {
        summary = &mut run => summary,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!(run_id = %run_ctx.run_id, "Ctrl+C received, cancelling run");
            token.cancel();
            reporter.report_run(&RunEvent::Cancelling {
                run_id: run_ctx.run_id.clone(),
            });
            match tokio::time::timeout(grace, &mut run).await {
                Ok(summary) => summary,
                Err(_) => {
                    tracing::error!(grace_ms = grace.as_millis() as u64, "tasks did not stop in time");
                    return Err(CliError::Interrupted);
                }
            }
        }
    };

    if summary.cancelled {
        return Ok(EXIT_INTERRUPTED);
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::cli::UiKind;
    use autocheck_core::action::ActionOutcome;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_apply_args_overrides_config() {
        let args = Args::parse_from([
            "autocheck",
            "--demo",
            "--ui",
            "jsonl",
            "--ascii",
            "--max-parallel",
            "2",
        ]);
        let mut cfg = AppConfig::default();
        apply_args(&mut cfg, &args);
        assert_eq!(args.ui, Some(UiKind::Jsonl));
        assert_eq!(cfg.reporter.ui, "jsonl");
        assert!(cfg.reporter.ascii);
        assert!(!cfg.reporter.verbose);
        assert_eq!(cfg.executor.max_parallel, Some(2));
    }

    #[test]
    fn test_format_plan() {
        let def = task::from_str(
            r#"{"name": "root", "subtasks": [
                {"name": "start_stream", "description": "x", "only_auto": true},
                {"name": "announce", "description": "x", "prerequisites": ["start_stream"]}
            ]}"#,
        )
        .unwrap();
        let mut actions = ActionRegistry::new();
        actions.register_fn("start_stream", vec![], |_ctx| async { ActionOutcome::Success });
        let deps = DependencyRegistry::new();
        let plan = ActionResolver::new(&actions, &deps)
            .resolve(&def.graph)
            .unwrap();

        assert_eq!(
            format_plan(&def.graph, &plan),
            "2 tasks\n  1. start_stream [automatic, only auto]\n  2. announce [manual] after start_stream\n"
        );
    }

    #[tokio::test]
    async fn test_missing_task_file_is_a_definition_error() {
        let args = Args::parse_from(["autocheck", "--tasks", "/nonexistent/autocheck/tasks.json"]);
        let err = run_app_with_config(args, AppConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Definition(_)));
    }

    #[tokio::test]
    async fn test_no_run_checks_bindings() {
        let args = Args::parse_from(["autocheck", "--demo", "--no-run", "--auto", "nosuchtask"]);
        let err = run_app_with_config(args, AppConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Binding(_)));

        let args = Args::parse_from(["autocheck", "--demo", "--no-run"]);
        assert_eq!(run_app_with_config(args, AppConfig::default()).await.unwrap(), 0);
    }
}
