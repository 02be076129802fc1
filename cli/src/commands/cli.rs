use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiKind {
    Console,
    Jsonl,
}

impl UiKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::Jsonl => "jsonl",
        }
    }
}

/// Run a live-production checklist: automate what can be automated and ask
/// a human for the rest.
#[derive(Parser, Debug)]
#[command(name = "autocheck", version, about)]
pub struct Args {
    /// Task definition file (JSON).
    #[arg(long, value_name = "FILE", required_unless_present = "demo", conflicts_with = "demo")]
    pub tasks: Option<PathBuf>,

    /// Run the built-in demo checklist.
    #[arg(long)]
    pub demo: bool,

    /// Front end. Overrides `[reporter] ui` from the config file.
    #[arg(long, value_enum)]
    pub ui: Option<UiKind>,

    #[arg(long, short)]
    pub verbose: bool,

    /// ASCII-only status markers.
    #[arg(long)]
    pub ascii: bool,

    /// Date the checklist is for (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Only automate these tasks; the rest ask first. `none` automates nothing.
    /// Can be specified multiple times.
    #[arg(long = "auto", value_name = "NAME", action = clap::ArgAction::Append)]
    pub auto: Vec<String>,

    /// Treat these tasks (or every task below these groups) as automatic-only
    /// for this run. Can be specified multiple times.
    #[arg(long = "only-auto", value_name = "NAME", action = clap::ArgAction::Append)]
    pub only_auto: Vec<String>,

    /// Cap on concurrently running actions. Overrides `[executor] max_parallel`.
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Load and check the checklist, print the plan, and exit without running.
    #[arg(long)]
    pub no_run: bool,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got '{s}': {e}"))
}
