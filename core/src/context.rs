use chrono::NaiveDate;

/// Immutable facts about the current run, handed to actions through the
/// dependency registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: String,
    /// The date the checklist is for. Defaults to today, overridable from the CLI.
    pub run_date: NaiveDate,
    pub verbose: bool,
}

impl RunContext {
    pub fn new(run_date: Option<NaiveDate>, verbose: bool) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            run_date: run_date.unwrap_or_else(|| chrono::Local::now().date_naive()),
            verbose,
        }
    }
}
