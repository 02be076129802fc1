//! Task-graph execution engine for live-production checklists.
//!
//! A checklist is a JSON tree of named tasks. Leaves are bound to actions at
//! startup; the engine runs them concurrently in prerequisite order and hands
//! a task to a human whenever its action cannot finish it.

pub mod action;
pub mod cancel;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod state;
pub mod task;

pub use action::{ActionContext, ActionOutcome, ActionRegistry, DependencyKey, DependencyRegistry};
pub use cancel::CancellationToken;
pub use executor::{ExecutionEngine, RunSummary, StatusReporter, TaskCanceller};
