//! Task graph execution
//!
//! ```text
//! TaskSpec tree
//!   ↓
//! TaskGraph::build() → normalize prerequisites, stable sort, cycle report,
//!                      transitive reduction
//!   ↓
//! ActionResolver::resolve() → ResolvedPlan (one Binding per leaf)
//!   ↓
//! ExecutionEngine::run() → one worker per leaf → RunSummary
//! ```
//!
//! Workers talk to the outside world only through a [`traits::StatusReporter`].

mod board;
mod canceller;
mod engine;
pub mod graph;
pub mod traits;
pub mod types;

pub use canceller::TaskCanceller;
pub use engine::{ExecutionEngine, ExecutionEngineBuilder};
pub use graph::{CompositeNode, LeafNode, TaskGraph};
pub use traits::{ProgressKey, RunEvent, StatusReporter};
pub use types::{ExecutionOpts, RunSummary, TaskResult};
