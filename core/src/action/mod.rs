//! Binding leaf tasks to automation.
//!
//! Actions are registered by task name at startup, together with the
//! dependency types they need. [`ActionResolver`] checks the whole tree before
//! the run starts so a missing dependency never surfaces mid-run.

pub mod context;
pub mod deps;
pub mod outcome;
pub mod registry;
pub mod resolver;

pub use context::{ActionContext, ProgressHandle};
pub use deps::{DependencyKey, DependencyRegistry};
pub use outcome::ActionOutcome;
pub use registry::{Action, ActionRegistry};
pub use resolver::{ActionResolver, Binding, BoundTask, ResolvedPlan};
