pub mod loader;
pub mod markup;
pub mod spec;

pub use loader::{from_str, load, TaskDefinition};
pub use spec::TaskSpec;
