//! Status reporters: the front ends a run talks to.

pub mod console;
pub mod input;
pub mod jsonl;
pub mod progress;

pub use console::ConsoleReporter;
pub use jsonl::JsonlReporter;
pub use progress::ProgressBars;
