//! # 任务状态模块
//!
//! 定义叶子任务的状态、人工决策和问题级别，以及单个任务的状态机。
//!
//! 状态机是纯函数，由调度器的 worker 驱动；组合任务的状态只用于展示，
//! 由其叶子任务状态归约得出。

pub mod composite;
pub mod transitions;
pub mod types;

pub use composite::composite_status;
pub use transitions::{StatusTransition, TaskEvent, TransitionError};
pub use types::{ProblemLevel, TaskStatus, UserResponse};
