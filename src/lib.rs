//! Blocking multi-producer/multi-consumer task queue and the demo roles
//! that exercise it.

pub mod config;
pub mod error;
pub mod logging;
pub mod roles;
pub mod sim;
pub mod task_queue;
pub mod types;

pub use task_queue::TaskQueue;
pub use types::{Task, TaskId};
