//! Task model shared by the queue and the producer/consumer roles.

use std::fmt;

/// Identifier of a task; negative values are reserved.
pub type TaskId = i64;
/// Scheduling hint carried by a task; only consumers interpret it.
pub type Priority = u8;

/// Reserved id of the in-band "no more work" task.
pub const SENTINEL_ID: TaskId = -1;
/// Description carried by every sentinel task.
pub const TERMINATE_DESCRIPTION: &str = "TERMINATE";

/// Unit of work handed from producers to consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    /// Task identifier; `SENTINEL_ID` marks a terminate request.
    pub id: TaskId,
    /// Human-readable label for demo output.
    pub description: String,
    /// Small priority value, 1..=3 for real work and 0 for sentinels.
    pub priority: Priority,
    /// Set by the consumer once simulated processing finishes.
    pub completed: bool,
}

impl Task {
    /// Construct a pending task.
    pub fn new(id: TaskId, description: impl Into<String>, priority: Priority) -> Self {
        Self {
            id,
            description: description.into(),
            priority,
            completed: false,
        }
    }

    /// Build the sentinel that tells exactly one consumer to stop.
    pub fn terminate() -> Self {
        Self::new(SENTINEL_ID, TERMINATE_DESCRIPTION, 0)
    }

    pub fn is_sentinel(&self) -> bool {
        self.id == SENTINEL_ID
    }

    /// Simulated processing cost in time units: `4 - priority`.
    ///
    /// Priority 1 is therefore the slowest and priority 3 the fastest, even
    /// though 1 is described as the most urgent. Kept as-is.
    pub fn work_units(&self) -> u32 {
        u32::from(4u8.saturating_sub(self.priority))
    }

    pub fn complete(&mut self) {
        self.completed = true;
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.completed { "Completed" } else { "Pending" };
        write!(
            f,
            "Task #{}: {} (Priority: {}, Status: {})",
            self.id, self.description, self.priority, status
        )
    }
}
