//! Frontier task status definitions
//!
//! A task is only ever `Pending` or `InProgress`. Recrawl is perpetual, so there
//! is no terminal state: every attempt ends with the task back in `Pending`.

use std::fmt;

/// Represents the persisted status of a frontier task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskStatus {
    /// Task is in the schedulable pool, eligible once `next_eligible_at` passes
    Pending,

    /// Task has been claimed by the scheduler and is being fetched
    InProgress,
}

impl TaskStatus {
    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            _ => None,
        }
    }

    /// Returns all possible task statuses
    pub fn all_statuses() -> [Self; 2] {
        [Self::Pending, Self::InProgress]
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
