// Task filtering

use crate::error::StoreError;
use crate::task::Task;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which tasks a view or a clear operation applies to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskFilter {
    #[default]
    All,
    Assigned,  // not completed
    Completed, // completed
}

impl TaskFilter {
    pub const ALL: [TaskFilter; 3] = [TaskFilter::All, TaskFilter::Assigned, TaskFilter::Completed];

    /// Whether `task` belongs to this filter
    pub fn matches(self, task: &Task) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Assigned => !task.completed,
            TaskFilter::Completed => task.completed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskFilter::All => "all",
            TaskFilter::Assigned => "assigned",
            TaskFilter::Completed => "completed",
        }
    }
}

impl std::fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskFilter {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(TaskFilter::All),
            "assigned" => Ok(TaskFilter::Assigned),
            "completed" => Ok(TaskFilter::Completed),
            other => Err(StoreError::validation(format!(
                "unknown filter '{}' (expected all, assigned or completed)",
                other
            ))),
        }
    }
}
