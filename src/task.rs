// Task data model

use crate::error::StoreError;
use serde::{Deserialize, Serialize};

/// Identifier assigned to a task when it is created
pub type TaskId = i64;

/// Maximum task name length, in characters, after trimming
pub const MAX_NAME_LEN: usize = 150;

/// A single entry in the task list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub completed: bool,
}

impl Task {
    /// Create an outstanding task. `name` must already be normalized.
    pub(crate) fn new(id: TaskId, name: String) -> Self {
        Self {
            id,
            name,
            completed: false,
        }
    }

    pub fn is_outstanding(&self) -> bool {
        !self.completed
    }
}

/// Trim a raw task name and check it is storable
///
/// Returns the trimmed name, or a validation error if it is empty,
/// whitespace-only or longer than [`MAX_NAME_LEN`] characters.
pub fn normalize_name(raw: &str) -> Result<String, StoreError> {
    let name = raw.trim();

    if name.is_empty() {
        return Err(StoreError::validation("empty task"));
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(StoreError::validation(format!(
            "task name exceeds {} characters",
            MAX_NAME_LEN
        )));
    }

    Ok(name.to_string())
}
