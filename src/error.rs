// Error taxonomy for task store operations

use crate::filter::TaskFilter;
use crate::task::TaskId;

/// Errors returned by [`crate::TaskStore`] operations
///
/// Only `Persistence` indicates a fault; the others describe input the
/// caller can correct or a no-op worth reporting.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Empty or otherwise unusable input
    #[error("invalid input: {0}")]
    Validation(String),

    /// The referenced task is not in the collection
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// No task matches the filter being cleared
    #[error("nothing to clear for filter '{0}'")]
    EmptyClear(TaskFilter),

    /// The snapshot could not be written; memory is ahead of storage
    #[error("failed to persist tasks: {0:#}")]
    Persistence(eyre::Report),
}

impl StoreError {
    pub fn validation<M: Into<String>>(message: M) -> Self {
        Self::Validation(message.into())
    }

    /// Short machine-readable code for each variant
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::EmptyClear(_) => "empty_clear",
            Self::Persistence(_) => "persistence",
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}
