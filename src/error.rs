use thiserror::Error;

/// Failures surfaced by task graph mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("subtask '{0}' not found")]
    NotFound(String),

    #[error("subtask '{0}' already exists")]
    DuplicateId(String),

    #[error("invalid status '{0}': expected pending, in_progress, complete, blocked or skipped")]
    InvalidStatus(String),

    #[error("invalid priority '{0}': expected low, normal or high")]
    InvalidPriority(String),
}
