//! Error types for the timeline crate.

use relocation_core::error::RelocationError;

/// Errors from timeline store operations and collaborator integrations.
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    #[error("No matching service for: {0}")]
    UnknownService(String),
    #[error("Task not found: {0}")]
    TaskNotFound(String),
    #[error("Research request failed: {0}")]
    Research(String),
    #[error("Storage error: {0}")]
    Storage(#[from] RelocationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_error_display() {
        let err = TimelineError::UnknownService("spaceflight".to_string());
        assert_eq!(err.to_string(), "No matching service for: spaceflight");

        let err = TimelineError::TaskNotFound("task-1".to_string());
        assert_eq!(err.to_string(), "Task not found: task-1");

        let err = TimelineError::Research("upstream 502".to_string());
        assert_eq!(err.to_string(), "Research request failed: upstream 502");
    }

    #[test]
    fn test_timeline_error_from_relocation_error() {
        let err: TimelineError = RelocationError::Storage("lock poisoned".to_string()).into();
        assert!(matches!(err, TimelineError::Storage(_)));
        assert!(err.to_string().contains("lock poisoned"));
    }
}
