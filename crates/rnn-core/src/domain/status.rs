//! Lifecycle status shared by ideas and articles.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{PipelineError, Result};

/// Monotone lifecycle: `pending -> in_progress -> {ready, failed}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    InProgress,
    Ready,
    Failed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Ready | Status::Failed)
    }

    pub fn can_transition_to(self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Pending, Status::InProgress)
                | (Status::InProgress, Status::Ready)
                | (Status::InProgress, Status::Failed)
        )
    }

    /// Validate and return the next status.
    pub fn transition(self, next: Status) -> Result<Status> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(PipelineError::Validation(format!(
                "illegal status transition {self} -> {next}"
            )))
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pending => "pending",
            Status::InProgress => "in_progress",
            Status::Ready => "ready",
            Status::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_allowed() {
        assert_eq!(Status::Pending.transition(Status::InProgress).unwrap(), Status::InProgress);
        assert_eq!(Status::InProgress.transition(Status::Ready).unwrap(), Status::Ready);
        assert_eq!(Status::InProgress.transition(Status::Failed).unwrap(), Status::Failed);
    }

    #[test]
    fn test_reverse_and_skipping_transitions_rejected() {
        assert!(Status::Ready.transition(Status::InProgress).is_err());
        assert!(Status::Failed.transition(Status::Ready).is_err());
        assert!(Status::Pending.transition(Status::Ready).is_err());
        assert!(Status::InProgress.transition(Status::Pending).is_err());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&Status::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
