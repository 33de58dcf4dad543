//! Per-task bookkeeping for batch runs.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::article::Article;
use super::idea::Idea;

/// Sub-steps of article assembly, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyStep {
    Outline,
    Body,
    Image,
    Comments,
}

impl fmt::Display for AssemblyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssemblyStep::Outline => "outline",
            AssemblyStep::Body => "body",
            AssemblyStep::Image => "image",
            AssemblyStep::Comments => "comments",
        };
        f.write_str(s)
    }
}

/// Attempts spent on one sub-step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepRecord {
    pub step: AssemblyStep,
    pub attempts: u32,
    pub succeeded: bool,
}

/// One idea-to-article attempt inside a batch.
#[derive(Debug, Clone)]
pub struct GenerationTask {
    /// Position of the idea in the batch input.
    pub index: usize,
    pub idea: Idea,
    /// Highest attempt count reached by any sub-step; bounded by the retry
    /// policy's maximum.
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl GenerationTask {
    pub fn new(index: usize, idea: Idea) -> Self {
        Self {
            index,
            idea,
            attempts: 0,
            last_error: None,
        }
    }

    pub fn record_attempts(&mut self, attempts: u32) {
        self.attempts = self.attempts.max(attempts);
    }
}

/// Terminal outcome of one task.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Ready(Article),
    /// `article` holds the partial artifact when assembly got far enough to
    /// write one.
    Failed {
        error: String,
        article: Option<Article>,
    },
    Cancelled,
}

impl TaskOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TaskOutcome::Ready(_) => "ready",
            TaskOutcome::Failed { .. } => "failed",
            TaskOutcome::Cancelled => "cancelled",
        }
    }
}

/// Everything the coordinator records about one task.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub index: usize,
    pub idea: Idea,
    pub outcome: TaskOutcome,
    pub attempts: u32,
    pub steps: Vec<StepRecord>,
}

impl TaskReport {
    pub fn is_ready(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Failed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Cancelled)
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            TaskOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Ordered outcomes of a batch; `outcomes[i]` belongs to input idea `i`.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub outcomes: Vec<TaskReport>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn ready_count(&self) -> usize {
        self.outcomes.iter().filter(|r| r.is_ready()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|r| r.is_failed()).count()
    }

    pub fn cancelled_count(&self) -> usize {
        self.outcomes.iter().filter(|r| r.is_cancelled()).count()
    }

    /// Ready articles in batch order.
    pub fn articles(&self) -> impl Iterator<Item = &Article> {
        self.outcomes.iter().filter_map(|r| match &r.outcome {
            TaskOutcome::Ready(article) => Some(article),
            _ => None,
        })
    }

    /// `(index, reason)` for every failed task.
    pub fn failures(&self) -> Vec<(usize, &str)> {
        self.outcomes
            .iter()
            .filter_map(|r| r.error().map(|e| (r.index, e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(index: usize, outcome: TaskOutcome) -> TaskReport {
        TaskReport {
            index,
            idea: Idea::original("t", "p", "c"),
            outcome,
            attempts: 1,
            steps: Vec::new(),
        }
    }

    #[test]
    fn test_batch_counts_and_failures() {
        let idea = Idea::original("t", "p", "c");
        let batch = BatchResult {
            outcomes: vec![
                report(0, TaskOutcome::Ready(Article::draft(&idea))),
                report(
                    1,
                    TaskOutcome::Failed {
                        error: "boom".into(),
                        article: None,
                    },
                ),
                report(2, TaskOutcome::Cancelled),
            ],
        };
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.ready_count(), 1);
        assert_eq!(batch.failed_count(), 1);
        assert_eq!(batch.cancelled_count(), 1);
        assert_eq!(batch.failures(), vec![(1, "boom")]);
        assert_eq!(batch.articles().count(), 1);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(TaskOutcome::Cancelled.label(), "cancelled");
        assert_eq!(AssemblyStep::Comments.to_string(), "comments");
    }
}
