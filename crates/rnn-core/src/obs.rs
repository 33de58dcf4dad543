//! Structured observability hooks for batch and deployment lifecycle events.
//!
//! This module provides:
//! - Batch-scoped tracing spans via the `BatchSpan` guard
//! - Emission functions for key lifecycle events: batch start/finish, task
//!   completion, deployment stage transitions
//!
//! Events are emitted at `info!` level with an `event` field naming them.

use tracing::{info, Span};

use crate::domain::{DeployStage, TaskReport};

/// Span tagged with the batch id.
///
/// Enter it for synchronous sections, or attach [`BatchSpan::span`] to
/// futures with `tracing::Instrument`.
pub struct BatchSpan {
    span: Span,
}

impl BatchSpan {
    pub fn new(batch_id: &str) -> Self {
        Self {
            span: tracing::info_span!("rnn.batch", batch_id = %batch_id),
        }
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    pub fn span(&self) -> Span {
        self.span.clone()
    }
}

/// Emit event: batch started.
pub fn emit_batch_started(batch_id: &str, tasks: usize, workers: usize) {
    info!(event = "batch.started", batch_id = %batch_id, tasks, workers);
}

/// Emit event: one task reached a terminal outcome.
pub fn emit_task_finished(batch_id: &str, report: &TaskReport) {
    info!(
        event = "batch.task_finished",
        batch_id = %batch_id,
        index = report.index,
        idea_id = %report.idea.id,
        outcome = report.outcome.label(),
        attempts = report.attempts,
    );
}

/// Emit event: batch finished with per-outcome counts.
pub fn emit_batch_finished(
    batch_id: &str,
    duration_ms: u64,
    ready: usize,
    failed: usize,
    cancelled: usize,
) {
    info!(
        event = "batch.finished",
        batch_id = %batch_id,
        duration_ms,
        ready,
        failed,
        cancelled,
    );
}

/// Emit event: deployment advanced to `stage`. `repo` must already be
/// stripped of credentials.
pub fn emit_deploy_stage(repo: &str, stage: DeployStage) {
    info!(event = "deploy.stage", repo = %repo, stage = %stage);
}

/// Emit event: deployment failed (warning level).
pub fn emit_deploy_failed(repo: &str, failed_at: DeployStage, error: &dyn std::fmt::Display) {
    tracing::warn!(
        event = "deploy.failed",
        repo = %repo,
        failed_at = %failed_at,
        error = %error,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_span_enter() {
        let span = BatchSpan::new("batch-1");
        let _entered = span.enter();
        emit_batch_started("batch-1", 3, 2);
    }
}
