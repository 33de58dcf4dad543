//! Parallel batch coordinator.
//!
//! A fixed pool of `min(limit, ideas)` workers pulls tasks from a shared
//! queue. Each assembly runs in its own spawned task so an error or panic is
//! caught at the task boundary and recorded as `failed` for that index only.
//! Outcomes land in a pre-sized vector keyed by input position, so completion
//! order never affects the result shape.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn, Instrument};
use uuid::Uuid;

use crate::assembler::ContentAssembler;
use crate::domain::{
    BatchResult, GenerationTask, Idea, PipelineError, Result, TaskOutcome, TaskReport,
};
use crate::obs::{self, BatchSpan};

pub struct BatchCoordinator {
    assembler: Arc<ContentAssembler>,
}

impl BatchCoordinator {
    pub fn new(assembler: Arc<ContentAssembler>) -> Self {
        Self { assembler }
    }

    /// Run every idea through the assembler with at most `concurrency_limit`
    /// assemblies in flight. See [`BatchCoordinator::run_batch_with_cancel`].
    pub async fn run_batch(
        &self,
        ideas: Vec<Idea>,
        concurrency_limit: usize,
    ) -> Result<BatchResult> {
        self.run_batch_with_cancel(ideas, concurrency_limit, CancellationToken::new())
            .await
    }

    /// Like [`BatchCoordinator::run_batch`], stopping early once `cancel`
    /// fires. In-flight tasks finish their current sub-step; tasks never
    /// started are reported as `cancelled`.
    #[instrument(skip(self, ideas, cancel), fields(tasks = ideas.len()))]
    pub async fn run_batch_with_cancel(
        &self,
        ideas: Vec<Idea>,
        concurrency_limit: usize,
        cancel: CancellationToken,
    ) -> Result<BatchResult> {
        if concurrency_limit == 0 {
            return Err(PipelineError::Validation(
                "concurrency limit must be positive".to_string(),
            ));
        }
        if ideas.is_empty() {
            return Ok(BatchResult::default());
        }

        let batch_id = Uuid::new_v4().to_string();
        let span = BatchSpan::new(&batch_id);
        let started = Instant::now();
        let total = ideas.len();
        let workers = concurrency_limit.min(total);
        obs::emit_batch_started(&batch_id, total, workers);

        let originals = ideas.clone();
        let queue: Arc<Mutex<VecDeque<GenerationTask>>> = Arc::new(Mutex::new(
            ideas
                .into_iter()
                .enumerate()
                .map(|(index, idea)| GenerationTask::new(index, idea))
                .collect(),
        ));
        let results: Arc<Mutex<Vec<Option<TaskReport>>>> =
            Arc::new(Mutex::new((0..total).map(|_| None).collect()));

        let pool = (0..workers).map(|worker| {
            let queue = Arc::clone(&queue);
            let results = Arc::clone(&results);
            let assembler = Arc::clone(&self.assembler);
            let cancel = cancel.clone();
            let batch_id = batch_id.clone();
            async move {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let Some(task) = queue.lock().await.pop_front() else {
                        break;
                    };
                    let index = task.index;
                    let idea = task.idea.clone();

                    let assembler = Arc::clone(&assembler);
                    let task_cancel = cancel.clone();
                    let handle = tokio::spawn(async move {
                        assembler.run_task(task, &task_cancel).await
                    });
                    let report = match handle.await {
                        Ok(report) => report,
                        Err(join_err) => {
                            warn!(worker, index, error = %join_err, "task aborted at boundary");
                            aborted_report(index, idea, join_err.to_string())
                        }
                    };

                    obs::emit_task_finished(&batch_id, &report);
                    results.lock().await[index] = Some(report);
                }
            }
            .instrument(span.span())
        });
        join_all(pool).await;

        let slots = std::mem::take(&mut *results.lock().await);
        let outcomes: Vec<TaskReport> = slots
            .into_iter()
            .zip(originals)
            .enumerate()
            .map(|(index, (slot, idea))| {
                slot.unwrap_or(TaskReport {
                    index,
                    idea,
                    outcome: TaskOutcome::Cancelled,
                    attempts: 0,
                    steps: Vec::new(),
                })
            })
            .collect();

        let result = BatchResult { outcomes };
        obs::emit_batch_finished(
            &batch_id,
            started.elapsed().as_millis() as u64,
            result.ready_count(),
            result.failed_count(),
            result.cancelled_count(),
        );
        Ok(result)
    }
}

/// Report for a task whose assembly never returned (panic or abort).
fn aborted_report(index: usize, mut idea: Idea, reason: String) -> TaskReport {
    if idea.start().is_ok() {
        let _ = idea.finish(false);
    }
    TaskReport {
        index,
        idea,
        outcome: TaskOutcome::Failed {
            error: format!("task aborted: {reason}"),
            article: None,
        },
        attempts: 0,
        steps: Vec::new(),
    }
}
