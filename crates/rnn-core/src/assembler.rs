//! Content assembler: one idea in, one article artifact out.
//!
//! Sub-steps run in a fixed order (outline, body, image, comments). Each is
//! retried under the shared [`RetryPolicy`](crate::retry::RetryPolicy); a
//! failed required step short-circuits everything after it. Cancellation is
//! only observed between sub-steps. When an image fetcher is attached, the
//! generated image is also stored next to the artifact as WebP.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{AssemblyConfig, StepPolicy};
use crate::domain::{
    Article, AssemblyStep, GenerationTask, Idea, PipelineError, Result, StepRecord, TaskOutcome,
    TaskReport,
};
use crate::generation::{BodyRequest, GenerationService};
use crate::media::{localize_image, ImageFetcher};
use crate::retry::{retry_with_backoff, Retried};
use crate::store::ArtifactStore;
use crate::text::{article_slug, estimate_reading_time};

pub struct ContentAssembler {
    service: Arc<dyn GenerationService>,
    images: Option<Arc<dyn ImageFetcher>>,
    store: ArtifactStore,
    config: AssemblyConfig,
}

/// Where a step left the assembly.
enum Halt {
    Failed(PipelineError),
    Cancelled,
}

impl ContentAssembler {
    pub fn new(service: Arc<dyn GenerationService>, config: AssemblyConfig) -> Result<Self> {
        let store = ArtifactStore::new(&config.article_dir)?;
        Ok(Self {
            service,
            images: None,
            store,
            config,
        })
    }

    /// Keep a local WebP copy of each generated image.
    pub fn with_image_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.images = Some(fetcher);
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    /// Assemble a single idea outside of a batch. Failures surface as the
    /// error that stopped the assembly.
    pub async fn assemble(&self, idea: Idea) -> Result<Article> {
        let (report, error) = self
            .drive(GenerationTask::new(0, idea), &CancellationToken::new())
            .await;
        match (report.outcome, error) {
            (TaskOutcome::Ready(article), _) => Ok(article),
            (TaskOutcome::Cancelled, _) => Err(PipelineError::Cancelled),
            (TaskOutcome::Failed { .. }, Some(e)) => Err(e),
            (TaskOutcome::Failed { error, .. }, None) => Err(PipelineError::Generation {
                reason: error,
                permanent: true,
            }),
        }
    }

    /// Drive one task to a terminal outcome and persist its artifact.
    pub async fn run_task(&self, task: GenerationTask, cancel: &CancellationToken) -> TaskReport {
        self.drive(task, cancel).await.0
    }

    async fn drive(
        &self,
        mut task: GenerationTask,
        cancel: &CancellationToken,
    ) -> (TaskReport, Option<PipelineError>) {
        let mut steps = Vec::new();

        if let Err(e) = task.idea.start() {
            let outcome = TaskOutcome::Failed {
                error: e.to_string(),
                article: None,
            };
            return (report(task, outcome, steps), Some(e));
        }
        let mut article = Article::draft(&task.idea);

        match self.build(&mut task, &mut article, &mut steps, cancel).await {
            Ok(()) => {
                if let Err(e) = article.mark_ready() {
                    return self.fail(task, article, steps, e).await;
                }
                if let Err(e) = self.persist(&article).await {
                    warn!(idea_id = %task.idea.id, error = %e, "artifact write failed");
                    let _ = task.idea.finish(false);
                    task.last_error = Some(e.to_string());
                    let outcome = TaskOutcome::Failed {
                        error: e.to_string(),
                        article: None,
                    };
                    return (report(task, outcome, steps), Some(e));
                }
                let _ = task.idea.finish(true);
                info!(
                    idea_id = %task.idea.id,
                    title = %article.title,
                    attempts = task.attempts,
                    "article ready"
                );
                (report(task, TaskOutcome::Ready(article), steps), None)
            }
            Err(Halt::Failed(e)) => self.fail(task, article, steps, e).await,
            Err(Halt::Cancelled) => {
                debug!(idea_id = %task.idea.id, "assembly cancelled at step boundary");
                let _ = article.mark_failed(PipelineError::Cancelled.to_string());
                let _ = task.idea.finish(false);
                if let Err(e) = self.persist(&article).await {
                    warn!(idea_id = %task.idea.id, error = %e, "partial artifact write failed");
                }
                (report(task, TaskOutcome::Cancelled, steps), None)
            }
        }
    }

    async fn build(
        &self,
        task: &mut GenerationTask,
        article: &mut Article,
        steps: &mut Vec<StepRecord>,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), Halt> {
        let service = &self.service;
        let retry = &self.config.retry;

        checkpoint(cancel)?;
        let idea = task.idea.clone();
        let outline = retry_with_backoff(retry, "outline", || service.outline(&idea)).await;
        article.outline = required(task, steps, AssemblyStep::Outline, outline)?;

        checkpoint(cancel)?;
        let target_words = self.config.length.sample(&mut rand::thread_rng());
        let outline_text = article.outline.clone();
        let draft = retry_with_backoff(retry, "body", || {
            service.body(BodyRequest {
                idea: &idea,
                outline: &outline_text,
                target_words,
            })
        })
        .await;
        let draft = required(task, steps, AssemblyStep::Body, draft)?;
        article.title = draft.title;
        article.overview = draft.overview;
        article.body = draft.body;
        article.generator = draft.generator;
        article.slug = article_slug(&article.title);
        article.reading_time_minutes =
            estimate_reading_time(&article.body, self.config.words_per_minute);

        checkpoint(cancel)?;
        if self.config.image != StepPolicy::Skip {
            let title = article.title.clone();
            let image =
                retry_with_backoff(retry, "image", || service.image(&title, &outline_text)).await;
            article.image_reference =
                optional(task, steps, AssemblyStep::Image, self.config.image, image)?;
        }

        if let (Some(fetcher), Some(source)) = (&self.images, article.image_reference.clone()) {
            checkpoint(cancel)?;
            article.image_path = self.store_image(fetcher.as_ref(), article, &source).await;
        }

        checkpoint(cancel)?;
        if self.config.comments != StepPolicy::Skip {
            let count = self
                .config
                .comment_count
                .sample(&mut rand::thread_rng(), idea.is_parody());
            if count == 0 {
                article.comments = Some(Vec::new());
            } else {
                let (title, body) = (article.title.clone(), article.body.clone());
                let comments = retry_with_backoff(retry, "comments", || {
                    service.comments(&title, &body, count)
                })
                .await;
                article.comments = optional(
                    task,
                    steps,
                    AssemblyStep::Comments,
                    self.config.comments,
                    comments,
                )?;
            }
        }
        Ok(())
    }

    /// Best-effort local copy of the article image; the source URL stays in
    /// `image_reference` either way.
    async fn store_image(
        &self,
        fetcher: &dyn ImageFetcher,
        article: &Article,
        source: &str,
    ) -> Option<String> {
        let stem = if article.slug.is_empty() {
            article.idea.id.to_string()
        } else {
            article.slug.clone()
        };
        let file_name = format!("{stem}.webp");
        let dest = self.store.image_path(&file_name);
        match localize_image(fetcher, source, &dest).await {
            Ok(()) => Some(file_name),
            Err(e) => {
                warn!(
                    idea_id = %article.idea.id,
                    source = %source,
                    error = %e,
                    "image download failed, keeping remote reference"
                );
                None
            }
        }
    }

    async fn fail(
        &self,
        mut task: GenerationTask,
        mut article: Article,
        steps: Vec<StepRecord>,
        error: PipelineError,
    ) -> (TaskReport, Option<PipelineError>) {
        warn!(
            idea_id = %task.idea.id,
            kind = error.kind(),
            error = %error,
            "assembly failed"
        );
        let reason = error.to_string();
        let _ = article.mark_failed(reason.clone());
        let _ = task.idea.finish(false);
        task.last_error = Some(reason.clone());

        let article = match self.persist(&article).await {
            Ok(_) => Some(article),
            Err(e) => {
                warn!(idea_id = %task.idea.id, error = %e, "partial artifact write failed");
                None
            }
        };
        let outcome = TaskOutcome::Failed {
            error: reason,
            article,
        };
        (report(task, outcome, steps), Some(error))
    }

    /// Atomic write on the blocking pool.
    async fn persist(&self, article: &Article) -> Result<PathBuf> {
        let store = self.store.clone();
        let article = article.clone();
        tokio::task::spawn_blocking(move || store.write(&article))
            .await
            .map_err(|e| PipelineError::Io(std::io::Error::other(e.to_string())))?
    }
}

fn checkpoint(cancel: &CancellationToken) -> std::result::Result<(), Halt> {
    if cancel.is_cancelled() {
        Err(Halt::Cancelled)
    } else {
        Ok(())
    }
}

fn record<T>(
    task: &mut GenerationTask,
    steps: &mut Vec<StepRecord>,
    step: AssemblyStep,
    out: &Retried<T>,
) {
    task.record_attempts(out.attempts);
    steps.push(StepRecord {
        step,
        attempts: out.attempts,
        succeeded: out.result.is_ok(),
    });
    if let Err(e) = &out.result {
        task.last_error = Some(e.to_string());
    }
}

fn required<T>(
    task: &mut GenerationTask,
    steps: &mut Vec<StepRecord>,
    step: AssemblyStep,
    out: Retried<T>,
) -> std::result::Result<T, Halt> {
    record(task, steps, step, &out);
    out.result.map_err(|e| {
        Halt::Failed(match e {
            PipelineError::Generation { reason, .. } => PipelineError::Generation {
                reason: format!("{step} step failed after {} attempt(s): {reason}", out.attempts),
                permanent: true,
            },
            other => other,
        })
    })
}

fn optional<T>(
    task: &mut GenerationTask,
    steps: &mut Vec<StepRecord>,
    step: AssemblyStep,
    policy: StepPolicy,
    out: Retried<T>,
) -> std::result::Result<Option<T>, Halt> {
    if policy == StepPolicy::Required {
        return required(task, steps, step, out).map(Some);
    }
    record(task, steps, step, &out);
    match out.result {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(
                idea_id = %task.idea.id,
                step = %step,
                error = %e,
                "best-effort step failed, leaving empty"
            );
            Ok(None)
        }
    }
}

fn report(task: GenerationTask, outcome: TaskOutcome, steps: Vec<StepRecord>) -> TaskReport {
    TaskReport {
        index: task.index,
        attempts: task.attempts,
        idea: task.idea,
        outcome,
        steps,
    }
}
