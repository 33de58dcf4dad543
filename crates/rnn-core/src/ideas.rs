//! Idea source: asks the generation service for fresh premises.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{Idea, PipelineError, Result};
use crate::generation::GenerationService;
use crate::retry::{retry_with_backoff, RetryPolicy};

pub struct IdeaSource {
    service: Arc<dyn GenerationService>,
    retry: RetryPolicy,
}

impl IdeaSource {
    pub fn new(service: Arc<dyn GenerationService>, retry: RetryPolicy) -> Self {
        Self { service, retry }
    }

    /// Exactly `count` pending original ideas.
    ///
    /// A response with the wrong number of ideas counts as a failed attempt;
    /// it is never truncated or padded.
    pub async fn generate_ideas(&self, count: usize) -> Result<Vec<Idea>> {
        if count == 0 {
            return Err(PipelineError::Validation(
                "idea count must be positive".to_string(),
            ));
        }

        let retried = retry_with_backoff(&self.retry, "ideas", || async move {
            let drafts = self.service.ideas(count).await?;
            let usable: Vec<_> = drafts
                .into_iter()
                .filter(|d| !d.description.trim().is_empty())
                .collect();
            if usable.len() != count {
                warn!(requested = count, received = usable.len(), "idea count mismatch");
                return Err(PipelineError::generation(format!(
                    "expected {count} ideas, service returned {}",
                    usable.len()
                )));
            }
            Ok(usable)
        })
        .await;

        let attempts = retried.attempts;
        let drafts = retried.into_result().map_err(|e| match e {
            PipelineError::Generation { reason, .. } => PipelineError::Generation {
                reason: format!("{reason} (after {attempts} attempt(s))"),
                permanent: true,
            },
            other => other,
        })?;

        info!(count, attempts, "ideas generated");
        Ok(drafts
            .into_iter()
            .map(|d| Idea::original(d.title, d.description, d.category))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IdeaOrigin, Status};
    use crate::fakes::ScriptedGenerationService;
    use crate::generation::IdeaDraft;

    fn draft(n: usize) -> IdeaDraft {
        IdeaDraft {
            title: format!("Idea {n}"),
            description: format!("Rats do thing {n}"),
            category: "Local".to_string(),
        }
    }

    fn source(service: ScriptedGenerationService) -> IdeaSource {
        let retry = RetryPolicy {
            backoff_base_ms: 1,
            ..RetryPolicy::default()
        };
        IdeaSource::new(Arc::new(service), retry)
    }

    #[tokio::test]
    async fn test_returns_exactly_count_pending_originals() {
        let service = ScriptedGenerationService::new();
        service.push_ideas(Ok((0..3).map(draft).collect()));
        let ideas = source(service).generate_ideas(3).await.unwrap();
        assert_eq!(ideas.len(), 3);
        assert!(ideas
            .iter()
            .all(|i| i.status() == Status::Pending && i.origin == IdeaOrigin::Original));
    }

    #[tokio::test]
    async fn test_short_response_is_retried_then_fails() {
        let service = ScriptedGenerationService::new();
        for _ in 0..3 {
            service.push_ideas(Ok(vec![draft(0)]));
        }
        let source = source(service.clone());
        let err = source.generate_ideas(2).await.unwrap_err();
        assert!(matches!(err, PipelineError::Generation { .. }), "got {err:?}");
        assert_eq!(service.calls("ideas"), 3);
    }

    #[tokio::test]
    async fn test_short_response_recovers_on_retry() {
        let service = ScriptedGenerationService::new();
        service.push_ideas(Ok(vec![draft(0)]));
        service.push_ideas(Ok((0..2).map(draft).collect()));
        let ideas = source(service).generate_ideas(2).await.unwrap();
        assert_eq!(ideas.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_count_is_validation_error() {
        let err = source(ScriptedGenerationService::new())
            .generate_ideas(0)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }
}
