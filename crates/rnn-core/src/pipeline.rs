//! End-to-end run: ideas → batch → stage → render → sitemap → deploy.
//!
//! The renderer never reads the artifact directory directly. Only the ready
//! articles of this run (or, when reusing, every ready artifact) are staged
//! into a fresh directory, so partial and stale artifacts stay unpublished.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::assembler::ContentAssembler;
use crate::batch::BatchCoordinator;
use crate::config::PipelineConfig;
use crate::deploy::DeploymentOrchestrator;
use crate::domain::{BatchResult, DeploymentReport, Idea, PipelineError, Result};
use crate::generation::GenerationService;
use crate::ideas::IdeaSource;
use crate::media::ImageFetcher;
use crate::parody::{ArticleFetcher, NewsSource, ParodyExtractor};
use crate::render::SiteRenderer;
use crate::sitemap;

/// Directory under the article directory handed to the renderer.
pub const STAGING_DIR: &str = ".render";

/// What one run produced.
#[derive(Debug)]
pub struct PipelineSummary {
    /// `None` when existing artifacts were reused instead of generating.
    pub batch: Option<BatchResult>,
    pub articles_ready: usize,
    pub article_dir: PathBuf,
    /// Ready artifacts as handed to the renderer.
    pub staged_dir: Option<PathBuf>,
    /// `None` when nothing was ready to render.
    pub site_dir: Option<PathBuf>,
    pub sitemap: Option<PathBuf>,
    pub deployment: Option<DeploymentReport>,
}

struct ParodySources {
    fetcher: Arc<dyn ArticleFetcher>,
    news: Arc<dyn NewsSource>,
}

pub struct Pipeline {
    config: PipelineConfig,
    service: Arc<dyn GenerationService>,
    renderer: Arc<dyn SiteRenderer>,
    parody: Option<ParodySources>,
    images: Option<Arc<dyn ImageFetcher>>,
    deployer: Option<DeploymentOrchestrator>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        service: Arc<dyn GenerationService>,
        renderer: Arc<dyn SiteRenderer>,
    ) -> Self {
        Self {
            config,
            service,
            renderer,
            parody: None,
            images: None,
            deployer: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Enable parody ideas drawn from `news` top stories.
    pub fn with_parody_sources(
        mut self,
        fetcher: Arc<dyn ArticleFetcher>,
        news: Arc<dyn NewsSource>,
    ) -> Self {
        self.parody = Some(ParodySources { fetcher, news });
        self
    }

    /// Store a local WebP copy of every generated image.
    pub fn with_image_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.images = Some(fetcher);
        self
    }

    pub fn with_deployment(mut self, deployer: DeploymentOrchestrator) -> Self {
        self.deployer = Some(deployer);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[instrument(skip(self), fields(num_articles = self.config.num_articles))]
    pub async fn run(&self) -> Result<PipelineSummary> {
        let mut assembler =
            ContentAssembler::new(self.service.clone(), self.config.assembly.clone())?;
        if let Some(fetcher) = &self.images {
            assembler = assembler.with_image_fetcher(fetcher.clone());
        }
        let assembler = Arc::new(assembler);
        let store = assembler.store().clone();
        let article_dir = store.root().to_path_buf();

        let mut reused = Vec::new();
        let (batch, articles_ready) = if self.config.num_articles == 0 {
            reused = store.load_ready()?;
            info!(dir = %article_dir.display(), count = reused.len(), "reusing existing articles");
            (None, reused.len())
        } else {
            let ideas = self.collect_ideas().await?;
            let coordinator = BatchCoordinator::new(assembler.clone());
            let result = coordinator
                .run_batch_with_cancel(ideas, self.config.concurrency, self.cancel.clone())
                .await?;
            for (index, reason) in result.failures() {
                warn!(index, reason, "article failed");
            }
            let ready = result.ready_count();
            (Some(result), ready)
        };

        let mut summary = PipelineSummary {
            batch,
            articles_ready,
            article_dir,
            staged_dir: None,
            site_dir: None,
            sitemap: None,
            deployment: None,
        };
        if articles_ready == 0 {
            warn!("no ready articles, skipping render and deployment");
            return Ok(summary);
        }
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let staged_dir = summary.article_dir.join(STAGING_DIR);
        let staged = match &summary.batch {
            Some(batch) => store.stage(batch.articles(), &staged_dir)?,
            None => store.stage(&reused, &staged_dir)?,
        };
        info!(dir = %staged_dir.display(), count = staged, "articles staged for rendering");
        summary.staged_dir = Some(staged_dir.clone());

        let site_dir = self.config.site_dir.clone();
        self.renderer.render(&staged_dir, &site_dir).await?;
        summary.sitemap = Some(sitemap::write_sitemap(&site_dir, &self.config.base_url)?);
        summary.site_dir = Some(site_dir.clone());

        if let Some(deployer) = &self.deployer {
            summary.deployment = Some(deployer.deploy(&site_dir).await?);
        }
        Ok(summary)
    }

    /// Original ideas plus the parody share decided by the parody policy.
    /// A parody shortfall is filled with original ideas so the batch keeps
    /// its requested size.
    async fn collect_ideas(&self) -> Result<Vec<Idea>> {
        let total = self.config.num_articles;
        let mut parodies = Vec::new();
        if let Some(sources) = &self.parody {
            let wanted = self.config.parody.parody_count(total);
            if wanted > 0 {
                let extractor = ParodyExtractor::new(
                    self.service.clone(),
                    sources.fetcher.clone(),
                    self.config.assembly.retry.clone(),
                );
                match extractor
                    .ideas_from_top_stories(sources.news.as_ref(), wanted)
                    .await
                {
                    Ok(ideas) => parodies = ideas,
                    Err(e) => warn!(error = %e, "parody sources unavailable"),
                }
            }
        }

        let originals_needed = total - parodies.len().min(total);
        let mut ideas = if originals_needed > 0 {
            IdeaSource::new(self.service.clone(), self.config.assembly.retry.clone())
                .generate_ideas(originals_needed)
                .await?
        } else {
            Vec::new()
        };
        info!(
            originals = ideas.len(),
            parodies = parodies.len(),
            "batch ideas collected"
        );
        ideas.extend(parodies.into_iter().take(total));
        Ok(ideas)
    }
}
