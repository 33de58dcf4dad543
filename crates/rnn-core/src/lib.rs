//! RNN Core Library
//!
//! The article pipeline behind Rat News Network: idea generation, article
//! assembly with local image copies, parody extraction, the
//! bounded-concurrency batch coordinator, sitemap generation and git
//! deployment of the rendered site.

pub mod assembler;
pub mod batch;
pub mod config;
pub mod deploy;
pub mod domain;
pub mod fakes;
pub mod generation;
pub mod ideas;
pub mod media;
pub mod obs;
pub mod parody;
pub mod pipeline;
pub mod render;
pub mod retry;
pub mod sitemap;
pub mod store;
pub mod telemetry;
pub mod text;

pub use domain::{
    Article, AssemblyStep, BatchResult, Comment, CommitIdentity, DeployOutcome, DeployStage,
    DeploymentError, DeploymentReport, DeploymentTarget, ExtractedArticle, GenerationTask, Idea,
    IdeaOrigin, ParodySource, PipelineError, Result, Status, TaskOutcome, TaskReport,
};

pub use assembler::ContentAssembler;
pub use batch::BatchCoordinator;
pub use config::{
    AssemblyConfig, CommentPolicy, LengthPolicy, ParodyPolicy, PipelineConfig, StepPolicy,
};
pub use deploy::{AutoApprove, DeploymentOrchestrator, PushGate, PushSummary, StdinPrompt};
pub use generation::{GenerationService, OpenAiGenerationService};
pub use ideas::IdeaSource;
pub use media::ImageFetcher;
pub use parody::{ArticleFetcher, NewsSource, ParodyExtractor};
pub use pipeline::{Pipeline, PipelineSummary};
pub use render::{CommandRenderer, SiteRenderer};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use sitemap::{build_sitemap, write_sitemap, ChangeFreq, SitemapEntry};
pub use store::ArtifactStore;
pub use telemetry::init_tracing;

/// Crate version, kept in lockstep across the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
