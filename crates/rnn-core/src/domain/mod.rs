//! Domain types for the article pipeline.

pub mod article;
pub mod deployment;
pub mod error;
pub mod idea;
pub mod parody;
pub mod status;
pub mod task;

pub use article::{Article, Comment, IdeaRef};
pub use deployment::{
    CommitIdentity, DeployOutcome, DeployStage, DeploymentError, DeploymentReport,
    DeploymentTarget,
};
pub use error::{PipelineError, Result};
pub use idea::{Idea, IdeaOrigin, PARODY_CATEGORY};
pub use parody::{ExtractedArticle, ParodySource};
pub use status::Status;
pub use task::{
    AssemblyStep, BatchResult, GenerationTask, StepRecord, TaskOutcome, TaskReport,
};
