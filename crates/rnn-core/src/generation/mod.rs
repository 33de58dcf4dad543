//! Generation service contract and its OpenAI-backed implementation.

pub mod openai;
pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Comment, ExtractedArticle, Idea, Result};

pub use openai::OpenAiGenerationService;

/// An idea as proposed by the service, before it gets an id and status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdeaDraft {
    #[serde(default)]
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: String,
}

/// Inputs for body generation.
#[derive(Debug, Clone)]
pub struct BodyRequest<'a> {
    pub idea: &'a Idea,
    pub outline: &'a str,
    pub target_words: usize,
}

/// Structured article text returned by body generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArticleDraft {
    pub title: String,
    #[serde(default)]
    pub overview: String,
    pub body: String,
    /// Prompt variant that produced the text.
    #[serde(default)]
    pub generator: Option<String>,
}

/// External text/image generation.
///
/// Every call is a plain request/response; retries are applied by callers.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Propose `count` ideas. Implementations return whatever the service
    /// produced; count validation happens in the idea source.
    async fn ideas(&self, count: usize) -> Result<Vec<IdeaDraft>>;

    async fn outline(&self, idea: &Idea) -> Result<String>;

    async fn body(&self, request: BodyRequest<'_>) -> Result<ArticleDraft>;

    /// Returns an image reference (hosted URL).
    async fn image(&self, title: &str, outline: &str) -> Result<String>;

    async fn comments(&self, title: &str, body: &str, count: usize) -> Result<Vec<Comment>>;

    /// Pull title/body/author out of normalized page text. Missing fields
    /// come back empty.
    async fn extract_article(&self, normalized_text: &str) -> Result<ExtractedArticle>;

    /// Rewrite a real story as a parody premise.
    async fn parody_premise(&self, article: &ExtractedArticle) -> Result<String>;
}
