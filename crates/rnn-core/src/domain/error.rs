//! Pipeline error taxonomy.

use super::deployment::DeploymentError;

/// Errors produced by the pipeline core.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Service unreachable, malformed/incomplete response, or retry budget exhausted.
    #[error("generation error: {reason}")]
    Generation { reason: String, permanent: bool },

    /// Required fields could not be identified in the source content.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Source content could not be converted to normalized text.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Malformed input (bad URL, zero count, illegal status transition).
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Deployment(#[from] DeploymentError),

    #[error("render error: {0}")]
    Render(String),

    #[error("cancelled before completion")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// A retryable generation failure.
    pub fn generation(reason: impl Into<String>) -> Self {
        PipelineError::Generation {
            reason: reason.into(),
            permanent: false,
        }
    }

    /// Whether the shared retry policy may attempt the call again.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Generation { permanent, .. } => !permanent,
            PipelineError::Extraction(_) | PipelineError::Io(_) => true,
            _ => false,
        }
    }

    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Generation { .. } => "generation",
            PipelineError::Extraction(_) => "extraction",
            PipelineError::Conversion(_) => "conversion",
            PipelineError::Validation(_) => "validation",
            PipelineError::Deployment(_) => "deployment",
            PipelineError::Render(_) => "render",
            PipelineError::Cancelled => "cancelled",
            PipelineError::Serialization(_) => "serialization",
            PipelineError::Io(_) => "io",
        }
    }
}

impl From<rnn_genai::GenAiError> for PipelineError {
    fn from(err: rnn_genai::GenAiError) -> Self {
        PipelineError::Generation {
            permanent: !err.is_transient(),
            reason: err.to_string(),
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
