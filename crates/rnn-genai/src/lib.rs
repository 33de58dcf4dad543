//! RNN service clients
//!
//! Thin HTTP clients for the external services the pipeline talks to:
//! - [`OpenAiClient`]: chat completions (text and JSON mode) and image generation
//! - [`NewsApiClient`]: top headlines used as parody sources
//! - [`PageFetcher`]: raw page and image download
//!
//! No pipeline logic lives here; retries, prompts and validation belong to
//! `rnn-core`.

pub mod error;
pub mod fetch;
pub mod news;
pub mod openai;
pub mod secret;
pub mod types;

pub use error::GenAiError;
pub use fetch::{FetchedPage, PageFetcher};
pub use news::{Headline, NewsApiClient, NewsApiConfig};
pub use openai::{extract_json_object, OpenAiClient, OpenAiConfig};
pub use secret::Secret;
pub use types::{ChatRequest, GeneratedImage, ImageRequest, Message, ResponseFormat};

/// Result type for client operations
pub type Result<T> = std::result::Result<T, GenAiError>;
