//! OpenAI-compatible chat and image client.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::GenAiError;
use crate::secret::Secret;
use crate::types::{
    ChatRequest, ChatResponseRaw, GeneratedImage, ImageRequest, ImageResponseRaw,
};
use crate::Result;

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Secret,
    pub base_url: String,
    /// Model for long-form writing (outlines, bodies, image ideas)
    pub heavy_model: String,
    /// Model for structured/JSON tasks (comments, extraction)
    pub light_model: String,
    pub image_model: String,
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<Secret>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            heavy_model: "gpt-4o".to_string(),
            light_model: "gpt-4o-mini".to_string(),
            image_model: "dall-e-3".to_string(),
            timeout_secs: 120,
        }
    }

    /// Read `OPENAI_API_KEY` (required) and `OPENAI_BASE_URL` (optional).
    pub fn from_env() -> Result<Self> {
        let api_key = Secret::from_env("OPENAI_API_KEY")
            .ok_or_else(|| GenAiError::Config("OPENAI_API_KEY not set".into()))?;
        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.base_url = url;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// OpenAI API client.
#[derive(Clone)]
pub struct OpenAiClient {
    http_client: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("rnn-genai/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenAiError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiConfig::from_env()?)
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    /// Chat completion; returns the text of the first choice.
    pub async fn chat(&self, request: ChatRequest) -> Result<String> {
        let start = Instant::now();
        let raw: ChatResponseRaw = self.post_json("chat/completions", &request).await?;

        let content = raw
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| GenAiError::Parse("chat response had no content".into()))?;

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis() as u64,
            chars = content.len(),
            "chat completion"
        );
        Ok(content)
    }

    /// Chat completion in JSON mode, deserialized into `T`.
    ///
    /// Tolerates prose around the object by slicing from the first `{` to the
    /// last `}` before parsing.
    pub async fn chat_json<T: DeserializeOwned>(&self, request: ChatRequest) -> Result<T> {
        let text = self.chat(request.json()).await?;
        let json = extract_json_object(&text)
            .ok_or_else(|| GenAiError::Parse("response contained no JSON object".into()))?;
        Ok(serde_json::from_str(json)?)
    }

    /// Generate one image and return its hosted URL.
    pub async fn generate_image(&self, prompt: impl Into<String>) -> Result<GeneratedImage> {
        let request = ImageRequest {
            model: self.config.image_model.clone(),
            prompt: prompt.into(),
            n: 1,
            size: "1024x1024".to_string(),
            quality: "standard".to_string(),
        };
        let raw: ImageResponseRaw = self.post_json("images/generations", &request).await?;

        let image = raw
            .data
            .into_iter()
            .next()
            .ok_or_else(|| GenAiError::Parse("image response had no data".into()))?;
        let url = image
            .url
            .ok_or_else(|| GenAiError::Parse("image response had no url".into()))?;

        if let Some(revised) = &image.revised_prompt {
            debug!(revised_prompt = %revised, "image generated");
        }
        Ok(GeneratedImage {
            url,
            revised_prompt: image.revised_prompt,
        })
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.config.api_key.expose())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(path = %path, error = %e, "OpenAI request failed");
                GenAiError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(path = %path, status = %status, "OpenAI API error");
            return Err(GenAiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| GenAiError::Parse(e.to_string()))
    }
}

/// Slice the outermost `{ ... }` out of a model response.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    #[test]
    fn test_config_builder() {
        let config = OpenAiConfig::new("sk-test").with_base_url("http://localhost:8080/v1");
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.heavy_model, "gpt-4o");
        assert!(!format!("{config:?}").contains("sk-test"));
    }

    #[test]
    fn test_extract_json_object_strips_prose() {
        let text = "Sure! Here you go:\n```json\n{\"a\": {\"b\": 1}}\n```";
        assert_eq!(extract_json_object(text), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let config = OpenAiConfig::new("sk-test").with_base_url("http://127.0.0.1:9/v1");
        let client = OpenAiClient::new(config).unwrap();

        let err = client
            .chat(ChatRequest::new("gpt-4o").message(Message::user("hello")))
            .await
            .unwrap_err();
        assert!(matches!(err, GenAiError::Network(_)), "got {err:?}");
        assert!(err.is_transient());
    }
}
