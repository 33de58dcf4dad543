//! NewsAPI top-headlines client used to pick parody sources.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::GenAiError;
use crate::secret::Secret;
use crate::Result;

/// NewsAPI configuration
#[derive(Debug, Clone)]
pub struct NewsApiConfig {
    pub api_key: Secret,
    pub base_url: String,
    /// Two-letter country code for top headlines
    pub country: String,
}

impl NewsApiConfig {
    pub fn new(api_key: impl Into<Secret>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://newsapi.org/v2".to_string(),
            country: "us".to_string(),
        }
    }

    /// Read `NEWS_API_KEY` (required) and `NEWS_API_COUNTRY` (optional).
    pub fn from_env() -> Result<Self> {
        let api_key = Secret::from_env("NEWS_API_KEY")
            .ok_or_else(|| GenAiError::Config("NEWS_API_KEY not set".into()))?;
        let mut config = Self::new(api_key);
        if let Ok(country) = std::env::var("NEWS_API_COUNTRY") {
            config.country = country;
        }
        Ok(config)
    }
}

/// A single headline entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Headline {
    pub title: Option<String>,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct HeadlinesRaw {
    status: String,
    #[serde(default)]
    articles: Vec<Headline>,
    message: Option<String>,
}

/// NewsAPI client
#[derive(Clone)]
pub struct NewsApiClient {
    http_client: Client,
    config: NewsApiConfig,
}

impl NewsApiClient {
    pub fn new(config: NewsApiConfig) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("rnn-genai/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GenAiError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(NewsApiConfig::from_env()?)
    }

    /// Fetch up to `limit` current top headlines.
    pub async fn top_headlines(&self, limit: usize) -> Result<Vec<Headline>> {
        let url = format!("{}/top-headlines", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http_client
            .get(&url)
            .header("X-Api-Key", self.config.api_key.expose())
            .query(&[
                ("country", self.config.country.clone()),
                ("pageSize", limit.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = %status, "NewsAPI error");
            return Err(GenAiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let raw: HeadlinesRaw = response.json().await?;
        parse_headlines(raw, limit)
    }
}

fn parse_headlines(raw: HeadlinesRaw, limit: usize) -> Result<Vec<Headline>> {
    if raw.status != "ok" {
        return Err(GenAiError::Parse(format!(
            "NewsAPI returned status '{}': {}",
            raw.status,
            raw.message.unwrap_or_default()
        )));
    }
    let headlines: Vec<Headline> = raw
        .articles
        .into_iter()
        .filter(|h| h.url.starts_with("http"))
        .take(limit)
        .collect();
    debug!(count = headlines.len(), "fetched top headlines");
    Ok(headlines)
}
