//! Plain HTTP page fetcher.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::error::GenAiError;
use crate::Result;

/// A fetched page body with its declared content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,
    pub content_type: Option<String>,
    pub body: String,
}

/// Fetches raw pages over HTTP.
#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (compatible; RatNewsBot/1.0)")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GenAiError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let response = self.get(url).await?;
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.text().await?;

        Ok(FetchedPage {
            url: final_url,
            content_type,
            body,
        })
    }

    /// Raw response body, for binary downloads such as images.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.get(url).await?;
        let bytes = response.bytes().await?;
        debug!(url = %url, len = bytes.len(), "HTTP download complete");
        Ok(bytes.to_vec())
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        debug!(url = %url, "HTTP fetch starting");
        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "HTTP request failed");
            GenAiError::Network(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenAiError::Api {
                status: status.as_u16(),
                message: format!("fetching {url}"),
            });
        }
        Ok(response)
    }
}
