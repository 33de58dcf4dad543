//! Local WebP copies of generated illustrations.
//!
//! Generator image URLs expire, so each article keeps its own copy next to
//! the artifact. The copy is best-effort: an article without one still
//! publishes, pointing at the source URL.

use std::path::Path;

use async_trait::async_trait;
use image::codecs::webp::WebPEncoder;
use image::DynamicImage;
use tracing::debug;
use url::Url;

use rnn_genai::PageFetcher;

use crate::domain::{PipelineError, Result};
use crate::store::write_atomic;

/// Downloads raw image bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_image(&self, url: &Url) -> Result<Vec<u8>>;
}

#[async_trait]
impl ImageFetcher for PageFetcher {
    async fn fetch_image(&self, url: &Url) -> Result<Vec<u8>> {
        Ok(self.fetch_bytes(url.as_str()).await?)
    }
}

/// Decode any supported format and re-encode it as WebP.
pub fn encode_webp(bytes: &[u8]) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| PipelineError::Conversion(format!("undecodable image: {e}")))?;
    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());

    let mut out = Vec::new();
    rgb.write_with_encoder(WebPEncoder::new_lossless(&mut out))
        .map_err(|e| PipelineError::Conversion(format!("webp encoding failed: {e}")))?;
    Ok(out)
}

/// Download `source` and store it as WebP at `dest`.
pub async fn localize_image(fetcher: &dyn ImageFetcher, source: &str, dest: &Path) -> Result<()> {
    let url = Url::parse(source)
        .map_err(|e| PipelineError::Validation(format!("image reference {source:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(PipelineError::Validation(format!(
            "image reference {source:?} is not an http(s) URL"
        )));
    }

    let bytes = fetcher.fetch_image(&url).await?;
    let path = dest.to_path_buf();
    let len = tokio::task::spawn_blocking(move || {
        let webp = encode_webp(&bytes)?;
        write_atomic(&path, &webp)?;
        Ok::<_, PipelineError>(webp.len())
    })
    .await
    .map_err(|e| PipelineError::Io(std::io::Error::other(e.to_string())))??;

    debug!(path = %dest.display(), len, "image stored");
    Ok(())
}
