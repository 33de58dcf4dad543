//! Parody extraction: real article URL -> normalized text -> parody idea.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{info, instrument, warn};
use url::Url;

use rnn_genai::{FetchedPage, NewsApiClient, PageFetcher};

use crate::domain::{ExtractedArticle, Idea, ParodySource, PipelineError, Result};
use crate::generation::GenerationService;
use crate::retry::{retry_with_backoff, RetryPolicy};

/// Paragraphs shorter than this are treated as navigation or captions.
pub const MIN_PARAGRAPH_CHARS: usize = 80;

/// Upper bound on text handed to the extraction prompt.
const MAX_EXTRACT_CHARS: usize = 24_000;

/// Downloads raw article content.
#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage>;
}

#[async_trait]
impl ArticleFetcher for PageFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        Ok(PageFetcher::fetch(self, url.as_str()).await?)
    }
}

/// Supplies URLs of current top stories.
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn top_story_urls(&self, count: usize) -> Result<Vec<String>>;
}

#[async_trait]
impl NewsSource for NewsApiClient {
    async fn top_story_urls(&self, count: usize) -> Result<Vec<String>> {
        let headlines = self.top_headlines(count).await?;
        Ok(headlines.into_iter().map(|h| h.url).collect())
    }
}

/// Reject anything that is not an absolute http(s) URL with a host.
pub fn validate_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| PipelineError::Validation(format!("invalid url '{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(PipelineError::Validation(format!(
            "unsupported url scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(PipelineError::Validation(format!("url '{raw}' has no host")));
    }
    Ok(url)
}

struct HtmlPatterns {
    script: Regex,
    style: Regex,
    noise: Regex,
    heading: Regex,
    paragraph: Regex,
    br: Regex,
    link: Regex,
    list_item: Regex,
    tag: Regex,
    spaces: Regex,
    blank_lines: Regex,
}

fn patterns() -> &'static HtmlPatterns {
    static PATTERNS: OnceLock<HtmlPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("valid html pattern");
        HtmlPatterns {
            script: re(r"(?is)<script[^>]*>.*?</script>"),
            style: re(r"(?is)<style[^>]*>.*?</style>"),
            noise: re(r"(?is)<(nav|header|footer|aside|form|noscript)[^>]*>.*?</(nav|header|footer|aside|form|noscript)>|<!--.*?-->"),
            heading: re(r"(?is)<h([1-6])[^>]*>(.*?)</h[1-6]>"),
            paragraph: re(r"(?is)<p[^>]*>(.*?)</p>"),
            br: re(r"(?i)<br\s*/?>"),
            link: re(r#"(?is)<a[^>]*href=["']([^"']+)["'][^>]*>(.*?)</a>"#),
            list_item: re(r"(?is)<li[^>]*>(.*?)</li>"),
            tag: re(r"<[^>]+>"),
            spaces: re(r"[ \t]+"),
            blank_lines: re(r"\n\s*\n(\s*\n)+"),
        }
    })
}

/// Convert an HTML document to markdown-like text.
pub fn html_to_markdown(html: &str) -> String {
    let p = patterns();
    let mut text = p.script.replace_all(html, "").into_owned();
    text = p.style.replace_all(&text, "").into_owned();
    text = p.noise.replace_all(&text, "").into_owned();

    text = p
        .heading
        .replace_all(&text, |caps: &regex::Captures| {
            let level = caps[1].parse::<usize>().unwrap_or(1);
            format!("\n{} {}\n\n", "#".repeat(level), caps[2].trim())
        })
        .into_owned();
    text = p.paragraph.replace_all(&text, "\n$1\n\n").into_owned();
    text = p.br.replace_all(&text, "\n").into_owned();
    text = p.link.replace_all(&text, "$2").into_owned();
    text = p.list_item.replace_all(&text, "\n- $1\n").into_owned();
    text = p.tag.replace_all(&text, "").into_owned();

    text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'");

    let text = p.spaces.replace_all(&text, " ");
    let text: String = text.lines().map(str::trim).collect::<Vec<_>>().join("\n");
    p.blank_lines.replace_all(&text, "\n\n").trim().to_string()
}

fn is_html(page: &FetchedPage) -> bool {
    match &page.content_type {
        Some(ct) => {
            let ct = ct.to_ascii_lowercase();
            ct.contains("text/html") || ct.contains("application/xhtml")
        }
        None => {
            let head = page
                .body
                .chars()
                .take(1024)
                .collect::<String>()
                .to_ascii_lowercase();
            head.contains("<html") || head.contains("<!doctype html")
        }
    }
}

/// Paragraph blocks long enough to be article prose.
fn article_paragraphs(markdown: &str) -> usize {
    markdown
        .split("\n\n")
        .map(str::trim)
        .filter(|block| !block.starts_with('#') && !block.starts_with("- "))
        .filter(|block| block.chars().count() >= MIN_PARAGRAPH_CHARS)
        .count()
}

/// Normalize a fetched page, failing with `Conversion` when it is not an
/// HTML article.
pub fn normalize_page(page: &FetchedPage) -> Result<String> {
    if !is_html(page) {
        return Err(PipelineError::Conversion(format!(
            "{} is not an HTML document (content type {})",
            page.url,
            page.content_type.as_deref().unwrap_or("unknown")
        )));
    }
    let markdown = html_to_markdown(&page.body);
    if markdown.is_empty() {
        return Err(PipelineError::Conversion(format!(
            "{} has no text content",
            page.url
        )));
    }
    if article_paragraphs(&markdown) == 0 {
        return Err(PipelineError::Conversion(format!(
            "{} has no article paragraphs",
            page.url
        )));
    }
    Ok(markdown)
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Turns third-party articles into parody ideas.
pub struct ParodyExtractor {
    service: Arc<dyn GenerationService>,
    fetcher: Arc<dyn ArticleFetcher>,
    retry: RetryPolicy,
}

impl ParodyExtractor {
    pub fn new(
        service: Arc<dyn GenerationService>,
        fetcher: Arc<dyn ArticleFetcher>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            service,
            fetcher,
            retry,
        }
    }

    /// Fetch, normalize and extract `url`, then derive a parody idea from it.
    #[instrument(skip(self))]
    pub async fn extract(&self, url: &str) -> Result<ParodySource> {
        let url = validate_url(url)?;

        let page = retry_with_backoff(&self.retry, "fetch", || {
            let url = url.clone();
            async move { self.fetcher.fetch(&url).await }
        })
        .await
        .into_result()?;

        let normalized = normalize_page(&page)?;
        let prompt_text = truncate_chars(&normalized, MAX_EXTRACT_CHARS);

        let extracted = retry_with_backoff(&self.retry, "extract_article", || async move {
            let article = self.service.extract_article(prompt_text).await?;
            check_extracted(article)
        })
        .await
        .into_result()?;

        let premise = retry_with_backoff(&self.retry, "parody_premise", || {
            let extracted = &extracted;
            async move {
                let premise = self.service.parody_premise(extracted).await?;
                let premise = premise.trim().to_string();
                if premise.is_empty() {
                    return Err(PipelineError::generation("empty parody premise"));
                }
                Ok(premise)
            }
        })
        .await
        .into_result()?;

        let idea = Idea::parody(premise, url.as_str());
        info!(url = %url, title = %extracted.title, idea_id = %idea.id, "parody idea derived");
        Ok(ParodySource::new(
            url.to_string(),
            page.body,
            normalized,
            extracted,
            idea,
        ))
    }

    /// Parody ideas from the news source's top stories. Stories that fail to
    /// extract are logged and skipped.
    pub async fn ideas_from_top_stories(
        &self,
        news: &dyn NewsSource,
        count: usize,
    ) -> Result<Vec<Idea>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let urls = retry_with_backoff(&self.retry, "top_stories", || news.top_story_urls(count))
            .await
            .into_result()?;

        let mut ideas = Vec::with_capacity(urls.len());
        for url in urls.into_iter().take(count) {
            match self.extract(&url).await {
                Ok(source) => ideas.push(source.into_idea()),
                Err(e) => warn!(url = %url, error = %e, kind = e.kind(), "skipping parody source"),
            }
        }
        info!(requested = count, derived = ideas.len(), "parody ideas ready");
        Ok(ideas)
    }
}

fn check_extracted(article: ExtractedArticle) -> Result<ExtractedArticle> {
    let mut missing = Vec::new();
    if article.title.trim().is_empty() {
        missing.push("title");
    }
    if article.body.trim().is_empty() {
        missing.push("body");
    }
    if missing.is_empty() {
        Ok(article)
    } else {
        Err(PipelineError::Extraction(format!(
            "missing required field(s): {}",
            missing.join(", ")
        )))
    }
}
