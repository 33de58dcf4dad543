//! In-memory fakes for the pipeline's service traits (testing only)
//!
//! Provides `ScriptedGenerationService`, `FakeArticleFetcher`,
//! `FakeImageFetcher` and `FakeNewsSource`, which satisfy the trait contracts without any network
//! access. Failures are scripted per assembly step and matched by substring.

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use url::Url;

use rnn_genai::{FetchedPage, GenAiError};

use crate::domain::{AssemblyStep, Comment, ExtractedArticle, Idea, PipelineError, Result};
use crate::generation::{ArticleDraft, BodyRequest, GenerationService, IdeaDraft};
use crate::media::ImageFetcher;
use crate::parody::{ArticleFetcher, NewsSource};
use crate::text::slugify;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// ScriptedGenerationService
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct FailureRule {
    step: AssemblyStep,
    needle: String,
    /// `None` fails forever.
    remaining: Option<u32>,
    panic: bool,
}

#[derive(Debug, Default)]
struct ScriptState {
    ideas: Mutex<VecDeque<Result<Vec<IdeaDraft>>>>,
    rules: Mutex<Vec<FailureRule>>,
    extraction: Mutex<Option<ExtractedArticle>>,
    calls: Mutex<HashMap<&'static str, u32>>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Deterministic generation service.
///
/// Outline and body rules match against the idea's title and premise; image
/// and comment rules match against the article title.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGenerationService {
    state: Arc<ScriptState>,
}

struct InFlight<'a>(&'a ScriptState);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedGenerationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call.
    pub fn with_delay(self, delay: Duration) -> Self {
        *lock(&self.state.delay) = delay;
        self
    }

    /// Queue the response for the next `ideas` call. When the queue is
    /// empty, `count` numbered ideas are returned.
    pub fn push_ideas(&self, response: Result<Vec<IdeaDraft>>) {
        lock(&self.state.ideas).push_back(response);
    }

    /// Fail `step` for every input containing `needle`.
    pub fn fail_step(&self, step: AssemblyStep, needle: &str) {
        self.add_rule(step, needle, None, false);
    }

    /// Fail `step` for inputs containing `needle` the first `times` calls.
    pub fn fail_step_times(&self, step: AssemblyStep, needle: &str, times: u32) {
        self.add_rule(step, needle, Some(times), false);
    }

    /// Panic inside `step` for inputs containing `needle`.
    pub fn panic_on(&self, step: AssemblyStep, needle: &str) {
        self.add_rule(step, needle, None, true);
    }

    /// Override the result of `extract_article`.
    pub fn set_extraction(&self, article: ExtractedArticle) {
        *lock(&self.state.extraction) = Some(article);
    }

    /// Number of calls made to the named trait method.
    pub fn calls(&self, method: &str) -> u32 {
        lock(&self.state.calls).get(method).copied().unwrap_or(0)
    }

    /// Highest number of simultaneously running calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    fn add_rule(&self, step: AssemblyStep, needle: &str, remaining: Option<u32>, panic: bool) {
        lock(&self.state.rules).push(FailureRule {
            step,
            needle: needle.to_string(),
            remaining,
            panic,
        });
    }

    async fn enter(&self, method: &'static str) -> InFlight<'_> {
        *lock(&self.state.calls).entry(method).or_insert(0) += 1;
        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.state);

        let delay = *lock(&self.state.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        guard
    }

    fn check(&self, step: AssemblyStep, key: &str) -> Result<()> {
        let mut should_panic = false;
        let mut fail = false;
        {
            let mut rules = lock(&self.state.rules);
            if let Some(rule) = rules.iter_mut().find(|r| {
                r.step == step && key.contains(&r.needle) && r.remaining != Some(0)
            }) {
                if let Some(n) = rule.remaining.as_mut() {
                    *n -= 1;
                }
                should_panic = rule.panic;
                fail = true;
            }
        }
        if should_panic {
            panic!("scripted panic in {step} step");
        }
        if fail {
            return Err(PipelineError::generation(format!(
                "scripted failure in {step} step"
            )));
        }
        Ok(())
    }
}

fn idea_key(idea: &Idea) -> String {
    format!("{} {}", idea.title, idea.premise)
}

#[async_trait]
impl GenerationService for ScriptedGenerationService {
    async fn ideas(&self, count: usize) -> Result<Vec<IdeaDraft>> {
        let _guard = self.enter("ideas").await;
        if let Some(scripted) = lock(&self.state.ideas).pop_front() {
            return scripted;
        }
        Ok((0..count)
            .map(|i| IdeaDraft {
                title: format!("Scripted Idea {i}"),
                description: format!("Rats encounter situation number {i}"),
                category: "Local".to_string(),
            })
            .collect())
    }

    async fn outline(&self, idea: &Idea) -> Result<String> {
        let _guard = self.enter("outline").await;
        self.check(AssemblyStep::Outline, &idea_key(idea))?;
        Ok(format!("1. Setup: {}\n2. Escalation\n3. Punchline", idea.premise))
    }

    async fn body(&self, request: BodyRequest<'_>) -> Result<ArticleDraft> {
        let _guard = self.enter("body").await;
        self.check(AssemblyStep::Body, &idea_key(request.idea))?;
        let title = if request.idea.title.is_empty() {
            format!("Breaking: {}", request.idea.premise)
        } else {
            request.idea.title.clone()
        };
        Ok(ArticleDraft {
            title,
            overview: format!("Overview of {}.", request.idea.premise),
            body: format!(
                "{}. Witnesses squeaked in agreement. Officials declined to comment.",
                request.idea.premise
            ),
            generator: Some("scripted".to_string()),
        })
    }

    async fn image(&self, title: &str, _outline: &str) -> Result<String> {
        let _guard = self.enter("image").await;
        self.check(AssemblyStep::Image, title)?;
        Ok(format!("https://images.example.com/{}.png", slugify(title)))
    }

    async fn comments(&self, title: &str, _body: &str, count: usize) -> Result<Vec<Comment>> {
        let _guard = self.enter("comments").await;
        self.check(AssemblyStep::Comments, title)?;
        Ok((0..count)
            .map(|i| Comment {
                author: format!("rat_{i}"),
                text: "Squeak!".to_string(),
            })
            .collect())
    }

    async fn extract_article(&self, normalized_text: &str) -> Result<ExtractedArticle> {
        let _guard = self.enter("extract_article").await;
        if let Some(article) = lock(&self.state.extraction).clone() {
            return Ok(article);
        }
        let title = normalized_text
            .lines()
            .find_map(|l| l.strip_prefix("# "))
            .or_else(|| normalized_text.lines().find(|l| !l.trim().is_empty()))
            .unwrap_or_default()
            .trim()
            .to_string();
        Ok(ExtractedArticle {
            title,
            body: normalized_text.to_string(),
            author: None,
        })
    }

    async fn parody_premise(&self, article: &ExtractedArticle) -> Result<String> {
        let _guard = self.enter("parody_premise").await;
        Ok(format!("Rats stage their own version of \"{}\"", article.title))
    }
}

// ---------------------------------------------------------------------------
// FakeArticleFetcher
// ---------------------------------------------------------------------------

/// Serves pages from a map keyed by URL; unknown URLs answer 404.
#[derive(Debug, Clone, Default)]
pub struct FakeArticleFetcher {
    pages: Arc<Mutex<HashMap<String, FetchedPage>>>,
    fetches: Arc<AtomicUsize>,
}

impl FakeArticleFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, page: FetchedPage) {
        lock(&self.pages).insert(page.url.clone(), page);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArticleFetcher for FakeArticleFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        lock(&self.pages).get(url.as_str()).cloned().ok_or_else(|| {
            GenAiError::Api {
                status: 404,
                message: format!("fetching {url}"),
            }
            .into()
        })
    }
}

// ---------------------------------------------------------------------------
// FakeImageFetcher
// ---------------------------------------------------------------------------

/// Serves image bytes keyed by URL; unknown URLs answer 404.
#[derive(Debug, Clone, Default)]
pub struct FakeImageFetcher {
    images: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fetches: Arc<AtomicUsize>,
}

impl FakeImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: &str, bytes: Vec<u8>) {
        lock(&self.images).insert(url.to_string(), bytes);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for FakeImageFetcher {
    async fn fetch_image(&self, url: &Url) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        lock(&self.images).get(url.as_str()).cloned().ok_or_else(|| {
            GenAiError::Api {
                status: 404,
                message: format!("fetching {url}"),
            }
            .into()
        })
    }
}

/// A 4x3 PNG.
pub fn tiny_png() -> Vec<u8> {
    let img = RgbImage::from_pixel(4, 3, Rgb([200, 180, 40]));
    let mut buf = Cursor::new(Vec::new());
    let _ = img.write_to(&mut buf, ImageFormat::Png);
    buf.into_inner()
}

// ---------------------------------------------------------------------------
// FakeNewsSource
// ---------------------------------------------------------------------------

/// Fixed list of top-story URLs.
#[derive(Debug, Clone, Default)]
pub struct FakeNewsSource {
    urls: Vec<String>,
}

impl FakeNewsSource {
    pub fn new(urls: Vec<String>) -> Self {
        Self { urls }
    }
}

#[async_trait]
impl NewsSource for FakeNewsSource {
    async fn top_story_urls(&self, count: usize) -> Result<Vec<String>> {
        Ok(self.urls.iter().take(count).cloned().collect())
    }
}
