//! Pipeline configuration.
//!
//! Plain data with serde + `Default`; the binary fills these from CLI flags
//! and the environment, the core never reads process state itself.

use chrono::{DateTime, Local};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::retry::RetryPolicy;
use crate::text::sample_gaussian;

/// How an optional assembly step reacts to failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepPolicy {
    /// Failure fails the whole assembly.
    Required,
    /// Failure is logged and the field left empty.
    #[default]
    BestEffort,
    /// Never run.
    Skip,
}

/// Target body length, sampled per article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LengthPolicy {
    pub mean_words: f64,
    /// Standard deviation; 0 makes sampling deterministic.
    pub spread_words: f64,
    pub min_words: usize,
    pub max_words: usize,
}

impl Default for LengthPolicy {
    fn default() -> Self {
        Self {
            mean_words: 450.0,
            spread_words: 150.0,
            min_words: 100,
            max_words: 10_000,
        }
    }
}

impl LengthPolicy {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let raw = sample_gaussian(rng, self.mean_words, self.spread_words);
        (raw.max(0.0) as usize).clamp(self.min_words, self.max_words.max(self.min_words))
    }
}

/// Number of simulated reader comments per article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentPolicy {
    pub mean: f64,
    pub spread: f64,
    pub max: usize,
    /// Floor applied to parody articles.
    pub parody_min: usize,
}

impl Default for CommentPolicy {
    fn default() -> Self {
        Self {
            mean: 4.0,
            spread: 2.7,
            max: 12,
            parody_min: 2,
        }
    }
}

impl CommentPolicy {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, is_parody: bool) -> usize {
        let floor = if is_parody { self.parody_min } else { 0 };
        let raw = sample_gaussian(rng, self.mean, self.spread).round().max(0.0) as usize;
        raw.clamp(floor, self.max.max(floor))
    }
}

/// How many parody ideas join a batch of a given size.
///
/// Batches smaller than `min_batch` get none; otherwise
/// `round(total * ratio)`, at least one, never more than `total`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParodyPolicy {
    pub min_batch: usize,
    pub ratio: f64,
}

impl Default for ParodyPolicy {
    fn default() -> Self {
        Self {
            min_batch: 3,
            ratio: 0.34,
        }
    }
}

impl ParodyPolicy {
    pub fn disabled() -> Self {
        Self {
            min_batch: usize::MAX,
            ratio: 0.0,
        }
    }

    pub fn parody_count(&self, total: usize) -> usize {
        if total == 0 || total < self.min_batch || self.ratio <= 0.0 {
            return 0;
        }
        let n = (total as f64 * self.ratio).round() as usize;
        n.clamp(1, total)
    }
}

/// Settings for one article assembly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssemblyConfig {
    pub retry: RetryPolicy,
    pub image: StepPolicy,
    pub comments: StepPolicy,
    pub length: LengthPolicy,
    pub comment_count: CommentPolicy,
    pub words_per_minute: u32,
    /// Directory receiving one `<idea id>.json` artifact per task.
    pub article_dir: PathBuf,
}

impl AssemblyConfig {
    pub fn new(article_dir: impl Into<PathBuf>) -> Self {
        Self {
            retry: RetryPolicy::default(),
            image: StepPolicy::BestEffort,
            comments: StepPolicy::BestEffort,
            length: LengthPolicy::default(),
            comment_count: CommentPolicy::default(),
            words_per_minute: 200,
            article_dir: article_dir.into(),
        }
    }
}

/// End-to-end run configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Articles to generate; 0 reuses ready artifacts from `article_dir`.
    pub num_articles: usize,
    pub concurrency: usize,
    pub parody: ParodyPolicy,
    pub assembly: AssemblyConfig,
    pub site_dir: PathBuf,
    /// Public site root used for sitemap URLs.
    pub base_url: String,
}

impl PipelineConfig {
    /// Defaults rooted at dated `out/` directories.
    pub fn new(out_root: impl AsRef<Path>, now: DateTime<Local>) -> Self {
        let out = out_root.as_ref();
        Self {
            num_articles: 0,
            concurrency: 4,
            parody: ParodyPolicy::default(),
            assembly: AssemblyConfig::new(dated_dir(&out.join("articles"), now)),
            site_dir: dated_dir(&out.join("site"), now),
            base_url: "https://ratnewsnetwork.com".to_string(),
        }
    }
}

/// `<root>/<YYYY-MM-DD>/<YYYY-MM-DD-HHMMSS>`
pub fn dated_dir(root: &Path, now: DateTime<Local>) -> PathBuf {
    root.join(now.format("%Y-%m-%d").to_string())
        .join(now.format("%Y-%m-%d-%H%M%S").to_string())
}
