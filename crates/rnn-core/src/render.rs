//! Site rendering seam.
//!
//! Turning article artifacts into HTML pages is an external concern; the
//! pipeline only needs the rendered tree to exist before sitemap and deploy.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::domain::{PipelineError, Result};

#[async_trait]
pub trait SiteRenderer: Send + Sync {
    /// Render the articles in `articles_dir` into a static site under `site_dir`.
    async fn render(&self, articles_dir: &Path, site_dir: &Path) -> Result<()>;
}

/// Renders by running an external command as
/// `<program> [args...] <articles_dir> <site_dir>`.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandRenderer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(600),
        }
    }

    /// Split a shell-like command line on whitespace. Quoting is not supported.
    pub fn from_command_line(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| PipelineError::Validation("render command is empty".into()))?;
        Ok(Self {
            program,
            args: parts.collect(),
            timeout: Duration::from_secs(600),
        })
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SiteRenderer for CommandRenderer {
    async fn render(&self, articles_dir: &Path, site_dir: &Path) -> Result<()> {
        let start = Instant::now();
        tokio::fs::create_dir_all(site_dir).await?;

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(articles_dir)
            .arg(site_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::Render(format!("failed to start {}: {e}", self.program)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                PipelineError::Render(format!(
                    "{} timed out after {}s",
                    self.program,
                    self.timeout.as_secs()
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Render(format!(
                "{} exited with {}: {}",
                self.program,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        debug!(stdout = %String::from_utf8_lossy(&output.stdout).trim(), "renderer output");

        ensure_rendered(site_dir)?;
        info!(
            site_dir = %site_dir.display(),
            duration_ms = start.elapsed().as_millis() as u64,
            "site rendered"
        );
        Ok(())
    }
}

/// A missing or empty site directory means nothing can be published.
pub fn ensure_rendered(site_dir: &Path) -> Result<()> {
    let mut entries = std::fs::read_dir(site_dir).map_err(|e| {
        PipelineError::Render(format!("site dir {} unreadable: {e}", site_dir.display()))
    })?;
    if entries.next().is_none() {
        return Err(PipelineError::Render(format!(
            "site dir {} is empty after rendering",
            site_dir.display()
        )));
    }
    Ok(())
}
