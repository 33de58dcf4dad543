//! Async git subprocess runner.
//!
//! The hosting token is passed to git as an `http.extraHeader` through the
//! `GIT_CONFIG_*` environment of each child process, so it never appears in
//! argv, the remote URL or `.git/config`.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tokio::process::Command;
use tracing::debug;
use url::Url;

use rnn_genai::Secret;

/// Captured result of one git invocation.
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs git commands, optionally authenticated.
#[derive(Debug, Clone)]
pub struct GitRunner {
    credential: Option<Secret>,
    timeout: Duration,
}

impl GitRunner {
    pub fn new(credential: Option<Secret>) -> Self {
        Self {
            credential,
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `git <args>` in `dir`. Errors are only for spawn failures and
    /// timeouts; a non-zero exit is returned in [`GitOutput`].
    pub async fn run(&self, dir: &Path, args: &[&str]) -> Result<GitOutput, String> {
        let start = Instant::now();
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(secret) = &self.credential {
            cmd.env("GIT_CONFIG_COUNT", "1")
                .env("GIT_CONFIG_KEY_0", "http.extraHeader")
                .env("GIT_CONFIG_VALUE_0", auth_header(secret));
        }

        let child = cmd
            .spawn()
            .map_err(|e| format!("failed to run git: {e}"))?;
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| format!("git {} timed out after {:?}", args.join(" "), self.timeout))?
            .map_err(|e| format!("failed to wait for git: {e}"))?;

        let result = GitOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: self.redact(String::from_utf8_lossy(&output.stderr).trim()),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        debug!(
            args = %args.join(" "),
            exit_code = result.exit_code,
            duration_ms = result.duration_ms,
            "git"
        );
        Ok(result)
    }

    /// Run and require a zero exit, returning stdout.
    pub async fn run_ok(&self, dir: &Path, args: &[&str]) -> Result<String, String> {
        let out = self.run(dir, args).await?;
        if out.success() {
            Ok(out.stdout)
        } else {
            Err(format!(
                "git {} failed ({}): {}",
                args.first().copied().unwrap_or_default(),
                out.exit_code,
                out.stderr
            ))
        }
    }

    /// Strip the credential from text that may end up in logs or errors.
    pub fn redact(&self, text: &str) -> String {
        match &self.credential {
            Some(secret) if !secret.expose().is_empty() => {
                text.replace(secret.expose(), "[REDACTED]")
            }
            _ => text.to_string(),
        }
    }
}

fn auth_header(secret: &Secret) -> String {
    let basic = STANDARD.encode(format!("x-access-token:{}", secret.expose()));
    format!("Authorization: Basic {basic}")
}

/// Repository URL with any userinfo removed, for logs.
pub fn sanitize_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) if !url.username().is_empty() || url.password().is_some() => {
            let _ = url.set_username("");
            let _ = url.set_password(None);
            url.to_string()
        }
        Ok(url) => url.to_string(),
        Err(_) => raw.to_string(),
    }
}
