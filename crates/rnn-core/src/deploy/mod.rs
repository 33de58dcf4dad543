//! Deployment orchestrator.
//!
//! One call walks `Init -> Cloned -> Synced -> Committed -> Pushed ->
//! (Cleaned | Retained)`. Any failure ends in `Failed` with the working copy
//! left on disk. Deployments to the same target must be serialized by the
//! caller.

pub mod git;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use crate::domain::{
    DeployOutcome, DeployStage, DeploymentError, DeploymentReport, DeploymentTarget,
};
use crate::obs;
use git::{sanitize_url, GitRunner};

/// What the push gate is asked to approve.
#[derive(Debug, Clone)]
pub struct PushSummary {
    /// Repository URL without credentials.
    pub repo: String,
    pub branch: String,
    pub commit_sha: String,
    pub stat: String,
}

/// Approval consulted between commit and push.
#[async_trait]
pub trait PushGate: Send + Sync {
    async fn approve(&self, summary: &PushSummary) -> bool;
}

/// Always pushes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl PushGate for AutoApprove {
    async fn approve(&self, _summary: &PushSummary) -> bool {
        true
    }
}

/// Asks on stdin; anything but `y`/`yes` declines.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompt;

#[async_trait]
impl PushGate for StdinPrompt {
    async fn approve(&self, summary: &PushSummary) -> bool {
        let prompt = format!(
            "{}\nPush commit {} to {} ({})? (y/n): ",
            summary.stat, summary.commit_sha, summary.repo, summary.branch
        );
        let answer = tokio::task::spawn_blocking(move || {
            use std::io::Write;
            eprint!("{prompt}");
            let _ = io::stderr().flush();
            let mut line = String::new();
            io::stdin().read_line(&mut line).map(|_| line)
        })
        .await;
        matches!(
            answer,
            Ok(Ok(line)) if matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
        )
    }
}

/// Tracks stage transitions for one attempt.
struct StageMachine {
    repo: String,
    stage: DeployStage,
    history: Vec<DeployStage>,
}

impl StageMachine {
    fn new(repo: String) -> Self {
        obs::emit_deploy_stage(&repo, DeployStage::Init);
        Self {
            repo,
            stage: DeployStage::Init,
            history: vec![DeployStage::Init],
        }
    }

    fn advance(&mut self, next: DeployStage) {
        debug_assert!(self.stage.can_advance_to(next), "{} -> {next}", self.stage);
        self.stage = next;
        self.history.push(next);
        obs::emit_deploy_stage(&self.repo, next);
    }

    fn fail(&mut self, working_copy: &Path, reason: String) -> DeploymentError {
        let failed_at = self.stage;
        self.history.push(DeployStage::Failed);
        let err = DeploymentError {
            failed_at,
            history: self.history.clone(),
            working_copy: working_copy.exists().then(|| working_copy.to_path_buf()),
            reason,
        };
        obs::emit_deploy_failed(&self.repo, failed_at, &err);
        err
    }
}

/// Synchronizes a rendered site into the hosting repository.
pub struct DeploymentOrchestrator {
    target: DeploymentTarget,
    git: GitRunner,
    gate: Arc<dyn PushGate>,
}

impl DeploymentOrchestrator {
    pub fn new(target: DeploymentTarget, gate: Arc<dyn PushGate>) -> Self {
        let git = GitRunner::new(target.credential.clone());
        Self { target, git, gate }
    }

    pub fn target(&self) -> &DeploymentTarget {
        &self.target
    }

    /// Deploy `site_dir` to the target branch.
    #[instrument(
        skip(self),
        fields(repo = %sanitize_url(&self.target.repo_url), branch = %self.target.branch)
    )]
    pub async fn deploy(&self, site_dir: &Path) -> Result<DeploymentReport, DeploymentError> {
        let target = &self.target;
        let work = target.working_dir.clone();
        let mut machine = StageMachine::new(sanitize_url(&target.repo_url));

        if !dir_has_entries(site_dir) {
            let reason = format!("site directory {} is missing or empty", site_dir.display());
            return Err(machine.fail(&work, reason));
        }

        // INIT -> CLONED
        if let Err(reason) = self.checkout(&work).await {
            return Err(machine.fail(&work, reason));
        }
        machine.advance(DeployStage::Cloned);

        // CLONED -> SYNCED
        let content_root = target.content_root();
        let preserve = self.preserved_entries();
        let site = site_dir.to_path_buf();
        let synced = tokio::task::spawn_blocking(move || {
            sync_tree(&site, &content_root, &preserve)?;
            tree_digest(&site)
        })
        .await;
        let content_digest = match synced {
            Ok(Ok(digest)) => digest,
            Ok(Err(e)) => return Err(machine.fail(&work, format!("sync failed: {e}"))),
            Err(e) => return Err(machine.fail(&work, format!("sync aborted: {e}"))),
        };
        machine.advance(DeployStage::Synced);

        // SYNCED -> COMMITTED, or straight to a terminal state when unchanged
        if let Err(reason) = self.git.run_ok(&work, &["add", "-A"]).await {
            return Err(machine.fail(&work, reason));
        }
        let changed = match self.git.run(&work, &["diff", "--cached", "--quiet"]).await {
            Ok(out) if out.exit_code == 0 => false,
            Ok(out) if out.exit_code == 1 => true,
            Ok(out) => {
                let reason = format!("git diff failed: {}", out.stderr);
                return Err(machine.fail(&work, reason));
            }
            Err(reason) => return Err(machine.fail(&work, reason)),
        };
        if !changed {
            info!("content unchanged, nothing to commit");
            let working_copy = self.finish(&mut machine, &work);
            return Ok(DeploymentReport {
                outcome: DeployOutcome::NoChanges,
                history: machine.history,
                commit_sha: None,
                content_digest,
                working_copy,
            });
        }

        let commit_sha = match self.commit(&work).await {
            Ok(sha) => sha,
            Err(reason) => return Err(machine.fail(&work, reason)),
        };
        machine.advance(DeployStage::Committed);

        // COMMITTED -> PUSHED, gated
        let stat = self
            .git
            .run_ok(&work, &["show", "--stat", "--format=%h %s", "HEAD"])
            .await
            .unwrap_or_default();
        let summary = PushSummary {
            repo: machine.repo.clone(),
            branch: target.branch.clone(),
            commit_sha: commit_sha.clone(),
            stat,
        };
        if !self.gate.approve(&summary).await {
            warn!(
                commit = %commit_sha,
                path = %work.display(),
                "push declined, keeping working copy"
            );
            machine.advance(DeployStage::Retained);
            return Ok(DeploymentReport {
                outcome: DeployOutcome::PushDeclined,
                history: machine.history,
                commit_sha: Some(commit_sha),
                content_digest,
                working_copy: Some(work),
            });
        }

        let refspec = format!("HEAD:refs/heads/{}", target.branch);
        if let Err(reason) = self.git.run_ok(&work, &["push", "origin", &refspec]).await {
            return Err(machine.fail(&work, reason));
        }
        machine.advance(DeployStage::Pushed);
        info!(commit = %commit_sha, "site pushed");

        let working_copy = self.finish(&mut machine, &work);
        Ok(DeploymentReport {
            outcome: DeployOutcome::Pushed,
            history: machine.history,
            commit_sha: Some(commit_sha),
            content_digest,
            working_copy,
        })
    }

    /// Clone into `work`, or refresh a retained clone, then switch to the
    /// target branch (created locally when the remote lacks it).
    async fn checkout(&self, work: &Path) -> Result<(), String> {
        let target = &self.target;
        if work.join(".git").is_dir() {
            self.git
                .run_ok(work, &["remote", "set-url", "origin", &target.repo_url])
                .await?;
            self.git.run_ok(work, &["fetch", "--prune", "origin"]).await?;
        } else {
            if dir_has_entries(work) {
                return Err(format!(
                    "working directory {} exists and is not a git clone",
                    work.display()
                ));
            }
            let parent = work
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let dest = work
                .file_name()
                .ok_or_else(|| format!("invalid working directory {}", work.display()))?
                .to_string_lossy();
            fs::create_dir_all(parent)
                .map_err(|e| format!("cannot create {}: {e}", parent.display()))?;
            self.git
                .run_ok(parent, &["clone", &target.repo_url, &dest])
                .await?;
        }

        let remote_ref = format!("refs/remotes/origin/{}", target.branch);
        let remote_has_branch = self
            .git
            .run(work, &["rev-parse", "--verify", "--quiet", &remote_ref])
            .await?
            .success();
        if remote_has_branch {
            let upstream = format!("origin/{}", target.branch);
            self.git
                .run_ok(work, &["checkout", "-B", &target.branch, &upstream])
                .await?;
            self.git.run_ok(work, &["reset", "--hard", &upstream]).await?;
        } else {
            info!(branch = %target.branch, "branch not on remote, creating it");
            self.git
                .run_ok(work, &["checkout", "-B", &target.branch])
                .await?;
        }
        Ok(())
    }

    async fn commit(&self, work: &Path) -> Result<String, String> {
        let who = &self.target.committer;
        let name = format!("user.name={}", who.name);
        let email = format!("user.email={}", who.email);
        let message = format!("Daily site update {}", Local::now().format("%Y-%m-%d"));
        self.git
            .run_ok(
                work,
                &["-c", &name, "-c", &email, "commit", "-q", "-m", &message],
            )
            .await?;
        self.git.run_ok(work, &["rev-parse", "HEAD"]).await
    }

    /// `.git` and configured entries, only when syncing into the repo root.
    fn preserved_entries(&self) -> Vec<String> {
        let mut keep = self.target.preserve.clone();
        if self.target.content_subdir.is_none() {
            keep.push(".git".to_string());
        }
        keep
    }

    /// Final cleanup: delete the working copy unless keep-local.
    fn finish(&self, machine: &mut StageMachine, work: &Path) -> Option<PathBuf> {
        if self.target.keep_local {
            machine.advance(DeployStage::Retained);
            return Some(work.to_path_buf());
        }
        match fs::remove_dir_all(work) {
            Ok(()) => {
                machine.advance(DeployStage::Cleaned);
                None
            }
            Err(e) => {
                warn!(path = %work.display(), error = %e, "could not remove working copy");
                machine.advance(DeployStage::Retained);
                Some(work.to_path_buf())
            }
        }
    }
}

fn dir_has_entries(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Replace the contents of `dest` with `src`, keeping top-level `preserve`
/// entries of `dest` that `src` does not provide.
pub fn sync_tree(src: &Path, dest: &Path, preserve: &[String]) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(dest)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name == ".git" || preserve.iter().any(|p| p == name.as_ref()) {
            if src.join(name.as_ref()).exists() && name != ".git" {
                remove_path(&entry.path())?;
            }
            continue;
        }
        remove_path(&entry.path())?;
    }
    copy_tree(src, dest)
}

fn remove_path(path: &Path) -> io::Result<()> {
    if path.is_dir() && !path.is_symlink() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn copy_tree(src: &Path, dest: &Path) -> io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        if entry.file_name() == ".git" {
            continue;
        }
        let from = entry.path();
        let to = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            fs::create_dir_all(&to)?;
            copy_tree(&from, &to)?;
        } else {
            fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_path_buf());
        }
    }
    Ok(())
}

/// SHA-256 over every file's relative path and bytes, in sorted order.
pub fn tree_digest(root: &Path) -> io::Result<String> {
    let mut files = Vec::new();
    collect_files(root, root, &mut files)?;
    files.sort();

    let mut hasher = Sha256::new();
    for rel in files {
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(fs::read(root.join(&rel))?);
        hasher.update([0u8]);
    }
    Ok(hex::encode(hasher.finalize()))
}
