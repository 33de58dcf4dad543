//! Deployment target, stages and outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use rnn_genai::Secret;

/// States of one deployment attempt.
///
/// `Init -> Cloned -> Synced -> Committed -> Pushed -> (Cleaned | Retained)`,
/// with `Failed` absorbing from any non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeployStage {
    Init,
    Cloned,
    Synced,
    Committed,
    Pushed,
    Cleaned,
    Retained,
    Failed,
}

impl DeployStage {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeployStage::Cleaned | DeployStage::Retained | DeployStage::Failed
        )
    }

    /// Forward edges of the state machine. The `Synced -> Cleaned | Retained`
    /// shortcut covers the no-changes and push-declined exits.
    pub fn can_advance_to(self, next: DeployStage) -> bool {
        use DeployStage::*;
        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Init, Cloned)
                | (Cloned, Synced)
                | (Synced, Committed)
                | (Synced, Cleaned)
                | (Synced, Retained)
                | (Committed, Pushed)
                | (Committed, Retained)
                | (Pushed, Cleaned)
                | (Pushed, Retained)
        )
    }
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeployStage::Init => "init",
            DeployStage::Cloned => "cloned",
            DeployStage::Synced => "synced",
            DeployStage::Committed => "committed",
            DeployStage::Pushed => "pushed",
            DeployStage::Cleaned => "cleaned",
            DeployStage::Retained => "retained",
            DeployStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How a successful deployment ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeployOutcome {
    /// New commit pushed to the remote branch.
    Pushed,
    /// Content tree identical to the remote; nothing committed.
    NoChanges,
    /// Commit created locally but the push was not approved.
    PushDeclined,
}

/// Author/committer identity used for deployment commits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl Default for CommitIdentity {
    fn default() -> Self {
        Self {
            name: "RNN Publisher".to_string(),
            email: "publisher@ratnewsnetwork.com".to_string(),
        }
    }
}

/// The hosting repository a deployment writes to.
///
/// The credential lives only in this value; it is handed to git through the
/// child process environment and never reaches `.git/config`, logs or disk.
#[derive(Debug, Clone)]
pub struct DeploymentTarget {
    pub repo_url: String,
    pub branch: String,
    /// Local working copy location.
    pub working_dir: PathBuf,
    pub credential: Option<Secret>,
    pub keep_local: bool,
    /// Subdirectory of the repository that receives the site; `None` is the root.
    pub content_subdir: Option<PathBuf>,
    /// Top-level entries of the content tree that survive a sync.
    pub preserve: Vec<String>,
    pub committer: CommitIdentity,
}

impl DeploymentTarget {
    pub fn new(repo_url: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_url: repo_url.into(),
            branch: "main".to_string(),
            working_dir: working_dir.into(),
            credential: None,
            keep_local: false,
            content_subdir: None,
            preserve: vec!["CNAME".to_string(), ".github".to_string()],
            committer: CommitIdentity::default(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_credential(mut self, credential: Secret) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn keep_local(mut self, keep: bool) -> Self {
        self.keep_local = keep;
        self
    }

    pub fn with_content_subdir(mut self, subdir: impl Into<PathBuf>) -> Self {
        self.content_subdir = Some(subdir.into());
        self
    }

    pub fn with_preserve(mut self, preserve: Vec<String>) -> Self {
        self.preserve = preserve;
        self
    }

    pub fn with_committer(mut self, committer: CommitIdentity) -> Self {
        self.committer = committer;
        self
    }

    /// Directory inside the working copy that mirrors the site.
    pub fn content_root(&self) -> PathBuf {
        match &self.content_subdir {
            Some(sub) => self.working_dir.join(sub),
            None => self.working_dir.clone(),
        }
    }
}

/// Summary of a deployment that reached a successful terminal state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentReport {
    pub outcome: DeployOutcome,
    pub history: Vec<DeployStage>,
    /// Commit created by this deployment, if any.
    pub commit_sha: Option<String>,
    /// SHA-256 over the synced content tree (paths and bytes).
    pub content_digest: String,
    /// Present when the working copy was kept on disk.
    pub working_copy: Option<PathBuf>,
}

impl DeploymentReport {
    pub fn final_stage(&self) -> Option<DeployStage> {
        self.history.last().copied()
    }
}

/// A deployment that ended in `Failed`.
///
/// The working copy is left in place so the local state can be inspected or
/// pushed by hand.
#[derive(Debug, Clone, thiserror::Error)]
#[error("deployment failed after stage {failed_at}: {reason}")]
pub struct DeploymentError {
    /// Last stage reached before the failure.
    pub failed_at: DeployStage,
    pub history: Vec<DeployStage>,
    pub working_copy: Option<PathBuf>,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_edges() {
        use DeployStage::*;
        let path = [Init, Cloned, Synced, Committed, Pushed, Cleaned];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(Pushed.can_advance_to(Retained));
    }

    #[test]
    fn test_failed_is_absorbing_and_terminals_are_final() {
        use DeployStage::*;
        for stage in [Init, Cloned, Synced, Committed, Pushed] {
            assert!(stage.can_advance_to(Failed));
        }
        assert!(!Failed.can_advance_to(Init));
        assert!(!Cleaned.can_advance_to(Failed));
        assert!(!Init.can_advance_to(Pushed));
    }

    #[test]
    fn test_target_debug_redacts_credential() {
        let target = DeploymentTarget::new("https://github.com/rnn/site.git", "/tmp/site")
            .with_credential(Secret::new("ghp_supersecret"));
        let debug = format!("{target:?}");
        assert!(!debug.contains("ghp_supersecret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_content_root_honours_subdir() {
        let target = DeploymentTarget::new("file:///r.git", "/tmp/wc").with_content_subdir("docs");
        assert_eq!(target.content_root(), PathBuf::from("/tmp/wc/docs"));
    }

    #[test]
    fn test_error_names_stage() {
        let err = DeploymentError {
            failed_at: DeployStage::Committed,
            history: vec![DeployStage::Init, DeployStage::Cloned],
            working_copy: None,
            reason: "push rejected".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("committed"));
        assert!(msg.contains("push rejected"));
    }
}
