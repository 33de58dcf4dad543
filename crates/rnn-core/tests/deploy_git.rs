//! Deployment against real git: a local bare repository stands in for the
//! hosting remote.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use async_trait::async_trait;
use rnn_core::{
    AutoApprove, DeployOutcome, DeployStage, DeploymentOrchestrator, DeploymentTarget, PushGate,
    PushSummary,
};
use rnn_genai::Secret;
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .current_dir(dir)
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(args)
        .output()
        .expect("git runs");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn write(path: &Path, text: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

/// Bare remote on `main` seeded with a CNAME and a stale page.
struct Remote {
    tmp: TempDir,
}

impl Remote {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let bare = tmp.path().join("site.git");
        fs::create_dir_all(&bare).unwrap();
        git(&bare, &["init", "--bare", "--initial-branch=main"]);

        let seed = tmp.path().join("seed");
        fs::create_dir_all(&seed).unwrap();
        git(&seed, &["init", "--initial-branch=main"]);
        write(&seed.join("CNAME"), "ratnewsnetwork.com");
        write(&seed.join("stale.html"), "old");
        git(&seed, &["add", "-A"]);
        git(&seed, &["commit", "-q", "-m", "seed"]);
        git(&seed, &["push", "-q", bare.to_str().unwrap(), "HEAD:refs/heads/main"]);
        Self { tmp }
    }

    /// Bare remote with no commits at all.
    fn empty() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let bare = tmp.path().join("site.git");
        fs::create_dir_all(&bare).unwrap();
        git(&bare, &["init", "--bare", "--initial-branch=main"]);
        Self { tmp }
    }

    fn bare(&self) -> PathBuf {
        self.tmp.path().join("site.git")
    }

    fn url(&self) -> String {
        format!("file://{}", self.bare().display())
    }

    fn head(&self) -> String {
        self.tip("main")
    }

    fn tip(&self, branch: &str) -> String {
        git(&self.bare(), &["rev-parse", &format!("refs/heads/{branch}")])
    }

    fn show(&self, path: &str) -> Option<String> {
        self.show_on("main", path)
    }

    fn show_on(&self, branch: &str, path: &str) -> Option<String> {
        let out = Command::new("git")
            .current_dir(self.bare())
            .args(["show", &format!("{branch}:{path}")])
            .output()
            .unwrap();
        out.status
            .success()
            .then(|| String::from_utf8_lossy(&out.stdout).into_owned())
    }

    #[cfg(unix)]
    fn reject_pushes(&self) {
        use std::os::unix::fs::PermissionsExt;
        let hook = self.bare().join("hooks").join("pre-receive");
        write(&hook, "#!/bin/sh\necho 'pushes are frozen' >&2\nexit 1\n");
        fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).unwrap();
    }
}

fn site() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("index.html"), "<html>home</html>");
    write(&dir.path().join("article/rats.html"), "<html>rats</html>");
    write(&dir.path().join("sitemap.xml"), "<urlset/>");
    dir
}

struct Decline;

#[async_trait]
impl PushGate for Decline {
    async fn approve(&self, _summary: &PushSummary) -> bool {
        false
    }
}

#[tokio::test]
async fn test_push_without_keep_local_removes_working_copy() {
    let remote = Remote::new();
    let before = remote.head();
    let site = site();
    let work = tempfile::tempdir().unwrap();
    let wc = work.path().join("clone");

    let target = DeploymentTarget::new(remote.url(), &wc);
    let report = DeploymentOrchestrator::new(target, Arc::new(AutoApprove))
        .deploy(site.path())
        .await
        .unwrap();

    assert_eq!(report.outcome, DeployOutcome::Pushed);
    assert_eq!(report.final_stage(), Some(DeployStage::Cleaned));
    assert_eq!(
        report.history,
        vec![
            DeployStage::Init,
            DeployStage::Cloned,
            DeployStage::Synced,
            DeployStage::Committed,
            DeployStage::Pushed,
            DeployStage::Cleaned,
        ]
    );
    assert!(report.working_copy.is_none());
    assert!(!wc.exists());

    let after = remote.head();
    assert_ne!(before, after);
    assert_eq!(report.commit_sha.as_deref(), Some(after.as_str()));
    assert_eq!(remote.show("index.html").unwrap(), "<html>home</html>");
    assert_eq!(remote.show("CNAME").unwrap(), "ratnewsnetwork.com");
    assert!(remote.show("stale.html").is_none());
    let subject = git(&remote.bare(), &["log", "-1", "--format=%s", "main"]);
    assert!(subject.starts_with("Daily site update "), "{subject}");
}

#[tokio::test]
async fn test_keep_local_retains_clone_without_token() {
    let remote = Remote::new();
    let site = site();
    let work = tempfile::tempdir().unwrap();
    let wc = work.path().join("clone");

    let target = DeploymentTarget::new(remote.url(), &wc)
        .with_credential(Secret::new("ghp_never_written_anywhere"))
        .keep_local(true);
    let report = DeploymentOrchestrator::new(target, Arc::new(AutoApprove))
        .deploy(site.path())
        .await
        .unwrap();

    assert_eq!(report.outcome, DeployOutcome::Pushed);
    assert_eq!(report.final_stage(), Some(DeployStage::Retained));
    assert_eq!(report.working_copy.as_deref(), Some(wc.as_path()));
    assert!(wc.join("index.html").exists());

    let config = fs::read_to_string(wc.join(".git").join("config")).unwrap();
    assert!(!config.contains("ghp_never_written_anywhere"));
    assert!(!config.contains("extraHeader"));
}

#[tokio::test]
async fn test_unchanged_site_skips_commit() {
    let remote = Remote::new();
    let site = site();
    let work = tempfile::tempdir().unwrap();
    let wc = work.path().join("clone");

    let target = DeploymentTarget::new(remote.url(), &wc).keep_local(true);
    let orchestrator = DeploymentOrchestrator::new(target, Arc::new(AutoApprove));
    let first = orchestrator.deploy(site.path()).await.unwrap();
    assert_eq!(first.outcome, DeployOutcome::Pushed);
    let head = remote.head();

    // the retained clone is refreshed in place
    let second = orchestrator.deploy(site.path()).await.unwrap();
    assert_eq!(second.outcome, DeployOutcome::NoChanges);
    assert!(second.commit_sha.is_none());
    assert_eq!(second.content_digest, first.content_digest);
    assert!(!second.history.contains(&DeployStage::Committed));
    assert_eq!(remote.head(), head);
}

#[tokio::test]
async fn test_declined_push_keeps_commit_locally() {
    let remote = Remote::new();
    let before = remote.head();
    let site = site();
    let work = tempfile::tempdir().unwrap();
    let wc = work.path().join("clone");

    let target = DeploymentTarget::new(remote.url(), &wc);
    let report = DeploymentOrchestrator::new(target, Arc::new(Decline))
        .deploy(site.path())
        .await
        .unwrap();

    assert_eq!(report.outcome, DeployOutcome::PushDeclined);
    assert_eq!(report.final_stage(), Some(DeployStage::Retained));
    assert_eq!(report.working_copy.as_deref(), Some(wc.as_path()));
    assert_eq!(remote.head(), before);
    let local = git(&wc, &["rev-parse", "HEAD"]);
    assert_eq!(report.commit_sha.as_deref(), Some(local.as_str()));
}

#[cfg(unix)]
#[tokio::test]
async fn test_rejected_push_fails_and_retains_working_copy() {
    let remote = Remote::new();
    remote.reject_pushes();
    let before = remote.head();
    let site = site();
    let work = tempfile::tempdir().unwrap();
    let wc = work.path().join("clone");

    // keep-local unset: a failure must still leave the clone in place
    let target = DeploymentTarget::new(remote.url(), &wc);
    let err = DeploymentOrchestrator::new(target, Arc::new(AutoApprove))
        .deploy(site.path())
        .await
        .unwrap_err();

    assert_eq!(err.failed_at, DeployStage::Committed);
    assert_eq!(err.history.last(), Some(&DeployStage::Failed));
    assert_eq!(err.working_copy.as_deref(), Some(wc.as_path()));
    assert!(err.to_string().contains("committed"), "{err}");
    assert!(wc.join(".git").is_dir());

    let subject = git(&wc, &["log", "-1", "--format=%s"]);
    assert!(subject.starts_with("Daily site update "), "{subject}");
    assert_eq!(remote.head(), before);
}

#[tokio::test]
async fn test_missing_branch_is_created_on_remote() {
    let remote = Remote::new();
    let main_before = remote.head();
    let site = site();
    let work = tempfile::tempdir().unwrap();
    let wc = work.path().join("clone");

    let target = DeploymentTarget::new(remote.url(), &wc).with_branch("gh-pages");
    let report = DeploymentOrchestrator::new(target, Arc::new(AutoApprove))
        .deploy(site.path())
        .await
        .unwrap();

    assert_eq!(report.outcome, DeployOutcome::Pushed);
    let tip = remote.tip("gh-pages");
    assert_eq!(report.commit_sha.as_deref(), Some(tip.as_str()));
    assert_eq!(
        remote.show_on("gh-pages", "index.html").unwrap(),
        "<html>home</html>"
    );
    // the new branch starts from the default branch, so preserved files carry over
    assert_eq!(
        remote.show_on("gh-pages", "CNAME").unwrap(),
        "ratnewsnetwork.com"
    );
    assert!(remote.show_on("gh-pages", "stale.html").is_none());
    assert_eq!(remote.head(), main_before);
}

#[tokio::test]
async fn test_empty_remote_receives_first_commit() {
    let remote = Remote::empty();
    let site = site();
    let work = tempfile::tempdir().unwrap();
    let wc = work.path().join("clone");

    let target = DeploymentTarget::new(remote.url(), &wc);
    let report = DeploymentOrchestrator::new(target, Arc::new(AutoApprove))
        .deploy(site.path())
        .await
        .unwrap();

    assert_eq!(report.outcome, DeployOutcome::Pushed);
    assert_eq!(report.final_stage(), Some(DeployStage::Cleaned));
    let head = remote.head();
    assert_eq!(report.commit_sha.as_deref(), Some(head.as_str()));
    assert_eq!(remote.show("article/rats.html").unwrap(), "<html>rats</html>");
    let count = git(&remote.bare(), &["rev-list", "--count", "main"]);
    assert_eq!(count, "1");
}
