use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{Article, Result};

/// Sub-directory holding artifacts that never became ready.
pub const FAILED_DIR: &str = "failed";

/// Directory of per-article JSON artifacts.
///
/// Layout: `<root>/<idea id>.json` for ready articles, `<root>/failed/<idea
/// id>.json` for partial ones, and `<root>/<name>.webp` for local images.
/// Each worker writes only its own files, so no locking is needed beyond the
/// atomic rename.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `root`. Creates the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_path(&self, idea_id: Uuid) -> PathBuf {
        self.root.join(format!("{idea_id}.json"))
    }

    pub fn failed_path(&self, idea_id: Uuid) -> PathBuf {
        self.root.join(FAILED_DIR).join(format!("{idea_id}.json"))
    }

    /// Location of a local image referenced by an artifact's `img_path`.
    pub fn image_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Write `article` under its idea id. Ready articles land in the root,
    /// anything else under [`FAILED_DIR`]. Readers never observe a partial
    /// file.
    pub fn write(&self, article: &Article) -> Result<PathBuf> {
        let id = article.idea.id;
        let (path, stale) = if article.is_ready() {
            (self.artifact_path(id), self.failed_path(id))
        } else {
            (self.failed_path(id), self.artifact_path(id))
        };
        let json = serde_json::to_vec_pretty(article)?;
        write_atomic(&path, &json)?;
        remove_if_present(&stale)?;

        debug!(path = %path.display(), status = %article.status(), "artifact written");
        Ok(path)
    }

    /// Read the artifact for `idea_id`, ready or not.
    pub fn read(&self, idea_id: Uuid) -> Result<Article> {
        let bytes = match fs::read(self.artifact_path(idea_id)) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => fs::read(self.failed_path(idea_id))?,
            other => other?,
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Copy `articles` and their local images into a fresh `dest`, which is
    /// emptied first. Files are named by slug, falling back to the idea id.
    pub fn stage<'a>(
        &self,
        articles: impl IntoIterator<Item = &'a Article>,
        dest: &Path,
    ) -> Result<usize> {
        if dest.exists() {
            fs::remove_dir_all(dest)?;
        }
        fs::create_dir_all(dest)?;

        let mut count = 0;
        for article in articles {
            let stem = if article.slug.is_empty() {
                article.idea.id.to_string()
            } else {
                article.slug.clone()
            };
            write_atomic(
                &dest.join(format!("{stem}.json")),
                &serde_json::to_vec_pretty(article)?,
            )?;
            if let Some(name) = &article.image_path {
                let src = self.image_path(name);
                if src.is_file() {
                    fs::copy(&src, dest.join(name))?;
                } else {
                    warn!(path = %src.display(), "local image missing, staging without it");
                }
            }
            count += 1;
        }
        debug!(dest = %dest.display(), count, "artifacts staged");
        Ok(count)
    }

    /// Every ready artifact in the directory, ordered by file name.
    ///
    /// Partial artifacts, strays that are not ready and files that do not
    /// parse are skipped.
    pub fn load_ready(&self) -> Result<Vec<Article>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut articles = Vec::new();
        for path in paths {
            let parsed = fs::read(&path)
                .map_err(crate::domain::PipelineError::from)
                .and_then(|bytes| Ok(serde_json::from_slice::<Article>(&bytes)?));
            match parsed {
                Ok(article) if article.is_ready() => articles.push(article),
                Ok(article) => {
                    debug!(path = %path.display(), status = %article.status(), "skipping non-ready artifact")
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable artifact"),
            }
        }
        Ok(articles)
    }
}

/// Write `bytes` to `path` through a temp file in the same directory.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Idea;

    fn make_store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("articles")).unwrap();
        (dir, store)
    }

    fn ready_article(title: &str) -> Article {
        let idea = Idea::original(title, "premise", "Local");
        let mut article = Article::draft(&idea);
        article.body = "Body text.".to_string();
        article.mark_ready().unwrap();
        article
    }

    #[test]
    fn test_write_then_read_by_idea_id() {
        let (_dir, store) = make_store();
        let article = ready_article("Cheese Futures Collapse");
        let path = store.write(&article).unwrap();
        assert_eq!(path, store.artifact_path(article.idea.id));
        assert_eq!(store.read(article.idea.id).unwrap(), article);
    }

    #[test]
    fn test_rewrite_replaces_previous_state() {
        let (_dir, store) = make_store();
        let idea = Idea::original("t", "p", "c");
        let mut article = Article::draft(&idea);
        store.write(&article).unwrap();
        article.mark_failed("body step failed").unwrap();
        store.write(&article).unwrap();

        let on_disk = store.read(idea.id).unwrap();
        assert_eq!(on_disk.error.as_deref(), Some("body step failed"));
        // only the artifact itself, no stray temp files
        assert_eq!(fs::read_dir(store.root().join(FAILED_DIR)).unwrap().count(), 1);
        assert!(!store.artifact_path(idea.id).exists());
    }

    #[test]
    fn test_partial_artifacts_stay_out_of_root() {
        let (_dir, store) = make_store();
        let mut failed = Article::draft(&Idea::original("x", "y", "z"));
        failed.mark_failed("outline step failed").unwrap();
        let path = store.write(&failed).unwrap();

        assert_eq!(path, store.failed_path(failed.idea.id));
        let top_level: Vec<_> = fs::read_dir(store.root())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.is_file())
            .collect();
        assert!(top_level.is_empty(), "{top_level:?}");
    }

    #[test]
    fn test_stage_copies_only_given_articles_with_images() {
        let (dir, store) = make_store();
        let mut pictured = ready_article("Pictured");
        pictured.slug = "pictured-1a".to_string();
        pictured.image_path = Some("pictured-1a.webp".to_string());
        fs::write(store.image_path("pictured-1a.webp"), b"RIFF").unwrap();
        let plain = ready_article("Plain");
        store.write(&pictured).unwrap();
        store.write(&plain).unwrap();
        // left over from an earlier run
        store.write(&ready_article("Stale")).unwrap();

        let dest = dir.path().join("staged");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("leftover.json"), b"{}").unwrap();
        let count = store.stage([&pictured, &plain], &dest).unwrap();

        assert_eq!(count, 2);
        let mut names: Vec<String> = fs::read_dir(&dest)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        let mut expected = vec![
            "pictured-1a.json".to_string(),
            "pictured-1a.webp".to_string(),
            format!("{}.json", plain.idea.id),
        ];
        expected.sort();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_load_ready_skips_failed_and_garbage() {
        let (_dir, store) = make_store();
        store.write(&ready_article("One")).unwrap();
        store.write(&ready_article("Two")).unwrap();

        let mut failed = Article::draft(&Idea::original("x", "y", "z"));
        failed.mark_failed("nope").unwrap();
        store.write(&failed).unwrap();
        fs::write(store.root().join("notes.json"), b"{not json").unwrap();
        fs::write(store.root().join("image.webp"), b"binary").unwrap();

        let loaded = store.load_ready().unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.iter().all(|a| a.is_ready()));
    }
}
