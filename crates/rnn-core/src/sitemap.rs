//! Sitemap generation for the rendered site tree.
//!
//! Output carries no timestamps: the same tree always yields the same bytes,
//! so a re-render with unchanged pages does not produce a spurious commit.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::domain::Result;

pub const SITEMAP_FILE: &str = "sitemap.xml";
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFreq {
    Daily,
    Weekly,
    Monthly,
}

impl fmt::Display for ChangeFreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeFreq::Daily => "daily",
            ChangeFreq::Weekly => "weekly",
            ChangeFreq::Monthly => "monthly",
        };
        f.write_str(s)
    }
}

/// Kind of page, derived from its location in the site tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageClass {
    Homepage,
    Article,
    Edition,
    Other,
}

impl PageClass {
    pub fn priority(self) -> f32 {
        match self {
            PageClass::Homepage => 1.0,
            PageClass::Article => 0.8,
            PageClass::Edition => 0.6,
            PageClass::Other => 0.5,
        }
    }

    pub fn changefreq(self) -> ChangeFreq {
        match self {
            PageClass::Homepage => ChangeFreq::Daily,
            PageClass::Article => ChangeFreq::Weekly,
            PageClass::Edition | PageClass::Other => ChangeFreq::Monthly,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub priority: f32,
    pub changefreq: ChangeFreq,
}

/// Classify a page by its `/`-separated path relative to the site root.
pub fn classify(rel_path: &str) -> PageClass {
    if rel_path == "index.html" {
        return PageClass::Homepage;
    }
    let mut dirs = rel_path.split('/').rev().skip(1);
    if dirs.clone().any(|d| d == "article" || d == "articles") {
        PageClass::Article
    } else if dirs.any(|d| d == "edition" || d == "editions" || d == "archive") {
        PageClass::Edition
    } else {
        PageClass::Other
    }
}

/// Map a relative page path onto its public URL.
pub fn page_url(base_url: &str, rel_path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if rel_path == "index.html" {
        return format!("{base}/");
    }
    if let Some(dir) = rel_path.strip_suffix("/index.html") {
        return format!("{base}/{dir}/");
    }
    let path = rel_path.strip_suffix(".html").unwrap_or(rel_path);
    format!("{base}/{path}")
}

pub fn entry_for(base_url: &str, rel_path: &str) -> SitemapEntry {
    let class = classify(rel_path);
    SitemapEntry {
        loc: page_url(base_url, rel_path),
        priority: class.priority(),
        changefreq: class.changefreq(),
    }
}

/// Render the sitemap XML for every `*.html` page under `output_dir`.
pub fn build_sitemap(output_dir: &Path, base_url: &str) -> Result<String> {
    let pages = discover_pages(output_dir)?;
    let entries: Vec<SitemapEntry> = pages.iter().map(|p| entry_for(base_url, p)).collect();
    debug!(pages = entries.len(), "sitemap entries classified");
    Ok(render_xml(&entries))
}

/// Build and write `sitemap.xml` at the root of `output_dir`.
pub fn write_sitemap(output_dir: &Path, base_url: &str) -> Result<PathBuf> {
    let xml = build_sitemap(output_dir, base_url)?;
    let path = output_dir.join(SITEMAP_FILE);
    fs::write(&path, xml)?;
    info!(path = %path.display(), "sitemap written");
    Ok(path)
}

fn discover_pages(root: &Path) -> Result<Vec<String>> {
    let mut pages = Vec::new();
    let mut stack = vec![PathBuf::new()];
    while let Some(rel) = stack.pop() {
        for entry in fs::read_dir(root.join(&rel))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let child = rel.join(&name);
            let ty = entry.file_type()?;
            if ty.is_dir() {
                stack.push(child);
            } else if ty.is_file() && name.ends_with(".html") {
                let parts: Vec<String> = child
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                pages.push(parts.join("/"));
            }
        }
    }
    pages.sort();
    Ok(pages)
}

fn render_xml(entries: &[SitemapEntry]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!("<urlset xmlns=\"{SITEMAP_NS}\">\n"));
    for e in entries {
        out.push_str("  <url>\n");
        out.push_str(&format!("    <loc>{}</loc>\n", escape_xml(&e.loc)));
        out.push_str(&format!("    <changefreq>{}</changefreq>\n", e.changefreq));
        out.push_str(&format!("    <priority>{:.1}</priority>\n", e.priority));
        out.push_str("  </url>\n");
    }
    out.push_str("</urlset>\n");
    out
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "<html></html>").unwrap();
    }

    #[test]
    fn test_classification_table() {
        assert_eq!(classify("index.html"), PageClass::Homepage);
        assert_eq!(classify("article/rats-win.html"), PageClass::Article);
        assert_eq!(classify("articles/2024/rats-win.html"), PageClass::Article);
        assert_eq!(classify("edition/1.html"), PageClass::Edition);
        assert_eq!(classify("archive/index.html"), PageClass::Edition);
        assert_eq!(classify("subscribe.html"), PageClass::Other);
        assert_eq!(classify("qr.html"), PageClass::Other);
        assert_eq!(classify("articles.html"), PageClass::Other);
    }

    #[test]
    fn test_urls_drop_html_suffix() {
        let base = "https://example.com/";
        assert_eq!(page_url(base, "index.html"), "https://example.com/");
        assert_eq!(page_url(base, "edition/index.html"), "https://example.com/edition/");
        assert_eq!(page_url(base, "article/a1.html"), "https://example.com/article/a1");
        assert_eq!(page_url("https://example.com", "qr.html"), "https://example.com/qr");
    }

    #[test]
    fn test_builds_sorted_sitemap_with_priorities() {
        let dir = tempfile::tempdir().unwrap();
        for rel in [
            "index.html",
            "subscribe.html",
            "article/b.html",
            "article/a.html",
            "edition/1.html",
            "styles.css",
        ] {
            touch(dir.path(), rel);
        }

        let xml = build_sitemap(dir.path(), "https://example.com").unwrap();
        assert_eq!(xml.matches("<url>").count(), 5);
        assert!(!xml.contains("lastmod"));
        assert!(!xml.contains("styles"));

        let a = xml.find("https://example.com/article/a<").unwrap();
        let b = xml.find("https://example.com/article/b<").unwrap();
        assert!(a < b);
        assert!(xml.contains(
            "<loc>https://example.com/</loc>\n    <changefreq>daily</changefreq>\n    <priority>1.0</priority>"
        ));
        assert!(xml.contains(
            "<loc>https://example.com/subscribe</loc>\n    <changefreq>monthly</changefreq>\n    <priority>0.5</priority>"
        ));
    }

    #[test]
    fn test_escapes_special_characters() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "article/rats&mice.html");
        let xml = build_sitemap(dir.path(), "https://example.com").unwrap();
        assert!(xml.contains("rats&amp;mice"));
    }

    #[test]
    fn test_empty_tree_yields_empty_urlset() {
        let dir = tempfile::tempdir().unwrap();
        let xml = build_sitemap(dir.path(), "https://example.com").unwrap();
        assert_eq!(xml.matches("<url>").count(), 0);
        assert!(xml.contains("<urlset"));
    }

    #[test]
    fn test_write_sitemap_places_file_at_root() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "index.html");
        let path = write_sitemap(dir.path(), "https://example.com").unwrap();
        assert_eq!(path, dir.path().join("sitemap.xml"));
        assert!(fs::read_to_string(path).unwrap().contains("<priority>1.0</priority>"));
    }
}
