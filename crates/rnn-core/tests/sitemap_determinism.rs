//! Sitemap output depends only on the tree's page paths.

use std::fs;
use std::path::Path;

use rnn_core::sitemap::{build_sitemap, classify, write_sitemap, PageClass};

fn page(root: &Path, rel: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, format!("<html>{rel}</html>")).unwrap();
}

fn site(root: &Path) {
    for rel in [
        "index.html",
        "subscribe.html",
        "qr.html",
        "article/rats-elect-mayor.html",
        "article/cheese-shortage.html",
        "edition/1.html",
        "edition/index.html",
        "archive/2024.html",
        "about/team.html",
    ] {
        page(root, rel);
    }
}

#[test]
fn test_rerun_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    site(dir.path());

    let first = fs::read(write_sitemap(dir.path(), "https://example.com/").unwrap()).unwrap();
    // touching page contents must not change the sitemap
    page(dir.path(), "article/cheese-shortage.html");
    let second = fs::read(write_sitemap(dir.path(), "https://example.com/").unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_same_pages_in_different_trees_match() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    site(a.path());
    site(b.path());
    assert_eq!(
        build_sitemap(a.path(), "https://example.com").unwrap(),
        build_sitemap(b.path(), "https://example.com").unwrap()
    );
}

#[test]
fn test_every_page_is_classified() {
    let dir = tempfile::tempdir().unwrap();
    site(dir.path());
    let xml = build_sitemap(dir.path(), "https://example.com").unwrap();

    assert_eq!(xml.matches("<url>").count(), 9);
    assert_eq!(xml.matches("<priority>1.0</priority>").count(), 1);
    assert_eq!(xml.matches("<priority>0.8</priority>").count(), 2);
    assert_eq!(xml.matches("<priority>0.6</priority>").count(), 3);
    assert_eq!(xml.matches("<priority>0.5</priority>").count(), 3);
    assert!(xml.contains("<loc>https://example.com/edition/</loc>"));
    assert!(xml.contains("<loc>https://example.com/about/team</loc>"));
    assert_eq!(classify("about/team.html"), PageClass::Other);
}
