//! Ensures all workspace crates use `version.workspace = true` and that
//! the workspace version is consistent across all Cargo.toml files.

use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

/// Read the workspace version from the root Cargo.toml.
fn workspace_version() -> String {
    let root_toml = std::fs::read_to_string(workspace_root().join("Cargo.toml")).unwrap();
    let doc: toml::Value = root_toml.parse().unwrap();
    doc["workspace"]["package"]["version"]
        .as_str()
        .unwrap()
        .to_string()
}

/// "workspace" when the crate inherits its version, the literal otherwise.
fn crate_version(manifest_dir: &Path) -> String {
    let toml_str = std::fs::read_to_string(manifest_dir.join("Cargo.toml")).unwrap();
    let doc: toml::Value = toml_str.parse().unwrap();

    let version = doc
        .get("package")
        .and_then(|pkg| pkg.get("version"))
        .unwrap_or_else(|| panic!("no package.version in {}", manifest_dir.display()));
    if let Some(table) = version.as_table() {
        if table.get("workspace").and_then(|v| v.as_bool()) == Some(true) {
            return "workspace".to_string();
        }
    }
    version
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| panic!("unreadable version in {}", manifest_dir.display()))
}

#[test]
fn all_crates_use_workspace_version() {
    let root = workspace_root();
    for krate in ["crates/rnn-core", "crates/rnn-genai", "crates/rnn-cli"] {
        let version = crate_version(&root.join(krate));
        assert_eq!(
            version, "workspace",
            "{krate} should use version.workspace = true, got version = {version:?}"
        );
    }
}

#[test]
fn workspace_version_matches_cargo_pkg() {
    assert_eq!(workspace_version(), env!("CARGO_PKG_VERSION"));
    assert_eq!(rnn_core::VERSION, env!("CARGO_PKG_VERSION"));
}

#[test]
fn internal_dependency_versions_match_workspace() {
    let root_toml = std::fs::read_to_string(workspace_root().join("Cargo.toml")).unwrap();
    let doc: toml::Value = root_toml.parse().unwrap();
    let ws_version = workspace_version();
    for name in ["rnn-core", "rnn-genai"] {
        let dep = &doc["workspace"]["dependencies"][name];
        assert_eq!(dep["version"].as_str(), Some(ws_version.as_str()), "{name}");
    }
}
