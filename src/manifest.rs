//! Revision manifest (`rev-manifest.json`).
//!
//! Maps each logical asset path to its content-hashed output path, both
//! relative to the destination root and always `/`-separated:
//!
//! ```json
//! {
//!   "images/logo.png": "images/logo-5d41402a.png",
//!   "stylesheets/app.css": "stylesheets/app-7d793037.css"
//! }
//! ```
//!
//! The CMS resolves asset URLs through this file at render time. Every
//! entry must name a file that exists once the build has finished; see
//! [`AssetManifest::missing_entries`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub const MANIFEST_FILENAME: &str = "rev-manifest.json";

/// Hex digits of the content hash kept in revisioned names.
const REV_HASH_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetManifest {
    entries: BTreeMap<String, String>,
}

impl AssetManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, logical: String, revisioned: String) {
        self.entries.insert(logical, revisioned);
    }

    pub fn get(&self, logical: &str) -> Option<&str> {
        self.entries.get(logical).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Load from the destination root. `Ok(None)` before the first build.
    pub fn load(dest_root: &Path) -> Result<Option<Self>, ManifestError> {
        let path = dest_root.join(MANIFEST_FILENAME);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, dest_root: &Path) -> Result<(), ManifestError> {
        fs::create_dir_all(dest_root)?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(dest_root.join(MANIFEST_FILENAME), json)?;
        Ok(())
    }

    /// Make the on-disk manifest match this build: write it when there are
    /// entries, otherwise remove any manifest left by an earlier build.
    pub fn publish(&self, dest_root: &Path) -> Result<(), ManifestError> {
        if !self.is_empty() {
            return self.save(dest_root);
        }
        let path = dest_root.join(MANIFEST_FILENAME);
        if path.exists() {
            fs::remove_file(&path)?;
            tracing::debug!(path = %path.display(), "removed manifest from previous build");
        }
        Ok(())
    }

    /// Revisioned paths with no file behind them.
    pub fn missing_entries(&self, dest_root: &Path) -> Vec<String> {
        self.entries
            .values()
            .filter(|rev| !dest_root.join(rev.as_str()).is_file())
            .cloned()
            .collect()
    }
}

/// Manifest key for a path relative to the destination root.
pub fn manifest_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// `stylesheets/app.css` + `7d793037…` → `stylesheets/app-7d793037.css`.
pub fn revisioned_path(relative: &Path, hash: &str) -> PathBuf {
    let short = &hash[..hash.len().min(REV_HASH_LEN)];
    let stem = relative
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match relative.extension() {
        Some(ext) => format!("{stem}-{short}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{short}"),
    };
    relative.with_file_name(name)
}

/// Rename every file under `dir` to its revisioned name and record it.
///
/// `fingerprint` supplies each file's content hash, usually [`hash_file`].
/// `dir` must live inside `dest_root`. Returns the number of files renamed.
pub fn revision_tree<F>(
    dest_root: &Path,
    dir: &Path,
    manifest: &mut AssetManifest,
    fingerprint: F,
) -> Result<usize, ManifestError>
where
    F: Fn(&Path) -> std::io::Result<String>,
{
    if !dir.exists() {
        return Ok(0);
    }
    let files: Vec<PathBuf> = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();

    let mut renamed = 0;
    for file in files {
        let Ok(relative) = file.strip_prefix(dest_root) else {
            continue;
        };
        let hash = fingerprint(&file)?;
        let revisioned = revisioned_path(relative, &hash);
        fs::rename(&file, dest_root.join(&revisioned))?;
        manifest.insert(manifest_key(relative), manifest_key(&revisioned));
        renamed += 1;
    }
    Ok(renamed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::hash_file;
    use tempfile::TempDir;

    #[test]
    fn revisioned_path_inserts_short_hash() {
        let rev = revisioned_path(Path::new("stylesheets/app.css"), "7d793037a0760186");
        assert_eq!(rev, Path::new("stylesheets/app-7d793037.css"));
    }

    #[test]
    fn revisioned_path_without_extension() {
        let rev = revisioned_path(Path::new("fonts/LICENSE"), "abcdef0123");
        assert_eq!(rev, Path::new("fonts/LICENSE-abcdef01"));
    }

    #[test]
    fn manifest_key_uses_forward_slashes() {
        let key = manifest_key(&Path::new("images").join("icons").join("a.svg"));
        assert_eq!(key, "images/icons/a.svg");
    }

    #[test]
    fn load_before_first_build_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(AssetManifest::load(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let mut m = AssetManifest::new();
        m.insert("images/a.png".into(), "images/a-12345678.png".into());
        m.save(tmp.path()).unwrap();

        let json = fs::read_to_string(tmp.path().join(MANIFEST_FILENAME)).unwrap();
        assert!(json.contains("\"images/a.png\": \"images/a-12345678.png\""));
        assert_eq!(AssetManifest::load(tmp.path()).unwrap(), Some(m));
    }

    #[test]
    fn publishing_empty_manifest_removes_previous_one() {
        let tmp = TempDir::new().unwrap();
        let mut m = AssetManifest::new();
        m.insert("images/a.png".into(), "images/a-12345678.png".into());
        m.publish(tmp.path()).unwrap();
        assert!(tmp.path().join(MANIFEST_FILENAME).exists());

        AssetManifest::new().publish(tmp.path()).unwrap();
        assert!(AssetManifest::load(tmp.path()).unwrap().is_none());

        // Nothing on disk and nothing to write.
        AssetManifest::new().publish(tmp.path()).unwrap();
    }

    #[test]
    fn revision_tree_renames_and_records() {
        let tmp = TempDir::new().unwrap();
        let css = tmp.path().join("stylesheets");
        fs::create_dir_all(&css).unwrap();
        fs::write(css.join("app.css"), "a{color:red}").unwrap();

        let mut m = AssetManifest::new();
        assert_eq!(revision_tree(tmp.path(), &css, &mut m, hash_file).unwrap(), 1);

        let rev = m.get("stylesheets/app.css").unwrap();
        assert!(rev.starts_with("stylesheets/app-"));
        assert!(rev.ends_with(".css"));
        assert!(!css.join("app.css").exists());
        assert!(m.missing_entries(tmp.path()).is_empty());
    }

    #[test]
    fn revision_hash_follows_content() {
        let tmp = TempDir::new().unwrap();
        let js = tmp.path().join("javascripts");
        fs::create_dir_all(&js).unwrap();

        fs::write(js.join("app.js"), "v1").unwrap();
        let mut first = AssetManifest::new();
        revision_tree(tmp.path(), &js, &mut first, hash_file).unwrap();

        fs::remove_dir_all(&js).unwrap();
        fs::create_dir_all(&js).unwrap();
        fs::write(js.join("app.js"), "v2").unwrap();
        let mut second = AssetManifest::new();
        revision_tree(tmp.path(), &js, &mut second, hash_file).unwrap();

        assert_ne!(first.get("javascripts/app.js"), second.get("javascripts/app.js"));
    }

    #[test]
    fn missing_entries_reports_deleted_files() {
        let tmp = TempDir::new().unwrap();
        let mut m = AssetManifest::new();
        m.insert("a.css".into(), "a-00000000.css".into());
        assert_eq!(m.missing_entries(tmp.path()), vec!["a-00000000.css"]);
    }
}
