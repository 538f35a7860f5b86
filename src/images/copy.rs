//! Literal (un-revisioned) image copies.
//!
//! Templates and CMS content often reference images by their plain name,
//! so production output keeps `images/logo.png` next to the revisioned
//! `images/logo-5d41402a.png`.

use crate::manifest::{AssetManifest, manifest_key};
use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyReport {
    pub copied: usize,
    pub skipped: usize,
}

/// Copy every file under `src` into `dest`, keeping relative paths.
///
/// A file is skipped when the manifest maps it to its own literal path,
/// meaning the engine already wrote it there.
pub fn copy_literal_images(
    src: &Path,
    dest: &Path,
    dest_root: &Path,
    manifest: Option<&AssetManifest>,
) -> io::Result<CopyReport> {
    let mut report = CopyReport::default();
    if !src.exists() {
        return Ok(report);
    }
    let dest_prefix = dest.strip_prefix(dest_root).unwrap_or(dest);

    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let key = manifest_key(&dest_prefix.join(relative));
        if manifest.and_then(|m| m.get(&key)) == Some(key.as_str()) {
            report.skipped += 1;
            continue;
        }
        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &target)?;
        report.copied += 1;
    }
    Ok(report)
}
