//! Shared test utilities for the assetline test suite.
//!
//! Provides a fixture project (`fixtures/project/`) copied into a temp dir,
//! contexts built from its config, and destination-tree lookups that panic
//! with a useful listing on a miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let ctx = fixture_context(tmp.path(), Environment::Production);
//! // ... run a build ...
//! let css = find_output(&ctx, "stylesheets/app-");
//! ```

use crate::config::load_config;
use crate::context::{BuildContext, Environment};
use crate::images::codec::tests::png_bytes;
use chrono::{TimeZone, Utc};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/project/` to a temp directory and return it.
///
/// A small PNG is generated at `src/images/logo.png` since the fixture tree
/// is text-only.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/project");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    std::fs::write(tmp.path().join("src/images/logo.png"), png_bytes(24, 24)).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Timestamp pinned into fixture contexts so banners are predictable.
pub fn fixture_timestamp() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 0).unwrap()
}

/// Load the project config under `root` and build a context for `env`.
pub fn fixture_context(root: &Path, env: Environment) -> BuildContext {
    let config = load_config(root).unwrap();
    BuildContext::new(env, root, config).with_timestamp(fixture_timestamp())
}

// =========================================================================
// Destination lookups
// =========================================================================

/// Every file under `dir`, relative and `/`-separated, sorted.
pub fn files_under(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(dir)
                .ok()
                .map(crate::manifest::manifest_key)
        })
        .collect();
    files.sort();
    files
}

/// The single destination file whose relative path starts with `prefix`.
/// Panics if there is not exactly one.
pub fn find_output(ctx: &BuildContext, prefix: &str) -> PathBuf {
    let dest = &ctx.paths().dest_root;
    let files = files_under(dest);
    let matches: Vec<&String> = files.iter().filter(|f| f.starts_with(prefix)).collect();
    match matches.as_slice() {
        [one] => dest.join(one.as_str()),
        _ => panic!("expected one output starting with '{prefix}', found {matches:?}. All: {files:?}"),
    }
}
