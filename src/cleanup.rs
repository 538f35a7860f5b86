//! Flush built assets before a production build.
//!
//! Revisioned file names change whenever content changes, so without a
//! flush every old `app-<hash>.css` would linger next to the new one.

use crate::context::BuildContext;
use crate::stage::{Stage, StageError};
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Recursively delete each directory. Returns the number of files removed.
///
/// Missing directories are skipped, so flushing twice is the same as once.
pub fn flush_dirs(dirs: &[&Path]) -> io::Result<usize> {
    let mut removed = 0;
    for dir in dirs {
        if !dir.exists() {
            continue;
        }
        removed += WalkDir::new(dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .count();
        match std::fs::remove_dir_all(dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}

/// Production prebuild: remove script, style and image output.
pub struct CleanupStage;

impl Stage for CleanupStage {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    fn run(&self, ctx: &BuildContext) -> Result<(), StageError> {
        let paths = ctx.paths();
        let removed = flush_dirs(&[&paths.scripts_dest, &paths.styles_dest, &paths.images_dest])?;
        tracing::debug!(removed, "flushed build output");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use crate::context::Environment;
    use std::fs;
    use tempfile::TempDir;

    fn files_under(dir: &Path) -> usize {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .count()
    }

    #[test]
    fn flush_removes_nested_files() {
        let tmp = TempDir::new().unwrap();
        let css = tmp.path().join("css/nested");
        fs::create_dir_all(&css).unwrap();
        fs::write(css.join("app-1a2b3c4d.css"), "old").unwrap();
        fs::write(tmp.path().join("css/app.css"), "old").unwrap();

        let removed = flush_dirs(&[&tmp.path().join("css")]).unwrap();
        assert_eq!(removed, 2);
        assert!(!tmp.path().join("css").exists());
    }

    #[test]
    fn flush_twice_equals_once() {
        let tmp = TempDir::new().unwrap();
        let js = tmp.path().join("js");
        fs::create_dir_all(&js).unwrap();
        fs::write(js.join("app.js"), "old").unwrap();

        flush_dirs(&[&js]).unwrap();
        let after_once = js.exists();
        assert_eq!(flush_dirs(&[&js]).unwrap(), 0);
        assert_eq!(js.exists(), after_once);
    }

    #[test]
    fn cleanup_stage_empties_destination() {
        let tmp = TempDir::new().unwrap();
        let ctx = BuildContext::new(Environment::Production, tmp.path(), ProjectConfig::default());
        let paths = ctx.paths();
        for dir in [&paths.scripts_dest, &paths.styles_dest, &paths.images_dest] {
            fs::create_dir_all(dir).unwrap();
            fs::write(dir.join("stale-0badf00d.bin"), "stale").unwrap();
        }

        CleanupStage.run(&ctx).unwrap();
        assert_eq!(files_under(&paths.dest_root), 0);
        CleanupStage.run(&ctx).unwrap();
    }

    #[test]
    fn cleanup_leaves_fonts() {
        let tmp = TempDir::new().unwrap();
        let ctx = BuildContext::new(Environment::Production, tmp.path(), ProjectConfig::default());
        let fonts = &ctx.paths().fonts_dest;
        fs::create_dir_all(fonts).unwrap();
        fs::write(fonts.join("inter.woff2"), "font").unwrap();

        CleanupStage.run(&ctx).unwrap();
        assert!(fonts.join("inter.woff2").exists());
    }
}
