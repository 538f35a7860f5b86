//! The core compile between prebuild and postbuild stages.
//!
//! [`BuildEngine`] is the seam the orchestrator calls; [`NativeEngine`] is
//! the shipped implementation:
//!
//! 1. Stylesheets through [`crate::styles`]
//! 2. Scripts through the configured [`ScriptBundler`]
//! 3. Fonts and images copied verbatim
//! 4. Production with `engine.rev`: styles, scripts and images renamed to
//!    `name-<hash>.ext` and recorded in the returned manifest. The hash
//!    skips the project banner, so a rebuild of unchanged sources keeps its
//!    revisioned names.
//!
//! Fonts are never revisioned; stylesheets reference them by relative URL.

use crate::banner::unbannered_hash;
use crate::context::BuildContext;
use crate::manifest::{AssetManifest, ManifestError, revision_tree};
use crate::scripts::{BundleJob, ScriptBundler, ScriptError, bundler_for};
use crate::styles::{StyleError, compile_stylesheets};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Style build failed: {0}")]
    Style(#[from] StyleError),
    #[error("Script build failed: {0}")]
    Script(#[from] ScriptError),
    #[error("Revisioning failed: {0}")]
    Manifest(#[from] ManifestError),
}

pub trait BuildEngine: Send + Sync {
    /// Compile every enabled asset type. Returns the revision manifest,
    /// empty when nothing was revisioned.
    fn compile(&self, ctx: &BuildContext) -> Result<AssetManifest, EngineError>;
}

pub struct NativeEngine {
    bundler: Box<dyn ScriptBundler>,
}

impl NativeEngine {
    pub fn new(bundler: Box<dyn ScriptBundler>) -> Self {
        Self { bundler }
    }

    pub fn from_context(ctx: &BuildContext) -> Self {
        Self::new(bundler_for(ctx.config().javascripts.bundler.as_ref()))
    }
}

impl BuildEngine for NativeEngine {
    fn compile(&self, ctx: &BuildContext) -> Result<AssetManifest, EngineError> {
        let engine = &ctx.config().engine;
        let paths = ctx.paths();

        if engine.stylesheets {
            compile_stylesheets(ctx)?;
        }
        if engine.javascripts {
            if paths.scripts_src.exists() {
                let written = self.bundler.bundle(&BundleJob::from_context(ctx))?;
                tracing::debug!(bundler = self.bundler.name(), count = written.len(), "scripts bundled");
            } else {
                tracing::debug!(dir = %paths.scripts_src.display(), "no script sources");
            }
        }
        if engine.fonts {
            copy_tree(&paths.fonts_src, &paths.fonts_dest)?;
        }
        if engine.images {
            copy_tree(&paths.images_src, &paths.images_dest)?;
        }

        let mut manifest = AssetManifest::new();
        if ctx.is_production() && engine.rev {
            let fingerprint = |path: &Path| unbannered_hash(path, ctx.project());
            for dir in [&paths.styles_dest, &paths.scripts_dest, &paths.images_dest] {
                revision_tree(&paths.dest_root, dir, &mut manifest, &fingerprint)?;
            }
        }
        Ok(manifest)
    }
}

/// Copy every file under `src` to the same relative path under `dest`.
/// Returns the number of files copied; a missing `src` copies nothing.
pub fn copy_tree(src: &Path, dest: &Path) -> io::Result<usize> {
    if !src.exists() {
        return Ok(0);
    }
    let mut copied = 0;
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &target)?;
        copied += 1;
    }
    Ok(copied)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use crate::context::Environment;
    use crate::manifest::MANIFEST_FILENAME;
    use chrono::{TimeZone, Utc};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Engine that records calls and how many files existed under the
    /// destination root when it started.
    pub struct RecordingEngine {
        pub log: Arc<Mutex<Vec<&'static str>>>,
        pub files_seen: Mutex<Option<usize>>,
        pub manifest: AssetManifest,
        pub fail: bool,
    }

    impl RecordingEngine {
        pub fn new(log: &Arc<Mutex<Vec<&'static str>>>) -> Self {
            Self {
                log: Arc::clone(log),
                files_seen: Mutex::new(None),
                manifest: AssetManifest::new(),
                fail: false,
            }
        }
    }

    impl BuildEngine for RecordingEngine {
        fn compile(&self, ctx: &BuildContext) -> Result<AssetManifest, EngineError> {
            self.log.lock().unwrap().push("compile");
            let count = WalkDir::new(&ctx.paths().dest_root)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .count();
            *self.files_seen.lock().unwrap() = Some(count);
            if self.fail {
                return Err(EngineError::Io(io::Error::other("compile exploded")));
            }
            Ok(self.manifest.clone())
        }
    }

    fn project(env: Environment) -> (TempDir, BuildContext) {
        let tmp = TempDir::new().unwrap();
        let ctx = BuildContext::new(env, tmp.path(), ProjectConfig::default());
        let paths = ctx.paths();
        fs::create_dir_all(&paths.styles_src).unwrap();
        fs::create_dir_all(&paths.scripts_src).unwrap();
        fs::create_dir_all(paths.images_src.join("icons")).unwrap();
        fs::create_dir_all(&paths.fonts_src).unwrap();
        fs::write(paths.styles_src.join("app.scss"), ".app { margin: 0; }\n").unwrap();
        fs::write(paths.scripts_src.join("app.js"), "console.log('app');\n").unwrap();
        fs::write(paths.images_src.join("icons/dot.svg"), "<svg/>").unwrap();
        fs::write(paths.fonts_src.join("inter.woff2"), "font").unwrap();
        (tmp, ctx)
    }

    #[test]
    fn development_compile_keeps_literal_names() {
        let (_tmp, ctx) = project(Environment::Development);
        let manifest = NativeEngine::from_context(&ctx).compile(&ctx).unwrap();
        let paths = ctx.paths();

        assert!(manifest.is_empty());
        assert!(paths.styles_dest.join("app.css").exists());
        assert!(paths.scripts_dest.join("app.js").exists());
        assert!(paths.images_dest.join("icons/dot.svg").exists());
        assert!(paths.fonts_dest.join("inter.woff2").exists());
        assert!(!paths.dest_root.join(MANIFEST_FILENAME).exists());
    }

    #[test]
    fn production_compile_revisions_outputs() {
        let (_tmp, ctx) = project(Environment::Production);
        let manifest = NativeEngine::from_context(&ctx).compile(&ctx).unwrap();
        let paths = ctx.paths();

        let css = manifest.get("stylesheets/app.css").unwrap();
        assert!(css.starts_with("stylesheets/app-"));
        assert!(manifest.get("javascripts/app.js").is_some());
        assert!(manifest.get("images/icons/dot.svg").is_some());
        assert!(manifest.get("fonts/inter.woff2").is_none());
        assert!(paths.fonts_dest.join("inter.woff2").exists());
        assert!(manifest.missing_entries(&paths.dest_root).is_empty());
    }

    #[test]
    fn style_revision_ignores_build_date() {
        let (tmp, ctx) = project(Environment::Production);
        let first = NativeEngine::from_context(&ctx).compile(&ctx).unwrap();
        fs::remove_dir_all(&ctx.paths().dest_root).unwrap();

        let later = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();
        let ctx = BuildContext::new(Environment::Production, tmp.path(), ProjectConfig::default())
            .with_timestamp(later);
        let second = NativeEngine::from_context(&ctx).compile(&ctx).unwrap();

        assert_eq!(first.get("stylesheets/app.css"), second.get("stylesheets/app.css"));
        let css = ctx.paths().dest_root.join(second.get("stylesheets/app.css").unwrap());
        assert!(fs::read_to_string(css).unwrap().contains("@built 2030-01-01 12:00 UTC"));
    }

    #[test]
    fn disabled_asset_types_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let mut config = ProjectConfig::default();
        config.engine.javascripts = false;
        config.engine.fonts = false;
        let ctx = BuildContext::new(Environment::Development, tmp.path(), config);
        fs::create_dir_all(&ctx.paths().fonts_src).unwrap();
        fs::write(ctx.paths().fonts_src.join("a.woff2"), "f").unwrap();

        NativeEngine::from_context(&ctx).compile(&ctx).unwrap();
        assert!(!ctx.paths().fonts_dest.exists());
    }

    #[test]
    fn style_failure_aborts_compile() {
        let (_tmp, ctx) = project(Environment::Development);
        fs::write(ctx.paths().styles_src.join("app.scss"), ".a { color: $nope; }").unwrap();
        let err = NativeEngine::from_context(&ctx).compile(&ctx).unwrap_err();
        assert!(matches!(err, EngineError::Style(_)));
    }

    #[test]
    fn copy_tree_counts_files() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a/b");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("x"), "1").unwrap();
        fs::write(tmp.path().join("a/y"), "2").unwrap();
        assert_eq!(copy_tree(&tmp.path().join("a"), &tmp.path().join("out")).unwrap(), 2);
        assert!(tmp.path().join("out/b/x").exists());
    }
}
