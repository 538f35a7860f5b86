//! Style build: preprocess, transform, banner or sourcemap, write.
//!
//! Every `scss`, `sass` or `css` file under the style source directory is
//! an entry point except Sass partials (`_name.scss`), which are only
//! reachable through `@use`/`@import`. Each entry compiles to a `.css` file
//! at the same relative path under the style destination.
//!
//! | Step | Development | Production |
//! |---|---|---|
//! | Preprocessor (`grass`) | yes, if configured | yes, if configured |
//! | Transform chain | utilities → … → vendor-prefixes | … → purge → minify |
//! | Output extras | inline sourcemap | banner |

pub mod purge;
pub mod sourcemap;
pub mod transforms;

pub use transforms::{CssTransform, TransformChain};

use crate::banner::prepend_banner;
use crate::config::Preprocessor;
use crate::context::BuildContext;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

const STYLE_EXTENSIONS: &[&str] = &["scss", "sass", "css"];

#[derive(Error, Debug)]
pub enum StyleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Sass error in {path}: {message}")]
    Preprocess { path: PathBuf, message: String },
    #[error("{transform} failed on {file}: {message}")]
    Transform {
        transform: &'static str,
        file: String,
        message: String,
    },
    #[error("Invalid purge content glob '{pattern}': {message}")]
    Glob { pattern: String, message: String },
}

fn is_entry_point(path: &Path) -> bool {
    let has_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| STYLE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
    let partial = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'));
    has_ext && !partial
}

/// Entry stylesheets under `dir`, sorted.
pub fn entry_points(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_entry_point(e.path()))
        .map(|e| e.into_path())
        .collect()
}

/// Compile every entry stylesheet. Returns the written output paths.
///
/// Stops at the first failing file.
pub fn compile_stylesheets(ctx: &BuildContext) -> Result<Vec<PathBuf>, StyleError> {
    let chain = TransformChain::for_context(ctx)?;
    let paths = ctx.paths();
    let mut written = Vec::new();
    for entry in entry_points(&paths.styles_src) {
        written.push(compile_file(ctx, &chain, &entry)?);
    }
    tracing::debug!(count = written.len(), "stylesheets compiled");
    Ok(written)
}

/// Compile one entry stylesheet through `chain` and write it.
pub fn compile_file(
    ctx: &BuildContext,
    chain: &TransformChain,
    entry: &Path,
) -> Result<PathBuf, StyleError> {
    let paths = ctx.paths();
    let relative = entry.strip_prefix(&paths.styles_src).unwrap_or(entry);
    let output = paths.styles_dest.join(relative).with_extension("css");
    let source_name = relative.to_string_lossy().replace('\\', "/");
    let output_name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let source = fs::read_to_string(entry)?;
    let css = preprocess(ctx, entry, &source)?;
    let css = chain
        .apply(&css, &source_name)
        .map_err(|(transform, message)| StyleError::Transform {
            transform,
            file: source_name.clone(),
            message,
        })?;

    let css = if ctx.is_production() {
        prepend_banner(&css, ctx.project(), ctx.built_at()).unwrap_or(css)
    } else {
        let map = sourcemap::source_map(&output_name, &source_name, &source);
        sourcemap::inline(&css, &map)
    };

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, css)?;
    Ok(output)
}

fn preprocess(ctx: &BuildContext, entry: &Path, source: &str) -> Result<String, StyleError> {
    let is_sass = entry
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("scss") || e.eq_ignore_ascii_case("sass"));
    let styles = &ctx.config().stylesheets;
    if styles.preprocessor == Preprocessor::None || !is_sass {
        return Ok(source.to_string());
    }

    let mut load_paths = vec![ctx.paths().styles_src.clone()];
    load_paths.extend(styles.include_paths.iter().map(|p| ctx.paths().root.join(p)));
    let options = grass::Options::default()
        .load_paths(&load_paths)
        .style(grass::OutputStyle::Expanded);
    grass::from_path(entry, &options).map_err(|e| StyleError::Preprocess {
        path: entry.to_path_buf(),
        message: e.to_string(),
    })
}
