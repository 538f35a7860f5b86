//! Development watch loop.
//!
//! Runs once as a normal development build, then recompiles stylesheets on
//! every debounced change under the style source directory. A failing
//! rebuild is reported and the loop keeps waiting; only watcher failures
//! end it.

use crate::context::BuildContext;
use crate::output;
use crate::styles::compile_stylesheets;
use notify::RecursiveMode;
use notify_debouncer_mini::{DebouncedEventKind, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    #[error("Failed to watch path: {0}")]
    WatchPath(#[source] notify::Error),
    #[error("Watch channel error: {0}")]
    Channel(String),
    #[error("Style source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub debounce: Duration,
    /// Local dev proxy URL, printed for the developer.
    pub dev_url: String,
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// Files whose change triggers a style rebuild.
pub fn is_style_source(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| matches!(e.as_str(), "scss" | "sass" | "css"))
}

/// Recompile stylesheets, reporting instead of propagating failures.
/// Returns whether the rebuild succeeded.
pub fn rebuild_styles(ctx: &BuildContext) -> bool {
    let started = Instant::now();
    match compile_stylesheets(ctx) {
        Ok(written) => {
            println!(
                "[{}] Compiled {} stylesheet(s) in {}ms",
                timestamp(),
                written.len(),
                started.elapsed().as_millis()
            );
            true
        }
        Err(e) => {
            output::report_error(&e);
            false
        }
    }
}

/// Watch the style sources until the watcher fails.
pub fn watch_styles(ctx: &BuildContext, options: &WatchOptions) -> Result<(), WatchError> {
    let src = &ctx.paths().styles_src;
    if !src.exists() {
        return Err(WatchError::SourceNotFound(src.clone()));
    }

    let (tx, rx) = channel();
    let mut debouncer = new_debouncer(options.debounce, tx).map_err(WatchError::WatcherInit)?;
    debouncer
        .watcher()
        .watch(src, RecursiveMode::Recursive)
        .map_err(WatchError::WatchPath)?;

    println!("[{}] Proxying {}", timestamp(), options.dev_url);
    println!("[{}] Watching {} for changes...", timestamp(), src.display());

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let changed: Vec<_> = events
                    .iter()
                    .filter(|e| matches!(e.kind, DebouncedEventKind::Any) && is_style_source(&e.path))
                    .collect();
                if changed.is_empty() {
                    continue;
                }
                for event in &changed {
                    if let Some(name) = event.path.file_name() {
                        println!("[{}] Changed: {}", timestamp(), name.to_string_lossy());
                    }
                }
                rebuild_styles(ctx);
            }
            Ok(Err(error)) => {
                tracing::warn!(%error, "watch error, continuing");
            }
            Err(e) => return Err(WatchError::Channel(e.to_string())),
        }
    }
}
