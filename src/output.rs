//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! ==> prebuild: cleanup
//!     done (3ms)
//! ==> compile
//!     12 assets revisioned (840ms)
//! ==> postbuild: copy-images
//!     done (9ms)
//! ...
//! Build complete (production): 4 stages, 12 revisioned assets in 1.42s
//! ```
//!
//! ## Images
//!
//! ```text
//! images/logo.png: 18.2 KB → 11.0 KB
//! images/hero.jpg: cached
//! images/broken.png: FAILED decode failed: ...
//! Cache: 1 cached, 1 compressed, 1 failed (3 total)
//! ```
//!
//! ## Errors
//!
//! ```text
//! error: postbuild stage 'compress-images' failed
//!   caused by: IO error: permission denied
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects. Errors go to stderr via
//! [`report_error`], the one reporter shared by every command.

use crate::images::{ImageEvent, ImageOutcome, ImageReport};
use crate::orchestrator::{BuildEvent, BuildSummary};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `840ms`, `1.42s`.
fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}

/// `512 B`, `18.2 KB`, `3.4 MB`.
fn format_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    let f = n as f64;
    if f < KB {
        format!("{n} B")
    } else if f < KB * KB {
        format!("{:.1} KB", f / KB)
    } else {
        format!("{:.1} MB", f / (KB * KB))
    }
}

// ============================================================================
// Build
// ============================================================================

pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::StageStarted { slot, name } => vec![format!("==> {slot}: {name}")],
        BuildEvent::StageFinished { elapsed, .. } => {
            vec![format!("{}done ({})", indent(1), format_duration(*elapsed))]
        }
        BuildEvent::StageFailed { message, .. } => {
            vec![format!("{}FAILED {message}", indent(1))]
        }
        BuildEvent::CompileStarted => vec!["==> compile".to_string()],
        BuildEvent::CompileFinished {
            revisioned,
            elapsed,
        } => {
            let detail = match revisioned {
                0 => "done".to_string(),
                1 => "1 asset revisioned".to_string(),
                n => format!("{n} assets revisioned"),
            };
            vec![format!("{}{detail} ({})", indent(1), format_duration(*elapsed))]
        }
    }
}

pub fn format_summary(summary: &BuildSummary) -> Vec<String> {
    let stages = match summary.stages.len() {
        1 => "1 stage".to_string(),
        n => format!("{n} stages"),
    };
    let mut line = format!("Build complete ({}): {stages}", summary.env);
    if summary.revisioned > 0 {
        line.push_str(&format!(", {} revisioned assets", summary.revisioned));
    }
    line.push_str(&format!(" in {}", format_duration(summary.elapsed)));
    vec![line]
}

pub fn print_summary(summary: &BuildSummary) {
    for line in format_summary(summary) {
        println!("{line}");
    }
}

// ============================================================================
// Images
// ============================================================================

pub fn format_image_event(event: &ImageEvent) -> Vec<String> {
    let status = match &event.outcome {
        ImageOutcome::Cached => "cached".to_string(),
        ImageOutcome::Copied => "copied from cache".to_string(),
        ImageOutcome::Compressed { before, after } if before == after => "unchanged".to_string(),
        ImageOutcome::Compressed { before, after } => {
            format!("{} → {}", format_bytes(*before), format_bytes(*after))
        }
        ImageOutcome::Failed(message) => format!("FAILED {message}"),
    };
    vec![format!("{}: {status}", event.path)]
}

pub fn format_image_report(report: &ImageReport) -> Vec<String> {
    vec![format!("Cache: {}", report.stats)]
}

pub fn print_image_report(report: &ImageReport) {
    for line in format_image_report(report) {
        println!("{line}");
    }
}

// ============================================================================
// Annotations
// ============================================================================

/// One line per report, path relative to `root`.
pub fn format_annotation_reports(reports: &[(PathBuf, usize)], root: &Path) -> Vec<String> {
    reports
        .iter()
        .map(|(path, count)| {
            let shown = path.strip_prefix(root).unwrap_or(path);
            let noun = if *count == 1 { "marker" } else { "markers" };
            format!("{}: {count} {noun}", shown.display())
        })
        .collect()
}

pub fn print_annotation_reports(reports: &[(PathBuf, usize)], root: &Path) {
    for line in format_annotation_reports(reports, root) {
        println!("{line}");
    }
}

// ============================================================================
// Errors
// ============================================================================

/// The error followed by each `caused by:` in its source chain.
pub fn format_error(err: &dyn Error) -> Vec<String> {
    let mut lines = vec![format!("error: {err}")];
    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(format!("  caused by: {cause}"));
        source = cause.source();
    }
    lines
}

/// Print an error and its causes to stderr.
pub fn report_error(err: &dyn Error) {
    for line in format_error(err) {
        eprintln!("{line}");
    }
}
