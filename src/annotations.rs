//! Marker-comment extraction (`TODO`, `FIXME`, `NOTE`, ...).
//!
//! Script, style and template trees are scanned independently and each gets
//! its own markdown report at the project root:
//!
//! | Tree | Default extensions | Report |
//! |---|---|---|
//! | scripts | `js` | `todo-javascript.md` |
//! | styles | `scss` | `todo-styles.md` |
//! | templates | `twig` | `todo-templates.md` |
//!
//! A marker is a tag right after a comment opener (`//`, `/*`, `*`, `{#`,
//! `<!--`), optionally prefixed with `@` and followed by `:`:
//!
//! ```text
//! // TODO: lazy-load the carousel
//! {# @CONTENT swap hero copy before launch #}
//! ```
//!
//! Reports are for developers only and never touch build output.

use crate::config::AnnotationsConfig;
use crate::context::BuildContext;
use crate::manifest::manifest_key;
use crate::stage::{Stage, StageError};
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub tag: String,
    /// Path relative to the project root, `/`-separated.
    pub file: String,
    /// 1-based.
    pub line: usize,
    pub text: String,
}

/// One of the independently reported source trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tree {
    Scripts,
    Styles,
    Templates,
}

impl Tree {
    pub const ALL: [Tree; 3] = [Tree::Scripts, Tree::Styles, Tree::Templates];

    pub fn report_name(self) -> &'static str {
        match self {
            Tree::Scripts => "todo-javascript.md",
            Tree::Styles => "todo-styles.md",
            Tree::Templates => "todo-templates.md",
        }
    }

    fn dir(self, ctx: &BuildContext) -> &Path {
        let paths = ctx.paths();
        match self {
            Tree::Scripts => &paths.scripts_src,
            Tree::Styles => &paths.styles_src,
            Tree::Templates => &paths.templates,
        }
    }

    fn extensions(self, config: &AnnotationsConfig) -> &[String] {
        match self {
            Tree::Scripts => &config.script_extensions,
            Tree::Styles => &config.style_extensions,
            Tree::Templates => &config.template_extensions,
        }
    }
}

/// Build the marker regex for `tags`.
pub fn matcher(tags: &[String]) -> Regex {
    let alternatives = tags
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(
        r"(?://|/\*+|\{{#|<!--|^\s*\*)\s*@?({alternatives})\b(?:\([^)]*\))?:?\s*(.*?)\s*(?:\*/|#\}}|-->)?\s*$"
    );
    Regex::new(&pattern).unwrap()
}

/// Markers in one file's content.
pub fn extract(content: &str, file: &str, matcher: &Regex) -> Vec<Annotation> {
    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let caps = matcher.captures(line)?;
            Some(Annotation {
                tag: caps[1].to_string(),
                file: file.to_string(),
                line: i + 1,
                text: caps[2].to_string(),
            })
        })
        .collect()
}

/// Markers in every file under `dir` with one of `extensions`.
pub fn scan_tree(
    root: &Path,
    dir: &Path,
    extensions: &[String],
    matcher: &Regex,
) -> io::Result<Vec<Annotation>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(io::Error::other)?;
        let path = entry.path();
        let wanted = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)));
        if !entry.file_type().is_file() || !wanted {
            continue;
        }
        // Binary or non-UTF-8 files are not annotated.
        let Ok(content) = fs::read_to_string(path) else {
            continue;
        };
        let file = manifest_key(path.strip_prefix(root).unwrap_or(path));
        found.extend(extract(&content, &file, matcher));
    }
    Ok(found)
}

/// Markdown report: one table per tag that has entries, in `tags` order.
pub fn render_report(annotations: &[Annotation], tags: &[String]) -> String {
    let mut out = String::new();
    for tag in tags {
        let rows: Vec<&Annotation> = annotations.iter().filter(|a| &a.tag == tag).collect();
        if rows.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("### {tag}s\n"));
        out.push_str(&format!("| Filename | line # | {tag}\n"));
        out.push_str("|:------|:------:|:------\n");
        for a in rows {
            out.push_str(&format!(
                "| [{file}]({file}#L{line}) | {line} | {text}\n",
                file = a.file,
                line = a.line,
                text = a.text
            ));
        }
    }
    out
}

/// Scan all three trees and write their reports. Returns `(report, count)`.
pub fn write_reports(ctx: &BuildContext) -> io::Result<Vec<(PathBuf, usize)>> {
    let config = &ctx.config().annotations;
    let tags = config.all_tags();
    let re = matcher(&tags);
    let root = &ctx.paths().root;

    let mut written = Vec::new();
    for tree in Tree::ALL {
        let found = scan_tree(root, tree.dir(ctx), tree.extensions(config), &re)?;
        let report = root.join(tree.report_name());
        fs::write(&report, render_report(&found, &tags))?;
        tracing::debug!(report = %report.display(), count = found.len(), "annotation report");
        written.push((report, found.len()));
    }
    Ok(written)
}

/// Development prebuild: refresh the annotation reports.
pub struct AnnotationStage;

impl Stage for AnnotationStage {
    fn name(&self) -> &'static str {
        "annotations"
    }

    fn run(&self, ctx: &BuildContext) -> Result<(), StageError> {
        write_reports(ctx)?;
        Ok(())
    }
}
