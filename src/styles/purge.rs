//! Unused-selector purging.
//!
//! Used tokens are extracted from the template directory and the script
//! source directory, wherever the path config puts them, plus any extra
//! `purge.content` globs. Class and id names declared by the stylesheet
//! that appear in neither the used set nor the whitelist are handed to
//! `lightningcss` as unused symbols, which drops the rules that reference
//! them.

use super::StyleError;
use super::transforms::{CssTransform, rewrite};
use crate::config::PurgeConfig;
use crate::context::PathTable;
use lightningcss::stylesheet::MinifyOptions;
use lightningcss::targets::{Features, Targets};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static CONTENT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9_:/-]+").unwrap());

static DECLARED_SYMBOL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[.#](-?[_a-zA-Z](?:[\w-]|\\.)*)").unwrap()
});

/// Tokens a content file could use as class or id names.
pub fn extract_tokens(content: &str) -> impl Iterator<Item = &str> {
    CONTENT_TOKEN.find_iter(content).map(|m| m.as_str())
}

/// Class and id names declared in `css`, unescaped (`md\:flex` → `md:flex`).
pub fn declared_symbols(css: &str) -> BTreeSet<String> {
    DECLARED_SYMBOL
        .captures_iter(css)
        .map(|c| c[1].replace('\\', ""))
        .collect()
}

/// Absolute globs scanned for used tokens: every configured extension under
/// the templates and script source directories, then the extra content
/// globs resolved against the project root.
pub fn content_globs(paths: &PathTable, config: &PurgeConfig) -> Vec<String> {
    let under = |dir: &Path, extensions: &[String]| -> Vec<String> {
        let base = glob::Pattern::escape(&dir.to_string_lossy());
        extensions
            .iter()
            .map(|ext| format!("{base}/**/*.{ext}"))
            .collect()
    };
    let root = glob::Pattern::escape(&paths.root.to_string_lossy());
    under(&paths.templates, &config.template_extensions)
        .into_iter()
        .chain(under(&paths.scripts_src, &config.script_extensions))
        .chain(config.content.iter().map(|extra| format!("{root}/{extra}")))
        .collect()
}

pub struct Purge {
    used: HashSet<String>,
    whitelist: HashSet<String>,
}

impl Purge {
    pub fn new(used: HashSet<String>, whitelist: impl IntoIterator<Item = String>) -> Self {
        Self {
            used,
            whitelist: whitelist.into_iter().collect(),
        }
    }

    /// Collect used tokens from every file matching [`content_globs`].
    pub fn scan(paths: &PathTable, config: &PurgeConfig) -> Result<Self, StyleError> {
        let mut used = HashSet::new();
        for pattern in content_globs(paths, config) {
            let matches = glob::glob(&pattern).map_err(|e| StyleError::Glob {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            for path in matches.filter_map(Result::ok).filter(|p| p.is_file()) {
                let content = fs::read_to_string(&path)?;
                used.extend(extract_tokens(&content).map(str::to_string));
            }
        }
        tracing::debug!(tokens = used.len(), "purge content scanned");
        Ok(Self::new(used, config.whitelist.iter().cloned()))
    }

    /// Declared names that may be dropped.
    pub fn unused_in(&self, css: &str) -> HashSet<String> {
        declared_symbols(css)
            .into_iter()
            .filter(|s| !self.used.contains(s) && !self.whitelist.contains(s))
            .collect()
    }
}

impl CssTransform for Purge {
    fn name(&self) -> &'static str {
        "purge"
    }

    fn apply(&self, css: &str, filename: &str) -> Result<String, String> {
        let unused = self.unused_in(css);
        if unused.is_empty() {
            return Ok(css.to_string());
        }
        let options = MinifyOptions {
            targets: Targets {
                browsers: None,
                include: Features::empty(),
                exclude: Features::all(),
            },
            unused_symbols: unused,
        };
        rewrite(css, filename, options, false)
    }
}
