//! Project configuration module.
//!
//! Handles loading, validating, and merging `assetline.toml`. Stock defaults
//! describe the conventional layout of a CMS front-end project; the project
//! file overrides only the values it names.
//!
//! ## Config File Location
//!
//! ```text
//! project/
//! ├── assetline.toml           # Project config (overrides stock defaults)
//! ├── local.toml               # Per-developer dev URL (not committed)
//! ├── src/
//! │   ├── stylesheets/
//! │   ├── javascripts/
//! │   ├── images/
//! │   └── fonts/
//! └── templates/
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [project]
//! name = "Harbor Freight Marketing"
//! version = "2.4.0"
//!
//! [purge]
//! whitelist = ["is-open", "SeattleWA"]
//! ```
//!
//! Unknown keys are rejected to catch typos early.
//!
//! ## Local Dev URL
//!
//! `local.toml` holds a single `url` key: the local CMS host that watch mode
//! proxies. The file is optional; when it is missing or unreadable the
//! hardcoded [`DEFAULT_DEV_URL`] is used instead.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Project config filename, looked up in the project root.
pub const CONFIG_FILENAME: &str = "assetline.toml";

/// Per-developer settings filename, looked up in the project root.
pub const LOCAL_CONFIG_FILENAME: &str = "local.toml";

/// Fallback dev proxy URL when `local.toml` is absent.
pub const DEFAULT_DEV_URL: &str = "http://localhost:3000";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Project configuration loaded from `assetline.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Project metadata used in banners.
    pub project: ProjectInfo,
    /// Source and destination directories.
    pub paths: PathConfig,
    /// Stylesheet preprocessing and transform settings.
    pub stylesheets: StylesheetsConfig,
    /// Script entry points handed to the bundler.
    pub javascripts: JavascriptsConfig,
    /// Unused-selector purging (production only).
    pub purge: PurgeConfig,
    /// Per-format image codec parameters.
    pub images: ImagesConfig,
    /// Marker comment extraction (development only).
    pub annotations: AnnotationsConfig,
    /// Which asset types the build engine compiles.
    pub engine: EngineConfig,
    /// Persistent compression cache location.
    pub cache: CacheConfig,
}

impl ProjectConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "project.name must not be empty".into(),
            ));
        }
        if !(1..=100).contains(&self.images.jpeg_quality) {
            return Err(ConfigError::Validation(
                "images.jpeg_quality must be 1-100".into(),
            ));
        }
        if self.paths.src == self.paths.dest {
            return Err(ConfigError::Validation(
                "paths.src and paths.dest must differ".into(),
            ));
        }
        if let Some(blank) = self.purge.whitelist.iter().find(|s| s.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "purge.whitelist contains a blank selector: {blank:?}"
            )));
        }
        for (name, files) in &self.javascripts.entries {
            if files.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "javascripts.entries.{name} lists no files"
                )));
            }
        }
        Ok(())
    }
}

/// Project metadata. Rendered into the banner of production CSS and JS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectInfo {
    pub name: String,
    pub description: String,
    pub version: String,
    pub url: String,
    pub author: String,
    pub author_url: String,
}

impl Default for ProjectInfo {
    fn default() -> Self {
        Self {
            name: "Project Name".to_string(),
            description: "Primary Marketing Site".to_string(),
            version: "1.0.0".to_string(),
            url: "https://example.com".to_string(),
            author: "Site Author".to_string(),
            author_url: "https://example.com".to_string(),
        }
    }
}

/// A source directory and its destination counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirPair {
    /// Relative to `paths.src`.
    pub src: String,
    /// Relative to `paths.dest`.
    pub dest: String,
}

impl DirPair {
    fn same(name: &str) -> Self {
        Self {
            src: name.to_string(),
            dest: name.to_string(),
        }
    }
}

/// Source/destination layout, relative to the project root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathConfig {
    pub src: String,
    pub dest: String,
    pub templates: String,
    pub stylesheets: DirPair,
    pub javascripts: DirPair,
    pub images: DirPair,
    pub fonts: DirPair,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            src: "src".to_string(),
            dest: "public/assets".to_string(),
            templates: "templates".to_string(),
            stylesheets: DirPair::same("stylesheets"),
            javascripts: DirPair::same("javascripts"),
            images: DirPair::same("images"),
            fonts: DirPair::same("fonts"),
        }
    }
}

/// Stylesheet preprocessor selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preprocessor {
    /// Stylesheets are plain CSS and pass through untouched.
    None,
    /// SCSS / indented Sass, compiled with `grass`.
    Sass,
}

/// An external program invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Browser versions the CSS lowering transforms target.
///
/// Versions are major releases; omitted browsers are not targeted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserTargets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firefox: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safari: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ios_saf: Option<u32>,
}

impl Default for BrowserTargets {
    fn default() -> Self {
        Self {
            chrome: Some(90),
            edge: Some(90),
            firefox: Some(88),
            safari: Some(14),
            ios_saf: Some(14),
        }
    }
}

/// Stylesheet settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StylesheetsConfig {
    pub preprocessor: Preprocessor,
    /// Extra `@use`/`@import` search paths, relative to the project root.
    pub include_paths: Vec<String>,
    pub browsers: BrowserTargets,
    /// Utility-class generator. Reads CSS on stdin, writes CSS to stdout.
    /// When absent the utility transform passes CSS through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utilities: Option<CommandConfig>,
}

impl Default for StylesheetsConfig {
    fn default() -> Self {
        Self {
            preprocessor: Preprocessor::Sass,
            include_paths: vec!["node_modules".to_string()],
            browsers: BrowserTargets::default(),
            utilities: None,
        }
    }
}

/// Script bundling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JavascriptsConfig {
    /// Bundle name → entry files relative to the script source dir.
    pub entries: BTreeMap<String, Vec<String>>,
    /// Module name → global variable provided by the page.
    pub externals: BTreeMap<String, String>,
    /// Public URL prefix of the script destination.
    pub public_path: String,
    /// External bundler. When absent, entry files are concatenated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundler: Option<CommandConfig>,
}

impl Default for JavascriptsConfig {
    fn default() -> Self {
        Self {
            entries: BTreeMap::from([("app".to_string(), vec!["./app.js".to_string()])]),
            externals: BTreeMap::from([("jquery".to_string(), "jQuery".to_string())]),
            public_path: "/assets/javascripts".to_string(),
            bundler: None,
        }
    }
}

/// Unused-selector purging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PurgeConfig {
    /// Template file extensions scanned under `paths.templates`.
    pub template_extensions: Vec<String>,
    /// Script file extensions scanned under the script source directory.
    pub script_extensions: Vec<String>,
    /// Extra globs, relative to the project root.
    pub content: Vec<String>,
    /// Class and id names never purged, even when no content references them.
    pub whitelist: Vec<String>,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            template_extensions: vec!["twig".to_string(), "html".to_string()],
            script_extensions: vec!["js".to_string(), "vue".to_string()],
            content: Vec::new(),
            whitelist: Vec::new(),
        }
    }
}

/// PNG deflate effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    Fast,
    Default,
    Best,
}

/// Per-format image codec parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    pub png_compression: PngCompression,
    /// Lossy JPEG quality (1-100).
    pub jpeg_quality: u8,
    /// Re-encode GIFs (frames are preserved).
    pub optimize_gif: bool,
    /// Drop the SVG `viewBox` attribute. Breaks responsive scaling; off by default.
    pub svg_remove_view_box: bool,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            png_compression: PngCompression::Best,
            jpeg_quality: 90,
            optimize_gif: true,
            svg_remove_view_box: false,
        }
    }
}

/// Marker-comment extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnnotationsConfig {
    pub tags: Vec<String>,
    pub custom_tags: Vec<String>,
    pub script_extensions: Vec<String>,
    pub style_extensions: Vec<String>,
    pub template_extensions: Vec<String>,
}

impl AnnotationsConfig {
    /// Built-in tags followed by custom tags, in report order.
    pub fn all_tags(&self) -> Vec<String> {
        self.tags
            .iter()
            .chain(self.custom_tags.iter())
            .cloned()
            .collect()
    }
}

impl Default for AnnotationsConfig {
    fn default() -> Self {
        Self {
            tags: vec!["TODO".to_string(), "FIXME".to_string()],
            custom_tags: vec![
                "NOTE".to_string(),
                "BACKLOG".to_string(),
                "CONTENT".to_string(),
            ],
            script_extensions: vec!["js".to_string()],
            style_extensions: vec!["scss".to_string()],
            template_extensions: vec!["twig".to_string()],
        }
    }
}

/// Asset types compiled by the build engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub stylesheets: bool,
    pub javascripts: bool,
    pub fonts: bool,
    pub images: bool,
    /// Rename outputs with a content hash in production and write the manifest.
    pub rev: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stylesheets: true,
            javascripts: true,
            fonts: true,
            images: true,
            rev: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Relative to the project root.
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: ".assetline-cache".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(ProjectConfig::default())
        .map_err(|e| ConfigError::Validation(format!("stock defaults do not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `assetline.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load the project config from `root`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<ProjectConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match load_raw_config(root)? {
        Some(overlay) => merge_toml(base, overlay),
        None => base,
    };
    let config: ProjectConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

#[derive(Deserialize)]
struct LocalConfig {
    url: String,
}

/// Resolve the local dev proxy URL from `local.toml`.
///
/// Never fails: a missing or malformed file yields [`DEFAULT_DEV_URL`].
pub fn load_dev_url(root: &Path) -> String {
    let path = root.join(LOCAL_CONFIG_FILENAME);
    let parsed = fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|s| toml::from_str::<LocalConfig>(&s).map_err(|e| e.to_string()));
    match parsed {
        Ok(local) if !local.url.trim().is_empty() => local.url,
        Ok(_) => DEFAULT_DEV_URL.to_string(),
        Err(reason) => {
            tracing::debug!(path = %path.display(), %reason, "using default dev url");
            DEFAULT_DEV_URL.to_string()
        }
    }
}

/// Returns a fully-commented stock `assetline.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# assetline configuration
# =======================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Project metadata (rendered into production CSS/JS banners)
# ---------------------------------------------------------------------------
[project]
name = "Project Name"
description = "Primary Marketing Site"
version = "1.0.0"
url = "https://example.com"
author = "Site Author"
author_url = "https://example.com"

# ---------------------------------------------------------------------------
# Layout. Asset dirs are relative to `src` and `dest`.
# ---------------------------------------------------------------------------
[paths]
src = "src"
dest = "public/assets"
templates = "templates"
stylesheets = { src = "stylesheets", dest = "stylesheets" }
javascripts = { src = "javascripts", dest = "javascripts" }
images = { src = "images", dest = "images" }
fonts = { src = "fonts", dest = "fonts" }

# ---------------------------------------------------------------------------
# Stylesheets
# ---------------------------------------------------------------------------
[stylesheets]
# "sass" or "none"
preprocessor = "sass"
include_paths = ["node_modules"]
# Utility-class generator: CSS on stdin, CSS on stdout.
# utilities = { program = "npx", args = ["tailwindcss", "--input", "-"] }

[stylesheets.browsers]
chrome = 90
edge = 90
firefox = 88
safari = 14
ios_saf = 14

# ---------------------------------------------------------------------------
# Scripts
# ---------------------------------------------------------------------------
[javascripts]
public_path = "/assets/javascripts"
# External bundler. Without one, entry files are concatenated.
# bundler = { program = "npx", args = ["esbuild-wrapper"] }

[javascripts.entries]
app = ["./app.js"]

[javascripts.externals]
jquery = "jQuery"

# ---------------------------------------------------------------------------
# Purge (production only)
# ---------------------------------------------------------------------------
[purge]
# Files under the templates and script source directories with these
# extensions are scanned for used class and id names.
template_extensions = ["twig", "html"]
script_extensions = ["js", "vue"]
# Extra globs to scan, relative to the project root.
content = []
# Selectors (classes and ids) kept even if no content references them.
whitelist = []

# ---------------------------------------------------------------------------
# Image compression (production post-build)
# ---------------------------------------------------------------------------
[images]
# "fast", "default" or "best"
png_compression = "best"
jpeg_quality = 90
optimize_gif = true
svg_remove_view_box = false

# ---------------------------------------------------------------------------
# Annotation reports (development pre-build)
# ---------------------------------------------------------------------------
[annotations]
tags = ["TODO", "FIXME"]
custom_tags = ["NOTE", "BACKLOG", "CONTENT"]
script_extensions = ["js"]
style_extensions = ["scss"]
template_extensions = ["twig"]

# ---------------------------------------------------------------------------
# Build engine
# ---------------------------------------------------------------------------
[engine]
stylesheets = true
javascripts = true
fonts = true
images = true
# Content-hash file names and write rev-manifest.json in production.
rev = true

[cache]
dir = ".assetline-cache"
"##
}
