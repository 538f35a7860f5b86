//! The immutable context threaded through every stage of one build.
//!
//! A [`BuildContext`] is created once per invocation, before any stage runs,
//! and is only ever borrowed afterwards. The environment lives here rather
//! than in process-global state, so every stage receives it explicitly.

use crate::config::{CacheConfig, PathConfig, ProjectConfig, ProjectInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Build environment. Selects which stage lists run and which CSS
/// transforms are appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Absolute source and destination directories, resolved from [`PathConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTable {
    pub root: PathBuf,
    pub src_root: PathBuf,
    pub dest_root: PathBuf,
    pub templates: PathBuf,
    pub styles_src: PathBuf,
    pub styles_dest: PathBuf,
    pub scripts_src: PathBuf,
    pub scripts_dest: PathBuf,
    pub images_src: PathBuf,
    pub images_dest: PathBuf,
    pub fonts_src: PathBuf,
    pub fonts_dest: PathBuf,
    pub cache_dir: PathBuf,
}

impl PathTable {
    pub fn resolve(root: &Path, paths: &PathConfig, cache: &CacheConfig) -> Self {
        let src_root = root.join(&paths.src);
        let dest_root = root.join(&paths.dest);
        Self {
            root: root.to_path_buf(),
            templates: root.join(&paths.templates),
            styles_src: src_root.join(&paths.stylesheets.src),
            styles_dest: dest_root.join(&paths.stylesheets.dest),
            scripts_src: src_root.join(&paths.javascripts.src),
            scripts_dest: dest_root.join(&paths.javascripts.dest),
            images_src: src_root.join(&paths.images.src),
            images_dest: dest_root.join(&paths.images.dest),
            fonts_src: src_root.join(&paths.fonts.src),
            fonts_dest: dest_root.join(&paths.fonts.dest),
            cache_dir: root.join(&cache.dir),
            src_root,
            dest_root,
        }
    }
}

/// Everything a stage may read about the current build.
#[derive(Debug, Clone)]
pub struct BuildContext {
    env: Environment,
    paths: PathTable,
    config: ProjectConfig,
    built_at: DateTime<Utc>,
}

impl BuildContext {
    pub fn new(env: Environment, root: &Path, config: ProjectConfig) -> Self {
        let paths = PathTable::resolve(root, &config.paths, &config.cache);
        Self {
            env,
            paths,
            config,
            built_at: Utc::now(),
        }
    }

    /// Pin the build timestamp (banners embed it).
    pub fn with_timestamp(mut self, built_at: DateTime<Utc>) -> Self {
        self.built_at = built_at;
        self
    }

    pub fn env(&self) -> Environment {
        self.env
    }

    pub fn is_production(&self) -> bool {
        self.env.is_production()
    }

    pub fn paths(&self) -> &PathTable {
        &self.paths
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn project(&self) -> &ProjectInfo {
        &self.config.project
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}
