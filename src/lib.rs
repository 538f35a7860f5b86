//! # assetline
//!
//! Front-end asset build orchestration for a CMS-backed website. The crate
//! decides *which* build stages run, in *what* order, for development vs.
//! production, and drives the compile in between:
//!
//! ```text
//! environment → prebuild stages → engine compile → postbuild stages → manifest check
//! ```
//!
//! | Environment | Prebuild | Compile | Postbuild |
//! |---|---|---|---|
//! | development | annotation reports | styles (sourcemaps), scripts, fonts, images | (none) |
//! | production | flush destination | styles (purged, minified, bannered), scripts, fonts, images, revisioning | copy-images → compress-images → banners |
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `assetline.toml` loading over stock defaults, validation, `local.toml` dev URL |
//! | [`context`] | `BuildContext`: environment, resolved path table, project metadata, timestamp |
//! | [`stage`] | `Stage` trait and the fixed per-environment `StagePlan` |
//! | [`orchestrator`] | Runs prebuild → compile → postbuild, aborting on the first failure |
//! | [`engine`] | `BuildEngine` trait and `NativeEngine`, the core compile |
//! | [`styles`] | Sass preprocessing, the CSS transform chain, sourcemaps, purge |
//! | [`scripts`] | `ScriptBundler` trait: external command or concatenation |
//! | [`images`] | Per-format codec chains, parallel compression, literal copies |
//! | [`cache`] | Persistent content-hashed compression cache |
//! | [`manifest`] | `rev-manifest.json` and content-hashed renaming |
//! | [`annotations`] | `TODO`/`FIXME`/... extraction into markdown reports |
//! | [`cleanup`] | Destination flush before production builds |
//! | [`banner`] | Project banner rendering and idempotent insertion |
//! | [`watch`] | Debounced style rebuilds for development |
//! | [`output`] | CLI output formatting and the shared error reporter |
//!
//! # Design Decisions
//!
//! ## Typed Stage Lists
//!
//! Stages are boxed trait objects in two ordered `Vec`s built once per
//! process. There is no registry keyed by name: the plan for an environment
//! is a single `match` in [`stage::StagePlan::for_environment`], so the order
//! is visible in one place and checked by tests.
//!
//! ## Environment as Data
//!
//! The environment is chosen once, stored in the immutable
//! [`context::BuildContext`], and passed to every stage. Nothing reads a
//! global flag, which lets tests build production and development contexts
//! side by side.
//!
//! ## Library Calls, Not Algorithms
//!
//! Compression, CSS lowering and Sass compilation are delegated to `image`,
//! `lightningcss` and `grass`. Utility-class generation and script bundling
//! are external commands the project configures. This crate owns ordering,
//! caching and failure policy.

pub mod annotations;
pub mod banner;
pub mod cache;
pub mod cleanup;
pub mod config;
pub mod context;
pub mod engine;
pub mod images;
pub mod manifest;
pub mod orchestrator;
pub mod output;
pub mod scripts;
pub mod stage;
pub mod styles;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
