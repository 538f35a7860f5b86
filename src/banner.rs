//! Reference banners prepended to production CSS and JS.
//!
//! ```text
//! /**
//!  * Project Name - Primary Marketing Site
//!  * @version v1.0.0
//!  * @link https://example.com
//!  * @author Site Author (https://example.com)
//!  * @built 2026-03-14 09:26 UTC
//!  */
//! ```
//!
//! Insertion is idempotent. The style stage banners CSS as it writes it and
//! the production post-build banner stage sweeps CSS and JS afterwards;
//! files that already carry the banner are left alone.

use crate::cache::hash_bytes;
use crate::config::ProjectInfo;
use crate::context::BuildContext;
use crate::stage::{Stage, StageError};
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Format a build timestamp as a fixed-width `YYYY-MM-DD HH:MM UTC` string.
pub fn format_build_date(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M UTC").to_string()
}

const BANNER_END: &str = "\n */\n";

/// Leading lines that identify a project banner regardless of build date.
fn signature(info: &ProjectInfo) -> String {
    format!("/**\n * {} - {}\n", info.name, info.description)
}

pub fn render_banner(info: &ProjectInfo, built_at: DateTime<Utc>) -> String {
    format!(
        "{signature} * @version v{version}\n * @link {url}\n * @author {author} ({author_url})\n * @built {date}\n */\n",
        signature = signature(info),
        version = info.version,
        url = info.url,
        author = info.author,
        author_url = info.author_url,
        date = format_build_date(built_at),
    )
}

pub fn has_banner(content: &str, info: &ProjectInfo) -> bool {
    content.starts_with(&signature(info))
}

/// `content` without its leading project banner, if it has one.
pub fn strip_banner<'a>(content: &'a str, info: &ProjectInfo) -> &'a str {
    if !has_banner(content, info) {
        return content;
    }
    match content.find(BANNER_END) {
        Some(end) => &content[end + BANNER_END.len()..],
        None => content,
    }
}

/// Content hash of the file at `path`, ignoring a leading project banner.
/// Revisioned names then only change when the asset itself does.
pub fn unbannered_hash(path: &Path, info: &ProjectInfo) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(match std::str::from_utf8(&bytes) {
        Ok(text) => hash_bytes(strip_banner(text, info).as_bytes()),
        Err(_) => hash_bytes(&bytes),
    })
}

/// Returns `None` when `content` is already bannered.
pub fn prepend_banner(content: &str, info: &ProjectInfo, built_at: DateTime<Utc>) -> Option<String> {
    if has_banner(content, info) {
        return None;
    }
    Some(format!("{}{}", render_banner(info, built_at), content))
}

/// Banner every file under `dir` with one of `extensions`.
///
/// Returns the number of files rewritten. A missing directory is empty.
pub fn banner_tree(
    dir: &Path,
    extensions: &[&str],
    info: &ProjectInfo,
    built_at: DateTime<Utc>,
) -> io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut written = 0;
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(io::Error::other)?;
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)));
        if !entry.file_type().is_file() || !matches {
            continue;
        }
        let content = fs::read_to_string(path)?;
        if let Some(bannered) = prepend_banner(&content, info, built_at) {
            fs::write(path, bannered)?;
            written += 1;
        }
    }
    Ok(written)
}

/// Production post-build: banner built styles and scripts.
pub struct BannerStage;

impl Stage for BannerStage {
    fn name(&self) -> &'static str {
        "banners"
    }

    fn run(&self, ctx: &BuildContext) -> Result<(), StageError> {
        let paths = ctx.paths();
        let styles = banner_tree(&paths.styles_dest, &["css"], ctx.project(), ctx.built_at())?;
        let scripts = banner_tree(&paths.scripts_dest, &["js"], ctx.project(), ctx.built_at())?;
        tracing::debug!(styles, scripts, "bannered files");
        Ok(())
    }
}
