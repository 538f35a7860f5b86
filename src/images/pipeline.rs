//! Batch image compression with the persistent cache.
//!
//! Files are compressed in parallel with [rayon](https://docs.rs/rayon);
//! cache bookkeeping is merged back on the calling thread afterwards.
//!
//! A file that cannot be read, decoded, or written fails on its own: the
//! failure is logged and reported, and the rest of the batch continues.

use super::codec::{CodecSet, ImageKind};
use crate::cache::{CacheStats, CompressionCache, Lookup, hash_bytes};
use crate::manifest::manifest_key;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to scan {path}: {message}")]
    Scan { path: PathBuf, message: String },
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    /// Restored from this path's own cache entry.
    Cached,
    /// Restored from a cache blob recorded under another path.
    Copied,
    /// Ran through the codec chain.
    Compressed { before: u64, after: u64 },
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ImageEvent {
    /// Relative to the pipeline input directory.
    pub path: String,
    pub outcome: ImageOutcome,
}

#[derive(Debug, Default)]
pub struct ImageReport {
    pub stats: CacheStats,
    pub events: Vec<ImageEvent>,
}

impl ImageReport {
    pub fn failures(&self) -> impl Iterator<Item = &ImageEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e.outcome, ImageOutcome::Failed(_)))
    }
}

/// Deferred cache write for a freshly compressed file.
struct Pending {
    relative: String,
    source_hash: String,
    params_hash: String,
    bytes: Option<Vec<u8>>,
}

/// Every file under `dir` with a known image format, sorted.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>, ImageError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| ImageError::Scan {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;
        if entry.file_type().is_file() && ImageKind::from_path(entry.path()).is_some() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Compress every image under `input_dir` into `output_dir`.
///
/// `input_dir` and `output_dir` may be the same directory, in which case
/// images are compressed in place. The cache is saved before returning.
pub fn compress_tree(
    input_dir: &Path,
    output_dir: &Path,
    codecs: &CodecSet,
    cache: &mut CompressionCache,
    progress: Option<Sender<ImageEvent>>,
) -> Result<ImageReport, ImageError> {
    let files = collect_images(input_dir)?;
    let shared: &CompressionCache = cache;

    let results: Vec<(ImageEvent, Option<Pending>)> = files
        .par_iter()
        .map_with(progress, |progress, path| {
            let relative = path
                .strip_prefix(input_dir)
                .map(manifest_key)
                .unwrap_or_else(|_| path.display().to_string());
            let (outcome, pending) =
                match compress_one(path, &output_dir.join(&relative), &relative, codecs, shared) {
                    Ok(done) => done,
                    Err(message) => {
                        tracing::warn!(file = %path.display(), %message, "image skipped");
                        (ImageOutcome::Failed(message), None)
                    }
                };
            let event = ImageEvent {
                path: relative,
                outcome,
            };
            if let Some(tx) = progress {
                tx.send(event.clone()).ok();
            }
            (event, pending)
        })
        .collect();

    let mut report = ImageReport::default();
    for (event, pending) in results {
        match &event.outcome {
            ImageOutcome::Cached => report.stats.hit(),
            ImageOutcome::Copied => report.stats.copy(),
            ImageOutcome::Compressed { .. } => report.stats.miss(),
            ImageOutcome::Failed(_) => report.stats.fail(),
        }
        if let Some(p) = pending {
            match p.bytes {
                Some(bytes) => cache.store(p.relative, p.source_hash, p.params_hash, &bytes)?,
                None => cache.record(p.relative, p.source_hash, p.params_hash),
            }
        }
        report.events.push(event);
    }
    cache.save()?;
    Ok(report)
}

fn compress_one(
    source: &Path,
    output: &Path,
    relative: &str,
    codecs: &CodecSet,
    cache: &CompressionCache,
) -> Result<(ImageOutcome, Option<Pending>), String> {
    let kind = ImageKind::from_path(source).ok_or("unsupported format")?;
    let input = fs::read(source).map_err(|e| format!("read failed: {e}"))?;
    let Some(chain) = codecs.chain(kind) else {
        write_output(output, &input)?;
        return Ok((
            ImageOutcome::Compressed {
                before: input.len() as u64,
                after: input.len() as u64,
            },
            None,
        ));
    };

    let source_hash = hash_bytes(&input);
    let params_hash = chain.params_hash().to_string();
    let pending = |bytes| Pending {
        relative: relative.to_string(),
        source_hash: source_hash.clone(),
        params_hash: params_hash.clone(),
        bytes,
    };

    match cache.lookup(relative, &source_hash, &params_hash) {
        Lookup::Hit(blob) => {
            copy_blob(&blob, output)?;
            Ok((ImageOutcome::Cached, None))
        }
        Lookup::Copy(blob) => {
            copy_blob(&blob, output)?;
            Ok((ImageOutcome::Copied, Some(pending(None))))
        }
        Lookup::Miss => {
            let compressed = chain.run(&input).map_err(|e| e.to_string())?;
            write_output(output, &compressed)?;
            let outcome = ImageOutcome::Compressed {
                before: input.len() as u64,
                after: compressed.len() as u64,
            };
            Ok((outcome, Some(pending(Some(compressed)))))
        }
    }
}

fn write_output(output: &Path, bytes: &[u8]) -> Result<(), String> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("create dir failed: {e}"))?;
    }
    fs::write(output, bytes).map_err(|e| format!("write failed: {e}"))
}

fn copy_blob(blob: &Path, output: &Path) -> Result<(), String> {
    let bytes = fs::read(blob).map_err(|e| format!("cache read failed: {e}"))?;
    write_output(output, &bytes)
}
