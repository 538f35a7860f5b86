//! Persistent image compression cache.
//!
//! Running every image through its codec chain on every release is the slow
//! part of a production build. This module lets the compression stage
//! restore a previous result when neither the image nor the codec settings
//! have changed.
//!
//! # Design
//!
//! ## Cache keys
//!
//! An entry is keyed by the image's path relative to the pipeline input and
//! records two fingerprints:
//!
//! - **`source_hash`**: SHA-256 of the input file. Content-based rather than
//!   mtime-based so it survives `git checkout`.
//! - **`params_hash`**: SHA-256 of the codec chain description for the
//!   image's format. Changing e.g. `jpeg_quality` invalidates every JPEG.
//!
//! Compressed bytes are stored as blobs named by both hashes, so identical
//! content at two paths (a literal copy next to its revisioned twin) is
//! encoded once. A lookup can therefore be:
//!
//! - a **hit**: this path's entry matches both hashes and the blob exists;
//! - a **copy**: no matching entry for this path, but a blob for the same
//!   content and parameters exists;
//! - a **miss**: the codecs must run. The new result overwrites the entry.
//!
//! Stale entries are never detected automatically. `assetline clear-cache`
//! deletes the whole cache directory.
//!
//! ## Storage
//!
//! ```text
//! .assetline-cache/
//! └── images/
//!     ├── .cache-manifest.json
//!     └── blobs/<source_hash>-<params_hash>
//! ```

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache manifest file within the cache directory.
const MANIFEST_FILENAME: &str = ".cache-manifest.json";

/// Subdirectory of the cache root owned by the image pipeline.
const IMAGES_SUBDIR: &str = "images";

/// Version of the cache manifest format. Bump this to invalidate all
/// existing caches when the format or key computation changes.
const MANIFEST_VERSION: u32 = 1;

/// Fingerprints recorded for one input path.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_hash: String,
    pub params_hash: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct CacheManifest {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

impl CacheManifest {
    fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
        }
    }

    /// Returns an empty manifest if the file doesn't exist or can't be
    /// parsed (version mismatch, corruption).
    fn load(dir: &Path) -> Self {
        let content = match fs::read_to_string(dir.join(MANIFEST_FILENAME)) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(m) if m.version == MANIFEST_VERSION => m,
            _ => Self::empty(),
        }
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Hit(PathBuf),
    Copy(PathBuf),
    Miss,
}

/// On-disk compression cache rooted at `<cache_dir>/images`.
#[derive(Debug)]
pub struct CompressionCache {
    dir: PathBuf,
    manifest: CacheManifest,
}

impl CompressionCache {
    /// Open the cache under `cache_root`, loading any previous manifest.
    pub fn open(cache_root: &Path) -> Self {
        let dir = cache_root.join(IMAGES_SUBDIR);
        let manifest = CacheManifest::load(&dir);
        Self { dir, manifest }
    }

    /// A cache that ignores previous runs (used for `--no-cache`).
    /// Results are still written, so the next cached run benefits.
    pub fn fresh(cache_root: &Path) -> Self {
        Self {
            dir: cache_root.join(IMAGES_SUBDIR),
            manifest: CacheManifest::empty(),
        }
    }

    pub fn len(&self) -> usize {
        self.manifest.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.entries.is_empty()
    }

    pub fn entry(&self, relative: &str) -> Option<&CacheEntry> {
        self.manifest.entries.get(relative)
    }

    fn blob_path(&self, source_hash: &str, params_hash: &str) -> PathBuf {
        self.dir
            .join("blobs")
            .join(format!("{source_hash}-{params_hash}"))
    }

    pub fn lookup(&self, relative: &str, source_hash: &str, params_hash: &str) -> Lookup {
        let blob = self.blob_path(source_hash, params_hash);
        if !blob.is_file() {
            return Lookup::Miss;
        }
        let expected = CacheEntry {
            source_hash: source_hash.to_string(),
            params_hash: params_hash.to_string(),
        };
        match self.manifest.entries.get(relative) {
            Some(entry) if *entry == expected => Lookup::Hit(blob),
            _ => Lookup::Copy(blob),
        }
    }

    /// Store compressed bytes and point `relative`'s entry at them,
    /// replacing whatever the entry held before.
    pub fn store(
        &mut self,
        relative: String,
        source_hash: String,
        params_hash: String,
        compressed: &[u8],
    ) -> io::Result<()> {
        let blob = self.blob_path(&source_hash, &params_hash);
        if let Some(parent) = blob.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&blob, compressed)?;
        self.record(relative, source_hash, params_hash);
        Ok(())
    }

    /// Point `relative`'s entry at an existing blob.
    pub fn record(&mut self, relative: String, source_hash: String, params_hash: String) {
        self.manifest.entries.insert(
            relative,
            CacheEntry {
                source_hash,
                params_hash,
            },
        );
    }

    pub fn save(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(&self.manifest)?;
        fs::write(self.dir.join(MANIFEST_FILENAME), json)
    }
}

/// Delete every cached result. Returns `false` if there was nothing to clear.
pub fn clear(cache_root: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(cache_root) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(hash_bytes(&bytes))
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 of a codec chain, from each codec's parameter description.
pub fn hash_codec_params<'a>(descriptions: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"codec-chain\0");
    for d in descriptions {
        hasher.update(d.as_bytes());
        hasher.update(b"\0");
    }
    format!("{:x}", hasher.finalize())
}

/// Summary of cache performance for one compression run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub copies: u32,
    pub misses: u32,
    pub failures: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn copy(&mut self) {
        self.copies += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn fail(&mut self) {
        self.failures += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.copies + self.misses + self.failures
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 || self.copies > 0 {
            write!(f, "{} cached, ", self.hits)?;
            if self.copies > 0 {
                write!(f, "{} copied, ", self.copies)?;
            }
            write!(f, "{} compressed", self.misses)?;
        } else {
            write!(f, "{} compressed", self.misses)?;
        }
        if self.failures > 0 {
            write!(f, ", {} failed", self.failures)?;
        }
        if self.hits > 0 || self.copies > 0 || self.failures > 0 {
            write!(f, " ({} total)", self.total())?;
        }
        Ok(())
    }
}
