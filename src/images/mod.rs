//! Production image handling.
//!
//! Two postbuild stages, always in this order:
//!
//! 1. [`CopyImagesStage`]: literal copies of every source image into the
//!    image destination, alongside whatever revisioned copies the engine
//!    wrote.
//! 2. [`CompressImagesStage`]: compress the whole image destination in
//!    place, through the persistent cache.
//!
//! The same pipeline backs the on-demand `images` command.

pub mod codec;
pub mod copy;
pub mod pipeline;

pub use codec::{Codec, CodecChain, CodecError, CodecSet, ImageKind};
pub use copy::{CopyReport, copy_literal_images};
pub use pipeline::{ImageError, ImageEvent, ImageOutcome, ImageReport, compress_tree};

use crate::cache::CompressionCache;
use crate::context::BuildContext;
use crate::manifest::AssetManifest;
use crate::stage::{Stage, StageError};

/// Open the image cache for a run; `use_cache = false` ignores past results.
pub fn open_cache(ctx: &BuildContext, use_cache: bool) -> CompressionCache {
    if use_cache {
        CompressionCache::open(&ctx.paths().cache_dir)
    } else {
        CompressionCache::fresh(&ctx.paths().cache_dir)
    }
}

pub struct CopyImagesStage;

impl Stage for CopyImagesStage {
    fn name(&self) -> &'static str {
        "copy-images"
    }

    fn run(&self, ctx: &BuildContext) -> Result<(), StageError> {
        let paths = ctx.paths();
        let manifest = AssetManifest::load(&paths.dest_root)?;
        let report = copy_literal_images(
            &paths.images_src,
            &paths.images_dest,
            &paths.dest_root,
            manifest.as_ref(),
        )?;
        tracing::debug!(copied = report.copied, skipped = report.skipped, "literal images");
        Ok(())
    }
}

pub struct CompressImagesStage {
    pub use_cache: bool,
}

impl Stage for CompressImagesStage {
    fn name(&self) -> &'static str {
        "compress-images"
    }

    fn run(&self, ctx: &BuildContext) -> Result<(), StageError> {
        let dir = &ctx.paths().images_dest;
        let codecs = CodecSet::from_config(&ctx.config().images);
        let mut cache = open_cache(ctx, self.use_cache);
        let report = compress_tree(dir, dir, &codecs, &mut cache, None)?;
        tracing::info!("images: {}", report.stats);
        Ok(())
    }
}
