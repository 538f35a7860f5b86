//! Stages and the per-environment stage plan.
//!
//! A stage is a named unit of build work that either succeeds or fails.
//! Stages are registered once, as typed handles in ordered lists, one list
//! per [`Slot`]. The plan for each environment is fixed:
//!
//! | Environment | Prebuild | Postbuild |
//! |---|---|---|
//! | development | annotations | (none) |
//! | production | cleanup | copy-images → compress-images → banners |
//!
//! Later stages rely on the side effects of earlier ones: literal image
//! copies must exist before compression rewrites the image tree, and the
//! destination must be flushed before the engine compiles into it.

use crate::annotations::AnnotationStage;
use crate::banner::BannerStage;
use crate::cleanup::CleanupStage;
use crate::context::{BuildContext, Environment};
use crate::images::{CompressImagesStage, CopyImagesStage, ImageError};
use crate::manifest::ManifestError;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image pipeline failed: {0}")]
    Image(#[from] ImageError),
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("{0}")]
    Failed(String),
}

/// When a stage runs relative to the engine's core compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Prebuild,
    Postbuild,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Slot::Prebuild => "prebuild",
            Slot::Postbuild => "postbuild",
        })
    }
}

pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, ctx: &BuildContext) -> Result<(), StageError>;
}

/// Ordered prebuild and postbuild stage lists.
#[derive(Default)]
pub struct StagePlan {
    prebuild: Vec<Box<dyn Stage>>,
    postbuild: Vec<Box<dyn Stage>>,
}

impl StagePlan {
    pub fn new(prebuild: Vec<Box<dyn Stage>>, postbuild: Vec<Box<dyn Stage>>) -> Self {
        Self {
            prebuild,
            postbuild,
        }
    }

    /// The fixed plan for an environment.
    ///
    /// `use_cache` only affects production image compression.
    pub fn for_environment(env: Environment, use_cache: bool) -> Self {
        match env {
            Environment::Development => Self::new(vec![Box::new(AnnotationStage)], Vec::new()),
            Environment::Production => Self::new(
                vec![Box::new(CleanupStage)],
                vec![
                    Box::new(CopyImagesStage),
                    Box::new(CompressImagesStage { use_cache }),
                    Box::new(BannerStage),
                ],
            ),
        }
    }

    pub fn stages(&self, slot: Slot) -> &[Box<dyn Stage>] {
        match slot {
            Slot::Prebuild => &self.prebuild,
            Slot::Postbuild => &self.postbuild,
        }
    }

    pub fn names(&self, slot: Slot) -> Vec<&'static str> {
        self.stages(slot).iter().map(|s| s.name()).collect()
    }
}

impl fmt::Debug for StagePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagePlan")
            .field("prebuild", &self.names(Slot::Prebuild))
            .field("postbuild", &self.names(Slot::Postbuild))
            .finish()
    }
}
