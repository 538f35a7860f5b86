//! Stage sequencing around the engine's core compile.
//!
//! ```text
//! prebuild stages (in order) → engine compile → postbuild stages (in order) → manifest check
//! ```
//!
//! The first failing stage aborts the run: later stages in its list, and
//! everything after the list, never start. The revision manifest returned
//! by the engine is published before postbuild so the copy stage can read
//! it; a build that revisions nothing removes the previous manifest. Once
//! postbuild has finished, every entry of the manifest on disk is checked
//! against the destination tree.

use crate::context::{BuildContext, Environment};
use crate::engine::{BuildEngine, EngineError};
use crate::manifest::{AssetManifest, ManifestError};
use crate::stage::{Slot, StageError, StagePlan};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("{slot} stage '{name}' failed")]
    Stage {
        slot: Slot,
        name: &'static str,
        #[source]
        source: StageError,
    },
    #[error("Build engine failed: {0}")]
    Engine(#[from] EngineError),
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("Manifest points at missing files: {}", .missing.join(", "))]
    StaleManifest { missing: Vec<String> },
}

/// Progress reported while a build runs.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    StageStarted {
        slot: Slot,
        name: &'static str,
    },
    StageFinished {
        slot: Slot,
        name: &'static str,
        elapsed: Duration,
    },
    StageFailed {
        slot: Slot,
        name: &'static str,
        message: String,
    },
    CompileStarted,
    CompileFinished {
        revisioned: usize,
        elapsed: Duration,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildSummary {
    pub env: Environment,
    pub stages: Vec<(Slot, &'static str)>,
    pub revisioned: usize,
    pub elapsed: Duration,
}

pub struct Orchestrator<'a> {
    plan: StagePlan,
    engine: &'a dyn BuildEngine,
    events: Option<Sender<BuildEvent>>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(plan: StagePlan, engine: &'a dyn BuildEngine) -> Self {
        Self {
            plan,
            engine,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Sender<BuildEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: BuildEvent) {
        if let Some(tx) = &self.events {
            tx.send(event).ok();
        }
    }

    pub fn run(&self, ctx: &BuildContext) -> Result<BuildSummary, BuildError> {
        let started = Instant::now();
        let mut stages = Vec::new();

        self.run_slot(Slot::Prebuild, ctx, &mut stages)?;

        self.emit(BuildEvent::CompileStarted);
        let compile_started = Instant::now();
        let manifest = self.engine.compile(ctx)?;
        let dest_root = &ctx.paths().dest_root;
        manifest.publish(dest_root)?;
        self.emit(BuildEvent::CompileFinished {
            revisioned: manifest.len(),
            elapsed: compile_started.elapsed(),
        });

        self.run_slot(Slot::Postbuild, ctx, &mut stages)?;

        let missing = AssetManifest::load(dest_root)?
            .map(|published| published.missing_entries(dest_root))
            .unwrap_or_default();
        if !missing.is_empty() {
            return Err(BuildError::StaleManifest { missing });
        }

        Ok(BuildSummary {
            env: ctx.env(),
            stages,
            revisioned: manifest.len(),
            elapsed: started.elapsed(),
        })
    }

    fn run_slot(
        &self,
        slot: Slot,
        ctx: &BuildContext,
        ran: &mut Vec<(Slot, &'static str)>,
    ) -> Result<(), BuildError> {
        for stage in self.plan.stages(slot) {
            let name = stage.name();
            self.emit(BuildEvent::StageStarted { slot, name });
            tracing::debug!(%slot, stage = name, "stage start");
            let stage_started = Instant::now();
            if let Err(source) = stage.run(ctx) {
                self.emit(BuildEvent::StageFailed {
                    slot,
                    name,
                    message: source.to_string(),
                });
                return Err(BuildError::Stage { slot, name, source });
            }
            ran.push((slot, name));
            self.emit(BuildEvent::StageFinished {
                slot,
                name,
                elapsed: stage_started.elapsed(),
            });
        }
        Ok(())
    }
}
