//! The step contract.

use std::path::PathBuf;
use std::sync::Arc;

use config::{Config, Variable};

use crate::error::{Error, Result};
use crate::pool::WorkerPool;
use crate::state::{Delta, PipelineState};
use crate::tool::ToolRunner;
use crate::view::DesignView;

/// Everything a step needs besides its input state.
#[derive(Clone)]
pub struct StepContext {
    /// The resolved configuration, shared by all steps of a flow.
    pub config: Arc<Config>,
    /// The step's private working directory.
    pub step_dir: PathBuf,
    /// The pool corner tasks run on.
    pub pool: Arc<WorkerPool>,
    /// Runs external tools.
    pub runner: Arc<dyn ToolRunner>,
}

impl std::fmt::Debug for StepContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepContext")
            .field("step_dir", &self.step_dir)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl StepContext {
    /// Returns a context for a subdirectory of this step's directory.
    pub fn subdir(&self, name: &str) -> Self {
        Self {
            step_dir: self.step_dir.join(name),
            ..self.clone()
        }
    }
}

/// The result of executing a step.
#[derive(Clone, Debug)]
pub enum StepOutcome {
    /// The precondition opted out of work. Holds the reason.
    Skipped(String),
    /// The step ran and produced a delta.
    Succeeded(Delta),
    /// The step failed.
    Failed(Error),
}

impl StepOutcome {
    /// Computes the state that follows `state`.
    ///
    /// A skipped step passes `state` through unchanged.
    pub fn apply(self, state: &PipelineState) -> Result<PipelineState> {
        match self {
            Self::Skipped(_) => Ok(state.clone()),
            Self::Succeeded(delta) => state.merge(&delta),
            Self::Failed(err) => Err(err),
        }
    }

    /// Returns `true` if the step was skipped.
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// One transformation of a [`PipelineState`].
pub trait Step: Send + Sync {
    /// The unique registry id, such as `OpenROAD.Floorplan`.
    fn id(&self) -> &str;

    /// A human-readable name.
    fn name(&self) -> &str;

    /// Views that must be present in the input state.
    fn inputs(&self) -> &[DesignView];

    /// Views the step may produce.
    fn outputs(&self) -> &[DesignView];

    /// Every configuration variable the step reads.
    fn config_vars(&self) -> &[Variable];

    /// Returns a reason to skip the step, or `None` to run it.
    fn precondition(&self, ctx: &StepContext, state: &PipelineState) -> Result<Option<String>> {
        let _ = (ctx, state);
        Ok(None)
    }

    /// Does the work, returning the changes to the state.
    fn run(&self, ctx: &StepContext, state: &PipelineState) -> Result<Delta>;

    /// Checks inputs and the precondition, then runs the step.
    fn execute(&self, ctx: &StepContext, state: &PipelineState) -> StepOutcome {
        let span = tracing::info_span!("step", id = self.id());
        let _guard = span.enter();

        if let Some(&view) = self.inputs().iter().find(|view| !state.contains(**view)) {
            let err = Error::MissingInput {
                step: self.id().into(),
                view,
            };
            tracing::error!("{err}");
            return StepOutcome::Failed(err);
        }

        match self.precondition(ctx, state) {
            Ok(Some(reason)) => {
                tracing::warn!("skipping {}: {reason}", self.name());
                return StepOutcome::Skipped(reason);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::error!("{err}");
                return StepOutcome::Failed(err);
            }
        }

        tracing::info!("running {}", self.name());
        match self.run(ctx, state) {
            Ok(delta) => {
                for view in delta.views.keys().filter(|view| !self.outputs().contains(*view)) {
                    tracing::warn!(view = %view, "step produced an undeclared view");
                }
                StepOutcome::Succeeded(delta)
            }
            Err(err) => {
                tracing::error!("{} failed: {err}", self.name());
                StepOutcome::Failed(err)
            }
        }
    }
}
