//! Running a sequence of steps.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::{Config, RawConfig, Resolver, UnknownKeyPolicy, Variable, merge_variables};
use serde::Serialize;

use crate::error::Result;
use crate::pool::WorkerPool;
use crate::registry::Registry;
use crate::state::PipelineState;
use crate::step::{Step, StepContext};
use crate::tool::ToolRunner;
use crate::vars::flow_variables;

/// Where and with what a flow runs.
#[derive(Clone)]
pub struct RunOptions {
    /// The directory step directories are created in.
    pub run_dir: PathBuf,
    /// The pool shared by all corner-parallel steps.
    pub pool: Arc<WorkerPool>,
    /// Runs external tools.
    pub runner: Arc<dyn ToolRunner>,
}

/// Steps run one after another, each on the state the previous one produced.
pub struct SequentialFlow {
    steps: Vec<Box<dyn Step>>,
}

impl std::fmt::Debug for SequentialFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|step| step.id()))
            .finish()
    }
}

impl SequentialFlow {
    /// Creates a flow from step instances.
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }

    /// Instantiates the steps registered under `ids`.
    pub fn from_ids<S: AsRef<str>>(registry: &Registry, ids: &[S]) -> Result<Self> {
        let steps = ids
            .iter()
            .map(|id| registry.create(id.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(steps))
    }

    /// The steps, in execution order.
    pub fn steps(&self) -> &[Box<dyn Step>] {
        &self.steps
    }

    /// Every variable read by the flow or any of its steps.
    pub fn variables(&self) -> Result<Vec<Variable>> {
        let common = flow_variables();
        let families = std::iter::once(common.as_slice())
            .chain(self.steps.iter().map(|step| step.config_vars()));
        Ok(merge_variables(families)?)
    }

    /// Resolves the configuration of all steps at once.
    ///
    /// Non-fatal issues are logged.
    pub fn resolve(
        &self,
        design: &RawConfig,
        pdk: &RawConfig,
        unknown_keys: UnknownKeyPolicy,
    ) -> Result<Config> {
        let variables = self.variables()?;
        let (config, issues) = Resolver::new(&variables)
            .unknown_keys(unknown_keys)
            .resolve(design, pdk)?;
        issues.log();
        Ok(config)
    }

    /// Runs every step, returning the final state.
    ///
    /// Each step gets a `NN-<id>` directory holding its configuration and
    /// its input and output states. The flow stops at the first failing
    /// step, leaving its directory in place.
    pub fn run(
        &self,
        config: Arc<Config>,
        initial: PipelineState,
        options: &RunOptions,
    ) -> Result<PipelineState> {
        let mut state = initial;
        for (i, step) in self.steps.iter().enumerate() {
            let step_dir = options.run_dir.join(step_dir_name(i + 1, step.id()));
            fs::create_dir_all(&step_dir)?;
            write_json(step_dir.join("config.json"), &config.filtered(step.config_vars()))?;
            state.save(step_dir.join("state_in.json"))?;

            let ctx = StepContext {
                config: config.clone(),
                step_dir: step_dir.clone(),
                pool: options.pool.clone(),
                runner: options.runner.clone(),
            };
            state = step.execute(&ctx, &state).apply(&state).inspect_err(|_| {
                tracing::error!(
                    step = step.id(),
                    dir = %step_dir.display(),
                    "flow halted"
                );
            })?;
            state.save(step_dir.join("state_out.json"))?;
        }
        Ok(state)
    }
}

/// The directory name of the `ordinal`-th step.
pub fn step_dir_name(ordinal: usize, id: &str) -> String {
    let slug = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>();
    format!("{ordinal:02}-{slug}")
}

fn write_json(path: impl AsRef<Path>, value: &impl Serialize) -> Result<()> {
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}
