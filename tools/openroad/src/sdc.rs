//! Checks on the constraint files.

use config::Variable;
use flow::{Delta, DesignView, PipelineState, Result, Step, StepContext};

use crate::vars::{pnr_sdc_file, signoff_sdc_file};

/// Warns about SDC variables that fall back to `FALLBACK_SDC_FILE`.
///
/// Runs no tool.
#[derive(Clone, Debug)]
pub struct CheckSdcFiles {
    vars: Vec<Variable>,
}

impl Default for CheckSdcFiles {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckSdcFiles {
    /// Creates the step.
    pub fn new() -> Self {
        Self {
            vars: vec![pnr_sdc_file(), signoff_sdc_file()],
        }
    }
}

impl Step for CheckSdcFiles {
    fn id(&self) -> &str {
        "OpenROAD.CheckSDCFiles"
    }

    fn name(&self) -> &str {
        "Check SDC Files"
    }

    fn inputs(&self) -> &[DesignView] {
        &[]
    }

    fn outputs(&self) -> &[DesignView] {
        &[]
    }

    fn config_vars(&self) -> &[Variable] {
        &self.vars
    }

    fn run(&self, ctx: &StepContext, _state: &PipelineState) -> Result<Delta> {
        let fallback = if ctx.config.is_set("FALLBACK_SDC_FILE") {
            "user-defined"
        } else {
            "generic"
        };
        for var in ["PNR_SDC_FILE", "SIGNOFF_SDC_FILE"] {
            if !ctx.config.is_set(var) {
                tracing::warn!("{var} is not defined, using the {fallback} fallback SDC");
            }
        }
        Ok(Delta::new())
    }
}
