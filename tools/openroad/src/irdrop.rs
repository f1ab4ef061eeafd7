//! Static IR drop analysis of the power grid.

use config::Variable;
use flow::corner::filter_view_paths;
use flow::report::IrDrop;
use flow::{Delta, DesignView, Error, PipelineState, Result, Step, StepContext};

use crate::script::{Program, ScriptRun, aggregate_timing, base_env, script_path};
use crate::vars::openroad_variables;

/// The report written by the IR drop script.
pub const REPORT_FILE: &str = "irdrop.rpt";

const INPUTS: &[DesignView] = &[DesignView::Odb, DesignView::Spef];

/// Runs IR drop analysis using the SPEF of the default corner.
#[derive(Clone, Debug)]
pub struct IrDropReport {
    vars: Vec<Variable>,
}

impl Default for IrDropReport {
    fn default() -> Self {
        Self::new()
    }
}

impl IrDropReport {
    /// Creates the step.
    pub fn new() -> Self {
        Self {
            vars: openroad_variables(),
        }
    }
}

impl Step for IrDropReport {
    fn id(&self) -> &str {
        "OpenROAD.IRDropReport"
    }

    fn name(&self) -> &str {
        "IR Drop Report"
    }

    fn inputs(&self) -> &[DesignView] {
        INPUTS
    }

    fn outputs(&self) -> &[DesignView] {
        &[]
    }

    fn config_vars(&self) -> &[Variable] {
        &self.vars
    }

    fn run(&self, ctx: &StepContext, state: &PipelineState) -> Result<Delta> {
        let config = &ctx.config;
        let corner = config.str("DEFAULT_CORNER")?;
        let spefs = state
            .per_corner(DesignView::Spef)
            .ok_or(Error::MalformedState {
                view: DesignView::Spef,
                reason: "expected a mapping from corners to files",
            })?;
        let spef = match filter_view_paths(spefs, corner).as_slice() {
            [spef] => spef.clone(),
            [] => {
                return Err(Error::CornerResolution {
                    corner: corner.into(),
                    what: "SPEF",
                });
            }
            _ => {
                return Err(Error::MalformedState {
                    view: DesignView::Spef,
                    reason: "more than one SPEF matches the default corner",
                });
            }
        };

        let mut env = base_env(config, &self.vars, state, self.inputs(), &[], &ctx.step_dir)?;
        env.insert(
            "CURRENT_SPEF_DEFAULT_CORNER".into(),
            spef.display().to_string(),
        );
        let run = ScriptRun {
            program: Program::OpenRoad,
            script: script_path(config, "irdrop.tcl")?,
            dir: ctx.step_dir.clone(),
            log: "openroad.log",
            env,
        };
        let metrics = run.execute(ctx.runner.as_ref())?;

        let report = IrDrop::load(ctx.step_dir.join(REPORT_FILE))?;
        let mut delta = Delta::new();
        delta.metrics = aggregate_timing(&metrics)?;
        delta.metrics.update(&report.metrics());
        Ok(delta)
    }
}
