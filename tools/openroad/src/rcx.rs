//! Parasitic extraction with OpenRCX.

use arcstr::ArcStr;
use config::{Value, Variable};
use flow::corner::{corner_dirs, filter_config_paths, pick_one};
use flow::pool::run_all;
use flow::{Delta, DesignView, Metrics, PipelineState, Result, Step, StepContext};
use indexmap::IndexMap;

use crate::script::{Program, ScriptRun, aggregate_timing, base_env, script_path};
use crate::vars::{openroad_variables, rcx_variables};

const INPUTS: &[DesignView] = &[DesignView::Def];
const OUTPUTS: &[DesignView] = &[DesignView::Spef];

/// Extracts one SPEF file per corner pattern of `RCX_RULESETS`.
#[derive(Clone, Debug)]
pub struct Rcx {
    vars: Vec<Variable>,
}

impl Default for Rcx {
    fn default() -> Self {
        Self::new()
    }
}

impl Rcx {
    /// Creates the step.
    pub fn new() -> Self {
        let mut vars = openroad_variables();
        vars.extend(rcx_variables());
        Self { vars }
    }
}

impl Step for Rcx {
    fn id(&self) -> &str {
        "OpenROAD.RCX"
    }

    fn name(&self) -> &str {
        "Parasitics (RC) Extraction"
    }

    fn inputs(&self) -> &[DesignView] {
        INPUTS
    }

    fn outputs(&self) -> &[DesignView] {
        OUTPUTS
    }

    fn config_vars(&self) -> &[Variable] {
        &self.vars
    }

    fn run(&self, ctx: &StepContext, state: &PipelineState) -> Result<Delta> {
        let config = ctx.config.clone();
        let design = ArcStr::from(config.str("DESIGN_NAME")?);
        let rulesets = config
            .dict("RCX_RULESETS")?
            .iter()
            .filter_map(|(pattern, ruleset)| match ruleset {
                Value::Path(path) => Some((pattern.clone(), path.clone())),
                _ => None,
            })
            .collect::<IndexMap<_, _>>();
        let patterns = rulesets.keys().cloned().collect::<Vec<_>>();
        let tech_lefs = config.get("TECH_LEFS").cloned().unwrap_or(Value::Absent);

        // SAVE_SPEF is set per corner.
        let env = base_env(&config, &self.vars, state, self.inputs(), &[], &ctx.step_dir)?;
        let script = script_path(&config, "rcx.tcl")?;
        let dirs = corner_dirs(&patterns);
        let step_dir = ctx.step_dir.clone();
        let runner = ctx.runner.clone();
        let per_corner = run_all(&ctx.pool, &patterns, move |corner| {
            let sanitized = &dirs[&corner];
            let dir = step_dir.join(sanitized);
            let tech_lef = pick_one(filter_config_paths(&tech_lefs, &corner), &corner, "tech LEF")?;
            let spef = dir.join(format!("{design}.{sanitized}.spef"));

            let mut env = env.clone();
            env.insert("RCX_LEF".into(), tech_lef.display().to_string());
            env.insert("RCX_RULESET".into(), rulesets[&corner].display().to_string());
            env.insert("SAVE_SPEF".into(), spef.display().to_string());

            let run = ScriptRun {
                program: Program::OpenRoad,
                script: script.clone(),
                dir,
                log: "rcx.log",
                env,
            };
            let metrics = run.execute(runner.as_ref())?;
            tracing::info!("finished extraction for {corner}");
            Ok((spef, metrics))
        })?;

        let mut metrics = Metrics::new();
        let mut spefs = IndexMap::new();
        for (corner, (spef, corner_metrics)) in per_corner {
            metrics.update(&corner_metrics);
            spefs.insert(corner, spef);
        }

        let mut delta = Delta::new();
        delta.views.insert(DesignView::Spef, spefs.into());
        delta.metrics = aggregate_timing(&metrics)?;
        Ok(delta)
    }
}
