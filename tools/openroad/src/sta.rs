//! Static timing analysis with OpenSTA.

use std::fs;
use std::path::{Path, PathBuf};

use arcstr::ArcStr;
use config::Variable;
use flow::corner::{corner_dirs, filter_view_paths, pick_one};
use flow::pool::run_all;
use flow::summary::TimingSummary;
use flow::{Delta, DesignView, Error, Metrics, PipelineState, Result, Step, StepContext};
use indexmap::IndexMap;

use crate::script::{
    Program, ScriptRun, aggregate_timing, base_env, collect_outputs, corner_libs, join_paths,
    script_path,
};
use crate::vars::{openroad_variables, signoff_sdc_file, sta_variables};

/// The script run once per corner.
pub const CORNER_SCRIPT: &str = "sta/corner.tcl";

/// The timing table written by post-PnR STA.
pub const SUMMARY_FILE: &str = "summary.rpt";

const PRE_PNR_INPUTS: &[DesignView] = &[DesignView::Netlist];
const PRE_PNR_OUTPUTS: &[DesignView] = &[DesignView::Sdf, DesignView::Sdc];
const POST_PNR_INPUTS: &[DesignView] = &[DesignView::Netlist, DesignView::Spef, DesignView::Odb];
const POST_PNR_OUTPUTS: &[DesignView] = &[DesignView::Sdf, DesignView::Sdc, DesignView::Lib];

/// STA of the synthesized netlist at the default corner.
#[derive(Clone, Debug)]
pub struct StaPrePnr {
    vars: Vec<Variable>,
}

impl Default for StaPrePnr {
    fn default() -> Self {
        Self::new()
    }
}

impl StaPrePnr {
    /// Creates the step.
    pub fn new() -> Self {
        let mut vars = openroad_variables();
        vars.extend(sta_variables());
        Self { vars }
    }
}

impl Step for StaPrePnr {
    fn id(&self) -> &str {
        "OpenROAD.STAPrePNR"
    }

    fn name(&self) -> &str {
        "STA (Pre-PnR)"
    }

    fn inputs(&self) -> &[DesignView] {
        PRE_PNR_INPUTS
    }

    fn outputs(&self) -> &[DesignView] {
        PRE_PNR_OUTPUTS
    }

    fn config_vars(&self) -> &[Variable] {
        &self.vars
    }

    fn run(&self, ctx: &StepContext, state: &PipelineState) -> Result<Delta> {
        let config = &ctx.config;
        let corner = config.str("DEFAULT_CORNER")?;
        let mut env = base_env(
            config,
            &self.vars,
            state,
            self.inputs(),
            self.outputs(),
            &ctx.step_dir,
        )?;
        env.insert("OPENSTA".into(), "1".into());
        env.insert("CURRENT_CORNER_NAME".into(), corner.to_string());
        env.insert(
            "CURRENT_CORNER_TIMING_VIEWS".into(),
            join_paths(&corner_libs(config, corner)),
        );
        env.insert("SDF_SAVE_DIR".into(), ctx.step_dir.display().to_string());

        let run = ScriptRun {
            program: Program::OpenSta,
            script: script_path(config, CORNER_SCRIPT)?,
            dir: ctx.step_dir.clone(),
            log: "sta.log",
            env,
        };
        let metrics = run.execute(ctx.runner.as_ref())?;

        let mut delta = collect_outputs(&ctx.step_dir, config.str("DESIGN_NAME")?, self.outputs());
        let sdfs = corner_sdfs(&ctx.step_dir)?;
        if !sdfs.is_empty() {
            delta.views.insert(DesignView::Sdf, sdfs.into());
        }
        delta.metrics = aggregate_timing(&metrics)?;
        Ok(delta)
    }
}

/// Collects the `<design>__<corner>.sdf` files of `dir` by corner.
fn corner_sdfs(dir: &Path) -> Result<IndexMap<ArcStr, PathBuf>> {
    let mut paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();

    let mut sdfs = IndexMap::new();
    for path in paths {
        if path.extension().is_none_or(|ext| ext != "sdf") {
            continue;
        }
        let corner = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.split_once("__"))
            .map(|(_, corner)| corner);
        match corner {
            Some(corner) => {
                sdfs.insert(ArcStr::from(corner), path.clone());
            }
            None => tracing::warn!(path = %path.display(), "SDF file name names no corner"),
        }
    }
    Ok(sdfs)
}

/// Multi-corner STA of the routed design with extracted parasitics.
#[derive(Clone, Debug)]
pub struct StaPostPnr {
    vars: Vec<Variable>,
}

impl Default for StaPostPnr {
    fn default() -> Self {
        Self::new()
    }
}

impl StaPostPnr {
    /// Creates the step.
    pub fn new() -> Self {
        let mut vars = openroad_variables();
        vars.extend(sta_variables());
        vars.push(signoff_sdc_file());
        Self { vars }
    }
}

impl Step for StaPostPnr {
    fn id(&self) -> &str {
        "OpenROAD.STAPostPNR"
    }

    fn name(&self) -> &str {
        "STA (Post-PnR)"
    }

    fn inputs(&self) -> &[DesignView] {
        POST_PNR_INPUTS
    }

    fn outputs(&self) -> &[DesignView] {
        POST_PNR_OUTPUTS
    }

    fn config_vars(&self) -> &[Variable] {
        &self.vars
    }

    fn run(&self, ctx: &StepContext, state: &PipelineState) -> Result<Delta> {
        let config = ctx.config.clone();
        let design = ArcStr::from(config.str("DESIGN_NAME")?);
        let corners = config
            .str_list("STA_CORNERS")?
            .into_iter()
            .map(ArcStr::from)
            .collect::<Vec<_>>();
        let spefs = state
            .per_corner(DesignView::Spef)
            .cloned()
            .ok_or(Error::MalformedState {
                view: DesignView::Spef,
                reason: "expected a mapping from corners to files",
            })?;

        let mut env = base_env(
            &config,
            &self.vars,
            state,
            self.inputs(),
            self.outputs(),
            &ctx.step_dir,
        )?;
        env.insert("OPENSTA".into(), "1".into());
        let sdc = match config.opt_path("SIGNOFF_SDC_FILE")? {
            Some(sdc) => Some(sdc),
            None => config.opt_path("FALLBACK_SDC_FILE")?,
        };
        match sdc {
            Some(sdc) => env.insert("SDC_IN".into(), sdc.display().to_string()),
            None => env.shift_remove("SDC_IN"),
        };

        let script = script_path(&config, CORNER_SCRIPT)?;
        let dirs = corner_dirs(&corners);
        let step_dir = ctx.step_dir.clone();
        let runner = ctx.runner.clone();
        let task_dirs = dirs.clone();
        let per_corner = run_all(&ctx.pool, &corners, move |corner| {
            let dir = step_dir.join(&task_dirs[&corner]);
            let spef = pick_one(filter_view_paths(&spefs, &corner), &corner, "SPEF")?;

            let mut env = env.clone();
            env.insert("CURRENT_CORNER_NAME".into(), corner.to_string());
            env.insert("LIB_SAVE_DIR".into(), dir.display().to_string());
            env.insert("SDF_SAVE_DIR".into(), dir.display().to_string());
            env.insert(
                "CURRENT_SPEF_BY_CORNER".into(),
                format!("{corner} {}", spef.display()),
            );
            env.insert(
                "CURRENT_CORNER_TIMING_VIEWS".into(),
                join_paths(&corner_libs(&config, &corner)),
            );

            let run = ScriptRun {
                program: Program::OpenSta,
                script: script.clone(),
                dir,
                log: "sta.log",
                env,
            };
            let metrics = run.execute(runner.as_ref())?;
            tracing::info!("finished STA for the {corner} timing corner");
            Ok(metrics)
        })?;

        let mut metrics = Metrics::new();
        for corner_metrics in per_corner.values() {
            metrics.update(corner_metrics);
        }
        let metrics = aggregate_timing(&metrics)?;

        let summary = TimingSummary::new(&metrics, &corners);
        tracing::info!("timing summary:\n{summary}");
        summary.write(ctx.step_dir.join(SUMMARY_FILE))?;

        let corner_files = |extension: &str| {
            corners
                .iter()
                .map(|corner| {
                    let path = ctx
                        .step_dir
                        .join(&dirs[corner])
                        .join(format!("{design}__{corner}.{extension}"));
                    (corner.clone(), path)
                })
                .collect::<IndexMap<_, _>>()
        };
        let mut delta = Delta::new();
        delta.views.insert(DesignView::Lib, corner_files("lib").into());
        delta.views.insert(DesignView::Sdf, corner_files("sdf").into());
        delta.metrics = metrics;
        Ok(delta)
    }
}
