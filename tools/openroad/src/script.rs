//! Running OpenROAD and OpenSTA scripts.

use std::fs;
use std::os::unix::prelude::PermissionsExt;
use std::path::{Path, PathBuf};

use config::{Config, Variable};
use flow::corner::filter_config_paths;
use flow::metrics::{TIMING_AGGREGATION, aggregate};
use flow::vars::flow_variables;
use flow::{Delta, DesignView, Invocation, Metrics, PipelineState, Result, ToolRunner};
use indexmap::IndexMap;
use serde::Serialize;

use crate::TEMPLATES;

/// The metrics file written by every tool run.
pub const METRICS_FILE: &str = "or_metrics_out.json";

/// The name of the reproducer script written next to every tool run.
pub const RUN_SCRIPT: &str = "run.sh";

/// The binary a script is run with.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum Program {
    /// `openroad`, which writes metrics through its `-metrics` flag.
    OpenRoad,
    /// Standalone `sta`, whose scripts write metrics to `SAVE_METRICS`.
    OpenSta,
}

/// Returns the path of a script bundled under `SCRIPTS_DIR`.
pub fn script_path(config: &Config, name: &str) -> Result<PathBuf> {
    Ok(Path::new(config.str("SCRIPTS_DIR")?).join("openroad").join(name))
}

/// Where a step writes its scalar output `view`.
pub fn output_path(dir: &Path, design: &str, view: DesignView) -> PathBuf {
    dir.join(format!("{design}.{}", view.extension()))
}

/// The timing libraries that apply to `corner`.
pub fn corner_libs(config: &Config, corner: &str) -> Vec<PathBuf> {
    config
        .get("LIB")
        .map(|libs| filter_config_paths(libs, corner))
        .unwrap_or_default()
}

/// Joins paths with single spaces.
pub fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the environment common to every OpenROAD script.
///
/// Holds the set values of the flow variables and of `vars`,
/// `CURRENT_<VIEW>` for scalar inputs, `SAVE_<VIEW>` for scalar outputs,
/// the PnR constraints and libraries, and the cells excluded from PnR.
pub fn base_env(
    config: &Config,
    vars: &[Variable],
    state: &PipelineState,
    inputs: &[DesignView],
    outputs: &[DesignView],
    dir: &Path,
) -> Result<IndexMap<String, String>> {
    let mut exported = flow_variables();
    exported.extend_from_slice(vars);
    let mut env = config
        .filtered(&exported)
        .env()
        .map(|(name, value)| (name.to_string(), value))
        .collect::<IndexMap<_, _>>();

    for view in inputs {
        if let Some(path) = state.path(*view) {
            env.insert(
                format!("CURRENT_{}", view.env_name()),
                path.display().to_string(),
            );
        }
    }
    let design = config.str("DESIGN_NAME")?;
    for view in outputs.iter().filter(|view| !view.is_per_corner()) {
        env.insert(
            format!("SAVE_{}", view.env_name()),
            output_path(dir, design, *view).display().to_string(),
        );
    }

    let sdc = match config.opt_path("PNR_SDC_FILE")? {
        Some(sdc) => Some(sdc),
        None => config.opt_path("FALLBACK_SDC_FILE")?,
    };
    if let Some(sdc) = sdc {
        env.insert("SDC_IN".into(), sdc.display().to_string());
    }

    let libs = corner_libs(config, config.str("DEFAULT_CORNER")?);
    env.insert("PNR_LIBS".into(), join_paths(&libs));

    let excluded = fs::read_to_string(config.path("PNR_EXCLUSION_CELL_LIST")?)?;
    env.insert(
        "PNR_EXCLUDED_CELLS".into(),
        excluded.split_whitespace().collect::<Vec<_>>().join(" "),
    );
    Ok(env)
}

/// One run of a script in a working directory.
#[derive(Clone, Debug)]
pub struct ScriptRun {
    /// The binary.
    pub program: Program,
    /// The script passed to the binary.
    pub script: PathBuf,
    /// The working directory, which also receives the log and metrics.
    pub dir: PathBuf,
    /// The log file name.
    pub log: &'static str,
    /// The environment of the tool.
    pub env: IndexMap<String, String>,
}

impl ScriptRun {
    /// The path the tool writes metrics to.
    pub fn metrics_path(&self) -> PathBuf {
        self.dir.join(METRICS_FILE)
    }

    /// The command line and environment of the run.
    pub fn invocation(&self) -> Invocation {
        let metrics = self.metrics_path().display().to_string();
        let script = self.script.display().to_string();
        let mut env = self.env.clone();
        let command = match self.program {
            Program::OpenRoad => vec![
                "openroad".to_string(),
                "-exit".to_string(),
                "-no_splash".to_string(),
                "-metrics".to_string(),
                metrics,
                script,
            ],
            Program::OpenSta => {
                env.insert("SAVE_METRICS".into(), metrics);
                vec![
                    "sta".to_string(),
                    "-no_splash".to_string(),
                    "-exit".to_string(),
                    script,
                ]
            }
        };
        Invocation {
            command,
            env,
            work_dir: self.dir.clone(),
            log: self.dir.join(self.log),
        }
    }

    /// Writes the reproducer script, runs the tool and loads its metrics.
    ///
    /// A run that writes no metrics file yields no metrics.
    pub fn execute(&self, runner: &dyn ToolRunner) -> Result<Metrics> {
        fs::create_dir_all(&self.dir)?;
        let invocation = self.invocation();
        write_run_script(&invocation)?;
        runner.run(&invocation)?;

        let metrics_path = self.metrics_path();
        if metrics_path.exists() {
            Metrics::load_json(&metrics_path)
        } else {
            tracing::debug!(path = %metrics_path.display(), "no metrics written");
            Ok(Metrics::new())
        }
    }
}

#[derive(Serialize)]
struct EnvVar<'a> {
    name: &'a str,
    value: String,
}

#[derive(Serialize)]
struct RunScriptContext<'a> {
    work_dir: String,
    env: Vec<EnvVar<'a>>,
    command: String,
}

/// Renders a shell script that repeats `invocation`.
pub fn write_run_script(invocation: &Invocation) -> Result<PathBuf> {
    let path = invocation.work_dir.join(RUN_SCRIPT);
    let context = RunScriptContext {
        work_dir: quote(&invocation.work_dir.display().to_string()),
        env: invocation
            .env
            .iter()
            .map(|(name, value)| EnvVar {
                name,
                value: quote(value),
            })
            .collect(),
        command: invocation
            .command
            .iter()
            .map(|arg| quote(arg))
            .collect::<Vec<_>>()
            .join(" "),
    };
    let contents = TEMPLATES
        .render(
            RUN_SCRIPT,
            &tera::Context::from_serialize(&context).map_err(flow::Error::template)?,
        )
        .map_err(flow::Error::template)?;
    fs::write(&path, contents)?;

    let mut perms = fs::metadata(&path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms)?;

    Ok(path)
}

/// Quotes `value` for a POSIX shell.
pub fn quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=@%+,".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Collects the scalar outputs a run left in `dir`.
pub fn collect_outputs(dir: &Path, design: &str, outputs: &[DesignView]) -> Delta {
    let mut delta = Delta::new();
    for view in outputs.iter().filter(|view| !view.is_per_corner()) {
        let path = output_path(dir, design, *view);
        if path.exists() {
            delta.views.insert(*view, path.into());
        }
    }
    delta
}

/// Adds cross-corner aggregates to `metrics`.
pub fn aggregate_timing(metrics: &Metrics) -> Result<Metrics> {
    aggregate(metrics, &TIMING_AGGREGATION)
}
