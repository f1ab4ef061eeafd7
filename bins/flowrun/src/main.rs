use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use config::{RawConfig, UnknownKeyPolicy};
use flow::{PipelineState, RunOptions, SequentialFlow, Subprocess, WorkerPool};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match flowrun(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Arguments to [`flowrun`].
#[derive(Parser)]
#[command(version, about, long_about = "Run a sequence of physical design steps")]
pub struct Args {
    /// Print the registered steps and exit.
    #[arg(long)]
    list_steps: bool,

    /// PDK defaults, as a JSON or TOML file.
    ///
    /// Values in the design configuration take precedence.
    #[arg(long)]
    pdk_defaults: Option<PathBuf>,

    /// The directory step directories are created in.
    #[arg(long, default_value = "runs/flowrun")]
    run_dir: PathBuf,

    /// The number of worker threads for corner-parallel steps.
    ///
    /// Defaults to the host's parallelism.
    #[arg(long)]
    threads: Option<usize>,

    /// Overrides a design configuration value.
    #[arg(long = "override", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// A step to run, by id. Steps run in the order given.
    #[arg(long = "step", value_name = "ID", required_unless_present = "list_steps")]
    steps: Vec<String>,

    /// The design configuration, as a JSON or TOML file.
    #[arg(required_unless_present = "list_steps")]
    config: Option<PathBuf>,
}

/// Resolves the configuration and runs the requested steps.
pub fn flowrun(args: Args) -> anyhow::Result<()> {
    let registry = openroad::registry()?;

    if args.list_steps {
        for id in registry.ids() {
            let step = registry.create(id)?;
            println!("{id}\t{}", step.name());
        }
        return Ok(());
    }

    let Some(config_path) = args.config else {
        bail!("no design configuration given");
    };
    let mut design = RawConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    for directive in &args.overrides {
        design.apply_override(directive)?;
    }
    let pdk = match args.pdk_defaults {
        Some(path) => RawConfig::load(&path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => RawConfig::new(),
    };

    let flow = SequentialFlow::from_ids(&registry, &args.steps)?;
    // Unknown keys are errors for designs with `meta.version` 2 or later.
    let config = flow
        .resolve(&design, &pdk, UnknownKeyPolicy::Warn)
        .context("invalid configuration")?;

    let pool = match args.threads {
        Some(n) => WorkerPool::new(n),
        None => WorkerPool::with_available_parallelism(),
    };
    let options = RunOptions {
        run_dir: args.run_dir,
        pool: Arc::new(pool),
        runner: Arc::new(Subprocess),
    };
    tracing::info!(steps = ?flow, dir = %options.run_dir.display(), "starting flow");

    let state = flow.run(Arc::new(config), PipelineState::new(), &options)?;

    for (name, value) in state.metrics().iter() {
        println!("{name}: {value}");
    }
    Ok(())
}
