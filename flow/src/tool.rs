//! Invoking external tools.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// One run of an external tool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Invocation {
    /// The program followed by its arguments.
    pub command: Vec<String>,
    /// Environment variables set on top of the inherited environment.
    pub env: IndexMap<String, String>,
    /// The working directory.
    pub work_dir: PathBuf,
    /// The file that receives both stdout and stderr.
    pub log: PathBuf,
}

impl Invocation {
    /// The command as a single shell-like string.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Runs external tools.
///
/// Tests substitute an implementation that fakes the tool's outputs.
pub trait ToolRunner: Send + Sync {
    /// Runs `invocation` to completion.
    ///
    /// Fails with [`Error::ExternalTool`] if the tool exits unsuccessfully.
    fn run(&self, invocation: &Invocation) -> Result<()>;
}

/// Runs tools as child processes.
#[derive(Copy, Clone, Debug, Default)]
pub struct Subprocess;

impl ToolRunner for Subprocess {
    fn run(&self, invocation: &Invocation) -> Result<()> {
        let Some((program, args)) = invocation.command.split_first() else {
            return Err(Error::Io(std::sync::Arc::new(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty command",
            ))));
        };
        if let Some(parent) = invocation.log.parent() {
            fs::create_dir_all(parent)?;
        }
        let log = fs::File::create(&invocation.log)?;
        let err = log.try_clone()?;

        tracing::info!(command = %invocation.command_line(), "running external tool");
        let status = Command::new(program)
            .args(args)
            .envs(&invocation.env)
            .current_dir(&invocation.work_dir)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(err)
            .status()?;

        if !status.success() {
            return Err(Error::ExternalTool {
                command: invocation.command_line(),
                status,
                log: invocation.log.clone(),
            });
        }
        Ok(())
    }
}
