//! Error types and error handling utilities.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;

use arcstr::ArcStr;

use crate::view::DesignView;

/// A result type returning flow errors.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type for flow functions.
///
/// Errors are cheap to clone so that a corner task's result can be observed
/// through a shared task handle.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// The configuration is missing, invalid or conflicting.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// A view changed between single-file and per-corner form.
    #[error("malformed state: view `{view}` {reason}")]
    MalformedState {
        /// The offending view.
        view: DesignView,
        /// What was wrong with it.
        reason: &'static str,
    },
    /// A step requires a view that the input state does not have.
    #[error("step `{step}` requires the `{view}` view, which is not in the input state")]
    MissingInput {
        /// The step id.
        step: ArcStr,
        /// The missing view.
        view: DesignView,
    },
    /// An external tool exited unsuccessfully.
    #[error("`{command}` failed with {status}, see `{}`", .log.display())]
    ExternalTool {
        /// The command that was run.
        command: String,
        /// Its exit status.
        status: ExitStatus,
        /// The log holding its output.
        log: PathBuf,
    },
    /// No input artifact is compatible with a corner.
    #[error("no {what} compatible with corner `{corner}` found")]
    CornerResolution {
        /// The corner being resolved.
        corner: ArcStr,
        /// The kind of artifact that was looked for.
        what: &'static str,
    },
    /// An external report or metrics file did not have the expected format.
    #[error("unexpected format in `{}`: {message}", .path.display())]
    ReportFormat {
        /// The report.
        path: PathBuf,
        /// What was expected.
        message: String,
    },
    /// Adding `+∞` and `-∞` while aggregating a metric.
    #[error("metric `{metric}` sums positive and negative infinity")]
    UndefinedMetric {
        /// The metric name.
        metric: ArcStr,
    },
    /// A sum of finite values left the decimal range while aggregating a metric.
    #[error("metric `{metric}` overflows when summed across corners")]
    MetricOverflow {
        /// The metric name.
        metric: ArcStr,
    },
    /// Two steps were registered under the same id.
    #[error("a step with id `{0}` is already registered")]
    DuplicateStep(ArcStr),
    /// No step is registered under the requested id.
    #[error("no step with id `{0}` is registered")]
    UnknownStep(ArcStr),
    /// An I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] Arc<std::io::Error>),
    /// A JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] Arc<serde_json::Error>),
    /// A template rendering error.
    #[error("template error: {0}")]
    Template(Arc<dyn std::error::Error + Send + Sync>),
    /// A worker thread panicked.
    #[error("a worker thread panicked")]
    Panic,
    /// The worker pool is no longer accepting tasks.
    #[error("the worker pool has shut down")]
    PoolClosed,
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(Arc::new(value))
    }
}

impl Error {
    /// Wraps a template engine error.
    pub fn template(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Template(Arc::new(err))
    }

    pub(crate) fn report(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ReportFormat {
            path: path.into(),
            message: message.into(),
        }
    }
}
