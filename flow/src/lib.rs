//! The step execution and data-flow engine.
//!
//! A flow threads an immutable [`PipelineState`] through a sequence of
//! [`Step`]s. Steps that analyze several timing corners fan out onto a
//! shared [`WorkerPool`] with [`pool::run_all`] and combine the per-corner
//! metrics with [`metrics::aggregate`].

#![warn(missing_docs)]

pub mod corner;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod registry;
pub mod report;
pub mod state;
pub mod step;
pub mod summary;
pub mod tool;
pub mod vars;
pub mod view;


pub use driver::{RunOptions, SequentialFlow};
pub use error::{Error, Result};
pub use metrics::{MetricValue, Metrics};
pub use pool::{TaskHandle, WorkerPool};
pub use registry::{Registry, RegistryBuilder, StepConstructor};
pub use state::{Delta, PipelineState};
pub use step::{Step, StepContext, StepOutcome};
pub use tool::{Invocation, Subprocess, ToolRunner};
pub use view::{DesignView, ViewValue};
