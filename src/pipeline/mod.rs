//! Pipeline orchestration: run requests, progress tracking, per-module
//! supervision, cancellation, and result aggregation.
//!
//! A run flows through the subsystem in one direction: the
//! [`PipelineOrchestrator`] validates a [`RunRequest`] and spawns one
//! [`runner::ModuleRunner`] per selected module; runners report transitions
//! to the shared [`ProgressTracker`]; once every module is terminal the
//! orchestrator folds the run into an [`AggregatedResult`].

pub mod aggregate;
pub mod cancel;
pub mod orchestrator;
pub mod progress;
pub mod runner;
pub mod types;

pub use aggregate::{aggregate, AggregatedResult, ModuleReport, RunOutcome};
pub use cancel::{CancelSignal, CancelToken};
pub use orchestrator::{PipelineError, PipelineOrchestrator, RunHandle};
pub use progress::ProgressTracker;
pub use types::{
    ErrorDescriptor, ErrorKind, ModuleState, ModuleStatus, PipelineRun, ProgressEntry, RunRequest,
    RunStatus,
};
