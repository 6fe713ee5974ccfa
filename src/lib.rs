//! marketpulse: labor-market data collection pipeline.
//!
//! This library runs a configurable subset of data-collection modules
//! concurrently against one topic, isolates per-module failures, tracks
//! live progress, and aggregates results into a single report.

pub mod cli;
pub mod config;
pub mod modules;
pub mod pipeline;

// Re-export the types most callers need
pub use config::{ConfigError, Settings};
pub use modules::{Module, ModuleError, ModuleOutput, ModuleRegistry, RegistryError};
pub use pipeline::{
    AggregatedResult, ModuleStatus, PipelineError, PipelineOrchestrator, RunHandle, RunOutcome,
    RunRequest, RunStatus,
};
