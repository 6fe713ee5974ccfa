//! Top-level pipeline coordinator.
//!
//! The orchestrator validates a run request, initializes progress state for
//! every selected module, dispatches one runner per module with bounded
//! parallelism, and joins them all before aggregating. Everything after
//! request validation happens asynchronously relative to the caller, who
//! observes progress through the tracker and collects the final report via
//! [`RunHandle::wait`].

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Settings;
use crate::modules::{Module, ModuleRegistry};
use crate::pipeline::aggregate::{aggregate, AggregatedResult};
use crate::pipeline::cancel::CancelSignal;
use crate::pipeline::progress::ProgressTracker;
use crate::pipeline::runner::ModuleRunner;
use crate::pipeline::types::{RunRequest, RunStatus};

/// Errors that can occur when starting or waiting on a run.
///
/// Only request validation is fatal to a run; module-level failures are
/// absorbed into the aggregated result and never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request topic is empty.
    #[error("Validation failed: topic must not be empty")]
    EmptyTopic,

    /// The request selects no modules.
    #[error("Validation failed: at least one module must be selected")]
    NoModules,

    /// The request names a module the registry does not know.
    #[error("Validation failed: unknown module '{0}'")]
    UnknownModule(String),

    /// The request names the same module twice.
    #[error("Validation failed: module '{0}' selected more than once")]
    DuplicateModule(String),

    /// The run driver task failed, which indicates a bug in the pipeline
    /// itself rather than in any module.
    #[error("Pipeline internal failure: {0}")]
    Internal(String),
}

/// Handle to one in-flight run.
#[derive(Debug)]
pub struct RunHandle {
    run_id: Uuid,
    tracker: ProgressTracker,
    cancel: Arc<CancelSignal>,
    driver: JoinHandle<AggregatedResult>,
}

impl RunHandle {
    /// The run identifier.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// A progress handle observers can poll for live snapshots.
    pub fn progress(&self) -> ProgressTracker {
        self.tracker.clone()
    }

    /// Fires the pipeline-wide cancel signal. Modules that have not
    /// started transition straight to `cancelled`; running ones are
    /// signalled and given the grace period. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A shared handle to the run's cancel signal, for cancelling from
    /// another task (e.g. a signal handler) after `wait` consumes the
    /// handle.
    pub fn cancel_signal(&self) -> Arc<CancelSignal> {
        Arc::clone(&self.cancel)
    }

    /// Waits until every module reaches a terminal status, then returns
    /// the aggregated result.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Internal` only if the driver task itself
    /// fails; module failures are reflected in the result, not here.
    pub async fn wait(self) -> Result<AggregatedResult, PipelineError> {
        self.driver
            .await
            .map_err(|e| PipelineError::Internal(format!("run driver task failed: {}", e)))
    }
}

/// Coordinates module execution for pipeline runs.
pub struct PipelineOrchestrator {
    registry: Arc<ModuleRegistry>,
    max_parallel_modules: usize,
    cancel_grace: Duration,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator over the given registry and settings.
    pub fn new(registry: Arc<ModuleRegistry>, settings: &Settings) -> Self {
        Self {
            registry,
            max_parallel_modules: settings.max_parallel_modules,
            cancel_grace: settings.cancel_grace,
        }
    }

    /// Validates the request and dispatches the run.
    ///
    /// Returns as soon as the runner tasks are spawned; no module work
    /// happens synchronously.
    ///
    /// # Errors
    ///
    /// Returns a validation variant of [`PipelineError`] without starting
    /// any runner if the request is malformed.
    pub async fn start_run(&self, request: RunRequest) -> Result<RunHandle, PipelineError> {
        let modules = self.validate(&request)?;

        let module_names: Vec<(String, String)> = modules
            .iter()
            .map(|(id, module)| (id.clone(), module.display_name().to_string()))
            .collect();

        let tracker = ProgressTracker::new(request.clone(), &module_names);
        let run_id = tracker.run_id();
        let cancel = Arc::new(CancelSignal::new());
        let permits = Arc::new(Semaphore::new(self.max_parallel_modules));

        info!(
            %run_id,
            topic = %request.topic,
            modules = ?request.modules,
            "Starting pipeline run"
        );
        tracker.mark_run_started().await;

        let mut runner_tasks = Vec::with_capacity(modules.len());
        for (id, module) in modules {
            let timeout = request
                .timeouts
                .get(&id)
                .copied()
                .unwrap_or_else(|| module.default_timeout());

            let runner = ModuleRunner::new(
                module,
                request.input_for(&id),
                timeout,
                self.cancel_grace,
                tracker.clone(),
                cancel.token(),
                Arc::clone(&permits),
            );

            let topic = request.topic.clone();
            runner_tasks.push(tokio::spawn(async move { runner.run(&topic).await }));
        }

        // Driver: full join over all runners, then mark the run terminal
        // and aggregate. Runner tasks record their own outcomes, so a
        // JoinError here can only mean a bug in the runner itself.
        let driver = {
            let tracker = tracker.clone();
            let cancel = Arc::clone(&cancel);
            tokio::spawn(async move {
                for result in join_all(runner_tasks).await {
                    if let Err(e) = result {
                        error!(%run_id, error = %e, "Runner task failed");
                    }
                }

                let status = if cancel.is_cancelled() {
                    RunStatus::Cancelled
                } else {
                    RunStatus::Completed
                };
                tracker.finish_run(status).await;

                let run = tracker.snapshot().await;
                let result = aggregate(&run);
                info!(%run_id, outcome = %result.outcome, "Pipeline run finished");
                result
            })
        };

        Ok(RunHandle {
            run_id,
            tracker,
            cancel,
            driver,
        })
    }

    /// Validates the request and resolves every selected module.
    fn validate(
        &self,
        request: &RunRequest,
    ) -> Result<Vec<(String, Arc<dyn Module>)>, PipelineError> {
        if request.topic.trim().is_empty() {
            return Err(PipelineError::EmptyTopic);
        }

        if request.modules.is_empty() {
            return Err(PipelineError::NoModules);
        }

        let mut seen = std::collections::HashSet::new();
        let mut modules = Vec::with_capacity(request.modules.len());
        for id in &request.modules {
            if !seen.insert(id.as_str()) {
                return Err(PipelineError::DuplicateModule(id.clone()));
            }
            let module = self
                .registry
                .resolve(id)
                .map_err(|_| PipelineError::UnknownModule(id.clone()))?;
            modules.push((id.clone(), module));
        }

        Ok(modules)
    }
}
