//! Per-module execution supervisor.
//!
//! A runner owns exactly one module's execution within a run: it waits for
//! a concurrency slot, validates configuration, races the module's
//! `execute` future against the per-module timeout and the pipeline-wide
//! cancel signal, and reports every transition to the progress tracker
//! before its task ends. A module-level failure never propagates as a
//! pipeline-level failure.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::modules::{Module, ModuleConfig, ModuleError, ModuleOutput};
use crate::pipeline::cancel::{CancelSignal, CancelToken};
use crate::pipeline::progress::ProgressTracker;
use crate::pipeline::types::{ErrorDescriptor, ErrorKind, ModuleStatus};

/// Supervises one module execution from `Queued` to a terminal status.
pub struct ModuleRunner {
    module_id: String,
    module: Arc<dyn Module>,
    config: ModuleConfig,
    /// Per-module execution timeout.
    timeout: Duration,
    /// How long a cancelled/timed-out module may keep running to release
    /// resources before its task is abandoned.
    grace: Duration,
    tracker: ProgressTracker,
    pipeline_cancel: CancelToken,
    permits: Arc<Semaphore>,
}

impl ModuleRunner {
    /// Creates a runner for one module of a run.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        module: Arc<dyn Module>,
        config: ModuleConfig,
        timeout: Duration,
        grace: Duration,
        tracker: ProgressTracker,
        pipeline_cancel: CancelToken,
        permits: Arc<Semaphore>,
    ) -> Self {
        Self {
            module_id: module.name().to_string(),
            module,
            config,
            timeout,
            grace,
            tracker,
            pipeline_cancel,
            permits,
        }
    }

    /// Drives the module to a terminal status.
    ///
    /// Always records a terminal outcome in the tracker; never returns an
    /// error and never panics on module misbehavior.
    pub async fn run(self, topic: &str) {
        // Pipeline cancelled before this module was dispatched
        if self.pipeline_cancel.is_cancelled() {
            self.finish_cancelled("Cancelled before start").await;
            return;
        }

        // Wait for a concurrency slot while still queued, racing the
        // pipeline cancel signal so queued modules cancel promptly.
        let _permit = tokio::select! {
            permit = Arc::clone(&self.permits).acquire_owned() => {
                match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        // Semaphore closed: the orchestrator is gone
                        self.tracker
                            .finish_module(
                                &self.module_id,
                                ModuleStatus::Failed,
                                None,
                                Some(ErrorDescriptor::new(
                                    ErrorKind::Execution,
                                    "concurrency limiter closed",
                                )),
                                "Failed: concurrency limiter closed",
                            )
                            .await;
                        return;
                    }
                }
            }
            _ = self.pipeline_cancel.cancelled() => {
                self.finish_cancelled("Cancelled before start").await;
                return;
            }
        };

        self.tracker
            .mark_running(
                &self.module_id,
                format!("Running {}...", self.module.display_name()),
            )
            .await;

        // Validate before execute: a config failure is terminal without
        // ever starting execution.
        if let Err(e) = self.module.validate(&self.config) {
            debug!(module = %self.module_id, error = %e, "Configuration validation failed");
            self.tracker
                .finish_module(
                    &self.module_id,
                    ModuleStatus::Failed,
                    None,
                    Some(ErrorDescriptor::new(ErrorKind::Config, e.to_string())),
                    format!("Failed: {}", e),
                )
                .await;
            return;
        }

        // The module gets its own cancel signal so a per-module timeout
        // does not disturb other modules.
        let module_cancel = CancelSignal::new();
        let mut execution = {
            let module = Arc::clone(&self.module);
            let topic = topic.to_string();
            let config = self.config.clone();
            let token = module_cancel.token();
            tokio::spawn(async move { module.execute(&topic, &config, token).await })
        };

        // Three-way race: completion, per-module timeout, pipeline cancel.
        tokio::select! {
            result = &mut execution => {
                self.finish_with_result(result).await;
            }
            _ = tokio::time::sleep(self.timeout) => {
                warn!(
                    module = %self.module_id,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Module timed out"
                );
                module_cancel.cancel();
                self.abandon(execution).await;
                self.tracker
                    .finish_module(
                        &self.module_id,
                        ModuleStatus::TimedOut,
                        None,
                        Some(ErrorDescriptor::new(
                            ErrorKind::Timeout,
                            format!(
                                "module did not finish within {:.0}s",
                                self.timeout.as_secs_f64()
                            ),
                        )),
                        format!("Timed out after {:.0}s", self.timeout.as_secs_f64()),
                    )
                    .await;
            }
            _ = self.pipeline_cancel.cancelled() => {
                info!(module = %self.module_id, "Module cancelled by pipeline");
                module_cancel.cancel();
                self.abandon(execution).await;
                self.finish_cancelled("Cancelled").await;
            }
        }
    }

    /// Records the outcome of a module that returned (or panicked) on its own.
    async fn finish_with_result(
        &self,
        result: Result<Result<ModuleOutput, ModuleError>, tokio::task::JoinError>,
    ) {
        match result {
            Ok(Ok(output)) => {
                let rows = output.total_rows();
                info!(module = %self.module_id, rows, "Module completed");
                self.tracker
                    .finish_module(
                        &self.module_id,
                        ModuleStatus::Succeeded,
                        Some(output),
                        None,
                        format!("Completed successfully ({} rows)", rows),
                    )
                    .await;
            }
            Ok(Err(ModuleError::Cancelled)) => {
                self.finish_cancelled("Cancelled").await;
            }
            Ok(Err(e)) => {
                warn!(module = %self.module_id, error = %e, "Module failed");
                self.tracker
                    .finish_module(
                        &self.module_id,
                        ModuleStatus::Failed,
                        None,
                        Some(e.descriptor()),
                        format!("Failed: {}", e),
                    )
                    .await;
            }
            Err(join_error) => {
                // A panicking module must not take the run down with it
                warn!(module = %self.module_id, error = %join_error, "Module task panicked");
                self.tracker
                    .finish_module(
                        &self.module_id,
                        ModuleStatus::Failed,
                        None,
                        Some(ErrorDescriptor::new(
                            ErrorKind::Execution,
                            format!("module panicked: {}", join_error),
                        )),
                        "Failed: module panicked",
                    )
                    .await;
            }
        }
    }

    /// Gives a signalled module up to the grace period to stop on its own,
    /// then aborts its task. Whatever it returns is discarded.
    async fn abandon(&self, mut execution: tokio::task::JoinHandle<Result<ModuleOutput, ModuleError>>) {
        if tokio::time::timeout(self.grace, &mut execution).await.is_err() {
            warn!(
                module = %self.module_id,
                grace_secs = self.grace.as_secs_f64(),
                "Module ignored cancellation, aborting its task"
            );
            execution.abort();
        }
    }

    async fn finish_cancelled(&self, message: &str) {
        self.tracker
            .finish_module(
                &self.module_id,
                ModuleStatus::Cancelled,
                None,
                Some(ErrorDescriptor::new(ErrorKind::Cancelled, "run cancelled")),
                message,
            )
            .await;
    }
}
