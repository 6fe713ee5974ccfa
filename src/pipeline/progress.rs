//! Shared, snapshot-able progress state for one pipeline run.
//!
//! The tracker is the only state mutated by more than one concurrent actor:
//! each module runner writes its own module's state through it, and any
//! number of observers poll point-in-time snapshots while the run is live.
//! All mutation is serialized through one lock and updates never fail: a
//! write against an unknown module id or a regressing transition is a
//! programming error that is logged and counted, never fatal to the run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{error, warn};
use uuid::Uuid;

use crate::modules::ModuleOutput;
use crate::pipeline::types::{
    ErrorDescriptor, ModuleState, ModuleStatus, PipelineRun, ProgressEntry, RunRequest, RunStatus,
};

/// Clone-able handle to one run's progress state.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    run_id: Uuid,
    inner: Arc<RwLock<PipelineRun>>,
    unknown_updates: Arc<AtomicUsize>,
}

impl ProgressTracker {
    /// Creates a tracker for a new run, with a `Queued` state for each
    /// selected module.
    ///
    /// `modules` pairs each selected identifier with its display name, in
    /// selection order. Every selected module gets exactly one state entry
    /// before any runner starts.
    pub fn new(request: RunRequest, modules: &[(String, String)]) -> Self {
        let mut run = PipelineRun::new(request);
        for (id, display_name) in modules {
            run.modules
                .insert(id.clone(), ModuleState::queued(id, display_name));
        }

        Self {
            run_id: run.run_id,
            inner: Arc::new(RwLock::new(run)),
            unknown_updates: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The run identifier.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Number of updates received for unknown module ids.
    pub fn unknown_updates(&self) -> usize {
        self.unknown_updates.load(Ordering::Relaxed)
    }

    /// Marks the run itself as running.
    pub async fn mark_run_started(&self) {
        let mut run = self.inner.write().await;
        if run.status == RunStatus::Pending {
            run.status = RunStatus::Running;
        }
    }

    /// Marks the run terminal and stamps its completion time.
    pub async fn finish_run(&self, status: RunStatus) {
        debug_assert!(status.is_terminal());
        let mut run = self.inner.write().await;
        if run.status.is_terminal() {
            warn!(run_id = %self.run_id, current = %run.status, "Ignoring run status change after terminal state");
            return;
        }
        run.status = status;
        run.completed_at = Some(Utc::now());
    }

    /// Transitions a module to `Running` and appends a progress message.
    pub async fn mark_running(&self, module_id: &str, message: impl Into<String>) {
        let mut run = self.inner.write().await;
        let Some(state) = Self::state_mut(&mut run, module_id, &self.unknown_updates) else {
            return;
        };

        if state.status.is_terminal() {
            warn!(
                run_id = %self.run_id,
                module = module_id,
                current = %state.status,
                "Ignoring transition out of terminal module state"
            );
            return;
        }

        state.status = ModuleStatus::Running;
        state.started_at.get_or_insert_with(Utc::now);
        state.messages.push(ProgressEntry::now(message));
    }

    /// Appends a progress message without changing status.
    pub async fn append(&self, module_id: &str, message: impl Into<String>) {
        let mut run = self.inner.write().await;
        let Some(state) = Self::state_mut(&mut run, module_id, &self.unknown_updates) else {
            return;
        };
        state.messages.push(ProgressEntry::now(message));
    }

    /// Records a module's terminal outcome.
    ///
    /// Exactly one of `output` / `error` is expected, matching the status.
    /// A second terminal write for the same module is ignored (transitions
    /// are monotonic).
    pub async fn finish_module(
        &self,
        module_id: &str,
        status: ModuleStatus,
        output: Option<ModuleOutput>,
        error: Option<ErrorDescriptor>,
        message: impl Into<String>,
    ) {
        debug_assert!(status.is_terminal());

        let mut run = self.inner.write().await;
        let Some(state) = Self::state_mut(&mut run, module_id, &self.unknown_updates) else {
            return;
        };

        if state.status.is_terminal() {
            warn!(
                run_id = %self.run_id,
                module = module_id,
                current = %state.status,
                attempted = %status,
                "Ignoring second terminal transition"
            );
            return;
        }

        state.status = status;
        state.completed_at = Some(Utc::now());
        state.output = output;
        state.error = error;
        state.messages.push(ProgressEntry::now(message));
    }

    /// Returns a point-in-time copy of the run, safe to read while writers
    /// continue.
    pub async fn snapshot(&self) -> PipelineRun {
        self.inner.read().await.clone()
    }

    fn state_mut<'a>(
        run: &'a mut PipelineRun,
        module_id: &str,
        unknown_updates: &AtomicUsize,
    ) -> Option<&'a mut ModuleState> {
        let run_id = run.run_id;
        match run.modules.get_mut(module_id) {
            Some(state) => Some(state),
            None => {
                unknown_updates.fetch_add(1, Ordering::Relaxed);
                error!(
                    run_id = %run_id,
                    module = module_id,
                    "Progress update for unknown module id"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::Table;
    use crate::pipeline::types::ErrorKind;

    fn tracker_for(ids: &[&str]) -> ProgressTracker {
        let request = RunRequest::new("topic", ids.iter().map(|s| s.to_string()).collect());
        let modules: Vec<(String, String)> = ids
            .iter()
            .map(|id| (id.to_string(), id.to_uppercase()))
            .collect();
        ProgressTracker::new(request, &modules)
    }

    #[tokio::test]
    async fn test_init_creates_queued_state_per_module() {
        let tracker = tracker_for(&["jobs", "trends"]);
        let snap = tracker.snapshot().await;

        assert_eq!(snap.modules.len(), 2);
        assert_eq!(snap.status, RunStatus::Pending);
        for state in snap.modules.values() {
            assert_eq!(state.status, ModuleStatus::Queued);
            assert!(state.messages.is_empty());
        }
        assert_eq!(snap.modules["jobs"].display_name, "JOBS");
    }

    #[tokio::test]
    async fn test_messages_are_fifo_per_module() {
        let tracker = tracker_for(&["jobs"]);
        tracker.mark_running("jobs", "starting").await;
        tracker.append("jobs", "page 1").await;
        tracker.append("jobs", "page 2").await;

        let snap = tracker.snapshot().await;
        let texts: Vec<&str> = snap.modules["jobs"]
            .messages
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(texts, vec!["starting", "page 1", "page 2"]);
    }

    #[tokio::test]
    async fn test_finish_module_records_output() {
        let tracker = tracker_for(&["jobs"]);
        tracker.mark_running("jobs", "starting").await;

        let output = ModuleOutput::new().with_table(Table {
            name: "data".to_string(),
            rows: vec![serde_json::json!({"x": 1})],
        });
        tracker
            .finish_module("jobs", ModuleStatus::Succeeded, Some(output), None, "done")
            .await;

        let snap = tracker.snapshot().await;
        let state = &snap.modules["jobs"];
        assert_eq!(state.status, ModuleStatus::Succeeded);
        assert!(state.started_at.is_some());
        assert!(state.completed_at.is_some());
        assert_eq!(state.output.as_ref().unwrap().total_rows(), 1);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_terminal_state_never_regresses() {
        let tracker = tracker_for(&["jobs"]);
        tracker
            .finish_module(
                "jobs",
                ModuleStatus::Failed,
                None,
                Some(ErrorDescriptor::new(ErrorKind::Execution, "boom")),
                "failed",
            )
            .await;

        // Attempts to move out of the terminal state are ignored
        tracker.mark_running("jobs", "late start").await;
        tracker
            .finish_module("jobs", ModuleStatus::Succeeded, None, None, "late finish")
            .await;

        let snap = tracker.snapshot().await;
        assert_eq!(snap.modules["jobs"].status, ModuleStatus::Failed);
        assert_eq!(snap.modules["jobs"].error.as_ref().unwrap().kind, ErrorKind::Execution);
    }

    #[tokio::test]
    async fn test_unknown_module_is_counted_not_fatal() {
        let tracker = tracker_for(&["jobs"]);
        tracker.mark_running("nope", "hello").await;
        tracker.append("nope", "hello").await;

        assert_eq!(tracker.unknown_updates(), 2);
        let snap = tracker.snapshot().await;
        assert_eq!(snap.modules.len(), 1);
    }

    #[tokio::test]
    async fn test_run_status_lifecycle() {
        let tracker = tracker_for(&["jobs"]);
        tracker.mark_run_started().await;
        assert_eq!(tracker.snapshot().await.status, RunStatus::Running);

        tracker.finish_run(RunStatus::Completed).await;
        let snap = tracker.snapshot().await;
        assert_eq!(snap.status, RunStatus::Completed);
        assert!(snap.completed_at.is_some());

        // Terminal run status does not regress
        tracker.finish_run(RunStatus::Cancelled).await;
        assert_eq!(tracker.snapshot().await.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_snapshot_is_point_in_time_copy() {
        let tracker = tracker_for(&["jobs"]);
        let before = tracker.snapshot().await;
        tracker.mark_running("jobs", "starting").await;

        assert_eq!(before.modules["jobs"].status, ModuleStatus::Queued);
        let after = tracker.snapshot().await;
        assert_eq!(after.modules["jobs"].status, ModuleStatus::Running);
    }

    #[tokio::test]
    async fn test_concurrent_writers_one_per_module() {
        let tracker = tracker_for(&["a", "b", "c"]);

        let mut handles = Vec::new();
        for id in ["a", "b", "c"] {
            let t = tracker.clone();
            handles.push(tokio::spawn(async move {
                t.mark_running(id, "start").await;
                for i in 0..20 {
                    t.append(id, format!("msg {}", i)).await;
                }
                t.finish_module(id, ModuleStatus::Succeeded, None, None, "done")
                    .await;
            }));
        }
        for handle in handles {
            handle.await.expect("writer task");
        }

        let snap = tracker.snapshot().await;
        for id in ["a", "b", "c"] {
            let state = &snap.modules[id];
            assert_eq!(state.status, ModuleStatus::Succeeded);
            // start + 20 appends + done
            assert_eq!(state.messages.len(), 22);
            for (i, entry) in state.messages[1..21].iter().enumerate() {
                assert_eq!(entry.text, format!("msg {}", i));
            }
        }
    }
}
