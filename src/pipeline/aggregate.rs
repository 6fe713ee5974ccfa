//! Result aggregation for completed runs.
//!
//! Aggregation is a pure function of a terminal [`PipelineRun`]: it copies
//! each module's terminal status, payload and error verbatim into one
//! report and derives the overall outcome. It has no failure mode, but
//! calling it on a non-terminal run is a precondition violation and panics
//! rather than producing a misleading report.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::modules::ModuleOutput;
use crate::pipeline::types::{ErrorDescriptor, ModuleStatus, PipelineRun};

/// Derived overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every module succeeded.
    AllSucceeded,
    /// At least one module succeeded and at least one did not.
    PartialSuccess,
    /// No module succeeded.
    AllFailed,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::AllSucceeded => write!(f, "all_succeeded"),
            RunOutcome::PartialSuccess => write!(f, "partial_success"),
            RunOutcome::AllFailed => write!(f, "all_failed"),
        }
    }
}

/// One module's entry in the aggregated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleReport {
    /// Human-readable module name.
    pub display_name: String,
    /// Terminal status the module reached.
    pub status: ModuleStatus,
    /// Success payload, present iff the module succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<ModuleOutput>,
    /// Error descriptor, present for every non-succeeded module.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDescriptor>,
    /// Execution duration in milliseconds, when both timestamps were
    /// recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

/// Final aggregated output of one run. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResult {
    /// Run identifier.
    pub run_id: Uuid,
    /// Topic the run collected data about.
    pub topic: String,
    /// Derived overall outcome.
    pub outcome: RunOutcome,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// One entry per selected module, keyed by module identifier.
    pub modules: BTreeMap<String, ModuleReport>,
}

impl AggregatedResult {
    /// Total rows across all succeeded modules.
    pub fn total_rows(&self) -> usize {
        self.modules
            .values()
            .filter_map(|report| report.output.as_ref())
            .map(ModuleOutput::total_rows)
            .sum()
    }
}

/// Builds the aggregated report for a terminal run.
///
/// # Panics
///
/// Panics if any module has not reached a terminal status; the
/// orchestrator only aggregates after the full join, so a non-terminal
/// module here is a caller bug.
pub fn aggregate(run: &PipelineRun) -> AggregatedResult {
    let mut modules = BTreeMap::new();
    let mut succeeded = 0usize;

    for (id, state) in &run.modules {
        assert!(
            state.status.is_terminal(),
            "aggregate called on non-terminal run: module '{}' is {}",
            id,
            state.status
        );

        if state.status == ModuleStatus::Succeeded {
            succeeded += 1;
        }

        modules.insert(
            id.clone(),
            ModuleReport {
                display_name: state.display_name.clone(),
                status: state.status,
                output: state.output.clone(),
                error: state.error.clone(),
                duration_ms: state.duration().map(|d| d.num_milliseconds()),
            },
        );
    }

    let outcome = if succeeded == run.modules.len() && !run.modules.is_empty() {
        RunOutcome::AllSucceeded
    } else if succeeded > 0 {
        RunOutcome::PartialSuccess
    } else {
        RunOutcome::AllFailed
    };

    AggregatedResult {
        run_id: run.run_id,
        topic: run.request.topic.clone(),
        outcome,
        started_at: run.started_at,
        completed_at: run.completed_at,
        modules,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::Table;
    use crate::pipeline::types::{ErrorKind, ModuleState, RunRequest};

    fn terminal_run(statuses: &[(&str, ModuleStatus)]) -> PipelineRun {
        let request = RunRequest::new(
            "data analyst",
            statuses.iter().map(|(id, _)| id.to_string()).collect(),
        );
        let mut run = PipelineRun::new(request);
        for (id, status) in statuses {
            let mut state = ModuleState::queued(*id, id.to_uppercase());
            state.status = *status;
            match status {
                ModuleStatus::Succeeded => {
                    state.output = Some(ModuleOutput::new().with_table(Table {
                        name: "data".to_string(),
                        rows: vec![serde_json::json!({"n": 1})],
                    }));
                }
                ModuleStatus::Failed => {
                    state.error = Some(ErrorDescriptor::new(ErrorKind::Execution, "boom"));
                }
                ModuleStatus::TimedOut => {
                    state.error = Some(ErrorDescriptor::new(ErrorKind::Timeout, "too slow"));
                }
                ModuleStatus::Cancelled => {
                    state.error = Some(ErrorDescriptor::new(ErrorKind::Cancelled, "cancelled"));
                }
                _ => {}
            }
            run.modules.insert(id.to_string(), state);
        }
        run.status = crate::pipeline::types::RunStatus::Completed;
        run
    }

    #[test]
    fn test_all_succeeded() {
        let run = terminal_run(&[
            ("jobs", ModuleStatus::Succeeded),
            ("trends", ModuleStatus::Succeeded),
        ]);
        let result = aggregate(&run);
        assert_eq!(result.outcome, RunOutcome::AllSucceeded);
        assert_eq!(result.modules.len(), 2);
        assert_eq!(result.total_rows(), 2);
    }

    #[test]
    fn test_partial_success() {
        let run = terminal_run(&[
            ("jobs", ModuleStatus::Succeeded),
            ("trends", ModuleStatus::Failed),
        ]);
        let result = aggregate(&run);
        assert_eq!(result.outcome, RunOutcome::PartialSuccess);
        assert!(result.modules["jobs"].output.is_some());
        assert_eq!(
            result.modules["trends"].error.as_ref().unwrap().kind,
            ErrorKind::Execution
        );
    }

    #[test]
    fn test_timed_out_counts_as_failure() {
        let run = terminal_run(&[
            ("jobs", ModuleStatus::TimedOut),
            ("trends", ModuleStatus::Failed),
        ]);
        assert_eq!(aggregate(&run).outcome, RunOutcome::AllFailed);
    }

    #[test]
    fn test_all_cancelled_is_all_failed() {
        let run = terminal_run(&[
            ("jobs", ModuleStatus::Cancelled),
            ("trends", ModuleStatus::Cancelled),
        ]);
        let result = aggregate(&run);
        assert_eq!(result.outcome, RunOutcome::AllFailed);
        for report in result.modules.values() {
            assert_eq!(report.status, ModuleStatus::Cancelled);
        }
    }

    #[test]
    fn test_one_entry_per_selected_module() {
        let run = terminal_run(&[
            ("a", ModuleStatus::Succeeded),
            ("b", ModuleStatus::Failed),
            ("c", ModuleStatus::TimedOut),
        ]);
        let result = aggregate(&run);
        let keys: Vec<&str> = result.modules.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let run = terminal_run(&[
            ("jobs", ModuleStatus::Succeeded),
            ("trends", ModuleStatus::Failed),
        ]);
        let first = serde_json::to_value(aggregate(&run)).expect("serialize");
        let second = serde_json::to_value(aggregate(&run)).expect("serialize");
        assert_eq!(first, second);
    }

    #[test]
    #[should_panic(expected = "non-terminal")]
    fn test_non_terminal_run_panics() {
        let run = terminal_run(&[("jobs", ModuleStatus::Running)]);
        aggregate(&run);
    }

    #[test]
    fn test_report_serialization_shape() {
        let run = terminal_run(&[("jobs", ModuleStatus::Succeeded)]);
        let json = serde_json::to_value(aggregate(&run)).expect("serialize");

        assert_eq!(json["outcome"], "all_succeeded");
        assert_eq!(json["topic"], "data analyst");
        assert_eq!(json["modules"]["jobs"]["status"], "succeeded");
        // Succeeded modules carry no error field at all
        assert!(json["modules"]["jobs"].get("error").is_none());
    }
}
