//! Core data model for pipeline runs.
//!
//! Defines the immutable run request, the mutable per-run state tracked
//! while modules execute, and the error descriptors recorded against
//! individual modules.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::modules::{ModuleConfig, ModuleOutput};

/// A request to execute one pipeline run.
///
/// Immutable once constructed: the orchestrator validates it up front and
/// never mutates it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    /// Topic the run collects data about (e.g. "data analyst").
    pub topic: String,

    /// Ordered selection of module identifiers to run.
    pub modules: Vec<String>,

    /// Per-module configuration, opaque to the core.
    #[serde(default)]
    pub inputs: BTreeMap<String, ModuleConfig>,

    /// Per-module timeout overrides. Modules without an entry use their
    /// own default timeout.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub timeouts: BTreeMap<String, Duration>,
}

impl RunRequest {
    /// Creates a run request for the given topic and module selection.
    pub fn new(topic: impl Into<String>, modules: Vec<String>) -> Self {
        Self {
            topic: topic.into(),
            modules,
            inputs: BTreeMap::new(),
            timeouts: BTreeMap::new(),
        }
    }

    /// Sets the configuration for one module.
    pub fn with_input(mut self, module_id: impl Into<String>, config: ModuleConfig) -> Self {
        self.inputs.insert(module_id.into(), config);
        self
    }

    /// Sets a timeout override for one module.
    pub fn with_timeout(mut self, module_id: impl Into<String>, timeout: Duration) -> Self {
        self.timeouts.insert(module_id.into(), timeout);
        self
    }

    /// Returns the configuration for a module, or `Null` if none was given.
    pub fn input_for(&self, module_id: &str) -> ModuleConfig {
        self.inputs
            .get(module_id)
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Status of a single module within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    /// Waiting for dispatch (or for a concurrency slot).
    Queued,
    /// Validation or execution in progress.
    Running,
    /// Execution finished with a payload.
    Succeeded,
    /// Configuration validation or execution failed.
    Failed,
    /// The per-module timeout elapsed before execution finished.
    TimedOut,
    /// The run was cancelled before the module finished.
    Cancelled,
}

impl ModuleStatus {
    /// Returns `true` for statuses from which no further transition occurs.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ModuleStatus::Succeeded
                | ModuleStatus::Failed
                | ModuleStatus::TimedOut
                | ModuleStatus::Cancelled
        )
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleStatus::Queued => write!(f, "queued"),
            ModuleStatus::Running => write!(f, "running"),
            ModuleStatus::Succeeded => write!(f, "succeeded"),
            ModuleStatus::Failed => write!(f, "failed"),
            ModuleStatus::TimedOut => write!(f, "timed_out"),
            ModuleStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Status of the run as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created but not yet dispatched.
    Pending,
    /// Modules are executing.
    Running,
    /// Every module reached a terminal status.
    Completed,
    /// The run was cancelled; every module reached a terminal status.
    Cancelled,
}

impl RunStatus {
    /// Returns `true` once the run can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Cancelled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Classification of a module-level error in the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credentials or parameters missing or invalid; execution never started.
    Config,
    /// The module failed while collecting data (network, auth, rate limit,
    /// empty result).
    Execution,
    /// The module did not finish within its allotted time.
    Timeout,
    /// The run was cancelled before the module finished.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Config => write!(f, "config"),
            ErrorKind::Execution => write!(f, "execution"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A module-level error as recorded in run state and the final report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
}

impl ErrorDescriptor {
    /// Creates an error descriptor.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// One timestamped progress message for a module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    /// When the message was recorded.
    pub at: DateTime<Utc>,
    /// Message text.
    pub text: String,
}

impl ProgressEntry {
    /// Creates a progress entry timestamped now.
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            text: text.into(),
        }
    }
}

/// Per-module record within a run.
///
/// Mutated only through the progress tracker, which serializes access and
/// enforces that terminal statuses never regress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleState {
    /// Module identifier.
    pub id: String,
    /// Human-readable module name for display.
    pub display_name: String,
    /// Current status.
    pub status: ModuleStatus,
    /// Append-only progress messages, FIFO per module.
    pub messages: Vec<ProgressEntry>,
    /// When the module transitioned to `Running`.
    pub started_at: Option<DateTime<Utc>>,
    /// When the module reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Result payload, present only when `status == Succeeded`.
    pub output: Option<ModuleOutput>,
    /// Error descriptor, present for failed/timed-out/cancelled modules.
    pub error: Option<ErrorDescriptor>,
}

impl ModuleState {
    /// Creates a queued state for a module.
    pub fn queued(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            status: ModuleStatus::Queued,
            messages: Vec::new(),
            started_at: None,
            completed_at: None,
            output: None,
            error: None,
        }
    }

    /// Wall-clock duration from start to completion, if both are recorded.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// State of one end-to-end pipeline execution.
///
/// Owned by the orchestrator (behind the progress tracker) for the duration
/// of the run; snapshots handed to observers are point-in-time copies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Generated run identifier.
    pub run_id: Uuid,
    /// The request that started this run.
    pub request: RunRequest,
    /// Overall run status.
    pub status: RunStatus,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Per-module state, one entry per selected module.
    pub modules: BTreeMap<String, ModuleState>,
}

impl PipelineRun {
    /// Creates a new pending run for the given request.
    pub fn new(request: RunRequest) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            request,
            status: RunStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            modules: BTreeMap::new(),
        }
    }

    /// Returns `true` once every module has reached a terminal status.
    pub fn all_modules_terminal(&self) -> bool {
        self.modules.values().all(|m| m.status.is_terminal())
    }
}
