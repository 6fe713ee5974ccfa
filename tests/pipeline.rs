//! End-to-end pipeline tests over scripted modules.
//!
//! These tests exercise the full public surface: registry, orchestrator,
//! progress tracking and aggregation, with stub modules standing in for
//! the real data sources.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use marketpulse::modules::{Module, ModuleConfig, ModuleError, ModuleOutput, ModuleResult, Table};
use marketpulse::pipeline::{CancelToken, ErrorKind};
use marketpulse::{
    ModuleRegistry, ModuleStatus, PipelineOrchestrator, RunOutcome, RunRequest, RunStatus,
    Settings,
};

enum Behavior {
    /// Succeed after a delay with the given number of rows.
    Rows { delay: Duration, rows: usize },
    /// Fail immediately with the given error.
    Fail(ModuleError),
    /// Wait for cancellation, then stop cooperatively.
    Hang,
}

struct TestModule {
    id: &'static str,
    behavior: Behavior,
    active: Arc<AtomicUsize>,
    peak_active: Arc<AtomicUsize>,
}

impl TestModule {
    fn arc(id: &'static str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            id,
            behavior,
            active: Arc::new(AtomicUsize::new(0)),
            peak_active: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Module for TestModule {
    fn name(&self) -> &'static str {
        self.id
    }

    fn display_name(&self) -> &'static str {
        self.id
    }

    fn description(&self) -> &'static str {
        "scripted test module"
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    fn validate(&self, _config: &ModuleConfig) -> ModuleResult<()> {
        Ok(())
    }

    async fn execute(
        &self,
        _topic: &str,
        _config: &ModuleConfig,
        cancel: CancelToken,
    ) -> ModuleResult<ModuleOutput> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(now_active, Ordering::SeqCst);

        let result = match &self.behavior {
            Behavior::Rows { delay, rows } => {
                tokio::time::sleep(*delay).await;
                let rows: Vec<serde_json::Value> =
                    (0..*rows).map(|i| serde_json::json!({"row": i})).collect();
                Ok(ModuleOutput::new().with_table(Table {
                    name: "data".to_string(),
                    rows,
                }))
            }
            Behavior::Fail(error) => Err(error.clone()),
            Behavior::Hang => {
                cancel.cancelled().await;
                Err(ModuleError::Cancelled)
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn orchestrator_with(
    modules: Vec<Arc<TestModule>>,
    settings: Settings,
) -> PipelineOrchestrator {
    let mut registry = ModuleRegistry::new(&settings);
    for module in modules {
        registry.register(module).expect("register test module");
    }
    PipelineOrchestrator::new(Arc::new(registry), &settings)
}

#[tokio::test]
async fn partial_success_preserves_successful_results() {
    // One module returns ten rows after a delay, the other hits a rate
    // limit. The successful payload must survive intact.
    let jobs = TestModule::arc(
        "jobs",
        Behavior::Rows {
            delay: Duration::from_millis(100),
            rows: 10,
        },
    );
    let trends = TestModule::arc(
        "trends",
        Behavior::Fail(ModuleError::RateLimited {
            retry_after: Some(60),
        }),
    );
    let orchestrator = orchestrator_with(vec![jobs, trends], Settings::default());

    let handle = orchestrator
        .start_run(RunRequest::new(
            "data analyst",
            vec!["jobs".to_string(), "trends".to_string()],
        ))
        .await
        .expect("start run");
    let result = handle.wait().await.expect("wait");

    assert_eq!(result.outcome, RunOutcome::PartialSuccess);
    assert_eq!(result.modules.len(), 2);

    let jobs_report = &result.modules["jobs"];
    assert_eq!(jobs_report.status, ModuleStatus::Succeeded);
    assert_eq!(jobs_report.output.as_ref().expect("output").total_rows(), 10);
    assert!(jobs_report.error.is_none());

    let trends_report = &result.modules["trends"];
    assert_eq!(trends_report.status, ModuleStatus::Failed);
    let error = trends_report.error.as_ref().expect("error");
    assert_eq!(error.kind, ErrorKind::Execution);
    assert!(error.message.contains("Rate limited"));
}

#[tokio::test]
async fn wait_returns_despite_hung_module() {
    let hung = TestModule::arc("hung", Behavior::Hang);
    let quick = TestModule::arc(
        "quick",
        Behavior::Rows {
            delay: Duration::from_millis(20),
            rows: 1,
        },
    );
    let settings = Settings::default().with_cancel_grace(Duration::from_millis(50));
    let orchestrator = orchestrator_with(vec![hung, quick], settings);

    let request = RunRequest::new("topic", vec!["hung".to_string(), "quick".to_string()])
        .with_timeout("hung", Duration::from_millis(100));
    let handle = orchestrator.start_run(request).await.expect("start run");

    let result = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("run must terminate even with a hung module")
        .expect("wait");

    assert_eq!(result.outcome, RunOutcome::PartialSuccess);
    assert_eq!(result.modules["hung"].status, ModuleStatus::TimedOut);
    assert_eq!(
        result.modules["hung"].error.as_ref().expect("error").kind,
        ErrorKind::Timeout
    );
    assert_eq!(result.modules["quick"].status, ModuleStatus::Succeeded);
}

#[tokio::test]
async fn cancellation_terminates_every_module() {
    let a = TestModule::arc("a", Behavior::Hang);
    let b = TestModule::arc("b", Behavior::Hang);
    let settings = Settings::default().with_cancel_grace(Duration::from_millis(100));
    let orchestrator = orchestrator_with(vec![a, b], settings);

    let handle = orchestrator
        .start_run(RunRequest::new(
            "topic",
            vec!["a".to_string(), "b".to_string()],
        ))
        .await
        .expect("start run");
    let tracker = handle.progress();

    tokio::time::sleep(Duration::from_millis(30)).await;
    handle.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("cancelled run must terminate")
        .expect("wait");

    assert_eq!(result.outcome, RunOutcome::AllFailed);
    for report in result.modules.values() {
        assert_eq!(report.status, ModuleStatus::Cancelled);
        assert_eq!(report.error.as_ref().expect("error").kind, ErrorKind::Cancelled);
    }
    assert_eq!(tracker.snapshot().await.status, RunStatus::Cancelled);
}

#[tokio::test]
async fn parallelism_never_exceeds_limit() {
    // All four stubs share one concurrency gauge
    let shared_active = Arc::new(AtomicUsize::new(0));
    let shared_peak = Arc::new(AtomicUsize::new(0));
    let modules: Vec<Arc<TestModule>> = ["m1", "m2", "m3", "m4"]
        .iter()
        .map(|&id| {
            Arc::new(TestModule {
                id,
                behavior: Behavior::Rows {
                    delay: Duration::from_millis(50),
                    rows: 1,
                },
                active: Arc::clone(&shared_active),
                peak_active: Arc::clone(&shared_peak),
            })
        })
        .collect();

    let settings = Settings::default().with_max_parallel_modules(2);
    let orchestrator = orchestrator_with(modules, settings);

    let handle = orchestrator
        .start_run(RunRequest::new(
            "topic",
            vec![
                "m1".to_string(),
                "m2".to_string(),
                "m3".to_string(),
                "m4".to_string(),
            ],
        ))
        .await
        .expect("start run");
    let result = handle.wait().await.expect("wait");

    assert_eq!(result.outcome, RunOutcome::AllSucceeded);
    assert!(
        shared_peak.load(Ordering::SeqCst) <= 2,
        "at most two modules may run concurrently, saw {}",
        shared_peak.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn report_shape_is_stable() {
    let jobs = TestModule::arc(
        "jobs",
        Behavior::Rows {
            delay: Duration::ZERO,
            rows: 2,
        },
    );
    let orchestrator = orchestrator_with(vec![jobs], Settings::default());

    let handle = orchestrator
        .start_run(RunRequest::new("data analyst", vec!["jobs".to_string()]))
        .await
        .expect("start run");
    let run_id = handle.run_id();
    let result = handle.wait().await.expect("wait");
    assert_eq!(result.run_id, run_id);

    let json = serde_json::to_value(&result).expect("serialize");
    assert_eq!(json["topic"], "data analyst");
    assert_eq!(json["outcome"], "all_succeeded");
    assert_eq!(json["modules"]["jobs"]["status"], "succeeded");
    assert_eq!(
        json["modules"]["jobs"]["output"]["tables"][0]["name"],
        "data"
    );
    // Succeeded modules carry no error field
    assert!(json["modules"]["jobs"].get("error").is_none());
}

#[tokio::test]
async fn progress_messages_accumulate_in_order() {
    let jobs = TestModule::arc(
        "jobs",
        Behavior::Rows {
            delay: Duration::from_millis(50),
            rows: 1,
        },
    );
    let orchestrator = orchestrator_with(vec![jobs], Settings::default());

    let handle = orchestrator
        .start_run(RunRequest::new("topic", vec!["jobs".to_string()]))
        .await
        .expect("start run");
    let tracker = handle.progress();
    handle.wait().await.expect("wait");

    let snapshot = tracker.snapshot().await;
    let messages: Vec<&str> = snapshot.modules["jobs"]
        .messages
        .iter()
        .map(|m| m.text.as_str())
        .collect();
    assert!(messages.first().expect("first message").contains("Running"));
    assert!(messages.last().expect("last message").contains("Completed"));
}
