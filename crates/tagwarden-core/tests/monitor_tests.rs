//! Execution monitor timing and outcome tests
//!
//! Runs on tokio's paused clock so the 1s/5s cadence is observable exactly.

use std::sync::Arc;
use std::time::Duration;
use tagwarden_core::{
    CancelSignal, ExecutionMonitor, ExecutionOutcome, ExecutionStatus, MonitorConfig,
    RegistryGateway, RetentionId, UndeterminedReason,
};
use tagwarden_test_utils::{listing, Call, FakeRegistry};
use tokio::time::Instant;

fn registry_with_policy() -> (Arc<FakeRegistry>, RetentionId) {
    let registry = Arc::new(FakeRegistry::new());
    let project = registry.add_project("payments");
    let policy = registry.attach_retention_policy(project);
    (registry, policy)
}

fn monitor(registry: &Arc<FakeRegistry>, config: MonitorConfig) -> ExecutionMonitor {
    let gateway: Arc<dyn RegistryGateway> = registry.clone();
    ExecutionMonitor::new(gateway, config)
}

#[tokio::test(start_paused = true)]
async fn discovery_gives_up_after_ten_polls() {
    let (registry, policy) = registry_with_policy();
    registry.script_executions(policy, vec![Vec::new()]);

    let start = Instant::now();
    let report = monitor(&registry, MonitorConfig::default())
        .run_and_await(policy, true)
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        ExecutionOutcome::Undetermined {
            reason: UndeterminedReason::NeverListed
        }
    );
    assert_eq!(report.discovery_polls, 10);
    assert_eq!(report.status_polls, 0);
    assert_eq!(report.execution_id, None);
    assert_eq!(registry.count(|c| matches!(c, Call::ListExecutions(_))), 10);
    assert_eq!(start.elapsed(), Duration::from_secs(9));
}

#[tokio::test(start_paused = true)]
async fn follows_pending_and_running_until_success() {
    let (registry, policy) = registry_with_policy();
    registry.script_executions(
        policy,
        vec![
            Vec::new(),
            Vec::new(),
            listing(7, "Pending"),
            listing(7, "Running"),
            listing(7, "Success"),
        ],
    );

    let start = Instant::now();
    let report = monitor(&registry, MonitorConfig::default())
        .run_and_await(policy, true)
        .await
        .unwrap();

    assert!(report.outcome.is_success());
    assert_eq!(report.execution_id.map(|id| id.get()), Some(7));
    assert_eq!(report.discovery_polls, 3);
    assert_eq!(report.status_polls, 2);
    assert_eq!(report.last_status, Some(ExecutionStatus::Success));
    // two discovery pauses, one status pause
    assert_eq!(start.elapsed(), Duration::from_secs(7));
    assert_eq!(
        registry.count(|c| matches!(c, Call::TriggerExecution { dry_run: true, .. })),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn error_and_stopped_are_terminal() {
    for status in ["Error", "Stopped"] {
        let (registry, policy) = registry_with_policy();
        registry.script_executions(policy, vec![listing(3, "Running"), listing(3, status)]);

        let report = monitor(&registry, MonitorConfig::default())
            .run_and_await(policy, false)
            .await
            .unwrap();

        assert_eq!(report.outcome.status(), Some(&ExecutionStatus::from(status)));
        assert!(!report.outcome.is_success());
        assert_eq!(report.status_polls, 1);
    }
}

#[tokio::test(start_paused = true)]
async fn vanished_execution_is_undetermined() {
    let (registry, policy) = registry_with_policy();
    registry.script_executions(policy, vec![listing(7, "Running"), listing(8, "Running")]);

    let report = monitor(&registry, MonitorConfig::default())
        .run_and_await(policy, true)
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        ExecutionOutcome::Undetermined {
            reason: UndeterminedReason::Vanished
        }
    );
    assert_eq!(report.execution_id.map(|id| id.get()), Some(7));
    assert_eq!(report.status_polls, 1);
}

#[tokio::test(start_paused = true)]
async fn unfamiliar_status_keeps_polling() {
    let (registry, policy) = registry_with_policy();
    registry.script_executions(
        policy,
        vec![
            listing(7, "Scheduled"),
            listing(7, "Queued"),
            listing(7, "Queued"),
            listing(7, "Success"),
        ],
    );

    let report = monitor(&registry, MonitorConfig::default())
        .run_and_await(policy, true)
        .await
        .unwrap();

    assert!(report.outcome.is_success());
    assert_eq!(report.status_polls, 3);
}

#[tokio::test(start_paused = true)]
async fn deadline_bounds_the_await_phase() {
    let (registry, policy) = registry_with_policy();
    registry.script_executions(policy, vec![listing(7, "Running")]);
    let config = MonitorConfig::default().with_await_deadline(Some(Duration::from_secs(30)));

    let report = monitor(&registry, config)
        .run_and_await(policy, true)
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        ExecutionOutcome::Undetermined {
            reason: UndeterminedReason::DeadlineExceeded
        }
    );
    assert_eq!(report.status_polls, 7);
    assert_eq!(report.last_status, Some(ExecutionStatus::Running));
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_the_wait() {
    let (registry, policy) = registry_with_policy();
    registry.script_executions(policy, vec![listing(7, "Running")]);
    let (handle, signal) = CancelSignal::new();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(12)).await;
        handle.cancel();
    });

    let start = Instant::now();
    let report = monitor(&registry, MonitorConfig::default())
        .with_cancel(signal)
        .run_and_await(policy, true)
        .await
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(
        report.outcome,
        ExecutionOutcome::Undetermined {
            reason: UndeterminedReason::Cancelled
        }
    );
    assert_eq!(report.status_polls, 3);
    assert_eq!(start.elapsed(), Duration::from_secs(12));
}
