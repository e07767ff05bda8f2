//! Execution monitor
//!
//! Triggers one retention execution and follows it to a terminal status:
//! 1. Trigger: a single start request; failure is fatal to the call
//! 2. Discovery: bounded listing until the new execution shows up
//! 3. Await-terminal: re-list until the execution is terminal or gone
//!
//! The await phase is unbounded unless [`MonitorConfig::await_deadline`] is set
//! or the [`CancelSignal`] fires.

use crate::cancel::CancelSignal;
use crate::config::MonitorConfig;
use crate::error::SweepError;
use crate::gateway::RegistryGateway;
use crate::types::{ExecutionId, ExecutionStatus, Page, RetentionExecution, RetentionId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Why no terminal status was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndeterminedReason {
    /// No execution became visible within the discovery budget
    NeverListed,
    /// The execution dropped out of the listing (finished and rotated out)
    Vanished,
    /// The await deadline passed
    DeadlineExceeded,
    /// Cancellation was requested
    Cancelled,
}

/// Final state of a monitored execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// Execution reached Success, Error or Stopped
    Terminal {
        /// Terminal status
        status: ExecutionStatus,
    },
    /// Execution may still be running server-side; not a failure
    Undetermined {
        /// Why the status is unknown
        reason: UndeterminedReason,
    },
}

impl ExecutionOutcome {
    /// Terminal status, if one was observed
    #[must_use]
    pub fn status(&self) -> Option<&ExecutionStatus> {
        match self {
            Self::Terminal { status } => Some(status),
            Self::Undetermined { .. } => None,
        }
    }

    /// Check if the execution finished successfully
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status(), Some(ExecutionStatus::Success))
    }
}

/// What the monitor saw
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorReport {
    /// Policy that was run
    pub policy_id: RetentionId,
    /// Execution followed, once discovered
    pub execution_id: Option<ExecutionId>,
    /// Final state
    pub outcome: ExecutionOutcome,
    /// Listings issued during discovery
    pub discovery_polls: u32,
    /// Listings issued while awaiting a terminal status
    pub status_polls: u32,
    /// Last status observed
    pub last_status: Option<ExecutionStatus>,
}

impl MonitorReport {
    fn new(policy_id: RetentionId) -> Self {
        Self {
            policy_id,
            execution_id: None,
            outcome: ExecutionOutcome::Undetermined {
                reason: UndeterminedReason::NeverListed,
            },
            discovery_polls: 0,
            status_polls: 0,
            last_status: None,
        }
    }

    fn undetermined(mut self, reason: UndeterminedReason) -> Self {
        self.outcome = ExecutionOutcome::Undetermined { reason };
        self
    }
}

enum Discovery {
    Found(ExecutionId),
    GaveUp(UndeterminedReason),
}

/// Triggers retention executions and polls them to completion
#[derive(Clone)]
pub struct ExecutionMonitor {
    gateway: Arc<dyn RegistryGateway>,
    config: MonitorConfig,
    cancel: CancelSignal,
}

impl std::fmt::Debug for ExecutionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionMonitor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ExecutionMonitor {
    /// Create monitor
    #[inline]
    #[must_use]
    pub fn new(gateway: Arc<dyn RegistryGateway>, config: MonitorConfig) -> Self {
        Self {
            gateway,
            config,
            cancel: CancelSignal::never(),
        }
    }

    /// With cancellation signal
    #[inline]
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Trigger an execution of `policy_id` and wait for its outcome
    ///
    /// # Returns
    /// A report whose outcome is either a terminal status or an undetermined
    /// reason. Undetermined is not an error.
    ///
    /// # Errors
    /// - `SweepError::Trigger` if the start request fails (never retried)
    /// - `SweepError::Poll` if an execution listing fails
    pub async fn run_and_await(
        &self,
        policy_id: RetentionId,
        dry_run: bool,
    ) -> Result<MonitorReport, SweepError> {
        self.gateway
            .trigger_execution(policy_id, dry_run)
            .await
            .map_err(|source| SweepError::Trigger { policy_id, source })?;
        tracing::info!(%policy_id, dry_run, "Retention execution started");

        let mut report = MonitorReport::new(policy_id);

        let execution_id = match self.discover(policy_id, &mut report).await? {
            Discovery::Found(id) => id,
            Discovery::GaveUp(reason) => return Ok(report.undetermined(reason)),
        };
        report.execution_id = Some(execution_id);

        self.await_terminal(policy_id, execution_id, report).await
    }

    async fn discover(
        &self,
        policy_id: RetentionId,
        report: &mut MonitorReport,
    ) -> Result<Discovery, SweepError> {
        let attempts = self.config.discovery_attempts;
        for attempt in 1..=attempts {
            let executions = self.list(policy_id).await?;
            report.discovery_polls += 1;

            if let Some(newest) = executions.first() {
                tracing::info!(
                    %policy_id,
                    execution_id = %newest.id,
                    attempt,
                    "Found execution"
                );
                return Ok(Discovery::Found(newest.id));
            }

            tracing::info!(%policy_id, attempt, attempts, "Waiting for new execution to appear");
            if attempt < attempts {
                if let Some(reason) = self.pause(self.config.discovery_interval, None).await {
                    return Ok(Discovery::GaveUp(reason));
                }
            }
        }

        tracing::warn!(%policy_id, attempts, "Could not find any execution");
        Ok(Discovery::GaveUp(UndeterminedReason::NeverListed))
    }

    async fn await_terminal(
        &self,
        policy_id: RetentionId,
        execution_id: ExecutionId,
        mut report: MonitorReport,
    ) -> Result<MonitorReport, SweepError> {
        let deadline = self.config.await_deadline.map(|d| Instant::now() + d);

        loop {
            let executions = self.list(policy_id).await?;
            report.status_polls += 1;
            let attempt = report.status_polls;

            let Some(current) = executions.into_iter().find(|e| e.id == execution_id) else {
                tracing::warn!(
                    %policy_id,
                    %execution_id,
                    attempt,
                    "Execution no longer listed, assuming finished"
                );
                return Ok(report.undetermined(UndeterminedReason::Vanished));
            };

            tracing::info!(
                %policy_id,
                %execution_id,
                attempt,
                status = %current.status,
                "Execution status"
            );
            report.last_status = Some(current.status.clone());

            if current.status.is_terminal() {
                tracing::info!(
                    %policy_id,
                    %execution_id,
                    status = %current.status,
                    "Execution completed"
                );
                report.outcome = ExecutionOutcome::Terminal {
                    status: current.status,
                };
                return Ok(report);
            }

            if let Some(reason) = self.pause(self.config.poll_interval, deadline).await {
                tracing::warn!(%policy_id, %execution_id, ?reason, "Stopped waiting for execution");
                return Ok(report.undetermined(reason));
            }
        }
    }

    async fn list(&self, policy_id: RetentionId) -> Result<Vec<RetentionExecution>, SweepError> {
        self.gateway
            .list_executions(policy_id, Page::first(self.config.page_size))
            .await
            .map_err(|source| SweepError::Poll { policy_id, source })
    }

    /// Sleep for `interval`, cut short by the deadline or cancellation
    async fn pause(
        &self,
        interval: Duration,
        deadline: Option<Instant>,
    ) -> Option<UndeterminedReason> {
        let now = Instant::now();
        let wake = match deadline {
            Some(deadline) if now >= deadline => {
                return Some(UndeterminedReason::DeadlineExceeded)
            }
            Some(deadline) => deadline.min(now + interval),
            None => now + interval,
        };

        let mut cancel = self.cancel.clone();
        tokio::select! {
            () = tokio::time::sleep_until(wake) => None,
            () = cancel.cancelled() => Some(UndeterminedReason::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::gateway::MockRegistryGateway;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn trigger_failure_is_fatal() {
        let mut gateway = MockRegistryGateway::new();
        gateway
            .expect_trigger_execution()
            .with(eq(RetentionId(3)), eq(true))
            .times(1)
            .returning(|_, _| Err(GatewayError::status(403, "forbidden")));
        gateway.expect_list_executions().never();

        let monitor = ExecutionMonitor::new(Arc::new(gateway), MonitorConfig::default());
        let err = monitor.run_and_await(RetentionId(3), true).await.unwrap_err();
        assert!(matches!(
            err,
            SweepError::Trigger {
                policy_id: RetentionId(3),
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn lists_with_configured_page() {
        let mut gateway = MockRegistryGateway::new();
        gateway.expect_trigger_execution().returning(|_, _| Ok(()));
        gateway
            .expect_list_executions()
            .with(eq(RetentionId(3)), eq(Page::first(100)))
            .returning(|_, _| Ok(vec![RetentionExecution::new(ExecutionId(1), "Success")]));

        let monitor = ExecutionMonitor::new(Arc::new(gateway), MonitorConfig::default());
        let report = monitor.run_and_await(RetentionId(3), true).await.unwrap();
        assert!(report.outcome.is_success());
        assert_eq!(report.discovery_polls, 1);
        assert_eq!(report.status_polls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_failure_is_surfaced() {
        let mut gateway = MockRegistryGateway::new();
        gateway.expect_trigger_execution().returning(|_, _| Ok(()));
        gateway
            .expect_list_executions()
            .returning(|_, _| Err(GatewayError::Transport("timeout".into())));

        let monitor = ExecutionMonitor::new(Arc::new(gateway), MonitorConfig::default());
        let err = monitor.run_and_await(RetentionId(3), true).await.unwrap_err();
        assert!(matches!(err, SweepError::Poll { .. }));
    }

    #[test]
    fn outcome_serializes_with_kind_tag() {
        let outcome = ExecutionOutcome::Undetermined {
            reason: UndeterminedReason::Vanished,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "undetermined");
        assert_eq!(json["reason"], "vanished");

        let outcome = ExecutionOutcome::Terminal {
            status: ExecutionStatus::Stopped,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "Stopped");
    }
}
