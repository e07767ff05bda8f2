//! Fleet orchestrator
//!
//! Runs the protective bracket over every included project:
//! 1. enable the immutable rule
//! 2. ensure the retention policy
//! 3. run the catalogued retention policy and await it, or skip with a reason
//! 4. disable the immutable rule, always, whatever happened in 1–3

use crate::cancel::CancelSignal;
use crate::catalog::{filter_projects, CatalogLoader, FilteredCatalog};
use crate::config::FleetConfig;
use crate::error::SweepError;
use crate::gateway::RegistryGateway;
use crate::monitor::{ExecutionMonitor, ExecutionOutcome, MonitorReport, UndeterminedReason};
use crate::reconciler::{ImmutabilityOutcome, PolicyReconciler, RetentionOutcome};
use crate::types::{Project, RunId};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::Instrument;

/// Orchestration step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Step 1
    EnableImmutability,
    /// Step 2
    EnsureRetention,
    /// Step 3
    RunExecution,
    /// Step 4
    RestoreImmutability,
}

/// A failed step and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    /// Step that failed
    pub step: Step,
    /// Error message
    pub message: String,
    /// Registry HTTP status, when it answered
    pub http_status: Option<u16>,
}

impl StepFailure {
    fn new(step: Step, error: &SweepError) -> Self {
        Self {
            step,
            message: error.to_string(),
            http_status: error.gateway_error().and_then(|e| e.http_status()),
        }
    }
}

/// Why step 3 did not start an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The catalog knew of no retention policy for the project
    NoRetentionPolicy,
    /// Cancellation fired before the execution was triggered
    Cancelled,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRetentionPolicy => write!(f, "project has no retention policy"),
            Self::Cancelled => write!(f, "run cancelled"),
        }
    }
}

/// What happened at step 3
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionStep {
    /// Execution was triggered and followed
    Monitored(MonitorReport),
    /// Execution was not started
    Skipped {
        /// Why
        reason: SkipReason,
    },
}

/// Outcome of one project's bracket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReport {
    /// Project processed
    pub project: Project,
    /// Step 1 result
    pub immutability_enabled: Option<ImmutabilityOutcome>,
    /// Step 2 result
    pub retention: Option<RetentionOutcome>,
    /// Step 3 result
    pub execution: Option<ExecutionStep>,
    /// Step 4 result
    pub immutability_restored: Option<ImmutabilityOutcome>,
    /// First failure among steps 1–3
    pub failure: Option<StepFailure>,
    /// Failure of step 4
    pub restore_failure: Option<StepFailure>,
    /// Project was never started because the run was cancelled
    pub cancelled: bool,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub finished_at: DateTime<Utc>,
}

impl ProjectReport {
    fn start(project: Project) -> Self {
        let now = Utc::now();
        Self {
            project,
            immutability_enabled: None,
            retention: None,
            execution: None,
            immutability_restored: None,
            failure: None,
            restore_failure: None,
            cancelled: false,
            started_at: now,
            finished_at: now,
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    /// Check if the bracket ran to completion and every step succeeded
    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !self.was_cancelled() && !self.has_failure()
    }

    /// Check if a step failed, restore included
    #[inline]
    #[must_use]
    pub fn has_failure(&self) -> bool {
        self.failure.is_some() || self.restore_failure.is_some()
    }

    /// Check if cancellation cut the bracket short
    ///
    /// True for a project never started, one whose execution was skipped on
    /// cancellation, and one whose await was abandoned on cancellation.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
            || matches!(
                self.execution,
                Some(ExecutionStep::Skipped {
                    reason: SkipReason::Cancelled
                })
            )
            || matches!(
                self.execution_outcome(),
                Some(ExecutionOutcome::Undetermined {
                    reason: UndeterminedReason::Cancelled
                })
            )
    }

    /// Execution outcome, if one was monitored
    #[must_use]
    pub fn execution_outcome(&self) -> Option<&ExecutionOutcome> {
        match &self.execution {
            Some(ExecutionStep::Monitored(report)) => Some(&report.outcome),
            _ => None,
        }
    }
}

/// Outcome of a fleet run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetReport {
    /// Run ID
    pub run_id: RunId,
    /// Whether executions were dry runs
    pub dry_run: bool,
    /// Projects in the catalog
    pub total_projects: usize,
    /// Names skipped by the exclusion set
    pub excluded: Vec<String>,
    /// Per-project results, in catalog order
    pub projects: Vec<ProjectReport>,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub finished_at: DateTime<Utc>,
}

impl FleetReport {
    /// Projects whose bracket ran
    #[must_use]
    pub fn processed(&self) -> usize {
        self.projects.iter().filter(|p| !p.cancelled).count()
    }

    /// Projects with a failed step
    #[must_use]
    pub fn failed(&self) -> usize {
        self.projects.iter().filter(|p| p.has_failure()).count()
    }

    /// Projects not started or cut short by cancellation
    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.projects.iter().filter(|p| p.was_cancelled()).count()
    }

    /// Check if the run as a whole succeeded
    #[must_use]
    pub fn passed(&self) -> bool {
        self.projects.iter().all(ProjectReport::succeeded)
    }

    /// Human-readable summary
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Retention Sweep Report ({})", self.run_id);
        let _ = writeln!(out, "=====================================");
        let _ = writeln!(out, "Dry run: {}", self.dry_run);
        let _ = writeln!(out, "Total projects: {}", self.total_projects);
        let _ = writeln!(out, "Excluded: {}", self.excluded.len());
        let _ = writeln!(out, "Processed: {}", self.processed());
        let _ = writeln!(out, "Failed: {}", self.failed());
        let _ = writeln!(out, "Cancelled: {}", self.cancelled());
        let _ = writeln!(out);

        for report in &self.projects {
            let execution = match &report.execution {
                Some(ExecutionStep::Monitored(m)) => match &m.outcome {
                    ExecutionOutcome::Terminal { status } => status.to_string(),
                    ExecutionOutcome::Undetermined { reason } => format!("undetermined ({reason:?})"),
                },
                Some(ExecutionStep::Skipped { reason }) => format!("skipped ({reason})"),
                None => "-".to_string(),
            };
            let state = if report.has_failure() {
                "FAILED"
            } else if report.was_cancelled() {
                "CANCELLED"
            } else {
                "OK"
            };
            let _ = writeln!(
                out,
                "  {:<30} {:<10} {:<9} {}",
                report.project.name, report.project.id, state, execution
            );
            for failure in report.failure.iter().chain(report.restore_failure.iter()) {
                let _ = writeln!(out, "      {:?}: {}", failure.step, failure.message);
            }
        }

        out
    }
}

/// Sequences reconciliation and monitoring across the fleet
#[derive(Debug, Clone)]
pub struct FleetOrchestrator {
    catalog: CatalogLoader,
    reconciler: PolicyReconciler,
    monitor: ExecutionMonitor,
    config: FleetConfig,
    cancel: CancelSignal,
}

impl FleetOrchestrator {
    /// Create orchestrator over a gateway
    #[must_use]
    pub fn new(gateway: Arc<dyn RegistryGateway>, config: FleetConfig) -> Self {
        Self {
            catalog: CatalogLoader::new(Arc::clone(&gateway)),
            reconciler: PolicyReconciler::new(Arc::clone(&gateway))
                .with_retention_rules(config.retention_rules.clone()),
            monitor: ExecutionMonitor::new(gateway, config.monitor),
            config,
            cancel: CancelSignal::never(),
        }
    }

    /// With cancellation signal
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.monitor = self.monitor.with_cancel(cancel.clone());
        self.cancel = cancel;
        self
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// Load the catalog, apply exclusions and process every included project
    ///
    /// # Errors
    /// - `SweepError::Catalog` if the catalog cannot be loaded; per-project
    ///   failures are recorded in the report instead
    pub async fn run(&self) -> Result<FleetReport, SweepError> {
        tracing::info!("Fetching all projects");
        let projects = self.catalog.list_projects().await?;
        let total = projects.len();
        let filtered = filter_projects(projects, &self.config);
        Ok(self.run_catalog(total, filtered).await)
    }

    /// Process an already filtered catalog
    pub async fn run_catalog(&self, total_projects: usize, catalog: FilteredCatalog) -> FleetReport {
        let run_id = RunId::new();
        let started_at = Utc::now();
        tracing::info!(%run_id, projects = catalog.included.len(), "Starting fleet run");

        let projects: Vec<ProjectReport> = futures::stream::iter(catalog.included)
            .map(|project| self.process_project(project))
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        let report = FleetReport {
            run_id,
            dry_run: self.config.dry_run,
            total_projects,
            excluded: catalog.excluded.into_iter().map(|p| p.name).collect(),
            projects,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            %run_id,
            processed = report.processed(),
            failed = report.failed(),
            cancelled = report.cancelled(),
            "Fleet run finished"
        );
        report
    }

    /// Run the protective bracket for one project
    pub async fn process_project(&self, project: Project) -> ProjectReport {
        let span = tracing::info_span!("project", name = %project.name, id = %project.id);
        self.bracket(project).instrument(span).await
    }

    async fn bracket(&self, project: Project) -> ProjectReport {
        let mut report = ProjectReport::start(project.clone());
        if self.cancel.is_cancelled() {
            tracing::info!("Run cancelled, project not started");
            report.cancelled = true;
            return report.finish();
        }

        if let Err(failure) = self.protected_steps(&project, &mut report).await {
            tracing::error!(step = ?failure.step, error = %failure.message, "Project step failed");
            report.failure = Some(failure);
        }

        match self.reconciler.ensure_immutability_rule(project.id, false).await {
            Ok(outcome) => report.immutability_restored = Some(outcome),
            Err(err) => {
                tracing::error!(error = %err, "Failed to restore immutable rule");
                report.restore_failure = Some(StepFailure::new(Step::RestoreImmutability, &err));
            }
        }

        report.finish()
    }

    async fn protected_steps(
        &self,
        project: &Project,
        report: &mut ProjectReport,
    ) -> Result<(), StepFailure> {
        let enabled = self
            .reconciler
            .ensure_immutability_rule(project.id, true)
            .await
            .map_err(|e| StepFailure::new(Step::EnableImmutability, &e))?;
        report.immutability_enabled = Some(enabled);

        let retention = self
            .reconciler
            .ensure_retention_policy(project.id)
            .await
            .map_err(|e| StepFailure::new(Step::EnsureRetention, &e))?;
        report.retention = Some(retention);

        if self.cancel.is_cancelled() {
            tracing::info!("Run cancelled, retention execution skipped");
            report.execution = Some(ExecutionStep::Skipped {
                reason: SkipReason::Cancelled,
            });
            return Ok(());
        }

        let Some(policy_id) = project.retention_id else {
            tracing::info!("No retention policy in catalog, retention execution skipped");
            report.execution = Some(ExecutionStep::Skipped {
                reason: SkipReason::NoRetentionPolicy,
            });
            return Ok(());
        };
        if retention.policy_id() != policy_id {
            tracing::warn!(
                catalog = %policy_id,
                current = %retention.policy_id(),
                "Retention policy changed since the catalog was loaded"
            );
        }

        let monitored = self
            .monitor
            .run_and_await(policy_id, self.config.dry_run)
            .await
            .map_err(|e| StepFailure::new(Step::RunExecution, &e))?;
        report.execution = Some(ExecutionStep::Monitored(monitored));

        Ok(())
    }
}
