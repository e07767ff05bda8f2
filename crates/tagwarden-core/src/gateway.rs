//! Registry gateway capability
//!
//! Everything the engine needs from the registry. Reads that can meet a
//! missing object return `Ok(None)` instead of an error, so callers branch on
//! a value rather than on an error kind.

use crate::error::GatewayError;
use crate::policy::{ImmutableRule, RetentionPolicy};
use crate::types::{Page, ProjectId, ProjectSummary, RetentionExecution, RetentionId, RuleId};
use async_trait::async_trait;

/// Registry operations consumed by the catalog, reconciler and monitor
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistryGateway: Send + Sync {
    /// List every project (all pages)
    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, GatewayError>;

    /// List a project's immutable tag rules; `None` if the registry reports not found
    async fn list_immutable_rules(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<Vec<ImmutableRule>>, GatewayError>;

    /// Create an immutable tag rule, returning its new ID
    async fn create_immutable_rule(
        &self,
        project_id: ProjectId,
        rule: &ImmutableRule,
    ) -> Result<RuleId, GatewayError>;

    /// Replace an immutable tag rule
    async fn update_immutable_rule(
        &self,
        project_id: ProjectId,
        rule_id: RuleId,
        rule: &ImmutableRule,
    ) -> Result<(), GatewayError>;

    /// Read a project's retention policy ID; `None` if it has none
    async fn get_retention_id(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<RetentionId>, GatewayError>;

    /// Create a retention policy, returning its new ID
    async fn create_retention_policy(
        &self,
        policy: &RetentionPolicy,
    ) -> Result<RetentionId, GatewayError>;

    /// Start a retention execution
    async fn trigger_execution(
        &self,
        policy_id: RetentionId,
        dry_run: bool,
    ) -> Result<(), GatewayError>;

    /// List a policy's executions, newest first
    async fn list_executions(
        &self,
        policy_id: RetentionId,
        page: Page,
    ) -> Result<Vec<RetentionExecution>, GatewayError>;
}
