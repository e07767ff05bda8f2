//! Policy reconciler
//!
//! Converges one project toward the managed governance state:
//! - exactly the managed immutable rule configuration (create or toggle in place)
//! - exactly one retention policy (create if absent, never replace)

use crate::error::SweepError;
use crate::gateway::RegistryGateway;
use crate::policy::{default_retention_rules, ImmutableRule, RetentionPolicy, RetentionRule};
use crate::types::{ProjectId, RetentionId, RuleId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of [`PolicyReconciler::ensure_immutability_rule`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImmutabilityOutcome {
    /// No rule existed; the managed rule was created
    Created {
        /// New rule
        rule_id: RuleId,
        /// Requested flag
        enabled: bool,
    },
    /// Existing rules were toggled in place
    Updated {
        /// Every rule updated
        rule_ids: Vec<RuleId>,
        /// Requested flag
        enabled: bool,
    },
}

impl ImmutabilityOutcome {
    /// Rules now carrying the requested flag
    #[must_use]
    pub fn rule_ids(&self) -> Vec<RuleId> {
        match self {
            Self::Created { rule_id, .. } => vec![*rule_id],
            Self::Updated { rule_ids, .. } => rule_ids.clone(),
        }
    }
}

/// Result of [`PolicyReconciler::ensure_retention_policy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "policy_id", rename_all = "snake_case")]
pub enum RetentionOutcome {
    /// A policy was already attached; nothing was changed
    AlreadyPresent(RetentionId),
    /// A new policy was created
    Created(RetentionId),
}

impl RetentionOutcome {
    /// Policy attached to the project after the call
    #[inline]
    #[must_use]
    pub fn policy_id(self) -> RetentionId {
        match self {
            Self::AlreadyPresent(id) | Self::Created(id) => id,
        }
    }
}

/// Idempotent per-project policy convergence
#[derive(Clone)]
pub struct PolicyReconciler {
    gateway: Arc<dyn RegistryGateway>,
    retention_rules: Vec<RetentionRule>,
}

impl std::fmt::Debug for PolicyReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyReconciler")
            .field("retention_rules", &self.retention_rules.len())
            .finish_non_exhaustive()
    }
}

impl PolicyReconciler {
    /// Create reconciler with the default retention rules
    #[inline]
    #[must_use]
    pub fn new(gateway: Arc<dyn RegistryGateway>) -> Self {
        Self {
            gateway,
            retention_rules: default_retention_rules(),
        }
    }

    /// With rules for newly created retention policies
    #[inline]
    #[must_use]
    pub fn with_retention_rules(mut self, rules: Vec<RetentionRule>) -> Self {
        self.retention_rules = rules;
        self
    }

    /// Ensure the project's immutable rules carry `enabled`
    ///
    /// Creates the match-all rule when the project has none (or the registry
    /// reports the rule list as not found). Otherwise every existing rule is
    /// updated in place, keeping its selectors, template and priority.
    ///
    /// # Errors
    /// - `SweepError::ImmutableRule` on any gateway failure; nothing is retried
    pub async fn ensure_immutability_rule(
        &self,
        project_id: ProjectId,
        enabled: bool,
    ) -> Result<ImmutabilityOutcome, SweepError> {
        let wrap = |source| SweepError::ImmutableRule { project_id, source };

        let existing = match self
            .gateway
            .list_immutable_rules(project_id)
            .await
            .map_err(wrap)?
        {
            Some(rules) => rules,
            None => {
                tracing::debug!(%project_id, "immutable rules not found, treating as none");
                Vec::new()
            }
        };

        if existing.is_empty() {
            let rule = ImmutableRule::match_all(enabled);
            let rule_id = self
                .gateway
                .create_immutable_rule(project_id, &rule)
                .await
                .map_err(wrap)?;
            tracing::info!(%project_id, %rule_id, enabled, "Immutable rule created");
            return Ok(ImmutabilityOutcome::Created { rule_id, enabled });
        }

        let mut rule_ids = Vec::with_capacity(existing.len());
        for rule in existing {
            let Some(rule_id) = rule.id else {
                tracing::warn!(%project_id, "registry listed an immutable rule without an id, skipping");
                continue;
            };
            let updated = rule.with_enabled(enabled);
            self.gateway
                .update_immutable_rule(project_id, rule_id, &updated)
                .await
                .map_err(wrap)?;
            tracing::info!(%project_id, %rule_id, enabled, "Immutable rule updated");
            rule_ids.push(rule_id);
        }

        Ok(ImmutabilityOutcome::Updated { rule_ids, enabled })
    }

    /// Ensure the project has exactly one retention policy
    ///
    /// An attached policy is left untouched. A policy is only created after the
    /// registry has confirmed there is none.
    ///
    /// # Errors
    /// - `SweepError::RetentionPolicy` if the lookup or the creation fails
    pub async fn ensure_retention_policy(
        &self,
        project_id: ProjectId,
    ) -> Result<RetentionOutcome, SweepError> {
        let wrap = |source| SweepError::RetentionPolicy { project_id, source };

        if let Some(policy_id) = self
            .gateway
            .get_retention_id(project_id)
            .await
            .map_err(wrap)?
        {
            tracing::info!(%project_id, %policy_id, "Retention policy already exists");
            return Ok(RetentionOutcome::AlreadyPresent(policy_id));
        }

        tracing::info!(%project_id, "No retention policy found");
        let policy = RetentionPolicy::for_project(project_id, self.retention_rules.clone());
        let policy_id = self
            .gateway
            .create_retention_policy(&policy)
            .await
            .map_err(wrap)?;
        tracing::info!(%project_id, %policy_id, rules = policy.rules.len(), "Retention policy created");

        Ok(RetentionOutcome::Created(policy_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::gateway::MockRegistryGateway;
    use crate::policy::Selector;
    use mockall::predicate::{always, eq, function};

    fn existing_rule(id: i64, enabled: bool) -> ImmutableRule {
        let mut rule = ImmutableRule::match_all(enabled);
        rule.id = Some(RuleId(id));
        rule
    }

    #[tokio::test]
    async fn creates_match_all_rule_when_none_exist() {
        let mut gateway = MockRegistryGateway::new();
        gateway
            .expect_list_immutable_rules()
            .with(eq(ProjectId(5)))
            .times(1)
            .returning(|_| Ok(Some(Vec::new())));
        gateway
            .expect_create_immutable_rule()
            .with(
                eq(ProjectId(5)),
                function(|rule: &ImmutableRule| rule.is_enabled() && rule.is_match_all()),
            )
            .times(1)
            .returning(|_, _| Ok(RuleId(40)));
        gateway.expect_update_immutable_rule().never();

        let reconciler = PolicyReconciler::new(Arc::new(gateway));
        let outcome = reconciler
            .ensure_immutability_rule(ProjectId(5), true)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ImmutabilityOutcome::Created {
                rule_id: RuleId(40),
                enabled: true
            }
        );
    }

    #[tokio::test]
    async fn not_found_rule_listing_means_create() {
        let mut gateway = MockRegistryGateway::new();
        gateway
            .expect_list_immutable_rules()
            .returning(|_| Ok(None));
        gateway
            .expect_create_immutable_rule()
            .times(1)
            .returning(|_, _| Ok(RuleId(1)));

        let reconciler = PolicyReconciler::new(Arc::new(gateway));
        let outcome = reconciler
            .ensure_immutability_rule(ProjectId(5), false)
            .await
            .unwrap();
        assert_eq!(outcome.rule_ids(), vec![RuleId(1)]);
    }

    #[tokio::test]
    async fn toggles_existing_rule_preserving_selectors() {
        let mut custom = existing_rule(8, true);
        custom.tag_selectors = vec![Selector::tag_matches("v*")];
        let listed = custom.clone();

        let mut gateway = MockRegistryGateway::new();
        gateway
            .expect_list_immutable_rules()
            .returning(move |_| Ok(Some(vec![listed.clone()])));
        gateway.expect_create_immutable_rule().never();
        gateway
            .expect_update_immutable_rule()
            .with(
                eq(ProjectId(2)),
                eq(RuleId(8)),
                function(move |rule: &ImmutableRule| {
                    !rule.is_enabled() && rule.tag_selectors == custom.tag_selectors
                }),
            )
            .times(1)
            .returning(|_, _, _| Ok(()));

        let reconciler = PolicyReconciler::new(Arc::new(gateway));
        let outcome = reconciler
            .ensure_immutability_rule(ProjectId(2), false)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ImmutabilityOutcome::Updated {
                rule_ids: vec![RuleId(8)],
                enabled: false
            }
        );
    }

    #[tokio::test]
    async fn update_failure_is_surfaced() {
        let mut gateway = MockRegistryGateway::new();
        gateway
            .expect_list_immutable_rules()
            .returning(|_| Ok(Some(vec![existing_rule(1, true)])));
        gateway
            .expect_update_immutable_rule()
            .returning(|_, _, _| Err(GatewayError::status(500, "boom")));

        let reconciler = PolicyReconciler::new(Arc::new(gateway));
        let err = reconciler
            .ensure_immutability_rule(ProjectId(3), true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SweepError::ImmutableRule {
                project_id: ProjectId(3),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn existing_retention_policy_is_a_no_op() {
        let mut gateway = MockRegistryGateway::new();
        gateway
            .expect_get_retention_id()
            .with(eq(ProjectId(4)))
            .returning(|_| Ok(Some(RetentionId(77))));
        gateway.expect_create_retention_policy().never();

        let reconciler = PolicyReconciler::new(Arc::new(gateway));
        let outcome = reconciler.ensure_retention_policy(ProjectId(4)).await.unwrap();
        assert_eq!(outcome, RetentionOutcome::AlreadyPresent(RetentionId(77)));
    }

    #[tokio::test]
    async fn creates_policy_when_absent() {
        let mut gateway = MockRegistryGateway::new();
        gateway.expect_get_retention_id().returning(|_| Ok(None));
        gateway
            .expect_create_retention_policy()
            .with(function(|policy: &RetentionPolicy| {
                policy.project_id() == Some(ProjectId(4)) && policy.rules.len() == 3
            }))
            .times(1)
            .returning(|_| Ok(RetentionId(12)));

        let reconciler = PolicyReconciler::new(Arc::new(gateway));
        let outcome = reconciler.ensure_retention_policy(ProjectId(4)).await.unwrap();
        assert_eq!(outcome, RetentionOutcome::Created(RetentionId(12)));
        assert_eq!(outcome.policy_id(), RetentionId(12));
    }

    #[tokio::test]
    async fn unconfirmed_absence_never_creates() {
        let mut gateway = MockRegistryGateway::new();
        gateway
            .expect_get_retention_id()
            .with(always())
            .returning(|_| Err(GatewayError::Transport("connection reset".into())));
        gateway.expect_create_retention_policy().never();

        let reconciler = PolicyReconciler::new(Arc::new(gateway));
        let err = reconciler.ensure_retention_policy(ProjectId(4)).await.unwrap_err();
        assert!(matches!(err, SweepError::RetentionPolicy { .. }));
    }
}
