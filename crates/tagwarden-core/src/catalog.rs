//! Project catalog
//!
//! Lists all projects and annotates each with its retention policy and first
//! immutable tag rule. Missing state is recorded as `None`, never as an error.

use crate::config::FleetConfig;
use crate::error::SweepError;
use crate::gateway::RegistryGateway;
use crate::types::Project;
use std::sync::Arc;

/// Loads the project catalog from the registry
#[derive(Clone)]
pub struct CatalogLoader {
    gateway: Arc<dyn RegistryGateway>,
}

impl std::fmt::Debug for CatalogLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogLoader").finish_non_exhaustive()
    }
}

impl CatalogLoader {
    /// Create loader over a gateway
    #[inline]
    #[must_use]
    pub fn new(gateway: Arc<dyn RegistryGateway>) -> Self {
        Self { gateway }
    }

    /// List every project with its governance state
    ///
    /// # Errors
    /// - `SweepError::Catalog` if listing projects or rules fails for any reason
    ///   other than the rules being absent
    pub async fn list_projects(&self) -> Result<Vec<Project>, SweepError> {
        let summaries = self
            .gateway
            .list_projects()
            .await
            .map_err(SweepError::Catalog)?;

        let mut projects = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let immutable_rule_id = self
                .gateway
                .list_immutable_rules(summary.id)
                .await
                .map_err(SweepError::Catalog)?
                .and_then(|rules| rules.first().and_then(|r| r.id));

            tracing::debug!(
                project = %summary.name,
                project_id = %summary.id,
                retention_id = ?summary.retention_id,
                immutable_rule_id = ?immutable_rule_id,
                "catalogued project"
            );

            projects.push(Project {
                id: summary.id,
                name: summary.name,
                retention_id: summary.retention_id,
                immutable_rule_id,
            });
        }

        tracing::info!(total = projects.len(), "Fetched project catalog");
        Ok(projects)
    }
}

/// Catalog split by the exclusion set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredCatalog {
    /// Projects to reconcile, in catalog order
    pub included: Vec<Project>,
    /// Projects skipped by name
    pub excluded: Vec<Project>,
}

/// Apply the exclusion set once, before orchestration
#[must_use]
pub fn filter_projects(projects: Vec<Project>, config: &FleetConfig) -> FilteredCatalog {
    let (excluded, included): (Vec<_>, Vec<_>) = projects
        .into_iter()
        .partition(|p| config.is_excluded(&p.name));

    tracing::info!(
        included = included.len(),
        excluded = excluded.len(),
        "Filtered projects"
    );

    FilteredCatalog { included, excluded }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::gateway::MockRegistryGateway;
    use crate::policy::ImmutableRule;
    use crate::types::{ProjectId, ProjectSummary, RetentionId, RuleId};

    fn summary(id: i64, name: &str, retention: Option<i64>) -> ProjectSummary {
        ProjectSummary {
            id: ProjectId(id),
            name: name.to_string(),
            retention_id: retention.map(RetentionId),
        }
    }

    #[tokio::test]
    async fn absent_state_maps_to_none() {
        let mut gateway = MockRegistryGateway::new();
        gateway.expect_list_projects().returning(|| {
            Ok(vec![
                summary(1, "alpha", Some(11)),
                summary(2, "beta", None),
                summary(3, "gamma", None),
            ])
        });
        gateway
            .expect_list_immutable_rules()
            .returning(|project_id| match project_id.get() {
                1 => {
                    let mut rule = ImmutableRule::match_all(false);
                    rule.id = Some(RuleId(100));
                    Ok(Some(vec![rule]))
                }
                2 => Ok(Some(Vec::new())),
                _ => Ok(None),
            });

        let loader = CatalogLoader::new(Arc::new(gateway));
        let projects = loader.list_projects().await.unwrap();

        assert_eq!(projects.len(), 3);
        assert_eq!(projects[0].retention_id, Some(RetentionId(11)));
        assert_eq!(projects[0].immutable_rule_id, Some(RuleId(100)));
        assert_eq!(projects[1].immutable_rule_id, None);
        assert_eq!(projects[2].immutable_rule_id, None);
        assert_eq!(projects[2].retention_id, None);
    }

    #[tokio::test]
    async fn rule_listing_failure_is_surfaced() {
        let mut gateway = MockRegistryGateway::new();
        gateway
            .expect_list_projects()
            .returning(|| Ok(vec![summary(1, "alpha", None)]));
        gateway
            .expect_list_immutable_rules()
            .returning(|_| Err(GatewayError::status(503, "unavailable")));

        let loader = CatalogLoader::new(Arc::new(gateway));
        let err = loader.list_projects().await.unwrap_err();
        assert!(matches!(err, SweepError::Catalog(GatewayError::Status { status: 503, .. })));
    }

    #[test]
    fn filter_keeps_catalog_order() {
        let projects = vec![
            Project::new(ProjectId(1), "library"),
            Project::new(ProjectId(2), "payments"),
            Project::new(ProjectId(3), "sre"),
            Project::new(ProjectId(4), "search"),
        ];
        let filtered = filter_projects(projects, &FleetConfig::new());

        let included: Vec<_> = filtered.included.iter().map(|p| p.name.as_str()).collect();
        let excluded: Vec<_> = filtered.excluded.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(included, vec!["payments", "search"]);
        assert_eq!(excluded, vec!["library", "sre"]);
    }
}
