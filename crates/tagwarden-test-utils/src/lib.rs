//! Testing utilities for the tagwarden workspace
//!
//! Shared test helpers, fixtures, and an in-memory registry.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tagwarden_core::{
    ExecutionId, ExecutionStatus, FleetConfig, FleetOrchestrator, GatewayError, ImmutableRule,
    Page, ProjectId, ProjectSummary, RegistryGateway, RetentionExecution, RetentionId,
    RetentionPolicy, RuleId,
};

/// Gateway call as recorded by [`FakeRegistry`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListProjects,
    ListImmutableRules(ProjectId),
    CreateImmutableRule {
        project_id: ProjectId,
        enabled: bool,
    },
    UpdateImmutableRule {
        project_id: ProjectId,
        rule_id: RuleId,
        enabled: bool,
    },
    GetRetentionId(ProjectId),
    CreateRetentionPolicy(ProjectId),
    TriggerExecution {
        policy_id: RetentionId,
        dry_run: bool,
    },
    ListExecutions(RetentionId),
}

impl Call {
    /// Check if the call changes registry state
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::CreateImmutableRule { .. }
                | Self::UpdateImmutableRule { .. }
                | Self::CreateRetentionPolicy(_)
                | Self::TriggerExecution { .. }
        )
    }
}

/// Gateway operation that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailPoint {
    ListProjects,
    ListImmutableRules,
    CreateImmutableRule,
    UpdateImmutableRule,
    GetRetentionId,
    CreateRetentionPolicy,
    TriggerExecution,
    ListExecutions,
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    projects: Vec<ProjectSummary>,
    rules: BTreeMap<ProjectId, Vec<ImmutableRule>>,
    policies: BTreeMap<RetentionId, RetentionPolicy>,
    executions: BTreeMap<RetentionId, Vec<RetentionExecution>>,
    scripts: BTreeMap<RetentionId, VecDeque<Vec<RetentionExecution>>>,
    failures: BTreeMap<FailPoint, GatewayError>,
    calls: Vec<Call>,
}

impl State {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, point: FailPoint) -> Result<(), GatewayError> {
        match self.failures.get(&point) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn project_mut(&mut self, project_id: ProjectId) -> Option<&mut ProjectSummary> {
        self.projects.iter_mut().find(|p| p.id == project_id)
    }
}

/// In-memory registry implementing [`RegistryGateway`]
///
/// Projects are registered with an empty rule list. Triggering a policy
/// without a script appends an execution that is immediately `Success`;
/// [`FakeRegistry::script_executions`] replaces that with a fixed sequence of
/// listings (the last one repeats).
#[derive(Debug, Default)]
pub struct FakeRegistry {
    state: Mutex<State>,
}

impl FakeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a project with no rules and no retention policy
    pub fn add_project(&self, name: &str) -> ProjectId {
        let mut state = self.state.lock();
        let id = ProjectId(state.allocate());
        state.projects.push(ProjectSummary {
            id,
            name: name.to_string(),
            retention_id: None,
        });
        state.rules.insert(id, Vec::new());
        id
    }

    /// Add an existing immutable rule to a project
    pub fn add_immutable_rule(&self, project_id: ProjectId, enabled: bool) -> RuleId {
        let mut state = self.state.lock();
        let id = RuleId(state.allocate());
        let mut rule = ImmutableRule::match_all(enabled);
        rule.id = Some(id);
        state.rules.entry(project_id).or_default().push(rule);
        id
    }

    /// Make the project's rule listing answer "not found"
    pub fn hide_immutable_rules(&self, project_id: ProjectId) {
        self.state.lock().rules.remove(&project_id);
    }

    /// Attach an existing retention policy to a project
    pub fn attach_retention_policy(&self, project_id: ProjectId) -> RetentionId {
        let mut state = self.state.lock();
        let id = RetentionId(state.allocate());
        let mut policy =
            RetentionPolicy::for_project(project_id, tagwarden_core::default_retention_rules());
        policy.id = Some(id);
        state.policies.insert(id, policy);
        if let Some(project) = state.project_mut(project_id) {
            project.retention_id = Some(id);
        }
        id
    }

    /// Fix the listings returned for a policy's executions, in order
    pub fn script_executions(&self, policy_id: RetentionId, listings: Vec<Vec<RetentionExecution>>) {
        self.state
            .lock()
            .scripts
            .insert(policy_id, listings.into_iter().collect());
    }

    /// Make an operation fail until [`FakeRegistry::recover`] is called
    pub fn fail(&self, point: FailPoint, error: GatewayError) {
        self.state.lock().failures.insert(point, error);
    }

    /// Stop failing an operation
    pub fn recover(&self, point: FailPoint) {
        self.state.lock().failures.remove(&point);
    }

    /// Every call made so far
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Mutating calls made so far
    #[must_use]
    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    /// Number of calls matching a predicate
    #[must_use]
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Current rules of a project
    #[must_use]
    pub fn immutable_rules(&self, project_id: ProjectId) -> Vec<ImmutableRule> {
        self.state
            .lock()
            .rules
            .get(&project_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Retention policies scoped to a project
    #[must_use]
    pub fn policies_for(&self, project_id: ProjectId) -> Vec<RetentionPolicy> {
        self.state
            .lock()
            .policies
            .values()
            .filter(|p| p.project_id() == Some(project_id))
            .cloned()
            .collect()
    }

    /// Retention policy recorded in the project metadata
    #[must_use]
    pub fn retention_id(&self, project_id: ProjectId) -> Option<RetentionId> {
        self.state
            .lock()
            .projects
            .iter()
            .find(|p| p.id == project_id)
            .and_then(|p| p.retention_id)
    }

    /// Project owning a retention policy
    #[must_use]
    pub fn policy_project(&self, policy_id: RetentionId) -> Option<ProjectId> {
        self.state
            .lock()
            .policies
            .get(&policy_id)
            .and_then(RetentionPolicy::project_id)
    }

    /// Projects any recorded call referred to, directly or through a policy
    #[must_use]
    pub fn touched_projects(&self) -> Vec<ProjectId> {
        let mut touched: Vec<ProjectId> = self
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::ListProjects => None,
                Call::ListImmutableRules(project_id)
                | Call::CreateImmutableRule { project_id, .. }
                | Call::UpdateImmutableRule { project_id, .. }
                | Call::GetRetentionId(project_id)
                | Call::CreateRetentionPolicy(project_id) => Some(project_id),
                Call::TriggerExecution { policy_id, .. } | Call::ListExecutions(policy_id) => {
                    self.policy_project(policy_id)
                }
            })
            .collect();
        touched.sort();
        touched.dedup();
        touched
    }
}

#[async_trait]
impl RegistryGateway for FakeRegistry {
    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(Call::ListProjects);
        state.check(FailPoint::ListProjects)?;
        Ok(state.projects.clone())
    }

    async fn list_immutable_rules(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<Vec<ImmutableRule>>, GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(Call::ListImmutableRules(project_id));
        state.check(FailPoint::ListImmutableRules)?;
        Ok(state.rules.get(&project_id).cloned())
    }

    async fn create_immutable_rule(
        &self,
        project_id: ProjectId,
        rule: &ImmutableRule,
    ) -> Result<RuleId, GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(Call::CreateImmutableRule {
            project_id,
            enabled: rule.is_enabled(),
        });
        state.check(FailPoint::CreateImmutableRule)?;
        if !state.projects.iter().any(|p| p.id == project_id) {
            return Err(GatewayError::status(404, "project not found"));
        }
        let id = RuleId(state.allocate());
        let mut stored = rule.clone();
        stored.id = Some(id);
        state.rules.entry(project_id).or_default().push(stored);
        Ok(id)
    }

    async fn update_immutable_rule(
        &self,
        project_id: ProjectId,
        rule_id: RuleId,
        rule: &ImmutableRule,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(Call::UpdateImmutableRule {
            project_id,
            rule_id,
            enabled: rule.is_enabled(),
        });
        state.check(FailPoint::UpdateImmutableRule)?;
        let slot = state
            .rules
            .get_mut(&project_id)
            .and_then(|rules| rules.iter_mut().find(|r| r.id == Some(rule_id)))
            .ok_or_else(|| GatewayError::status(404, "rule not found"))?;
        *slot = ImmutableRule {
            id: Some(rule_id),
            ..rule.clone()
        };
        Ok(())
    }

    async fn get_retention_id(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<RetentionId>, GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(Call::GetRetentionId(project_id));
        state.check(FailPoint::GetRetentionId)?;
        Ok(state
            .projects
            .iter()
            .find(|p| p.id == project_id)
            .and_then(|p| p.retention_id))
    }

    async fn create_retention_policy(
        &self,
        policy: &RetentionPolicy,
    ) -> Result<RetentionId, GatewayError> {
        let mut state = self.state.lock();
        let project_id = policy
            .project_id()
            .ok_or_else(|| GatewayError::status(400, "policy is not project scoped"))?;
        state.calls.push(Call::CreateRetentionPolicy(project_id));
        state.check(FailPoint::CreateRetentionPolicy)?;
        let id = RetentionId(state.allocate());
        let project = state
            .project_mut(project_id)
            .ok_or_else(|| GatewayError::status(404, "project not found"))?;
        project.retention_id = Some(id);
        let mut stored = policy.clone();
        stored.id = Some(id);
        state.policies.insert(id, stored);
        Ok(id)
    }

    async fn trigger_execution(
        &self,
        policy_id: RetentionId,
        dry_run: bool,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(Call::TriggerExecution { policy_id, dry_run });
        state.check(FailPoint::TriggerExecution)?;
        if !state.policies.contains_key(&policy_id) {
            return Err(GatewayError::status(404, "retention not found"));
        }
        if !state.scripts.contains_key(&policy_id) {
            let id = ExecutionId(state.allocate());
            let execution = RetentionExecution::new(id, ExecutionStatus::Success)
                .with_policy(policy_id)
                .with_dry_run(dry_run);
            state.executions.entry(policy_id).or_default().insert(0, execution);
        }
        Ok(())
    }

    async fn list_executions(
        &self,
        policy_id: RetentionId,
        page: Page,
    ) -> Result<Vec<RetentionExecution>, GatewayError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.calls.push(Call::ListExecutions(policy_id));
        state.check(FailPoint::ListExecutions)?;

        let listing = match state.scripts.get_mut(&policy_id) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap_or_default(),
            Some(script) => script.front().cloned().unwrap_or_default(),
            None => state.executions.get(&policy_id).cloned().unwrap_or_default(),
        };

        let size = page.size as usize;
        let skip = (page.number.saturating_sub(1) as usize) * size;
        Ok(listing.into_iter().skip(skip).take(size).collect())
    }
}

/// Execution snapshot
#[must_use]
pub fn execution(id: i64, status: &str) -> RetentionExecution {
    RetentionExecution::new(ExecutionId(id), status)
}

/// Listing with a single execution
#[must_use]
pub fn listing(id: i64, status: &str) -> Vec<RetentionExecution> {
    vec![execution(id, status)]
}

/// Orchestrator over a fake registry with default configuration
pub fn setup_fleet(registry: &Arc<FakeRegistry>) -> FleetOrchestrator {
    setup_fleet_with(registry, FleetConfig::new())
}

/// Orchestrator over a fake registry
pub fn setup_fleet_with(registry: &Arc<FakeRegistry>, config: FleetConfig) -> FleetOrchestrator {
    let gateway: Arc<dyn RegistryGateway> = registry.clone();
    FleetOrchestrator::new(gateway, config)
}
