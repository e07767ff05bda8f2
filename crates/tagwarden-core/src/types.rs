//! Core types for tagwarden
//!
//! Defines the identifiers and registry-state snapshots the engine works on:
//! - Project, rule, policy and execution identifiers
//! - Catalog projects
//! - Retention executions and their statuses

use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! registry_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Raw registry value
            #[inline]
            #[must_use]
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

registry_id!(
    /// Registry project identifier
    ProjectId
);
registry_id!(
    /// Immutable tag rule identifier (assigned by the registry on creation)
    RuleId
);
registry_id!(
    /// Retention policy identifier
    RetentionId
);
registry_id!(
    /// Retention execution identifier
    ExecutionId
);

/// Identifier of one fleet run (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Generate new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Project as listed by the registry, before rule lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    /// Project ID
    pub id: ProjectId,
    /// Project name
    pub name: String,
    /// Retention policy recorded in the project metadata
    pub retention_id: Option<RetentionId>,
}

/// Catalog entry: a project annotated with its governance state
///
/// Recomputed on every run; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project ID
    pub id: ProjectId,
    /// Project name
    pub name: String,
    /// Current retention policy, if any
    pub retention_id: Option<RetentionId>,
    /// First immutable tag rule, if any
    pub immutable_rule_id: Option<RuleId>,
}

impl Project {
    /// Create project with no retention policy and no rule
    #[inline]
    #[must_use]
    pub fn new(id: ProjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            retention_id: None,
            immutable_rule_id: None,
        }
    }

    /// With retention policy
    #[inline]
    #[must_use]
    pub fn with_retention(mut self, retention_id: RetentionId) -> Self {
        self.retention_id = Some(retention_id);
        self
    }

    /// With immutable rule
    #[inline]
    #[must_use]
    pub fn with_immutable_rule(mut self, rule_id: RuleId) -> Self {
        self.immutable_rule_id = Some(rule_id);
        self
    }
}

/// Listing page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number
    pub number: u32,
    /// Page size
    pub size: u32,
}

impl Page {
    /// First page with the given size
    #[inline]
    #[must_use]
    pub fn first(size: u32) -> Self {
        Self { number: 1, size }
    }

    /// Following page
    #[inline]
    #[must_use]
    pub fn next(self) -> Self {
        Self {
            number: self.number + 1,
            size: self.size,
        }
    }
}

/// Retention execution status as reported by the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExecutionStatus {
    /// Queued, not started
    Pending,
    /// Scheduled by the job service
    Scheduled,
    /// In progress
    Running,
    /// Finished successfully
    Success,
    /// Finished with an error
    Error,
    /// Stopped before completion
    Stopped,
    /// Any status string this crate does not know; treated as non-terminal
    Other(String),
}

impl ExecutionStatus {
    /// Check if no further transition can follow
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Stopped)
    }

    /// Registry spelling of the status
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::Scheduled => "Scheduled",
            Self::Running => "Running",
            Self::Success => "Success",
            Self::Error => "Error",
            Self::Stopped => "Stopped",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ExecutionStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Pending" => Self::Pending,
            "Scheduled" => Self::Scheduled,
            "Running" | "InProgress" => Self::Running,
            "Success" | "Succeed" => Self::Success,
            "Error" => Self::Error,
            "Stopped" => Self::Stopped,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for ExecutionStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ExecutionStatus> for String {
    fn from(value: ExecutionStatus) -> Self {
        match value {
            ExecutionStatus::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One asynchronous run of a retention policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionExecution {
    /// Execution ID
    pub id: ExecutionId,
    /// Owning retention policy
    #[serde(default)]
    pub policy_id: Option<RetentionId>,
    /// Current status
    pub status: ExecutionStatus,
    /// Whether the run only evaluates rules
    #[serde(default)]
    pub dry_run: bool,
    /// Trigger kind (`MANUAL`, `SCHEDULE`)
    #[serde(default)]
    pub trigger: Option<String>,
    /// Start time as reported by the registry
    #[serde(default)]
    pub start_time: Option<String>,
    /// End time as reported by the registry
    #[serde(default)]
    pub end_time: Option<String>,
}

impl RetentionExecution {
    /// Create execution snapshot
    #[inline]
    #[must_use]
    pub fn new(id: ExecutionId, status: impl Into<ExecutionStatus>) -> Self {
        Self {
            id,
            policy_id: None,
            status: status.into(),
            dry_run: false,
            trigger: None,
            start_time: None,
            end_time: None,
        }
    }

    /// With owning policy
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy_id: RetentionId) -> Self {
        self.policy_id = Some(policy_id);
        self
    }

    /// With dry-run flag
    #[inline]
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
