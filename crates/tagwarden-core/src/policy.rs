//! Governance policy content
//!
//! Immutable tag rules and retention policies in the registry's own JSON shape,
//! plus the fixed templates this crate converges projects toward.

use crate::types::{ProjectId, RetentionId, RuleId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Action of a managed immutable rule
pub const IMMUTABLE_ACTION: &str = "immutable";
/// Template of a managed immutable rule
pub const IMMUTABLE_TEMPLATE: &str = "immutable_template";
/// Action of a retention rule
pub const RETAIN_ACTION: &str = "retain";
/// Template/param key of "keep the latest K pushed" retention rules
pub const LATEST_PUSHED_K: &str = "latestPushedK";
/// Scope selector key for repositories
pub const REPOSITORY_SCOPE: &str = "repository";

/// Glob selector over repository or tag names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    /// Matcher kind (`doublestar`)
    pub kind: String,
    /// `matches`/`excludes` for tags, `repoMatches`/`repoExcludes` for repositories
    pub decoration: String,
    /// Glob pattern
    pub pattern: String,
    /// JSON-encoded extras, e.g. `{"untagged":true}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<String>,
}

impl Selector {
    /// Repository selector
    #[inline]
    #[must_use]
    pub fn repo_matches(pattern: impl Into<String>) -> Self {
        Self {
            kind: "doublestar".to_string(),
            decoration: "repoMatches".to_string(),
            pattern: pattern.into(),
            extras: None,
        }
    }

    /// Tag selector
    #[inline]
    #[must_use]
    pub fn tag_matches(pattern: impl Into<String>) -> Self {
        Self {
            kind: "doublestar".to_string(),
            decoration: "matches".to_string(),
            pattern: pattern.into(),
            extras: None,
        }
    }

    /// Also select untagged artifacts
    #[must_use]
    pub fn include_untagged(mut self) -> Self {
        self.extras = Some(serde_json::json!({ "untagged": true }).to_string());
        self
    }

    /// Check the `untagged` extra
    #[must_use]
    pub fn includes_untagged(&self) -> bool {
        self.extras
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
            .and_then(|v| v.get("untagged").and_then(Value::as_bool))
            .unwrap_or(false)
    }
}

fn all_repositories() -> BTreeMap<String, Vec<Selector>> {
    BTreeMap::from([(
        REPOSITORY_SCOPE.to_string(),
        vec![Selector::repo_matches("**")],
    )])
}

/// Immutable tag rule
///
/// The registry stores the inverse flag (`disabled`); [`ImmutableRule::is_enabled`]
/// is the view the reconciler works with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImmutableRule {
    /// Rule ID, absent before creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RuleId>,
    /// Evaluation priority
    #[serde(default)]
    pub priority: i64,
    /// Registry-side disabled flag
    #[serde(default)]
    pub disabled: bool,
    /// Rule action
    pub action: String,
    /// Rule template
    #[serde(default)]
    pub template: String,
    /// Template parameters
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    /// Tag selectors
    #[serde(default)]
    pub tag_selectors: Vec<Selector>,
    /// Scope selectors keyed by scope (`repository`)
    #[serde(default)]
    pub scope_selectors: BTreeMap<String, Vec<Selector>>,
}

impl ImmutableRule {
    /// Managed rule: every tag in every repository
    #[must_use]
    pub fn match_all(enabled: bool) -> Self {
        Self {
            id: None,
            priority: 0,
            disabled: !enabled,
            action: IMMUTABLE_ACTION.to_string(),
            template: IMMUTABLE_TEMPLATE.to_string(),
            params: BTreeMap::new(),
            tag_selectors: vec![Selector::tag_matches("**")],
            scope_selectors: all_repositories(),
        }
    }

    /// Check if the rule is in effect
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }

    /// Same rule with only the enabled flag changed
    #[inline]
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.disabled = !enabled;
        self
    }

    /// Check if this is the all-repositories/all-tags rule
    #[must_use]
    pub fn is_match_all(&self) -> bool {
        self.tag_selectors == [Selector::tag_matches("**")]
            && self.scope_selectors == all_repositories()
    }
}

/// One rule of a retention policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionRule {
    /// Rule action (`retain`)
    pub action: String,
    /// Template parameters
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    /// Scope selectors keyed by scope (`repository`)
    #[serde(default)]
    pub scope_selectors: BTreeMap<String, Vec<Selector>>,
    /// Tag selectors
    #[serde(default)]
    pub tag_selectors: Vec<Selector>,
    /// Rule template
    pub template: String,
}

impl RetentionRule {
    /// Keep the `k` most recently pushed artifacts whose tag matches `tag_pattern`,
    /// untagged artifacts included
    #[must_use]
    pub fn latest_pushed(k: u32, tag_pattern: impl Into<String>) -> Self {
        Self {
            action: RETAIN_ACTION.to_string(),
            params: BTreeMap::from([(LATEST_PUSHED_K.to_string(), Value::from(k))]),
            scope_selectors: all_repositories(),
            tag_selectors: vec![Selector::tag_matches(tag_pattern).include_untagged()],
            template: LATEST_PUSHED_K.to_string(),
        }
    }

    /// Number of pushes retained, for `latestPushedK` rules
    #[must_use]
    pub fn retained_count(&self) -> Option<u64> {
        self.params.get(LATEST_PUSHED_K).and_then(Value::as_u64)
    }

    /// First tag pattern
    #[must_use]
    pub fn tag_pattern(&self) -> Option<&str> {
        self.tag_selectors.first().map(|s| s.pattern.as_str())
    }
}

/// Default retention rules: `t-*` keeps 3, `m-*` keeps 10, `r-*` keeps 10
#[must_use]
pub fn default_retention_rules() -> Vec<RetentionRule> {
    vec![
        RetentionRule::latest_pushed(3, "t-*"),
        RetentionRule::latest_pushed(10, "m-*"),
        RetentionRule::latest_pushed(10, "r-*"),
    ]
}

/// Retention policy scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyScope {
    /// Scope level (`project`)
    pub level: String,
    /// Scoped object ID
    #[serde(rename = "ref")]
    pub reference: i64,
}

/// Retention policy trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTrigger {
    /// Trigger kind (`Schedule`)
    pub kind: String,
    /// Trigger settings (`cron`)
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
}

impl PolicyTrigger {
    /// Schedule trigger with an empty cron; runs are started explicitly
    #[must_use]
    pub fn manual_only() -> Self {
        Self {
            kind: "Schedule".to_string(),
            settings: BTreeMap::from([("cron".to_string(), Value::from(""))]),
        }
    }
}

/// Tag retention policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Policy ID, absent before creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RetentionId>,
    /// Rule combination (`or`)
    pub algorithm: String,
    /// Policy scope
    pub scope: PolicyScope,
    /// Policy trigger
    pub trigger: PolicyTrigger,
    /// Retention rules
    pub rules: Vec<RetentionRule>,
}

impl RetentionPolicy {
    /// Project-level OR policy over `rules`
    #[must_use]
    pub fn for_project(project_id: ProjectId, rules: Vec<RetentionRule>) -> Self {
        Self {
            id: None,
            algorithm: "or".to_string(),
            scope: PolicyScope {
                level: "project".to_string(),
                reference: project_id.get(),
            },
            trigger: PolicyTrigger::manual_only(),
            rules,
        }
    }

    /// Project this policy is scoped to
    #[must_use]
    pub fn project_id(&self) -> Option<ProjectId> {
        (self.scope.level == "project").then_some(ProjectId(self.scope.reference))
    }
}
