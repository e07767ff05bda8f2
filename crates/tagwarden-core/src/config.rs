//! Engine configuration
//!
//! Builder-style settings for the execution monitor and the fleet run.

use crate::policy::{default_retention_rules, RetentionRule};
use std::collections::BTreeSet;
use std::time::Duration;

/// Projects never touched by a fleet run
pub const DEFAULT_EXCLUDED_PROJECTS: &[&str] = &[
    "base",
    "catalog-mirror",
    "images-mirror",
    "dgx",
    "helm-chart",
    "ht-devops",
    "ht-platforms",
    "team-os",
    "component-ocp",
    "anht",
    "aqua-security",
    "attt-efin",
    "externals",
    "library",
    "glamor-bidv",
    "netops",
    "quanglv2",
    "sre",
    "tools",
    "vhgsdv",
    "vhud",
    "bidv-omni",
    "ansp",
    "bidv-uat",
    "aiomni",
    "project-dung-test",
    "cndl-prod",
    "cndl",
    "devops",
    "drop",
];

/// Execution monitor timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Listings tried before giving up on seeing the triggered execution
    pub discovery_attempts: u32,
    /// Wait between discovery listings
    pub discovery_interval: Duration,
    /// Wait between status listings
    pub poll_interval: Duration,
    /// Page size of execution listings
    pub page_size: u32,
    /// Upper bound on the status wait; `None` waits indefinitely
    pub await_deadline: Option<Duration>,
}

impl MonitorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With discovery attempts
    #[inline]
    #[must_use]
    pub fn with_discovery_attempts(mut self, attempts: u32) -> Self {
        self.discovery_attempts = attempts;
        self
    }

    /// With discovery interval
    #[inline]
    #[must_use]
    pub fn with_discovery_interval(mut self, interval: Duration) -> Self {
        self.discovery_interval = interval;
        self
    }

    /// With status poll interval
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// With an upper bound on the status wait
    #[inline]
    #[must_use]
    pub fn with_await_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.await_deadline = deadline;
        self
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            discovery_attempts: 10,
            discovery_interval: Duration::from_secs(1),
            poll_interval: Duration::from_secs(5),
            page_size: 100,
            await_deadline: None,
        }
    }
}

/// Fleet run configuration
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Project names skipped before orchestration
    pub excluded_projects: BTreeSet<String>,
    /// Run retention executions as dry runs
    pub dry_run: bool,
    /// Projects processed at once
    pub concurrency: usize,
    /// Rules of newly created retention policies
    pub retention_rules: Vec<RetentionRule>,
    /// Monitor timing
    pub monitor: MonitorConfig,
}

impl FleetConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude additional project names
    #[must_use]
    pub fn with_exclusions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_projects.extend(names.into_iter().map(Into::into));
        self
    }

    /// Replace the exclusion set
    #[must_use]
    pub fn with_exclusion_set(mut self, names: BTreeSet<String>) -> Self {
        self.excluded_projects = names;
        self
    }

    /// With dry-run flag
    #[inline]
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// With project concurrency (at least 1)
    #[inline]
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// With retention rules for new policies
    #[inline]
    #[must_use]
    pub fn with_retention_rules(mut self, rules: Vec<RetentionRule>) -> Self {
        self.retention_rules = rules;
        self
    }

    /// With monitor configuration
    #[inline]
    #[must_use]
    pub fn with_monitor(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }

    /// Check if a project name is excluded
    #[inline]
    #[must_use]
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_projects.contains(name)
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            excluded_projects: DEFAULT_EXCLUDED_PROJECTS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            dry_run: true,
            concurrency: 1,
            retention_rules: default_retention_rules(),
            monitor: MonitorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_defaults() {
        let config = MonitorConfig::new();
        assert_eq!(config.discovery_attempts, 10);
        assert_eq!(config.discovery_interval, Duration::from_secs(1));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.page_size, 100);
        assert!(config.await_deadline.is_none());
    }

    #[test]
    fn fleet_defaults() {
        let config = FleetConfig::new();
        assert!(config.dry_run);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.excluded_projects.len(), DEFAULT_EXCLUDED_PROJECTS.len());
        assert!(config.is_excluded("library"));
        assert!(!config.is_excluded("payments"));
    }

    #[test]
    fn fleet_builder() {
        let config = FleetConfig::new()
            .with_exclusions(["payments"])
            .with_concurrency(0)
            .with_dry_run(false);
        assert!(config.is_excluded("payments"));
        assert!(config.is_excluded("library"));
        assert_eq!(config.concurrency, 1);
        assert!(!config.dry_run);
    }
}
