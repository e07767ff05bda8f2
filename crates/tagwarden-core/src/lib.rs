//! tagwarden core - registry governance reconciliation
//!
//! The engine that:
//! - Loads the project catalog with each project's governance state
//! - Converges immutable tag rules (create once, toggle in place)
//! - Ensures exactly one retention policy per project
//! - Triggers retention executions and polls them to a terminal status
//! - Brackets every retention run between enabling and disabling immutability
//!
//! The registry itself is a capability ([`RegistryGateway`]) injected into
//! every component.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tagwarden_core::{FleetConfig, FleetOrchestrator};
//!
//! # async fn example(gateway: Arc<dyn tagwarden_core::RegistryGateway>) -> Result<(), Box<dyn std::error::Error>> {
//! let fleet = FleetOrchestrator::new(gateway, FleetConfig::new());
//! let report = fleet.run().await?;
//!
//! println!("Processed {} projects", report.processed());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod cancel;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fleet;
pub mod gateway;
pub mod monitor;
pub mod policy;
pub mod reconciler;
pub mod types;

// Re-exports for convenience
pub use cancel::{CancelHandle, CancelSignal};
pub use catalog::{filter_projects, CatalogLoader, FilteredCatalog};
pub use config::{FleetConfig, MonitorConfig, DEFAULT_EXCLUDED_PROJECTS};
pub use error::{GatewayError, SweepError};
pub use fleet::{
    ExecutionStep, FleetOrchestrator, FleetReport, ProjectReport, SkipReason, Step, StepFailure,
};
pub use gateway::RegistryGateway;
pub use monitor::{ExecutionMonitor, ExecutionOutcome, MonitorReport, UndeterminedReason};
pub use policy::{
    default_retention_rules, ImmutableRule, PolicyScope, PolicyTrigger, RetentionPolicy,
    RetentionRule, Selector,
};
pub use reconciler::{ImmutabilityOutcome, PolicyReconciler, RetentionOutcome};
pub use types::{
    ExecutionId, ExecutionStatus, Page, Project, ProjectId, ProjectSummary, RetentionExecution,
    RetentionId, RuleId, RunId,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with tagwarden core
    pub use crate::{
        CancelSignal, ExecutionMonitor, ExecutionOutcome, FleetConfig, FleetOrchestrator,
        MonitorConfig, PolicyReconciler, Project, ProjectId, RegistryGateway, RetentionId,
        SweepError,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
