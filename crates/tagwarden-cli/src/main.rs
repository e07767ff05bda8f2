//! tagwarden - Harbor immutability and retention sweep
//!
//! Reads the project catalog, then for every project outside the exclusion
//! set: enables the immutable tag rule, ensures the retention policy, runs it
//! and waits for the outcome, and disables the rule again.

mod cli;
mod logging;

use anyhow::Context;
use std::sync::Arc;
use tagwarden_core::{CancelSignal, FleetOrchestrator, RegistryGateway};
use tagwarden_harbor::HarborClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli::command().get_matches();
    let settings = cli::Settings::from_matches(&matches)?;
    logging::init(settings.log_format)?;

    tracing::info!(
        registry = settings.harbor.base_url(),
        dry_run = settings.fleet.dry_run,
        concurrency = settings.fleet.concurrency,
        excluded = settings.fleet.excluded_projects.len(),
        "Starting tagwarden"
    );

    let client = HarborClient::new(settings.harbor).context("failed to build Harbor client")?;
    let gateway: Arc<dyn RegistryGateway> = Arc::new(client);

    let (handle, signal) = CancelSignal::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, restoring current projects and stopping");
            handle.cancel();
        }
    });

    let fleet = FleetOrchestrator::new(gateway, settings.fleet).with_cancel(signal);
    let report = fleet.run().await.context("fleet run aborted")?;

    if settings.json_report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.generate_text());
    }

    std::process::exit(if report.passed() { 0 } else { 1 });
}
