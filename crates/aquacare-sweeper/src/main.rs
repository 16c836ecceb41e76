//! AquaCare Sweeper - Main Entry Point
//!
//! Loads the configured snapshot into in-memory adapters and runs the
//! periodic expiry sweep until interrupted.

use std::sync::Arc;
use std::time::Duration;

use aquacare_contracts::infrastructure::{
    ContractMigrator, InMemoryAccountDirectory, InMemoryContractRepository, InMemoryCustomerRepository,
    InMemoryItemCatalog, InMemoryPlanCatalog, Snapshot, SweepScheduler, SystemClock, TracingNotificationSink,
};
use aquacare_contracts::{Clock, ContractService, EngineConfig, ServicePorts};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("AquaCare Sweeper v{}", env!("CARGO_PKG_VERSION"));

    // Load config
    let config_path = std::env::var("CONFIG_PATH")
        .unwrap_or_else(|_| "/etc/aquacare/engine.json".into());
    let config = EngineConfig::load_or_default(&config_path);

    let customers = Arc::new(InMemoryCustomerRepository::new());
    let contracts = Arc::new(InMemoryContractRepository::new());
    match &config.snapshot_path {
        Some(path) => {
            let migrator = ContractMigrator::new(config.default_duration_months, config.default_rental_quota);
            let report = Snapshot::read(path)?
                .load_into(&migrator, customers.as_ref(), contracts.as_ref())
                .await;
            tracing::info!(path = %path, skipped = report.skipped, "Stores seeded from snapshot");
        }
        None => tracing::warn!("No snapshot_path configured, sweeping empty stores"),
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ports = ServicePorts {
        customers,
        contracts,
        accounts: Arc::new(InMemoryAccountDirectory::new()),
        plans: Arc::new(InMemoryPlanCatalog::new()),
        items: Arc::new(InMemoryItemCatalog::new()),
        notifier: Arc::new(TracingNotificationSink),
        clock: clock.clone(),
    };
    let period = Duration::from_secs(config.sweep_interval_secs.max(1));
    let service = Arc::new(ContractService::new(ports, config));

    let scheduler = SweepScheduler::new(service, clock, period);
    let (stop, stopped) = tokio::sync::watch::channel(false);

    let worker = tokio::spawn(async move { scheduler.run(stopped).await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    stop.send(true)?;
    worker.await?;

    Ok(())
}
