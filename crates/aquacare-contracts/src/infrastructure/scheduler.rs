//! Periodic expiry sweep

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::application::dto::SweepReport;
use crate::ports::inbound::ContractUseCases;
use crate::ports::outbound::Clock;

/// Runs `run_expiry_sweep` on a fixed period until told to stop.
pub struct SweepScheduler {
    service: Arc<dyn ContractUseCases>,
    clock: Arc<dyn Clock>,
    period: Duration,
}

impl SweepScheduler {
    pub fn new(service: Arc<dyn ContractUseCases>, clock: Arc<dyn Clock>, period: Duration) -> Self {
        Self { service, clock, period }
    }

    /// One sweep at the clock's current time. Errors are logged, not returned;
    /// the next tick retries whatever was missed.
    pub async fn tick(&self) -> Option<SweepReport> {
        let now = self.clock.now();
        match self.service.run_expiry_sweep(now).await {
            Ok(report) => Some(report),
            Err(e) if e.is_fatal() => {
                tracing::error!(error = %e, "Expiry sweep failed");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Expiry sweep incomplete");
                None
            }
        }
    }

    /// Sweep immediately, then every period, until `shutdown` turns true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> usize {
        tracing::info!(period_secs = self.period.as_secs(), "Starting expiry sweep scheduler");

        let mut interval = tokio::time::interval(self.period);
        let mut runs = 0;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                    runs += 1;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(runs, "Expiry sweep scheduler stopped");
        runs
    }
}
