//! Periodic upkeep
//!
//! Runs on a `tokio::time::interval` until cancelled: moves expired open
//! circuits to half-open, purges expired cache entries, trims the attempt
//! history and ledger alerts, and writes the statistics snapshot when
//! persistence is configured.

use std::sync::Arc;

use serde::Serialize;
use switchyard_config::PersistenceConfig;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::Engine;

/// Work done by one maintenance pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub circuits_half_opened: usize,
    pub cache_entries_purged: usize,
    pub attempts_trimmed: usize,
    pub alerts_trimmed: usize,
}

impl Engine {
    /// Run one maintenance pass synchronously
    pub fn run_maintenance(&self) -> MaintenanceReport {
        let report = MaintenanceReport {
            circuits_half_opened: self.health.sweep(),
            cache_entries_purged: self.cache.purge_expired() + self.decisions.purge_expired(),
            attempts_trimmed: self.orchestrator.history().trim(),
            alerts_trimmed: self.ledger.trim(),
        };

        if report != MaintenanceReport::default() {
            tracing::debug!(
                circuits_half_opened = report.circuits_half_opened,
                cache_entries_purged = report.cache_entries_purged,
                attempts_trimmed = report.attempts_trimmed,
                alerts_trimmed = report.alerts_trimmed,
                "maintenance pass"
            );
        }

        report
    }

    /// Spawn the maintenance loop
    ///
    /// A final snapshot is written after `shutdown` is cancelled.
    pub fn spawn_maintenance(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.maintenance_loop(shutdown).await })
    }

    async fn maintenance_loop(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.maintenance.sweep_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_persisted = Instant::now();

        tracing::debug!(
            interval_ms = self.maintenance.sweep_interval_ms,
            persistence = self.persistence.is_some(),
            "maintenance loop started"
        );

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_maintenance();

                    if let Some(ref persistence) = self.persistence
                        && last_persisted.elapsed() >= persistence.interval()
                    {
                        self.persist(persistence).await;
                        last_persisted = Instant::now();
                    }
                }
            }
        }

        if let Some(ref persistence) = self.persistence {
            self.persist(persistence).await;
        }
        tracing::debug!("maintenance loop stopped");
    }

    async fn persist(&self, persistence: &PersistenceConfig) {
        match self.save_snapshot(&persistence.path).await {
            Ok(()) => tracing::debug!(path = %persistence.path.display(), "statistics snapshot written"),
            Err(e) => tracing::warn!(path = %persistence.path.display(), error = %e, "failed to write statistics snapshot"),
        }
    }
}
