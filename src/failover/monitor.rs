//! Periodic fleet monitor.
//!
//! One tick per monitoring interval:
//! probe (optional) → prune expired samples → automatic failover check.
//! A failure on one server is logged and never aborts the tick for the rest.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::MonitorConfig;
use crate::failover::FailoverCoordinator;
use crate::health::{HealthProber, HealthStore};

pub struct FleetMonitor {
    coordinator: Arc<FailoverCoordinator>,
    health: Arc<HealthStore>,
    prober: Option<HealthProber>,
    config: MonitorConfig,
}

/// What one tick did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub probed: usize,
    pub pruned: usize,
    pub failovers: usize,
}

impl FleetMonitor {
    pub fn new(
        coordinator: Arc<FailoverCoordinator>,
        health: Arc<HealthStore>,
        prober: Option<HealthProber>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            coordinator,
            health,
            prober,
            config,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Fleet monitor disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            auto_failover = self.config.auto_failover,
            probing = self.prober.is_some(),
            "Fleet monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Fleet monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        if let Some(prober) = &self.prober {
            report.probed = prober.probe_all().await;
        }

        report.pruned = self.health.prune_expired();

        if self.config.auto_failover {
            report.failovers = self.coordinator.check_fleet().len();
        }

        tracing::debug!(
            probed = report.probed,
            pruned = report.pruned,
            failovers = report.failovers,
            "Monitor tick complete"
        );
        report
    }
}
