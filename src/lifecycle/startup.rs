//! Startup orchestration.
//!
//! Components are built in dependency order:
//! registry → health store → rules → load balancer → failover → sync.
//! Each one receives its collaborators explicitly.

use std::sync::Arc;

use crate::config::FleetConfig;
use crate::failover::{FailoverCoordinator, FleetMonitor};
use crate::health::{HealthProber, HealthStore};
use crate::load_balancer::LoadBalancer;
use crate::registry::ServerRegistry;
use crate::rules::RuleEngine;
use crate::sync::SyncJobManager;

/// Every control-plane component, wired together.
pub struct ControlPlane {
    pub config: Arc<FleetConfig>,
    pub registry: Arc<ServerRegistry>,
    pub health: Arc<HealthStore>,
    pub rules: Arc<RuleEngine>,
    pub balancer: Arc<LoadBalancer>,
    pub failover: Arc<FailoverCoordinator>,
    pub sync: Arc<SyncJobManager>,
}

impl ControlPlane {
    pub fn new(config: FleetConfig) -> Self {
        let registry = Arc::new(ServerRegistry::new(&config.servers));
        let health = Arc::new(HealthStore::new(registry.clone(), config.health.clone()));
        let rules = Arc::new(RuleEngine::new());
        let balancer = Arc::new(LoadBalancer::new(
            registry.clone(),
            rules.clone(),
            config.balancer.clone(),
        ));
        let failover = Arc::new(FailoverCoordinator::new(
            registry.clone(),
            health.clone(),
            balancer.clone(),
        ));
        let sync = Arc::new(SyncJobManager::new(registry.clone()));

        tracing::info!(
            servers = config.servers.len(),
            default_strategy = %config.balancer.default_strategy,
            "Control plane initialized"
        );

        Self {
            config: Arc::new(config),
            registry,
            health,
            rules,
            balancer,
            failover,
            sync,
        }
    }

    /// Background monitor over this plane's components.
    pub fn monitor(&self) -> FleetMonitor {
        let monitor_config = self.config.monitor.clone();
        let prober = HealthProber::new(self.registry.clone(), monitor_config.clone());
        FleetMonitor::new(
            self.failover.clone(),
            self.health.clone(),
            Some(prober),
            monitor_config,
        )
    }
}
