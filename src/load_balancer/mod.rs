//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! select request (strategy?, hints)
//!     → registry (enabled + online snapshot, sorted by id)
//!     → rules (first matching rule may override strategy / restrict candidates)
//!     → Apply strategy:
//!         - least_conn.rs (fewest current clients, lowest id on ties)
//!         - weighted.rs (max_clients as weight, random draw)
//!         - round_robin.rs (rotating cursor)
//!         - geographic.rs (nearest, then same country, then least connections)
//!     → server id or NoHealthyServer
//! ```
//!
//! # Design Decisions
//! - Selection never touches `current_clients`; callers confirm connections separately
//! - An empty healthy set is an explicit error, never a default server
//! - Strategy instances live as long as the balancer so round-robin keeps its cursor

pub mod geographic;
pub mod least_conn;
pub mod round_robin;
pub mod weighted;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::BalancerConfig;
use crate::error::{FleetError, FleetResult};
use crate::observability::metrics;
use crate::registry::{ServerId, ServerRegistry, ServerSnapshot};
use crate::rules::RuleEngine;

use self::geographic::Geographic;
use self::least_conn::LeastConnections;
use self::round_robin::RoundRobin;
use self::weighted::Weighted;

/// A selection algorithm over a candidate set sorted by id.
pub trait Balancer: Send + Sync + fmt::Debug {
    fn next_server(&self, candidates: &[ServerSnapshot], hints: &SelectionHints) -> Option<ServerId>;
}

/// Named selection strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    LeastConnections,
    Weighted,
    RoundRobin,
    Geographic,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::LeastConnections => "least_connections",
            StrategyKind::Weighted => "weighted",
            StrategyKind::RoundRobin => "round_robin",
            StrategyKind::Geographic => "geographic",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "least_connections" => Ok(StrategyKind::LeastConnections),
            "weighted" => Ok(StrategyKind::Weighted),
            "round_robin" => Ok(StrategyKind::RoundRobin),
            "geographic" => Ok(StrategyKind::Geographic),
            other => Err(FleetError::Validation(format!("unknown strategy '{other}'"))),
        }
    }
}

/// Optional caller context for selection and rule matching.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionHints {
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub stream_id: Option<u64>,
}

impl SelectionHints {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// Picks one healthy server per request.
#[derive(Debug)]
pub struct LoadBalancer {
    registry: Arc<ServerRegistry>,
    rules: Arc<RuleEngine>,
    config: BalancerConfig,
    least_conn: LeastConnections,
    weighted: Weighted,
    round_robin: RoundRobin,
    geographic: Geographic,
}

impl LoadBalancer {
    pub fn new(registry: Arc<ServerRegistry>, rules: Arc<RuleEngine>, config: BalancerConfig) -> Self {
        Self {
            registry,
            rules,
            weighted: Weighted::new(config.default_weight),
            config,
            least_conn: LeastConnections::new(),
            round_robin: RoundRobin::new(),
            geographic: Geographic::new(),
        }
    }

    fn balancer(&self, kind: StrategyKind) -> &dyn Balancer {
        match kind {
            StrategyKind::LeastConnections => &self.least_conn,
            StrategyKind::Weighted => &self.weighted,
            StrategyKind::RoundRobin => &self.round_robin,
            StrategyKind::Geographic => &self.geographic,
        }
    }

    /// Select a server for a viewer request. `None` uses the configured default strategy.
    pub fn select_server(
        &self,
        strategy: Option<StrategyKind>,
        hints: &SelectionHints,
    ) -> FleetResult<ServerId> {
        let mut strategy = strategy.unwrap_or(self.config.default_strategy);
        let mut candidates = self.registry.list_healthy(true);

        if self.config.rules_enabled {
            if let Some(rule) = self.rules.first_match(hints) {
                if let Some(target) = rule.target_strategy {
                    strategy = target;
                }
                if !rule.target_servers.is_empty() {
                    let restricted: Vec<_> = candidates
                        .iter()
                        .filter(|s| rule.target_servers.contains(&s.id))
                        .cloned()
                        .collect();
                    if restricted.is_empty() {
                        tracing::warn!(rule_id = rule.id, "Rule targets no healthy server, using full healthy set");
                    } else {
                        candidates = restricted;
                    }
                }
                tracing::debug!(rule_id = rule.id, strategy = %strategy, "Load-balancing rule applied");
            }
        }

        self.pick(strategy, &candidates, hints)
    }

    /// Select a server other than `excluded`, without consulting rules.
    pub fn select_excluding(
        &self,
        strategy: StrategyKind,
        hints: &SelectionHints,
        excluded: ServerId,
    ) -> FleetResult<ServerId> {
        let candidates: Vec<_> = self
            .registry
            .list_healthy(true)
            .into_iter()
            .filter(|s| s.id != excluded)
            .collect();
        self.pick(strategy, &candidates, hints)
    }

    fn pick(
        &self,
        strategy: StrategyKind,
        candidates: &[ServerSnapshot],
        hints: &SelectionHints,
    ) -> FleetResult<ServerId> {
        match self.balancer(strategy).next_server(candidates, hints) {
            Some(id) => {
                metrics::record_selection(strategy, true);
                tracing::debug!(strategy = %strategy, server_id = id, candidates = candidates.len(), "Server selected");
                Ok(id)
            }
            None => {
                metrics::record_selection(strategy, false);
                tracing::warn!(strategy = %strategy, "No healthy servers available");
                Err(FleetError::NoHealthyServer)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::registry::{Reachability, ServerStatus};
    use crate::rules::{RuleCondition, RuleDraft};

    pub(crate) fn snapshot(id: ServerId, clients: u64, max_clients: Option<u64>) -> ServerSnapshot {
        ServerSnapshot {
            id,
            name: format!("server-{id}"),
            max_clients,
            current_clients: clients,
            enabled: true,
            status: ServerStatus::Online,
            country: None,
            latitude: None,
            longitude: None,
            cpu_usage: None,
            memory_usage: None,
            bandwidth: None,
            last_checked: None,
            reachability: Reachability::Unknown,
        }
    }

    fn online(id: ServerId) -> ServerConfig {
        let mut config = ServerConfig::new(id, Some(1000));
        config.online = true;
        config
    }

    fn balancer(configs: &[ServerConfig]) -> (Arc<ServerRegistry>, Arc<RuleEngine>, LoadBalancer) {
        let registry = Arc::new(ServerRegistry::new(configs));
        let rules = Arc::new(RuleEngine::new());
        let lb = LoadBalancer::new(registry.clone(), rules.clone(), BalancerConfig::default());
        (registry, rules, lb)
    }

    #[test]
    fn test_strategy_names() {
        for kind in [
            StrategyKind::LeastConnections,
            StrategyKind::Weighted,
            StrategyKind::RoundRobin,
            StrategyKind::Geographic,
        ] {
            assert_eq!(kind.as_str().parse::<StrategyKind>().unwrap(), kind);
        }
        assert!(matches!("random".parse::<StrategyKind>(), Err(FleetError::Validation(_))));
    }

    #[test]
    fn test_empty_fleet_is_no_healthy_server() {
        let (_, _, lb) = balancer(&[]);
        for kind in [
            StrategyKind::LeastConnections,
            StrategyKind::Weighted,
            StrategyKind::RoundRobin,
            StrategyKind::Geographic,
        ] {
            assert!(matches!(
                lb.select_server(Some(kind), &SelectionHints::default()),
                Err(FleetError::NoHealthyServer)
            ));
        }
    }

    #[test]
    fn test_selection_does_not_touch_client_count() {
        let (registry, _, lb) = balancer(&[online(1), online(2)]);
        for _ in 0..10 {
            lb.select_server(None, &SelectionHints::default()).unwrap();
        }
        assert!(registry.list().iter().all(|s| s.current_clients == 0));
    }

    #[test]
    fn test_select_excluding() {
        let (registry, _, lb) = balancer(&[online(1), online(2)]);
        registry.increment_client_count(2, 10).unwrap();
        let id = lb
            .select_excluding(StrategyKind::LeastConnections, &SelectionHints::default(), 1)
            .unwrap();
        assert_eq!(id, 2);

        registry.mark_offline(2).unwrap();
        assert!(matches!(
            lb.select_excluding(StrategyKind::LeastConnections, &SelectionHints::default(), 1),
            Err(FleetError::NoHealthyServer)
        ));
    }

    #[test]
    fn test_rule_overrides_strategy_and_candidates() {
        let (registry, rules, lb) = balancer(&[online(1), online(2), online(3)]);
        registry.increment_client_count(1, 1).unwrap();
        registry.increment_client_count(2, 5).unwrap();
        registry.increment_client_count(3, 9).unwrap();

        rules
            .create(RuleDraft {
                name: "germany to 2 and 3".into(),
                priority: 10,
                condition: RuleCondition {
                    countries: vec!["DE".into()],
                    ..Default::default()
                },
                target_strategy: None,
                target_servers: vec![2, 3],
                enabled: true,
            })
            .unwrap();

        let de = SelectionHints {
            country: Some("DE".into()),
            ..Default::default()
        };
        assert_eq!(lb.select_server(Some(StrategyKind::LeastConnections), &de).unwrap(), 2);
        assert_eq!(
            lb.select_server(Some(StrategyKind::LeastConnections), &SelectionHints::default())
                .unwrap(),
            1
        );

        rules
            .create(RuleDraft {
                name: "everything round robin".into(),
                priority: 1,
                condition: RuleCondition::default(),
                target_strategy: Some(StrategyKind::RoundRobin),
                target_servers: vec![],
                enabled: true,
            })
            .unwrap();
        let picks: Vec<_> = (0..3)
            .map(|_| lb.select_server(Some(StrategyKind::LeastConnections), &de).unwrap())
            .collect();
        assert_eq!(picks, vec![1, 2, 3]);
    }

    #[test]
    fn test_rule_restriction_to_unhealthy_set_falls_back() {
        let (registry, rules, lb) = balancer(&[online(1), online(2)]);
        registry.mark_offline(2).unwrap();
        rules
            .create(RuleDraft {
                name: "pin to 2".into(),
                priority: 0,
                condition: RuleCondition::default(),
                target_strategy: None,
                target_servers: vec![2],
                enabled: true,
            })
            .unwrap();
        assert_eq!(lb.select_server(None, &SelectionHints::default()).unwrap(), 1);
    }
}
