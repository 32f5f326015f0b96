//! Load-balancing rule engine.
//!
//! # Data Flow
//! ```text
//! admin CRUD → RuleEngine (kept sorted by priority, then id)
//! select request → first_match(hints)
//!     → matcher.rs (AND of the rule's conditions)
//!     → target strategy and/or target server set
//! ```
//!
//! # Design Decisions
//! - Lower priority sorts first; ties keep insertion order (ids are monotonic)
//! - Disabled rules are stored but never matched
//! - The load balancer only reads; mutation goes through the admin surface

pub mod matcher;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::clock::unix_millis;
use crate::error::{FleetError, FleetResult};
use crate::load_balancer::{SelectionHints, StrategyKind};
use crate::registry::ServerId;

use self::matcher::{AndMatcher, CountryMatcher, Matcher, StreamMatcher};

/// Conditions of a rule; every non-empty list must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleCondition {
    pub countries: Vec<String>,
    pub stream_ids: Vec<u64>,
}

impl RuleCondition {
    pub fn matcher(&self) -> AndMatcher {
        let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
        if !self.countries.is_empty() {
            matchers.push(Box::new(CountryMatcher::new(&self.countries)));
        }
        if !self.stream_ids.is_empty() {
            matchers.push(Box::new(StreamMatcher::new(&self.stream_ids)));
        }
        AndMatcher::new(matchers)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancingRule {
    pub id: u64,
    pub name: String,
    pub priority: i32,
    pub condition: RuleCondition,
    pub target_strategy: Option<StrategyKind>,
    pub target_servers: Vec<ServerId>,
    pub enabled: bool,
    pub created_at: u64,
}

/// Create/update payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDraft {
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub condition: RuleCondition,
    #[serde(default)]
    pub target_strategy: Option<StrategyKind>,
    #[serde(default)]
    pub target_servers: Vec<ServerId>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl RuleDraft {
    fn validate(&self) -> FleetResult<()> {
        if self.name.trim().is_empty() {
            return Err(FleetError::Validation("rule name is required".into()));
        }
        if self.target_strategy.is_none() && self.target_servers.is_empty() {
            return Err(FleetError::Validation(
                "rule needs a target strategy or target servers".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RuleEngine {
    rules: RwLock<Vec<LoadBalancingRule>>,
    next_id: AtomicU64,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, draft: RuleDraft) -> FleetResult<LoadBalancingRule> {
        draft.validate()?;
        let rule = LoadBalancingRule {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            name: draft.name,
            priority: draft.priority,
            condition: draft.condition,
            target_strategy: draft.target_strategy,
            target_servers: draft.target_servers,
            enabled: draft.enabled,
            created_at: unix_millis(),
        };

        let mut rules = self.rules.write().expect("rule engine lock poisoned");
        rules.push(rule.clone());
        rules.sort_by_key(|r| (r.priority, r.id));
        tracing::info!(rule_id = rule.id, priority = rule.priority, "Load-balancing rule created");
        Ok(rule)
    }

    /// All rules in evaluation order.
    pub fn list(&self) -> Vec<LoadBalancingRule> {
        self.rules.read().expect("rule engine lock poisoned").clone()
    }

    pub fn get(&self, id: u64) -> FleetResult<LoadBalancingRule> {
        self.rules
            .read()
            .expect("rule engine lock poisoned")
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(FleetError::NotFound { kind: "rule", id })
    }

    pub fn update(&self, id: u64, draft: RuleDraft) -> FleetResult<LoadBalancingRule> {
        draft.validate()?;
        let mut rules = self.rules.write().expect("rule engine lock poisoned");
        let rule = rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(FleetError::NotFound { kind: "rule", id })?;

        rule.name = draft.name;
        rule.priority = draft.priority;
        rule.condition = draft.condition;
        rule.target_strategy = draft.target_strategy;
        rule.target_servers = draft.target_servers;
        rule.enabled = draft.enabled;
        let updated = rule.clone();

        rules.sort_by_key(|r| (r.priority, r.id));
        tracing::info!(rule_id = id, "Load-balancing rule updated");
        Ok(updated)
    }

    pub fn delete(&self, id: u64) -> FleetResult<()> {
        let mut rules = self.rules.write().expect("rule engine lock poisoned");
        let before = rules.len();
        rules.retain(|r| r.id != id);
        if rules.len() == before {
            return Err(FleetError::NotFound { kind: "rule", id });
        }
        tracing::info!(rule_id = id, "Load-balancing rule deleted");
        Ok(())
    }

    /// First enabled rule, in evaluation order, whose condition matches.
    pub fn first_match(&self, hints: &SelectionHints) -> Option<LoadBalancingRule> {
        self.rules
            .read()
            .expect("rule engine lock poisoned")
            .iter()
            .filter(|r| r.enabled)
            .find(|r| r.condition.matcher().matches(hints))
            .cloned()
    }
}
