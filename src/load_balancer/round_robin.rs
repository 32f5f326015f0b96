//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::{Balancer, SelectionHints};
use crate::registry::{ServerId, ServerSnapshot};

/// Round-robin selector.
/// Stores an internal cursor advanced modulo the candidate count, so k
/// consecutive calls over k stable candidates visit each exactly once.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Balancer for RoundRobin {
    fn next_server(&self, candidates: &[ServerSnapshot], _hints: &SelectionHints) -> Option<ServerId> {
        if candidates.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
        Some(candidates[index].id)
    }
}
