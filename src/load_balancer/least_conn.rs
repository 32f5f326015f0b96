//! Least Connections load balancing strategy.

use crate::load_balancer::{Balancer, SelectionHints};
use crate::registry::{ServerId, ServerSnapshot};

/// Least connections selector.
/// Selects the server with the minimum number of current clients.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl Balancer for LeastConnections {
    fn next_server(&self, candidates: &[ServerSnapshot], _hints: &SelectionHints) -> Option<ServerId> {
        // Ties go to the lowest id
        candidates
            .iter()
            .min_by_key(|s| (s.current_clients, s.id))
            .map(|s| s.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::tests::snapshot;

    #[test]
    fn test_least_conn() {
        let lb = LeastConnections::new();
        let hints = SelectionHints::default();

        let servers = vec![snapshot(1, 3, None), snapshot(2, 0, None), snapshot(3, 1, None)];
        assert_eq!(lb.next_server(&servers, &hints), Some(2));

        let servers = vec![snapshot(1, 1, None), snapshot(2, 2, None)];
        assert_eq!(lb.next_server(&servers, &hints), Some(1));
    }

    #[test]
    fn test_tie_breaks_on_lowest_id() {
        let lb = LeastConnections::new();
        let servers = vec![snapshot(9, 4, None), snapshot(5, 4, None), snapshot(7, 4, None)];
        assert_eq!(lb.next_server(&servers, &SelectionHints::default()), Some(5));
    }

    #[test]
    fn test_empty() {
        assert_eq!(LeastConnections::new().next_server(&[], &SelectionHints::default()), None);
    }
}
