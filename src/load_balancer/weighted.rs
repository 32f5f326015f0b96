//! Weighted random load balancing strategy.

use rand::Rng;

use crate::load_balancer::{least_conn::LeastConnections, Balancer, SelectionHints};
use crate::registry::{ServerId, ServerSnapshot};

/// Draws one server with probability `max_clients / total weight`.
#[derive(Debug)]
pub struct Weighted {
    default_weight: u64,
    fallback: LeastConnections,
}

impl Weighted {
    /// `default_weight` applies to servers without `max_clients`.
    pub fn new(default_weight: u64) -> Self {
        Self {
            default_weight,
            fallback: LeastConnections::new(),
        }
    }

    fn weight(&self, server: &ServerSnapshot) -> u64 {
        server.max_clients.unwrap_or(self.default_weight)
    }

    /// Pick using a caller-supplied random source.
    pub fn pick_with<R: Rng>(
        &self,
        candidates: &[ServerSnapshot],
        hints: &SelectionHints,
        rng: &mut R,
    ) -> Option<ServerId> {
        let total = candidates
            .iter()
            .try_fold(0u64, |acc, s| acc.checked_add(self.weight(s)));
        let total = match total {
            Some(0) => return self.fallback.next_server(candidates, hints),
            Some(total) => total,
            None => {
                tracing::warn!(candidates = candidates.len(), "Server weights overflow, using least connections");
                return self.fallback.next_server(candidates, hints);
            }
        };

        let mut point = rng.gen_range(0..total);
        for server in candidates {
            let weight = self.weight(server);
            if point < weight {
                return Some(server.id);
            }
            point -= weight;
        }
        None
    }
}

impl Balancer for Weighted {
    fn next_server(&self, candidates: &[ServerSnapshot], hints: &SelectionHints) -> Option<ServerId> {
        self.pick_with(candidates, hints, &mut rand::thread_rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::tests::snapshot;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn test_distribution_tracks_weights() {
        let lb = Weighted::new(1000);
        let hints = SelectionHints::default();
        // Weights 100 / 300 / 1000 (default) out of 1400.
        let servers = vec![snapshot(1, 0, Some(100)), snapshot(2, 0, Some(300)), snapshot(3, 0, None)];

        let trials = 20_000;
        let mut counts: HashMap<ServerId, usize> = HashMap::new();
        for _ in 0..trials {
            *counts.entry(lb.next_server(&servers, &hints).unwrap()).or_default() += 1;
        }

        for (id, weight) in [(1, 100.0), (2, 300.0), (3, 1000.0)] {
            let observed = counts.get(&id).copied().unwrap_or(0) as f64 / trials as f64;
            let expected = weight / 1400.0;
            assert!(
                (observed - expected).abs() < 0.05,
                "server {id}: observed {observed:.3}, expected {expected:.3}"
            );
        }
    }

    #[test]
    fn test_seeded_draws_are_reproducible() {
        let lb = Weighted::new(1000);
        let hints = SelectionHints::default();
        let servers = vec![snapshot(1, 0, Some(10)), snapshot(2, 0, Some(20))];

        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..50)
                .map(|_| lb.pick_with(&servers, &hints, &mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(7), draw(7));
    }

    #[test]
    fn test_zero_weight_never_drawn() {
        let lb = Weighted::new(1000);
        let hints = SelectionHints::default();
        let servers = vec![snapshot(1, 0, Some(0)), snapshot(2, 0, Some(5))];
        for _ in 0..1000 {
            assert_eq!(lb.next_server(&servers, &hints), Some(2));
        }
    }

    #[test]
    fn test_all_zero_weights_fall_back() {
        let lb = Weighted::new(1000);
        let servers = vec![snapshot(1, 4, Some(0)), snapshot(2, 1, Some(0))];
        assert_eq!(lb.next_server(&servers, &SelectionHints::default()), Some(2));
    }

    #[test]
    fn test_overflowing_weights_fall_back() {
        let lb = Weighted::new(1000);
        let servers = vec![snapshot(1, 5, Some(u64::MAX)), snapshot(2, 1, Some(10))];
        for _ in 0..100 {
            assert_eq!(lb.next_server(&servers, &SelectionHints::default()), Some(2));
        }
    }

    #[test]
    fn test_single_max_weight_is_drawn() {
        let lb = Weighted::new(1000);
        let servers = vec![snapshot(1, 5, Some(u64::MAX)), snapshot(2, 1, Some(0))];
        assert_eq!(lb.next_server(&servers, &SelectionHints::default()), Some(1));
    }
}
