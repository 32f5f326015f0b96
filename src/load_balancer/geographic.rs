//! Geography-aware load balancing strategy.
//!
//! # Matching
//! - Caller coordinates: nearest server with coordinates (great-circle distance)
//! - Caller country only: least connections among same-country servers
//! - No usable hint or no geo-aware candidate: least connections over everything

use std::cmp::Ordering;

use crate::load_balancer::{least_conn::LeastConnections, Balancer, SelectionHints};
use crate::registry::{ServerId, ServerSnapshot};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres.
pub fn haversine_km((lat1, lon1): (f64, f64), (lat2, lon2): (f64, f64)) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

#[derive(Debug, Default)]
pub struct Geographic {
    fallback: LeastConnections,
}

impl Geographic {
    pub fn new() -> Self {
        Self::default()
    }

    fn nearest(&self, candidates: &[ServerSnapshot], origin: (f64, f64)) -> Option<ServerId> {
        candidates
            .iter()
            .filter_map(|s| s.coordinates().map(|c| (haversine_km(origin, c), s)))
            .min_by(|(da, a), (db, b)| {
                da.partial_cmp(db)
                    .unwrap_or(Ordering::Equal)
                    .then(a.current_clients.cmp(&b.current_clients))
                    .then(a.id.cmp(&b.id))
            })
            .map(|(_, s)| s.id)
    }
}

impl Balancer for Geographic {
    fn next_server(&self, candidates: &[ServerSnapshot], hints: &SelectionHints) -> Option<ServerId> {
        if let Some(origin) = hints.coordinates() {
            if let Some(id) = self.nearest(candidates, origin) {
                return Some(id);
            }
        }

        if let Some(country) = hints.country.as_deref() {
            let local: Vec<_> = candidates
                .iter()
                .filter(|s| {
                    s.country
                        .as_deref()
                        .is_some_and(|c| c.eq_ignore_ascii_case(country))
                })
                .cloned()
                .collect();
            if let Some(id) = self.fallback.next_server(&local, hints) {
                return Some(id);
            }
        }

        self.fallback.next_server(candidates, hints)
    }
}
