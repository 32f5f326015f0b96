//! Health tracking subsystem.
//!
//! # Data Flow
//! ```text
//! Pushed reports (store.rs):
//!     health-report payload
//!     → sample.rs (derive healthy/warning/critical)
//!     → append to per-server series
//!     → project onto registry status (offline vs online)
//!
//! Active probes (probe.rs):
//!     Monitor tick
//!     → GET each server's status URL (timeout-bounded)
//!     → reachability with hysteresis
//! ```
//!
//! # Design Decisions
//! - Samples are immutable; readers only clone
//! - A server that never reported is `offline`
//! - The registry keeps the lossy online/offline view, the store keeps the detail

pub mod probe;
pub mod sample;
pub mod store;

pub use probe::HealthProber;
pub use sample::{derive_status, HealthMetrics, HealthSample, HealthStatus};
pub use store::HealthStore;
