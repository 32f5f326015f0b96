//! Media fleet control plane.
//!
//! Keeps a catalog of media servers, ingests their health reports, picks a
//! server for each viewer request, fails servers over when they degrade and
//! tracks content sync jobs between them.
//!
//! # Architecture Overview
//!
//! ```text
//!   media servers ──health reports──▶ ┌──────────────┐      ┌──────────────┐
//!                                     │ health store │─────▶│   registry   │
//!   fleet monitor ──probes/prune────▶ └──────────────┘      │  (catalog,   │
//!        │                                                  │  live state) │
//!        └──automatic check──▶ ┌──────────────────────┐     └──────┬───────┘
//!                              │ failover coordinator │◀───────────┤
//!   admin API ────manual───────▶└──────────┬───────────┘            │
//!                                          ▼                        ▼
//!   viewer request ──/select──▶ ┌───────────────┐  ◀── rules ── ┌─────────┐
//!                               │ load balancer │               │  rule   │
//!                               └───────────────┘               │ engine  │
//!                                                               └─────────┘
//!   admin API ──/sync──▶ sync job manager
//! ```

// Core components
pub mod failover;
pub mod health;
pub mod load_balancer;
pub mod registry;
pub mod rules;
pub mod sync;

// Surfaces
pub mod admin;
pub mod http;

// Cross-cutting concerns
pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use config::FleetConfig;
pub use error::{FleetError, FleetResult};
pub use http::HttpServer;
pub use lifecycle::{ControlPlane, Shutdown};
