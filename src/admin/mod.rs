//! Operator surface: failover, sync jobs, rules, catalog, status.
//!
//! Every route here sits behind `auth::admin_auth_middleware`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/failover", post(trigger_failover))
        .route("/failover-history", get(failover_history))
        .route("/sync", post(create_sync_job).get(list_sync_jobs))
        .route("/sync/{id}", get(get_sync_job).patch(update_sync_job))
        .route("/sync/{id}/cancel", post(cancel_sync_job))
        .route("/rules", get(list_rules).post(create_rule))
        .route("/rules/{id}", get(get_rule).put(update_rule).delete(delete_rule))
        .route("/servers", get(list_servers).post(upsert_server))
        .route("/servers/{id}", axum::routing::delete(remove_server))
        .route("/servers/{id}/enabled", put(set_server_enabled))
        .route("/servers/{id}/online", post(mark_server_online))
        .route("/servers/{id}/offline", post(mark_server_offline))
        .route("/status", get(get_status))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
