use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::validation::validate_server;
use crate::config::ServerConfig;
use crate::error::{FleetError, FleetResult};
use crate::failover::{FailoverEvent, FailoverRequest, TriggeredBy};
use crate::http::server::AppState;
use crate::registry::{ServerId, ServerSnapshot, ServerStatus};
use crate::rules::{LoadBalancingRule, RuleDraft};
use crate::sync::{SyncJob, SyncJobType, SyncStatus, SyncUpdate};

/// Header carrying the acting operator's id.
pub const X_USER_ID: &str = "x-user-id";

fn user_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_USER_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

// Failover

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailoverBody {
    pub from_server_id: ServerId,
    pub to_server_id: ServerId,
    pub reason: Option<String>,
}

pub async fn trigger_failover(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<FailoverBody>,
) -> FleetResult<Json<FailoverEvent>> {
    let request = FailoverRequest {
        from_server_id: body.from_server_id,
        to_server_id: body.to_server_id,
        reason: body.reason,
        triggered_by: TriggeredBy::Admin,
        user_id: user_id(&headers),
    };
    state.plane.failover.trigger_failover(request).map(Json)
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn failover_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<FailoverEvent>> {
    Json(state.plane.failover.history(query.limit))
}

// Sync jobs

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSyncBody {
    pub job_type: SyncJobType,
    pub source_server_id: Option<ServerId>,
    pub target_server_id: ServerId,
}

pub async fn create_sync_job(
    State(state): State<AppState>,
    Json(body): Json<CreateSyncBody>,
) -> FleetResult<Json<Value>> {
    let job_id =
        state
            .plane
            .sync
            .create_job(body.job_type, body.source_server_id, body.target_server_id)?;
    Ok(Json(json!({ "jobId": job_id })))
}

pub async fn list_sync_jobs(State(state): State<AppState>) -> Json<Vec<SyncJob>> {
    Json(state.plane.sync.list())
}

pub async fn get_sync_job(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> FleetResult<Json<SyncJob>> {
    state.plane.sync.get(id).map(Json)
}

pub async fn update_sync_job(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(update): Json<SyncUpdate>,
) -> FleetResult<Json<SyncJob>> {
    state.plane.sync.update_progress(id, update).map(Json)
}

pub async fn cancel_sync_job(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> FleetResult<Json<SyncJob>> {
    state.plane.sync.cancel(id).map(Json)
}

// Rules

pub async fn list_rules(State(state): State<AppState>) -> Json<Vec<LoadBalancingRule>> {
    Json(state.plane.rules.list())
}

pub async fn create_rule(
    State(state): State<AppState>,
    Json(draft): Json<RuleDraft>,
) -> FleetResult<Json<LoadBalancingRule>> {
    state.plane.rules.create(draft).map(Json)
}

pub async fn get_rule(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> FleetResult<Json<LoadBalancingRule>> {
    state.plane.rules.get(id).map(Json)
}

pub async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(draft): Json<RuleDraft>,
) -> FleetResult<Json<LoadBalancingRule>> {
    state.plane.rules.update(id, draft).map(Json)
}

pub async fn delete_rule(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> FleetResult<StatusCode> {
    state.plane.rules.delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// Catalog

pub async fn list_servers(State(state): State<AppState>) -> Json<Vec<ServerSnapshot>> {
    Json(state.plane.registry.list())
}

pub async fn upsert_server(
    State(state): State<AppState>,
    Json(config): Json<ServerConfig>,
) -> FleetResult<Json<ServerSnapshot>> {
    let errors = validate_server(&config);
    if !errors.is_empty() {
        let message = errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(FleetError::Validation(message));
    }
    Ok(Json(state.plane.registry.upsert(&config)))
}

pub async fn remove_server(
    State(state): State<AppState>,
    Path(id): Path<ServerId>,
) -> FleetResult<Json<ServerSnapshot>> {
    let removed = state.plane.registry.remove(id)?;
    state.plane.health.forget(id);
    Ok(Json(removed))
}

#[derive(Debug, Deserialize)]
pub struct EnabledBody {
    pub enabled: bool,
}

pub async fn set_server_enabled(
    State(state): State<AppState>,
    Path(id): Path<ServerId>,
    Json(body): Json<EnabledBody>,
) -> FleetResult<Json<ServerSnapshot>> {
    state.plane.registry.set_enabled(id, body.enabled).map(Json)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub server_id: ServerId,
    pub status: ServerStatus,
    pub changed: bool,
}

pub async fn mark_server_online(
    State(state): State<AppState>,
    Path(id): Path<ServerId>,
) -> FleetResult<Json<StatusChange>> {
    let changed = state.plane.registry.mark_online(id)?;
    Ok(Json(StatusChange {
        server_id: id,
        status: ServerStatus::Online,
        changed,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct OfflineBody {
    pub reason: Option<String>,
}

/// Takes the server out of rotation through the failover coordinator so the
/// move is recorded like any other failover.
pub async fn mark_server_offline(
    State(state): State<AppState>,
    Path(id): Path<ServerId>,
    headers: HeaderMap,
    body: Option<Json<OfflineBody>>,
) -> FleetResult<Json<FailoverEvent>> {
    let reason = body.and_then(|Json(b)| b.reason);
    state
        .plane
        .failover
        .take_offline(id, reason, user_id(&headers))
        .map(Json)
}

// Status

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub servers_total: usize,
    pub servers_online: usize,
    pub servers_available: usize,
    pub total_clients: u64,
    pub rules: usize,
    pub sync_jobs_running: usize,
    pub failover_events: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let plane = &state.plane;
    let servers = plane.registry.list();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        servers_total: servers.len(),
        servers_online: servers
            .iter()
            .filter(|s| s.status == ServerStatus::Online)
            .count(),
        servers_available: plane.registry.list_healthy(true).len(),
        total_clients: servers.iter().map(|s| s.current_clients).sum(),
        rules: plane.rules.list().len(),
        sync_jobs_running: plane
            .sync
            .list()
            .iter()
            .filter(|j| j.status == SyncStatus::Running)
            .count(),
        failover_events: plane.failover.event_count(),
    })
}
