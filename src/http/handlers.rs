//! Public handlers: health ingestion, server selection, client counts.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{FleetError, FleetResult};
use crate::health::{HealthMetrics, HealthSample, HealthStatus};
use crate::http::server::AppState;
use crate::load_balancer::{SelectionHints, StrategyKind};
use crate::registry::ServerId;

/// Body of `POST /health-report`: the server id plus any subset of metrics.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub server_id: ServerId,
    #[serde(flatten)]
    pub metrics: HealthMetrics,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReportAck {
    pub accepted: bool,
    pub status: HealthStatus,
}

pub async fn report_health(
    State(state): State<AppState>,
    Json(report): Json<HealthReport>,
) -> FleetResult<Json<HealthReportAck>> {
    let sample = state.plane.health.record_health(report.server_id, report.metrics)?;
    Ok(Json(HealthReportAck {
        accepted: true,
        status: sample.status,
    }))
}

/// Query of `GET /select`. Kept flat: urlencoded numbers do not survive `flatten`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectQuery {
    pub strategy: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub stream_id: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub server_id: ServerId,
}

pub async fn select_server(
    State(state): State<AppState>,
    Query(query): Query<SelectQuery>,
) -> FleetResult<Json<Selection>> {
    let strategy = query
        .strategy
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<StrategyKind>)
        .transpose()?;
    let hints = SelectionHints {
        country: query.country,
        latitude: query.latitude,
        longitude: query.longitude,
        stream_id: query.stream_id,
    };

    let server_id = state.plane.balancer.select_server(strategy, &hints)?;
    Ok(Json(Selection { server_id }))
}

#[derive(Debug, Deserialize)]
pub struct ConnectionDelta {
    pub delta: i64,
}

pub async fn adjust_connections(
    State(state): State<AppState>,
    Path(id): Path<ServerId>,
    Json(body): Json<ConnectionDelta>,
) -> FleetResult<Json<Value>> {
    let current = state.plane.registry.increment_client_count(id, body.delta)?;
    Ok(Json(json!({ "serverId": id, "currentClients": current })))
}

pub async fn latest_health(
    State(state): State<AppState>,
    Path(id): Path<ServerId>,
) -> FleetResult<Json<HealthSample>> {
    if !state.plane.registry.contains(id) {
        return Err(FleetError::server_not_found(id));
    }
    state
        .plane
        .health
        .latest(id)
        .map(Json)
        .ok_or(FleetError::NotFound {
            kind: "health sample for server",
            id,
        })
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub since: u64,
}

pub async fn health_history(
    State(state): State<AppState>,
    Path(id): Path<ServerId>,
    Query(query): Query<HistoryQuery>,
) -> FleetResult<Json<Vec<HealthSample>>> {
    if !state.plane.registry.contains(id) {
        return Err(FleetError::server_not_found(id));
    }
    Ok(Json(state.plane.health.history(id, query.since)))
}
