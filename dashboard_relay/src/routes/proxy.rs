use crate::server::SharedState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

pub async fn accident(State(state): State<SharedState>) -> Json<Value> {
    state.metrics.record_request("/api/accident");
    Json(state.proxy.accident().await)
}

pub async fn status(State(state): State<SharedState>) -> Json<Value> {
    state.metrics.record_request("/api/status");
    Json(state.proxy.status().await)
}

#[instrument(skip(state, headers, body), fields(bytes = body.len()))]
pub async fn upload(
    State(state): State<SharedState>,
    Path(lane_id): Path<i64>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.metrics.record_request("/api/upload");

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    match state.proxy.forward_upload(lane_id, content_type, body).await {
        Ok((status, data)) => (status, Json(data)).into_response(),
        Err(e) => {
            tracing::error!("Upload to backend failed: {}", e);
            (StatusCode::BAD_GATEWAY, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

pub async fn simulation_start(State(state): State<SharedState>) -> Json<Value> {
    state.metrics.record_request("/api/simulation/start");
    Json(state.proxy.post_control("simulation/start").await)
}

pub async fn simulation_reset(State(state): State<SharedState>) -> Json<Value> {
    state.metrics.record_request("/api/simulation/reset");
    Json(state.proxy.post_control("simulation/reset").await)
}

fn default_lane() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct TriggerQuery {
    #[serde(default = "default_lane")]
    lane_id: i64,
}

pub async fn trigger_accident(
    State(state): State<SharedState>,
    Query(query): Query<TriggerQuery>,
) -> Json<Value> {
    state.metrics.record_request("/api/debug/trigger_accident");
    let path = format!("debug/trigger_accident?lane_id={}", query.lane_id);
    Json(state.proxy.post_control(&path).await)
}
