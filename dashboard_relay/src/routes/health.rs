use crate::server::SharedState;
use axum::{extract::State, response::Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    dashboard_clients: i64,
    timestamp: String,
}

pub async fn healthcheck(State(state): State<SharedState>) -> Json<Health> {
    state.metrics.record_request("/health");
    Json(Health {
        status: "healthy",
        dashboard_clients: state.metrics.connected_clients(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
