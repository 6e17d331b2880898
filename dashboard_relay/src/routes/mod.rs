mod dashboard;
mod health;
mod history;
mod metrics;
mod proxy;

use crate::server::SharedState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/ws/dashboard", get(dashboard::dashboard_ws))
        .route("/api/accident", get(proxy::accident))
        .route("/api/status", get(proxy::status))
        .route(
            "/api/upload/{lane_id}",
            post(proxy::upload).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/simulation/start", post(proxy::simulation_start))
        .route("/api/simulation/reset", post(proxy::simulation_reset))
        .route("/api/debug/trigger_accident", post(proxy::trigger_accident))
        .route("/api/history", get(history::history_list))
        .route("/api/history/image/{filename}", get(history::history_image))
}
