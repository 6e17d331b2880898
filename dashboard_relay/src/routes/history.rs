use crate::{history, server::SharedState};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<usize>,
}

pub async fn history_list(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    state.metrics.record_request("/api/history");
    let limit = query.limit.unwrap_or(state.history.default_limit);

    match history::list_history(&state.history.output_dir, limit).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => {
            tracing::error!("{}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
}

pub async fn history_image(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> Response {
    state.metrics.record_request("/api/history/image");

    let Some(path) = history::resolve_image(&state.history.output_dir, &filename).await else {
        return not_found();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response(),
        Err(e) => {
            tracing::warn!("Failed to read {:?}: {}", path, e);
            not_found()
        }
    }
}
