use crate::{relay::relay, server::SharedState};
use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

pub async fn dashboard_ws(ws: WebSocketUpgrade, State(state): State<SharedState>) -> Response {
    state.metrics.record_request("/ws/dashboard");

    ws.on_upgrade(move |socket| relay(socket, state.backend, state.feed, state.metrics))
}
