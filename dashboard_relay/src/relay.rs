use crate::{backend::Backend, config::FeedConfig, feed::FeedClient, telemetry::Metrics};
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::instrument;

/// Serves one dashboard connection until the client leaves.
///
/// Each connection owns its feed task, so a slow or disconnected client
/// never holds up another. The feed is aborted on exit, which cancels any
/// backend wait it is parked on.
#[instrument(skip_all)]
pub async fn relay(
    socket: WebSocket,
    backend: Arc<dyn Backend>,
    config: FeedConfig,
    metrics: Arc<Metrics>,
) {
    metrics.client_connected();
    tracing::info!(clients = metrics.connected_clients(), "Dashboard client connected");

    let (mut sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::channel(1);
    let feed = tokio::spawn(FeedClient::new(backend, config, metrics.clone()).run(tx));
    let mut payloads = ReceiverStream::new(rx);

    loop {
        tokio::select! {
            payload = payloads.next() => {
                let Some(payload) = payload else {
                    tracing::warn!("Feed ended unexpectedly");
                    break;
                };
                let text = match serde_json::to_string(&payload) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("Failed to serialize payload: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sender.send(Message::Text(text.into())).await {
                    tracing::debug!("Send to dashboard client failed: {}", e);
                    break;
                }
                metrics.record_payload_sent();
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!("Dashboard client socket error: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            }
        }
    }

    feed.abort();
    metrics.client_disconnected();
    tracing::info!(clients = metrics.connected_clients(), "Dashboard client disconnected");
}
