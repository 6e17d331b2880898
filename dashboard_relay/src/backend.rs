use crate::{
    config::BackendConfig,
    payload::{AccidentSnapshot, SignalsSnapshot},
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::{pin::Pin, time::Duration};
use thiserror::Error;
use tokio_tungstenite::tungstenite::Message;

/// Raw text frames from the backend stream. An `Err` item or the end of the
/// stream means the connection is gone.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, UpstreamError>> + Send>>;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("backend stream closed")]
    StreamClosed,
    #[error("unexpected backend response: {0}")]
    BadResponse(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UpstreamError::BadResponse(err.to_string())
        } else {
            UpstreamError::Unreachable(err.to_string())
        }
    }
}

/// The live sources a relay loop reads from.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    async fn open_stream(&self) -> Result<FrameStream, UpstreamError>;
    async fn fetch_accident(&self) -> Result<AccidentSnapshot, UpstreamError>;
    async fn fetch_signals(&self) -> Result<SignalsSnapshot, UpstreamError>;
}

#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
    request_timeout: Duration,
}

impl HttpBackend {
    pub fn new(
        client: reqwest::Client,
        config: BackendConfig,
        request_timeout: Duration,
    ) -> Self {
        Self {
            client,
            config,
            request_timeout,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, UpstreamError> {
        let response = self
            .client
            .get(self.config.endpoint(path))
            .timeout(self.request_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn open_stream(&self) -> Result<FrameStream, UpstreamError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(self.config.stream_url.as_str())
            .await
            .map_err(|e| UpstreamError::Unreachable(e.to_string()))?;

        let frames = ws_stream.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => Some(Ok(String::from_utf8_lossy(&bytes).into_owned())),
                Ok(Message::Close(_)) => Some(Err(UpstreamError::StreamClosed)),
                Ok(_) => None,
                Err(e) => Some(Err(UpstreamError::Unreachable(e.to_string()))),
            }
        });

        Ok(Box::pin(frames))
    }

    async fn fetch_accident(&self) -> Result<AccidentSnapshot, UpstreamError> {
        self.get_json("accident_api").await
    }

    async fn fetch_signals(&self) -> Result<SignalsSnapshot, UpstreamError> {
        self.get_json("signals").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::tests::{backend_config, closed_addr, serve};
    use axum::{
        extract::ws::{self, WebSocketUpgrade},
        response::{IntoResponse, Json},
        routing::get,
        Router,
    };
    use serde_json::json;

    async fn emergency_ws(ws: WebSocketUpgrade) -> impl IntoResponse {
        ws.on_upgrade(|mut socket| async move {
            for signal in ["GREEN", "RED"] {
                let frame = json!({"signals": {"1": signal}}).to_string();
                if socket.send(ws::Message::Text(frame.into())).await.is_err() {
                    return;
                }
            }
            let _ = socket.send(ws::Message::Close(None)).await;
        })
    }

    fn fake_backend() -> Router {
        Router::new()
            .route("/ws/emergency", get(emergency_ws))
            .route(
                "/accident_api",
                get(|| async {
                    Json(json!({"status": true, "frame": "abc", "lane_id": 3, "confidence": 0.9}))
                }),
            )
            .route(
                "/signals",
                get(|| async {
                    Json(json!({
                        "signals": {"1": "RED", "2": "GREEN"},
                        "emergency": {"is_active": true, "lane_id": 2}
                    }))
                }),
            )
    }

    fn http_backend(config: BackendConfig) -> HttpBackend {
        HttpBackend::new(reqwest::Client::new(), config, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_fetch_snapshots() {
        let addr = serve(fake_backend()).await;
        let backend = http_backend(backend_config(addr));

        let accident = backend.fetch_accident().await.unwrap();
        let signals = backend.fetch_signals().await.unwrap();

        assert!(accident.status);
        assert_eq!(accident.frame, "abc");
        assert_eq!(accident.lane_id, Some(3));
        assert_eq!(signals.signals.len(), 2);
        assert!(signals.emergency.is_active);
        assert_eq!(signals.emergency.lane_id, Some(2));
    }

    #[tokio::test]
    async fn test_stream_yields_frames_then_ends() {
        let addr = serve(fake_backend()).await;
        let backend = http_backend(backend_config(addr));

        let mut stream = backend.open_stream().await.unwrap();

        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert!(first.contains("GREEN"));
        assert!(second.contains("RED"));
        assert!(!matches!(stream.next().await, Some(Ok(_))));
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let backend = http_backend(backend_config(closed_addr().await));

        assert!(matches!(
            backend.open_stream().await,
            Err(UpstreamError::Unreachable(_))
        ));
        assert!(matches!(
            backend.fetch_accident().await,
            Err(UpstreamError::Unreachable(_))
        ));
        assert!(backend.fetch_signals().await.is_err());
    }

    #[tokio::test]
    async fn test_unexpected_body_is_bad_response() {
        let router = Router::new().route("/accident_api", get(|| async { "not json" }));
        let backend = http_backend(backend_config(serve(router).await));

        assert!(matches!(
            backend.fetch_accident().await,
            Err(UpstreamError::BadResponse(_))
        ));
    }
}
