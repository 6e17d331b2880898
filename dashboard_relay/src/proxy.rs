use crate::{config::BackendConfig, payload::AccidentSnapshot};
use axum::http::StatusCode;
use bytes::Bytes;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("{0}")]
    Upstream(#[from] reqwest::Error),
}

/// Thin REST passthrough to the backend for the dashboard's HTTP calls.
#[derive(Clone)]
pub struct BackendProxy {
    client: reqwest::Client,
    config: BackendConfig,
}

fn status_code(status: reqwest::StatusCode) -> StatusCode {
    StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY)
}

impl BackendProxy {
    pub fn new(client: reqwest::Client, config: BackendConfig) -> Self {
        Self { client, config }
    }

    async fn get_json(&self, path: &str) -> Result<Value, ProxyError> {
        let response = self
            .client
            .get(self.config.endpoint(path))
            .timeout(Duration::from_millis(self.config.proxy_timeout_ms))
            .send()
            .await?;
        Ok(response.json().await?)
    }

    /// Falls back to an empty snapshot carrying the error.
    pub async fn accident(&self) -> Value {
        match self.get_json("accident_api").await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Accident proxy failed: {}", e);
                json!(AccidentSnapshot::unavailable(e.to_string()))
            }
        }
    }

    pub async fn status(&self) -> Value {
        match self.get_json("status").await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Status proxy failed: {}", e);
                json!({ "error": e.to_string(), "backend_reachable": false })
            }
        }
    }

    /// Forwards an upload body untouched and mirrors the backend's status.
    pub async fn forward_upload(
        &self,
        lane_id: i64,
        content_type: Option<String>,
        body: Bytes,
    ) -> Result<(StatusCode, Value), ProxyError> {
        let mut request = self
            .client
            .post(self.config.endpoint(&format!("upload/{}", lane_id)))
            .timeout(Duration::from_millis(self.config.upload_timeout_ms))
            .body(body);
        if let Some(content_type) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }

        let response = request.send().await?;
        let status = status_code(response.status());
        let text = response.text().await?;
        let data = serde_json::from_str(&text)
            .unwrap_or_else(|_| json!({ "status": "ok", "raw": text }));

        Ok((status, data))
    }

    /// POSTs to a backend control endpoint and returns its JSON body, or
    /// `{error}` when the call fails.
    pub async fn post_control(&self, path: &str) -> Value {
        let result: Result<Value, ProxyError> = async {
            let response = self
                .client
                .post(self.config.endpoint(path))
                .timeout(Duration::from_millis(self.config.control_timeout_ms))
                .send()
                .await?;
            Ok(response.json().await?)
        }
        .await;

        result.unwrap_or_else(|e| {
            tracing::warn!(path, "Control proxy failed: {}", e);
            json!({ "error": e.to_string() })
        })
    }
}
