use crate::server::SharedState;
use axum::{extract::State, response::Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct ServiceInfo {
    service: &'static str,
    status: &'static str,
    model_loaded: bool,
    endpoints: [&'static str; 3],
}

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    model_loaded: bool,
    timestamp: String,
}

pub async fn service_info(State(state): State<SharedState>) -> Json<ServiceInfo> {
    state.metrics.record_request("/");
    Json(ServiceInfo {
        service: "Accident Detection ML",
        status: "running",
        model_loaded: state.classifier.model_loaded(),
        endpoints: ["/detect", "/detect-upload", "/health"],
    })
}

pub async fn healthcheck(State(state): State<SharedState>) -> Json<Health> {
    state.metrics.record_request("/health");
    Json(Health {
        status: "healthy",
        model_loaded: state.classifier.model_loaded(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{inference_service::AccidentClassifier, telemetry::Metrics};
    use std::{sync::Arc, time::Duration};

    #[tokio::test]
    async fn test_info_and_health_are_counted() {
        let state = SharedState {
            classifier: AccidentClassifier::new(None, Duration::from_secs(1)),
            metrics: Arc::new(Metrics::new().unwrap()),
        };

        let Json(info) = service_info(State(state.clone())).await;
        let Json(health) = healthcheck(State(state.clone())).await;
        healthcheck(State(state.clone())).await;

        assert!(!info.model_loaded);
        assert_eq!(health.status, "healthy");
        let text = state.metrics.encode().unwrap();
        assert!(text.contains("requests_total{route=\"/\"} 1"));
        assert!(text.contains("requests_total{route=\"/health\"} 2"));
    }
}
