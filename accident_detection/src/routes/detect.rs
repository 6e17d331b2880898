use crate::{
    detection::DetectionResult,
    image_input::{decode_base64_image, decode_image_bytes},
    inference_service::InferenceError,
    server::SharedState,
};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use image::DynamicImage;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    /// Base64 image, optionally as a data URL.
    pub image: String,
    pub accident_id: Option<String>,
    pub gps: Option<String>,
}

impl IntoResponse for InferenceError {
    fn into_response(self) -> Response {
        let status = match self {
            InferenceError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            InferenceError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

async fn run_detection(
    state: &SharedState,
    image: DynamicImage,
    accident_id: Option<String>,
    route: &str,
) -> Result<DetectionResult, InferenceError> {
    let mut result = state.classifier.classify(image).await?;
    result.correlation_id = accident_id;

    state
        .metrics
        .record_detection_duration(result.processing_time_ms, route);
    state
        .metrics
        .record_detection(result.severity, result.is_accident);

    tracing::info!(
        is_accident = result.is_accident,
        confidence = result.confidence,
        severity = result.severity.as_str(),
        processing_time_ms = result.processing_time_ms,
        "Detection completed"
    );

    Ok(result)
}

#[instrument(skip(state, request), fields(accident_id = ?request.accident_id, gps = ?request.gps))]
pub async fn detect(
    State(state): State<SharedState>,
    Json(request): Json<DetectRequest>,
) -> Result<Json<DetectionResult>, InferenceError> {
    state.metrics.record_request("/detect");

    let image = decode_base64_image(&request.image)?;
    let result = run_detection(&state, image, request.accident_id, "/detect").await?;

    Ok(Json(result))
}

#[instrument(skip(state, multipart))]
pub async fn detect_upload(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<DetectionResult>, InferenceError> {
    state.metrics.record_request("/detect-upload");

    let mut image_bytes = None;
    let mut accident_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| InferenceError::InvalidImage(format!("Invalid image file: {}", e)))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("image") => {
                let bytes = field.bytes().await.map_err(|e| {
                    InferenceError::InvalidImage(format!("Invalid image file: {}", e))
                })?;
                image_bytes = Some(bytes);
            }
            Some("accident_id") => {
                let text = field.text().await.map_err(|e| {
                    InferenceError::InvalidImage(format!("Invalid form field: {}", e))
                })?;
                accident_id = Some(text);
            }
            _ => {}
        }
    }

    let image_bytes = image_bytes
        .ok_or_else(|| InferenceError::InvalidImage("missing `image` file field".to_string()))?;
    let image = decode_image_bytes(&image_bytes)?;
    let result = run_detection(&state, image, accident_id, "/detect-upload").await?;

    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        detection::{DetectionBox, Severity},
        image_input::tests::png_bytes,
        inference_service::{tests::MockDetector, AccidentClassifier},
        telemetry::Metrics,
    };
    use axum::{
        body::Body,
        extract::FromRequest,
        http::{header, Request},
    };
    use base64::{engine::general_purpose, Engine};
    use std::{sync::Arc, time::Duration};

    fn state_with(boxes: Option<Vec<DetectionBox>>) -> SharedState {
        let detector = boxes.map(|b| Arc::new(MockDetector::new(b)) as Arc<dyn crate::model_service::Detector>);
        SharedState {
            classifier: AccidentClassifier::new(detector, Duration::from_secs(1)),
            metrics: Arc::new(Metrics::new().unwrap()),
        }
    }

    fn upload_request(fields: &[(&str, Option<&str>, Vec<u8>)]) -> Request<Body> {
        let boundary = "accident-boundary";
        let mut body = Vec::new();
        for (name, filename, content) in fields {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: image/png\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/detect-upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_detect_base64() {
        let state = state_with(Some(vec![DetectionBox::new(
            "collision",
            0.7,
            [1.0, 1.0, 4.0, 4.0],
        )]));
        let request = DetectRequest {
            image: general_purpose::STANDARD.encode(png_bytes(16, 16)),
            accident_id: Some("acc-1".to_string()),
            gps: None,
        };

        let Json(result) = detect(State(state.clone()), Json(request)).await.unwrap();

        assert!(result.is_accident);
        assert_eq!(result.severity, Severity::High);
        assert_eq!(result.correlation_id.as_deref(), Some("acc-1"));
        assert!(state.metrics.encode().unwrap().contains("requests_total{route=\"/detect\"} 1"));
    }

    #[tokio::test]
    async fn test_detect_invalid_image_is_400() {
        let state = state_with(Some(vec![]));
        let request = DetectRequest {
            image: "%%%".to_string(),
            accident_id: None,
            gps: None,
        };

        let err = detect(State(state), Json(request)).await.unwrap_err();

        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_detect_without_model_is_503() {
        let state = state_with(None);
        let request = DetectRequest {
            image: general_purpose::STANDARD.encode(png_bytes(4, 4)),
            accident_id: None,
            gps: None,
        };

        let err = detect(State(state), Json(request)).await.unwrap_err();

        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_detect_upload() {
        let state = state_with(Some(vec![]));
        let request = upload_request(&[
            ("accident_id", None, b"acc-9".to_vec()),
            ("image", Some("frame.png"), png_bytes(10, 10)),
        ]);
        let multipart = Multipart::from_request(request, &()).await.unwrap();

        let Json(result) = detect_upload(State(state), multipart).await.unwrap();

        assert!(!result.is_accident);
        assert_eq!(result.severity, Severity::Low);
        assert_eq!(result.correlation_id.as_deref(), Some("acc-9"));
    }

    #[tokio::test]
    async fn test_detect_upload_missing_image_is_400() {
        let state = state_with(Some(vec![]));
        let request = upload_request(&[("accident_id", None, b"acc-9".to_vec())]);
        let multipart = Multipart::from_request(request, &()).await.unwrap();

        let err = detect_upload(State(state), multipart).await.unwrap_err();

        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
