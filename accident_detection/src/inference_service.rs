use crate::{
    detection::{classify_severity, round_to, DetectionBox, DetectionResult, Severity},
    model_service::{Detector, DetectorError},
};
use image::DynamicImage;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::Instant;
use tracing::instrument;

/// Substrings of class labels that count toward accident confidence.
const ACCIDENT_KEYWORDS: [&str; 8] = [
    "accident",
    "crash",
    "collision",
    "damage",
    "severe",
    "moderate",
    "car",
    "vehicle",
];

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),
}

impl From<DetectorError> for InferenceError {
    fn from(err: DetectorError) -> Self {
        match err {
            DetectorError::Preprocess(msg) => InferenceError::InvalidImage(msg),
            other => InferenceError::ModelUnavailable(other.to_string()),
        }
    }
}

pub fn is_accident_relevant(class_label: &str) -> bool {
    let label = class_label.to_lowercase();
    ACCIDENT_KEYWORDS.iter().any(|kw| label.contains(kw))
}

/// Accident flag and confidence for a set of boxes.
///
/// Relevant boxes alone decide the confidence when any are present. When
/// boxes exist but none is relevant, the strongest box still counts as an
/// accident.
pub fn assess(boxes: &[DetectionBox]) -> (bool, f32) {
    let mut relevant_max: Option<f32> = None;
    let mut overall_max: Option<f32> = None;

    for bbox in boxes {
        overall_max = Some(overall_max.map_or(bbox.confidence, |m| m.max(bbox.confidence)));
        if is_accident_relevant(&bbox.class_label) {
            relevant_max = Some(relevant_max.map_or(bbox.confidence, |m| m.max(bbox.confidence)));
        }
    }

    match (relevant_max, overall_max) {
        (Some(confidence), _) => (true, confidence),
        (None, Some(confidence)) => (true, confidence),
        (None, None) => (false, 0.0),
    }
}

/// Turns detector output into a severity-classified [`DetectionResult`].
#[derive(Clone)]
pub struct AccidentClassifier {
    detector: Option<Arc<dyn Detector>>,
    time_budget: Duration,
}

impl AccidentClassifier {
    pub fn new(detector: Option<Arc<dyn Detector>>, time_budget: Duration) -> Self {
        Self {
            detector,
            time_budget,
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.detector.is_some()
    }

    #[instrument(skip(self, image))]
    pub async fn classify(&self, image: DynamicImage) -> Result<DetectionResult, InferenceError> {
        let start = Instant::now();

        let detector = self
            .detector
            .as_ref()
            .ok_or_else(|| InferenceError::ModelUnavailable("ML model not loaded".to_string()))?;

        let boxes = detector.detect(image).await?;
        let (is_accident, confidence) = assess(&boxes);
        let severity = if is_accident {
            classify_severity(confidence)
        } else {
            Severity::Low
        };

        let elapsed = start.elapsed();
        if elapsed > self.time_budget {
            tracing::warn!(
                "Detection took {}ms, over the {}ms budget",
                elapsed.as_millis(),
                self.time_budget.as_millis()
            );
        }

        tracing::debug!("Returning {} detections", boxes.len());
        for (i, detection) in boxes.iter().enumerate() {
            tracing::debug!(
                "Detection {}: class={}, confidence={:.3}, bbox={:?}",
                i,
                detection.class_label,
                detection.confidence,
                detection.bounding_box
            );
        }

        Ok(DetectionResult {
            is_accident,
            confidence: round_to(confidence, 4),
            severity,
            boxes: boxes.into_iter().map(DetectionBox::rounded).collect(),
            processing_time_ms: (elapsed.as_secs_f64() * 100_000.0).round() / 100.0,
            correlation_id: None,
        })
    }
}
