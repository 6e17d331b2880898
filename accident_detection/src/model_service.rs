use crate::detection::DetectionBox;
use async_trait::async_trait;
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model failed to load: {0}")]
    Load(String),
    #[error("image preprocessing failed: {0}")]
    Preprocess(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Object detector over a decoded image. Implementations hold read-only
/// model state and are shared across concurrent requests.
#[async_trait]
pub trait Detector: Send + Sync + 'static {
    async fn detect(&self, image: DynamicImage) -> Result<Vec<DetectionBox>, DetectorError>;
}
