use crate::inference_service::InferenceError;
use base64::{engine::general_purpose, Engine};
use image::DynamicImage;
use std::io::Cursor;

/// Drops a `data:image/...;base64,` style prefix if present.
fn strip_data_url(b64: &str) -> &str {
    match b64.split_once(',') {
        Some((_, payload)) => payload,
        None => b64,
    }
}

/// Accepts line-wrapped (MIME style) payloads; whitespace anywhere in the
/// payload is ignored.
pub fn decode_base64_image(b64: &str) -> Result<DynamicImage, InferenceError> {
    let payload: String = strip_data_url(b64)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| InferenceError::InvalidImage(format!("Invalid base64 image: {}", e)))?;
    decode_image_bytes(&bytes)
}

pub fn decode_image_bytes(bytes: &[u8]) -> Result<DynamicImage, InferenceError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| InferenceError::InvalidImage(format!("Error reading image: {}", e)))?
        .decode()
        .map_err(|e| InferenceError::InvalidImage(format!("Error decoding image: {}", e)))
}
