mod image_input;
mod ort_service;
mod routes;
mod server;
mod state;
mod telemetry;

pub mod app;
pub mod config;
pub mod detection;
pub mod inference_service;
pub mod model_service;

pub use app::start_app;
pub use detection::{classify_severity, DetectionBox, DetectionResult, Severity};
pub use inference_service::{AccidentClassifier, InferenceError};
pub use model_service::{Detector, DetectorError};
