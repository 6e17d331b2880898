use crate::{
    config::{Config, ModelConfig, Validatable},
    inference_service::AccidentClassifier,
    model_service::Detector,
    ort_service::OrtDetector,
    server::{HttpServer, SharedState},
    state::ClassLabels,
    telemetry::Metrics,
};
use std::{error::Error, sync::Arc, time::Duration};
use tokio::{signal, sync::broadcast};

/// Loads the detector once at startup. A missing or broken model leaves the
/// service up with detections answering "model unavailable".
fn load_detector(model_config: &ModelConfig, labels: ClassLabels) -> Option<Arc<dyn Detector>> {
    let Some(model_path) = model_config.resolve_model_path() else {
        tracing::error!(
            "No model file found, tried {:?}",
            model_config.candidate_paths()
        );
        return None;
    };

    if let Err(e) = model_config.validate() {
        tracing::warn!("Primary model unavailable ({}), using {:?}", e, model_path);
    }

    match OrtDetector::new(&model_path, model_config, labels) {
        Ok(detector) => {
            tracing::info!("Model loaded from {:?}", model_path);
            Some(Arc::new(detector))
        }
        Err(e) => {
            tracing::error!("Failed to load model: {}", e);
            None
        }
    }
}

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let labels = match ClassLabels::load(&config.labels) {
        Ok(labels) => labels,
        Err(e) => {
            tracing::warn!("{}, falling back to numeric class names", e);
            ClassLabels::default()
        }
    };
    tracing::info!("Loaded {} class labels", labels.len());

    let detector = load_detector(&config.model, labels);
    let classifier = AccidentClassifier::new(
        detector,
        Duration::from_millis(config.inference.time_budget_ms),
    );

    let state = SharedState {
        classifier,
        metrics: Arc::new(Metrics::new()?),
    };

    let server = HttpServer::new(state, &config.server).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_handle = server.run(shutdown_tx.subscribe()).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    let _ = server_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
