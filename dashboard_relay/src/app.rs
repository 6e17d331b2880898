use crate::{
    backend::{Backend, HttpBackend},
    config::Config,
    proxy::BackendProxy,
    server::{HttpServer, SharedState},
    telemetry::Metrics,
};
use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let client = reqwest::Client::new();

    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(
        client.clone(),
        config.backend.clone(),
        config.feed.snapshot_timeout(),
    ));
    tracing::info!(
        base_url = %config.backend.base_url,
        stream_url = %config.backend.stream_url,
        "Relaying backend"
    );

    let state = SharedState {
        backend,
        proxy: BackendProxy::new(client, config.backend.clone()),
        feed: config.feed.clone(),
        history: config.history.clone(),
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
