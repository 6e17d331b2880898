use crate::{
    backend::Backend,
    config::{FeedConfig, HistoryConfig, ServerConfig},
    proxy::BackendProxy,
    routes::api_routes,
    telemetry::Metrics,
};
use axum::Router;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};

#[derive(Clone)]
pub struct SharedState {
    pub backend: Arc<dyn Backend>,
    pub proxy: BackendProxy,
    pub feed: FeedConfig,
    pub history: HistoryConfig,
    pub metrics: Arc<Metrics>,
}

pub fn build_router(state: SharedState) -> Router {
    Router::new().merge(api_routes()).with_state(state)
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(state: SharedState, config: &ServerConfig) -> anyhow::Result<Self> {
        let router = build_router(state);
        let listener = TcpListener::bind(config.get_address()).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(self, shutdown_rx: Receiver<()>) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting dashboard relay on {}", self.listener.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let mut shutdown_rx = shutdown_rx.resubscribe();
        let server_handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_rx.recv().await.ok();
                })
                .await?;
            Ok(())
        });

        Ok(server_handle)
    }
}
