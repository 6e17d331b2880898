use crate::{
    backend::{Backend, UpstreamError},
    config::FeedConfig,
    payload::{AccidentSnapshot, LiveFrame, RelayPayload, SignalsSnapshot},
    telemetry::Metrics,
};
use futures::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio::{
    sync::mpsc,
    time::{sleep, timeout},
};
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Live,
    Polling,
}

#[derive(Error, Debug)]
#[error("dashboard client disconnected")]
pub struct ClientDisconnected;

enum LiveExit {
    Upstream(UpstreamError),
    Disconnected,
}

/// Produces one [`RelayPayload`] per tick for a single dashboard client,
/// alternating between the backend stream and REST polling. Never gives up
/// on the backend; stops only when the receiving side is dropped.
pub struct FeedClient {
    backend: Arc<dyn Backend>,
    config: FeedConfig,
    metrics: Arc<Metrics>,
}

impl FeedClient {
    pub fn new(backend: Arc<dyn Backend>, config: FeedConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            backend,
            config,
            metrics,
        }
    }

    #[instrument(skip_all)]
    pub async fn run(self, tx: mpsc::Sender<RelayPayload>) {
        let mut state = FeedState::Live;

        loop {
            state = match state {
                FeedState::Live => match self.run_live(&tx).await {
                    LiveExit::Disconnected => break,
                    LiveExit::Upstream(e) => {
                        tracing::warn!("Backend stream unavailable ({}), polling instead", e);
                        self.metrics.record_fallback();
                        FeedState::Polling
                    }
                },
                FeedState::Polling => match self.run_polling(&tx).await {
                    Ok(()) => {
                        tracing::info!("Retrying backend stream");
                        FeedState::Live
                    }
                    Err(ClientDisconnected) => break,
                },
            };
        }

        tracing::debug!("Feed stopped, dashboard client gone");
    }

    async fn run_live(&self, tx: &mpsc::Sender<RelayPayload>) -> LiveExit {
        let mut stream = match timeout(self.config.stream_timeout(), self.backend.open_stream()).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return LiveExit::Upstream(e),
            Err(_) => {
                return LiveExit::Upstream(UpstreamError::Unreachable(
                    "timed out connecting to stream".to_string(),
                ))
            }
        };
        tracing::info!("Connected to backend stream");

        loop {
            let frame = match timeout(self.config.stream_timeout(), stream.next()).await {
                Ok(Some(Ok(raw))) => {
                    let frame = LiveFrame::decode(&raw);
                    if frame.is_none() {
                        tracing::debug!("Discarding malformed backend frame");
                    }
                    frame
                }
                Ok(Some(Err(e))) => return LiveExit::Upstream(e),
                Ok(None) => return LiveExit::Upstream(UpstreamError::StreamClosed),
                Err(_) => None,
            };

            let accident = self.fetch_accident().await;
            if tx
                .send(RelayPayload::from_live(frame, accident))
                .await
                .is_err()
            {
                return LiveExit::Disconnected;
            }

            sleep(self.config.live_interval()).await;
        }
    }

    async fn run_polling(&self, tx: &mpsc::Sender<RelayPayload>) -> Result<(), ClientDisconnected> {
        for _ in 0..self.config.poll_iterations.max(1) {
            let (accident, signals) = tokio::join!(self.fetch_accident(), self.fetch_signals());

            tx.send(RelayPayload::from_poll(signals, accident))
                .await
                .map_err(|_| ClientDisconnected)?;

            sleep(self.config.poll_interval()).await;
        }

        Ok(())
    }

    async fn fetch_accident(&self) -> AccidentSnapshot {
        match timeout(self.config.snapshot_timeout(), self.backend.fetch_accident()).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                tracing::debug!("Accident snapshot unavailable: {}", e);
                AccidentSnapshot::default()
            }
            Err(_) => {
                tracing::debug!("Accident snapshot timed out");
                AccidentSnapshot::default()
            }
        }
    }

    async fn fetch_signals(&self) -> SignalsSnapshot {
        match timeout(self.config.snapshot_timeout(), self.backend.fetch_signals()).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                tracing::debug!("Signals snapshot unavailable: {}", e);
                SignalsSnapshot::default()
            }
            Err(_) => {
                tracing::debug!("Signals snapshot timed out");
                SignalsSnapshot::default()
            }
        }
    }
}
