use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub struct Metrics {
    request_counter: IntCounterVec,
    connected_clients: IntGauge,
    payloads_sent: IntCounter,
    feed_fallbacks: IntCounter,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let request_counter = IntCounterVec::new(
            Opts::new("requests_total", "Total number of requests"),
            &["route"],
        )?;
        let connected_clients = IntGauge::new(
            "dashboard_clients",
            "Dashboard clients currently connected to the relay",
        )?;
        let payloads_sent = IntCounter::new(
            "relay_payloads_sent_total",
            "Payloads delivered to dashboard clients",
        )?;
        let feed_fallbacks = IntCounter::new(
            "feed_fallbacks_total",
            "Times a relay loop fell back from the live stream to polling",
        )?;

        registry.register(Box::new(request_counter.clone()))?;
        registry.register(Box::new(connected_clients.clone()))?;
        registry.register(Box::new(payloads_sent.clone()))?;
        registry.register(Box::new(feed_fallbacks.clone()))?;

        Ok(Metrics {
            request_counter,
            connected_clients,
            payloads_sent,
            feed_fallbacks,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        self.request_counter.with_label_values(&[route]).inc();
    }

    pub fn client_connected(&self) {
        self.connected_clients.inc();
    }

    pub fn client_disconnected(&self) {
        self.connected_clients.dec();
    }

    pub fn connected_clients(&self) -> i64 {
        self.connected_clients.get()
    }

    pub fn record_payload_sent(&self) {
        self.payloads_sent.inc();
    }

    pub fn record_fallback(&self) {
        self.feed_fallbacks.inc();
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_gauge_tracks_connections() {
        let metrics = Metrics::new().unwrap();
        metrics.client_connected();
        metrics.client_connected();
        metrics.client_disconnected();
        metrics.record_fallback();

        assert_eq!(metrics.connected_clients(), 1);
        let text = metrics.encode().unwrap();
        assert!(text.contains("dashboard_clients 1"));
        assert!(text.contains("feed_fallbacks_total 1"));
    }
}
