use crate::detection::Severity;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::collections::HashSet;

pub struct Metrics {
    request_counter: IntCounterVec,
    detection_duration: HistogramVec,
    detection_counter: IntCounterVec,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let request_counter = IntCounterVec::new(
            Opts::new("requests_total", "Total number of requests"),
            &["route"],
        )?;

        let boundaries = generate_boundaries(&[(10, 100, 10), (100, 500, 50), (500, 2000, 250)]);
        let detection_duration = HistogramVec::new(
            HistogramOpts::new(
                "detection_duration_ms",
                "Duration of detection calls in milliseconds",
            )
            .buckets(boundaries),
            &["route"],
        )?;

        let detection_counter = IntCounterVec::new(
            Opts::new("detections_total", "Detections by outcome"),
            &["severity", "is_accident"],
        )?;

        registry.register(Box::new(request_counter.clone()))?;
        registry.register(Box::new(detection_duration.clone()))?;
        registry.register(Box::new(detection_counter.clone()))?;

        // Pre-create the severity series so dashboards see zeros.
        for severity in Severity::ALL {
            detection_counter.with_label_values(&[severity.as_str(), "true"]);
        }

        Ok(Metrics {
            request_counter,
            detection_duration,
            detection_counter,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        self.request_counter.with_label_values(&[route]).inc();
    }

    pub fn record_detection_duration(&self, duration_ms: f64, route: &str) {
        self.detection_duration
            .with_label_values(&[route])
            .observe(duration_ms);
    }

    pub fn record_detection(&self, severity: Severity, is_accident: bool) {
        let is_accident = if is_accident { "true" } else { "false" };
        self.detection_counter
            .with_label_values(&[severity.as_str(), is_accident])
            .inc();
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Concatenates `(start, end, step)` ranges into strictly increasing bucket bounds.
fn generate_boundaries(segments: &[(u32, u32, usize)]) -> Vec<f64> {
    let mut seen = HashSet::new();
    segments
        .iter()
        .flat_map(|&(start, end, step)| (start..=end).step_by(step))
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_boundaries() {
        let get = generate_boundaries(&[(2, 22, 10), (22, 26, 2), (26, 46, 20), (46, 146, 100)]);
        let expected = vec![2.0, 12.0, 22.0, 24.0, 26.0, 46.0, 146.0];

        assert_eq!(get, expected);
    }

    #[test]
    fn test_encode_contains_recorded_series() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request("/detect");
        metrics.record_detection_duration(42.0, "/detect");
        metrics.record_detection(Severity::High, true);

        let text = metrics.encode().unwrap();

        assert!(text.contains("requests_total{route=\"/detect\"} 1"));
        assert!(text.contains("detection_duration_ms_count{route=\"/detect\"} 1"));
        assert!(text.contains("detections_total{is_accident=\"true\",severity=\"high\"} 1"));
    }
}
