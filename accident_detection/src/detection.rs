use serde::{Deserialize, Serialize};

/// One object reported by the detector, in original image pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    #[serde(rename = "class")]
    pub class_label: String,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]`
    #[serde(rename = "bbox")]
    pub bounding_box: [f32; 4],
}

impl DetectionBox {
    pub fn new(class_label: impl Into<String>, confidence: f32, bounding_box: [f32; 4]) -> Self {
        Self {
            class_label: class_label.into(),
            confidence,
            bounding_box,
        }
    }

    /// Confidence to 4 decimals and coordinates to 1, as reported to callers.
    pub fn rounded(self) -> Self {
        Self {
            confidence: round_to(self.confidence, 4),
            bounding_box: self.bounding_box.map(|coord| round_to(coord, 1)),
            ..self
        }
    }

    pub fn area(&self) -> f32 {
        let [x1, y1, x2, y2] = self.bounding_box;
        (x2 - x1).max(0.0) * (y2 - y1).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];
}

pub fn round_to(value: f32, decimals: i32) -> f32 {
    let factor = 10f32.powi(decimals);
    (value * factor).round() / factor
}

/// Maps accident confidence onto a severity tier.
pub fn classify_severity(confidence: f32) -> Severity {
    if confidence >= 0.85 {
        Severity::Critical
    } else if confidence >= 0.65 {
        Severity::High
    } else if confidence >= 0.45 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub is_accident: bool,
    pub confidence: f32,
    pub severity: Severity,
    #[serde(rename = "detections")]
    pub boxes: Vec<DetectionBox>,
    pub processing_time_ms: f64,
    #[serde(rename = "accident_id")]
    pub correlation_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_thresholds_at_boundaries() {
        assert_eq!(classify_severity(0.85), Severity::Critical);
        assert_eq!(classify_severity(0.849999), Severity::High);
        assert_eq!(classify_severity(0.65), Severity::High);
        assert_eq!(classify_severity(0.649999), Severity::Medium);
        assert_eq!(classify_severity(0.45), Severity::Medium);
        assert_eq!(classify_severity(0.449999), Severity::Low);
        assert_eq!(classify_severity(0.0), Severity::Low);
        assert_eq!(classify_severity(1.0), Severity::Critical);
    }

    #[test]
    fn test_severity_is_monotonic() {
        let mut previous = classify_severity(0.0);
        for step in 0..=1000 {
            let current = classify_severity(step as f32 / 1000.0);
            assert!(current >= previous, "severity dropped at step {}", step);
            previous = current;
        }
    }

    #[test]
    fn test_result_wire_format() {
        let result = DetectionResult {
            is_accident: true,
            confidence: 0.5,
            severity: Severity::Medium,
            boxes: vec![DetectionBox::new("crash", 0.5, [1.0, 2.0, 3.0, 4.0])],
            processing_time_ms: 12.5,
            correlation_id: Some("abc".to_string()),
        };

        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["severity"], "medium");
        assert_eq!(json["accident_id"], "abc");
        assert_eq!(json["detections"][0]["class"], "crash");
        assert_eq!(json["detections"][0]["bbox"][2], 3.0);
    }

    #[test]
    fn test_rounded_box() {
        let bbox = DetectionBox::new("crash", 0.876_543, [1.26, 2.0, 3.04, 4.449]).rounded();

        assert!((bbox.confidence - 0.8765).abs() < 1e-6);
        for (got, want) in bbox.bounding_box.iter().zip([1.3, 2.0, 3.0, 4.4]) {
            assert!((got - want).abs() < 1e-4, "{} != {}", got, want);
        }
    }

    #[test]
    fn test_area_of_degenerate_box_is_zero() {
        let bbox = DetectionBox::new("car", 0.9, [10.0, 10.0, 5.0, 20.0]);
        assert_eq!(bbox.area(), 0.0);
    }
}
