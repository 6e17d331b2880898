use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Emergency {
    pub is_active: bool,
    pub lane_id: Option<i64>,
}

/// One message from the backend stream.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LiveFrame {
    pub signals: Map<String, Value>,
    pub emergency: Emergency,
    pub detections: Map<String, Value>,
}

impl LiveFrame {
    /// `None` for anything that does not decode, so a bad frame reads the
    /// same as a missing one.
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalsSnapshot {
    pub signals: Map<String, Value>,
    pub emergency: Emergency,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccidentSnapshot {
    #[serde(deserialize_with = "null_as_default")]
    pub status: bool,
    /// Base64 JPEG of the accident frame, empty when there is none.
    #[serde(deserialize_with = "null_as_default")]
    pub frame: String,
    pub lane_id: Option<i64>,
    #[serde(deserialize_with = "null_as_default")]
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AccidentSnapshot {
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// The message pushed to a dashboard client on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayPayload {
    pub signals: Map<String, Value>,
    pub emergency: Emergency,
    pub detections: Map<String, Value>,
    pub accident: AccidentSnapshot,
    pub backend_connected: bool,
    pub timestamp: String,
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl RelayPayload {
    pub fn from_live(frame: Option<LiveFrame>, accident: AccidentSnapshot) -> Self {
        let backend_connected = frame.is_some();
        let frame = frame.unwrap_or_default();
        Self {
            signals: frame.signals,
            emergency: frame.emergency,
            detections: frame.detections,
            accident,
            backend_connected,
            timestamp: now(),
        }
    }

    pub fn from_poll(snapshot: SignalsSnapshot, accident: AccidentSnapshot) -> Self {
        Self {
            backend_connected: !snapshot.signals.is_empty(),
            signals: snapshot.signals,
            emergency: snapshot.emergency,
            detections: Map::new(),
            accident,
            timestamp: now(),
        }
    }
}
