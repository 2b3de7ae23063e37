use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::PulseError;

/// 单条遥测事件
///
/// 入队时序列化为 JSON，入队后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub event_name: String,
    pub captured_at: String,
    #[serde(default)]
    pub app: Option<String>,
    /// Already anonymized by the time the event is built.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl TelemetryEvent {
    /// Parses a queued payload.
    pub fn decode(payload: &str) -> Result<Self, PulseError> {
        serde_json::from_str(payload).map_err(|e| PulseError::Decode(e.to_string()))
    }

    /// Rate-limit identity: `event_name:site:app:user`.
    pub fn event_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.event_name,
            key_part(&self.site),
            key_part(&self.app),
            key_part(&self.user)
        )
    }
}

fn key_part(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("None")
}

/// Current UTC time, RFC 3339 with microseconds.
pub fn utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
