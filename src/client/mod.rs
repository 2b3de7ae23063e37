pub mod dispatcher;
pub mod http;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::common::anonymize::anonymize_optional;
use crate::common::events::{utc_iso, TelemetryEvent};
use crate::common::interval::Interval;
use crate::config::{DispatchSettings, PulseSettings};
use crate::queue::{AddOutcome, BatchReport, EventQueue, EventSink};
use crate::storage::LedgerEntry;

pub use http::HttpSink;

const ENABLE_SETTING_KEY: &str = "enable_telemetry";
const DEFAULT_FETCH_LIMIT: usize = 20;

/// 一次采集请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub event_name: String,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub app: Option<String>,
    /// Raw user identifier; anonymized before it reaches the queue.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub captured_at: Option<String>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub interval: Option<Interval>,
}

impl CaptureRequest {
    pub fn new(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureOutcome {
    Disabled,
    Queued,
    RateLimited,
    /// Logged and swallowed.
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugInfo {
    pub is_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued_event_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued_events: Option<Vec<TelemetryEvent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limited_events: Option<Vec<LedgerEntry>>,
}

struct EnabledCache {
    ttl: Duration,
    cached: RwLock<Option<(Instant, bool)>>,
}

/// 遥测客户端：采集、开关判断与批量投递
///
/// 采集路径上的任何错误只记录日志，不会抛给调用方。
#[derive(Clone)]
pub struct PulseClient {
    queue: EventQueue,
    pulse: Arc<PulseSettings>,
    dispatch: Arc<DispatchSettings>,
    sink: Arc<dyn EventSink>,
    enabled: Arc<EnabledCache>,
}

impl PulseClient {
    pub fn new(
        queue: EventQueue,
        pulse: PulseSettings,
        dispatch: DispatchSettings,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let enabled = EnabledCache {
            ttl: Duration::from_secs(pulse.enabled_cache_ttl_secs),
            cached: RwLock::new(None),
        };
        Self {
            queue,
            pulse: Arc::new(pulse),
            dispatch: Arc::new(dispatch),
            sink,
            enabled: Arc::new(enabled),
        }
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn dispatch_settings(&self) -> &DispatchSettings {
        &self.dispatch
    }

    /// Cached for `pulse.enabled_cache_ttl_secs`.
    pub fn is_enabled(&self) -> bool {
        if let Ok(cached) = self.enabled.cached.read() {
            if let Some((at, value)) = *cached {
                if at.elapsed() < self.enabled.ttl {
                    return value;
                }
            }
        }

        let value = match self.compute_enabled() {
            Ok(value) => value,
            Err(e) => {
                warn!("[Pulse] Enable check failed: {}", e);
                return false;
            }
        };
        if let Ok(mut cached) = self.enabled.cached.write() {
            *cached = Some((Instant::now(), value));
        }
        value
    }

    fn compute_enabled(&self) -> anyhow::Result<bool> {
        if self.pulse.developer_mode || !self.pulse.managed {
            return Ok(false);
        }
        let has_key = self
            .pulse
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if !has_key {
            return Ok(false);
        }
        let switch = self.queue.store().get_setting(ENABLE_SETTING_KEY)?;
        Ok(match switch.as_deref() {
            Some(value) => value == "1",
            None => self.pulse.enabled,
        })
    }

    pub fn clear_enabled_cache(&self) {
        if let Ok(mut cached) = self.enabled.cached.write() {
            *cached = None;
        }
    }

    /// Flips the runtime switch and drops the cached decision.
    pub fn set_telemetry_enabled(&self, enabled: bool) -> anyhow::Result<()> {
        let value = if enabled { "1" } else { "0" };
        self.queue.store().set_setting(ENABLE_SETTING_KEY, value)?;
        self.clear_enabled_cache();
        info!("[Pulse] Telemetry switched {}", if enabled { "on" } else { "off" });
        Ok(())
    }

    pub fn capture(&self, request: CaptureRequest) -> CaptureOutcome {
        if !self.is_enabled() {
            return CaptureOutcome::Disabled;
        }

        let event = TelemetryEvent {
            event_name: request.event_name,
            captured_at: request.captured_at.unwrap_or_else(utc_iso),
            app: request.app,
            user: anonymize_optional(request.user.as_deref()),
            site: request.site.or_else(|| Some(self.pulse.site.clone())),
            properties: request.properties.unwrap_or_default(),
        };

        match self.queue.add(&event, request.interval.as_ref()) {
            Ok(AddOutcome::Queued) => CaptureOutcome::Queued,
            Ok(AddOutcome::RateLimited) => CaptureOutcome::RateLimited,
            Err(e) => {
                error!("[Pulse] Capture failed: {}", e);
                CaptureOutcome::Failed
            }
        }
    }

    /// Events without a user are attributed to `session_user`.
    pub fn bulk_capture(
        &self,
        events: Vec<CaptureRequest>,
        session_user: &str,
    ) -> Vec<CaptureOutcome> {
        if !self.is_enabled() {
            return vec![CaptureOutcome::Disabled; events.len()];
        }

        events
            .into_iter()
            .map(|request| self.capture_for_session(request, session_user))
            .collect()
    }

    /// Like [`bulk_capture`](Self::bulk_capture), for descriptors that have
    /// not been decoded yet. A descriptor that does not decode is logged and
    /// reported as `Failed` without affecting the others.
    pub fn bulk_capture_values(
        &self,
        events: Vec<Value>,
        session_user: &str,
    ) -> Vec<CaptureOutcome> {
        if !self.is_enabled() {
            return vec![CaptureOutcome::Disabled; events.len()];
        }

        events
            .into_iter()
            .map(|raw| match serde_json::from_value::<CaptureRequest>(raw) {
                Ok(request) => self.capture_for_session(request, session_user),
                Err(e) => {
                    error!("[Pulse] Malformed event descriptor: {}", e);
                    CaptureOutcome::Failed
                }
            })
            .collect()
    }

    fn capture_for_session(
        &self,
        mut request: CaptureRequest,
        session_user: &str,
    ) -> CaptureOutcome {
        if request.user.as_deref().map_or(true, str::is_empty) {
            request.user = Some(session_user.to_string());
        }
        self.capture(request)
    }

    /// Drains the queue into the configured sink. `None` when disabled.
    pub async fn send_queued_events(&self) -> anyhow::Result<Option<BatchReport>> {
        let enabled = {
            let client = self.clone();
            tokio::task::spawn_blocking(move || client.is_enabled()).await?
        };
        if !enabled {
            return Ok(None);
        }

        let policy = self.dispatch.batch_policy();
        let report = self.queue.batch_process(self.sink.as_ref(), &policy).await?;
        Ok(Some(report))
    }

    pub fn debug_info(
        &self,
        fetch_events: Option<usize>,
        fetch_rate_limited_events: Option<usize>,
    ) -> anyhow::Result<DebugInfo> {
        let mut info = DebugInfo {
            is_enabled: self.is_enabled(),
            queued_event_count: None,
            queued_events: None,
            rate_limited_events: None,
        };
        if !info.is_enabled {
            return Ok(info);
        }

        info.queued_event_count = Some(self.queue.length()?);
        if let Some(limit) = fetch_events {
            info.queued_events = Some(self.queue.get_events(limit)?);
        }
        if let Some(limit) = fetch_rate_limited_events {
            info.rate_limited_events = Some(self.queue.get_last_sent_events(limit)?);
        }
        Ok(info)
    }
}

/// Reads a debug fetch flag: digits are a limit, any other non-empty value
/// means the default limit.
pub fn parse_fetch_limit(raw: Option<&str>) -> Option<usize> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<usize>() {
        Ok(limit) => Some(limit),
        Err(_) => Some(DEFAULT_FETCH_LIMIT),
    }
}
