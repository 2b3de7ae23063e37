use reqwest::{header, Client};
use std::time::Duration;
use tracing::error;
use url::Url;

use crate::common::error::PulseError;
use crate::common::events::TelemetryEvent;
use crate::config::PulseSettings;
use crate::queue::EventSink;

pub const DEFAULT_HOST: &str = "https://pulse.m.frappe.cloud";
pub const DEFAULT_INGEST_ENDPOINT: &str = "/api/method/pulse.api.bulk_ingest";
pub const API_KEY_HEADER: &str = "X-Pulse-API-Key";

/// Prefixes `https://` when the host carries no scheme.
pub fn ensure_http(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// Joins the (possibly overridden) host and endpoint with exactly one `/`.
pub fn ingest_url(host: Option<&str>, endpoint: Option<&str>) -> String {
    let host = non_blank(host).unwrap_or(DEFAULT_HOST);
    let host = ensure_http(host);
    let endpoint = non_blank(endpoint).unwrap_or(DEFAULT_INGEST_ENDPOINT);
    format!(
        "{}/{}",
        host.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// 通过 HTTP POST 将批次发送到采集端点
pub struct HttpSink {
    client: Client,
    url: Url,
    api_key: String,
}

impl HttpSink {
    pub fn new(url: &str, api_key: &str, timeout: Duration) -> anyhow::Result<Self> {
        let url = Url::parse(url).map_err(|e| anyhow::anyhow!("Invalid ingest URL {}: {}", url, e))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("HTTP client init failed: {}", e))?;
        Ok(Self {
            client,
            url,
            api_key: api_key.to_string(),
        })
    }

    pub fn from_settings(settings: &PulseSettings) -> anyhow::Result<Self> {
        let url = ingest_url(settings.host.as_deref(), settings.ingest_endpoint.as_deref());
        Self::new(
            &url,
            settings.api_key.as_deref().unwrap_or_default(),
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait::async_trait]
impl EventSink for HttpSink {
    async fn deliver(&self, events: &[TelemetryEvent]) -> anyhow::Result<()> {
        let body = serde_json::json!({ "events": events });
        let response = self
            .client
            .post(self.url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| PulseError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        error!("[Pulse] Post failed: {} {}", status.as_u16(), body);
        Err(PulseError::Delivery {
            status: status.as_u16(),
            body,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_url_defaults() {
        assert_eq!(
            ingest_url(None, None),
            "https://pulse.m.frappe.cloud/api/method/pulse.api.bulk_ingest"
        );
    }

    #[test]
    fn ingest_url_normalizes_overrides() {
        assert_eq!(
            ingest_url(Some("pulse.example.com/"), Some("/ingest")),
            "https://pulse.example.com/ingest"
        );
        assert_eq!(
            ingest_url(Some("http://127.0.0.1:9000"), Some("")),
            "http://127.0.0.1:9000/api/method/pulse.api.bulk_ingest"
        );
    }
}
