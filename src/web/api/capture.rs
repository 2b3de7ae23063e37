use crate::client::{CaptureOutcome, CaptureRequest};
use crate::web::state::AppState;
use crate::web::utils::errors::{bad_request_json, internal_error_json};
use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json as AxumJson,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

pub const SESSION_USER_HEADER: &str = "x-pulse-user";
const DEFAULT_SESSION_USER: &str = "Guest";

/// 批量采集请求体：JSON 数组，或内容为 JSON 数组的字符串
///
/// 元素保持未解码状态，逐条解析，单条失败不影响其余事件。
#[derive(Deserialize)]
#[serde(untagged)]
pub enum BulkCaptureBody {
    Events(Vec<Value>),
    Encoded(String),
}

/// 单条采集接口
pub async fn capture_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CaptureRequest>,
) -> Response {
    let client = state.client.clone();
    match tokio::task::spawn_blocking(move || client.capture(request)).await {
        Ok(outcome) => AxumJson(serde_json::json!({
            "status": "success",
            "outcome": outcome
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("[Capture] Thread failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                AxumJson(internal_error_json(&e.to_string())),
            )
                .into_response()
        }
    }
}

/// 批量采集接口
///
/// 未指定用户的事件归属于 `X-Pulse-User` 头对应的会话用户。
pub async fn bulk_capture_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<BulkCaptureBody>,
) -> Response {
    let events = match body {
        BulkCaptureBody::Events(events) => events,
        BulkCaptureBody::Encoded(raw) => match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(events) => events,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    AxumJson(bad_request_json(&e.to_string())),
                )
                    .into_response();
            }
        },
    };

    let session_user = headers
        .get(SESSION_USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_SESSION_USER)
        .to_string();

    let client = state.client.clone();
    let result = tokio::task::spawn_blocking(move || {
        client.bulk_capture_values(events, &session_user)
    })
    .await;

    match result {
        Ok(outcomes) => {
            let queued = outcomes
                .iter()
                .filter(|outcome| **outcome == CaptureOutcome::Queued)
                .count();
            AxumJson(serde_json::json!({
                "status": "success",
                "queued": queued,
                "outcomes": outcomes
            }))
            .into_response()
        }
        Err(e) => {
            tracing::error!("[Capture] Bulk thread failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                AxumJson(internal_error_json(&e.to_string())),
            )
                .into_response()
        }
    }
}
