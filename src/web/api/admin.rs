use crate::client::parse_fetch_limit;
use crate::web::state::AppState;
use crate::web::utils::errors::admin_internal_error_json;
use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json as AxumJson,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize, Default)]
pub struct DebugParams {
    pub fetch_events: Option<String>,
    pub fetch_rate_limited_events: Option<String>,
}

#[derive(Deserialize)]
pub struct EnabledRequest {
    pub enabled: bool,
}

/// 调试信息接口
///
/// 返回开关状态、队列长度，以及按需返回队列事件与限流账本。
pub async fn debug_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DebugParams>,
) -> Response {
    let fetch_events = parse_fetch_limit(params.fetch_events.as_deref());
    let fetch_rate_limited = parse_fetch_limit(params.fetch_rate_limited_events.as_deref());
    let client = state.client.clone();

    let result = tokio::task::spawn_blocking(move || {
        client.debug_info(fetch_events, fetch_rate_limited)
    })
    .await;

    match result {
        Ok(Ok(info)) => AxumJson(info).into_response(),
        Ok(Err(e)) => {
            tracing::error!("[Admin] Debug info failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                AxumJson(admin_internal_error_json(&e.to_string())),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("[Admin] Debug info thread failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                AxumJson(admin_internal_error_json(&e.to_string())),
            )
                .into_response()
        }
    }
}

/// 运行时开关接口
pub async fn set_enabled_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EnabledRequest>,
) -> impl IntoResponse {
    let client = state.client.clone();
    let enabled = payload.enabled;
    let result =
        tokio::task::spawn_blocking(move || client.set_telemetry_enabled(enabled)).await;

    match result {
        Ok(Ok(())) => AxumJson(serde_json::json!({
            "status": "success",
            "enabled": enabled
        }))
        .into_response(),
        Ok(Err(e)) => {
            tracing::error!("[Admin] Toggle failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                AxumJson(admin_internal_error_json(&e.to_string())),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("[Admin] Toggle thread failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                AxumJson(admin_internal_error_json(&e.to_string())),
            )
                .into_response()
        }
    }
}
