use crate::web::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// 管理端鉴权中间件
///
/// 职责：校验 `Authorization: Bearer <token>`，只放行持有管理令牌的调用方。
/// 前置条件：必须在注册了 `AppState` 的路由组中使用。
pub async fn admin_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    let Some(presented) = presented else {
        tracing::warn!("[Auth] Denied: missing bearer token");
        return Err(StatusCode::UNAUTHORIZED);
    };

    match state.admin_token.as_deref() {
        Some(expected) if !expected.is_empty() && expected == presented => {
            tracing::debug!("[Auth] Admin request authenticated");
            Ok(next.run(req).await)
        }
        _ => {
            tracing::warn!("[Auth] Denied: invalid admin token");
            Err(StatusCode::FORBIDDEN)
        }
    }
}
