pub mod api;
pub mod middleware;
pub mod state;
pub mod utils;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use self::api::{admin, capture};
use self::middleware::auth::admin_middleware;
use self::state::AppState;

/// 路由定义
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest(
            "/api/telemetry",
            Router::new()
                .route("/capture", post(capture::capture_handler))
                .route("/bulk_capture", post(capture::bulk_capture_handler)),
        )
        .nest(
            "/admin/telemetry",
            Router::new()
                .route("/debug", get(admin::debug_handler))
                .route("/enabled", post(admin::set_enabled_handler))
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    admin_middleware,
                )),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}
