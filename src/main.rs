use std::sync::Arc;
use tracing::{info, warn};

use pulse_core::client::{dispatcher, HttpSink, PulseClient};
use pulse_core::config::Settings;
use pulse_core::queue::EventQueue;
use pulse_core::storage::PulseStore;
use pulse_core::web::{self, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pulse_core=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    info!("[Startup] pulse-core initializing...");

    let settings = Settings::new()?;
    info!(
        "[Config] Binding at {}:{}",
        settings.server.host, settings.server.port
    );

    // 基础设施初始化
    let store = PulseStore::new(&settings.database.url, settings.database.max_connections)?;
    let queue = EventQueue::new(store, settings.queue.capacity);
    let sink = HttpSink::from_settings(&settings.pulse)?;
    info!("[Config] Ingest endpoint: {}", sink.url());

    let client = PulseClient::new(
        queue,
        settings.pulse.clone(),
        settings.dispatch.clone(),
        Arc::new(sink),
    );
    if !client.is_enabled() {
        warn!("[Pulse] Telemetry disabled; captures will be ignored");
    }

    dispatcher::spawn_dispatcher(client.clone());

    // 构造全局状态
    let state = Arc::new(AppState {
        client,
        admin_token: settings.admin.token.clone(),
    });
    let app = web::build_router(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("[Startup] Service ready at http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
