use crate::client::PulseClient;

/// Web 应用全局状态
///
/// 职责：包含所有跨请求共享的对象，通过 Arc 注入到 Axum 的 Handler 中。
#[derive(Clone)]
pub struct AppState {
    pub client: PulseClient,
    /// Bearer token guarding `/admin`; `None` denies every admin request.
    pub admin_token: Option<String>,
}
