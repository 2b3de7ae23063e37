use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::queue::BatchPolicy;

/// 应用配置总结构
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub pulse: PulseSettings,
    pub queue: QueueSettings,
    pub dispatch: DispatchSettings,
    pub admin: AdminSettings,
}

/// 服务相关配置（监听地址、端口）
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// 数据库配置（SQLite 文件路径与连接池大小）
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

/// 遥测开关与采集端点
#[derive(Debug, Deserialize, Clone)]
pub struct PulseSettings {
    /// Initial value of the runtime `enable_telemetry` switch.
    pub enabled: bool,
    /// Deployment is a managed/hosted one; telemetry is never sent otherwise.
    pub managed: bool,
    #[serde(default)]
    pub developer_mode: bool,
    pub api_key: Option<String>,
    /// Overrides the default ingestion host.
    pub host: Option<String>,
    /// Overrides the default ingestion path.
    pub ingest_endpoint: Option<String>,
    /// Site reported when a capture does not name one.
    pub site: String,
    pub enabled_cache_ttl_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueueSettings {
    pub capacity: usize,
}

/// 周期投递任务
#[derive(Debug, Deserialize, Clone)]
pub struct DispatchSettings {
    pub interval_ms: u64,
    pub batch_size: usize,
    pub max_batches: usize,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl DispatchSettings {
    pub fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy {
            batch_size: self.batch_size,
            max_batches: self.max_batches,
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdminSettings {
    /// Bearer token for the debug surface; unset locks it entirely.
    pub token: Option<String>,
}

impl Settings {
    /// 加载配置：支持默认值、可选配置文件、环境变量覆盖
    pub fn new() -> anyhow::Result<Self> {
        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.url", "pulse.db")?
            .set_default("database.max_connections", 8)?
            .set_default("pulse.enabled", true)?
            .set_default("pulse.managed", false)?
            .set_default("pulse.developer_mode", false)?
            .set_default::<&str, Option<String>>("pulse.api_key", None)?
            .set_default::<&str, Option<String>>("pulse.host", None)?
            .set_default::<&str, Option<String>>("pulse.ingest_endpoint", None)?
            .set_default("pulse.site", "localhost")?
            .set_default("pulse.enabled_cache_ttl_secs", 3600)?
            .set_default("pulse.request_timeout_secs", 15)?
            .set_default("queue.capacity", 10_000)?
            .set_default("dispatch.interval_ms", 60_000)?
            .set_default("dispatch.batch_size", 100)?
            .set_default("dispatch.max_batches", 10)?
            .set_default("dispatch.max_retries", 3)?
            .set_default("dispatch.backoff_ms", 1000)?
            .set_default::<&str, Option<String>>("admin.token", None)?
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("PULSE").separator("__"));

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}
