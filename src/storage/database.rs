use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite_migration::{Migrations, M};
use std::time::Duration;
use tracing::info;

/// 初始化数据库连接池并执行迁移
pub(crate) fn initialize_pool(
    db_path: &str,
    max_connections: u32,
) -> anyhow::Result<Pool<SqliteConnectionManager>> {
    // 多个生产者并发写入时依赖 busy_timeout 排队，而不是立即报错
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(|conn| conn.busy_timeout(Duration::from_secs(5)));

    let pool = Pool::builder()
        .max_size(max_connections)
        .connection_timeout(Duration::from_secs(5))
        .build(manager)
        .map_err(|e| anyhow::anyhow!("Failed to initialize DB pool: {}", e))?;

    let mut conn = pool
        .get()
        .map_err(|e| anyhow::anyhow!("Failed to acquire init connection: {}", e))?;

    let migrations = Migrations::new(vec![
        // M1: 事件队列，pos 越大越新
        M::up(
            "CREATE TABLE IF NOT EXISTS pulse_queue (
                pos INTEGER PRIMARY KEY,
                payload TEXT NOT NULL
            );",
        ),
        // M2: 限流账本
        M::up(
            "CREATE TABLE IF NOT EXISTS pulse_ratelimit (
                event_key TEXT PRIMARY KEY,
                last_sent REAL NOT NULL
            );",
        ),
        // M3: 运行时开关
        M::up(
            "CREATE TABLE IF NOT EXISTS pulse_settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            );",
        ),
    ]);

    if let Err(e) = migrations.to_latest(&mut conn) {
        return Err(anyhow::anyhow!("Failed to apply database migrations: {}", e));
    }

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA temp_store = MEMORY;",
    )?;

    match conn.execute("CREATE TEMPORARY TABLE health_check (id INTEGER)", []) {
        Ok(_) => {
            let _ = conn.execute("DROP TABLE health_check", []);
        }
        Err(e) => return Err(anyhow::anyhow!("Database health check failed: {}", e)),
    }

    info!(
        "[Store] SQLite connection initialized at: {} (Pool size: {})",
        db_path, max_connections
    );
    Ok(pool)
}
