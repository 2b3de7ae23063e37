pub mod database;
pub mod ledger;
pub mod queue;
pub mod settings;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

pub use ledger::LedgerEntry;

/// 共享存储：事件队列、限流账本与运行时开关
///
/// 所有进程内外的生产者与调度器通过同一个 SQLite 文件协作，
/// 单条 push/pop 在存储层保证原子性。
#[derive(Clone)]
pub struct PulseStore {
    pub(crate) pool: Pool<SqliteConnectionManager>,
}

impl PulseStore {
    /// 创建存储并初始化数据库连接池
    ///
    /// # Parameters
    /// - `db_path`: 数据库文件路径
    /// - `max_connections`: 最大连接数
    pub fn new(db_path: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = database::initialize_pool(db_path, max_connections)?;
        Ok(Self { pool })
    }

    // ===============================
    // 事件队列
    // ===============================

    /// Push onto the fresh end, then keep only the `capacity` freshest entries.
    pub fn push_fresh(&self, payload: &str, capacity: usize) -> anyhow::Result<()> {
        queue::push_fresh(&self.pool, payload, capacity)
    }

    pub fn push_stale_many(&self, payloads: &[String], capacity: usize) -> anyhow::Result<()> {
        queue::push_stale_many(&self.pool, payloads, capacity)
    }

    pub fn pop_stale(&self) -> anyhow::Result<Option<String>> {
        queue::pop_stale(&self.pool)
    }

    /// Freshest first.
    pub fn peek_fresh(&self, limit: usize) -> anyhow::Result<Vec<String>> {
        queue::peek_fresh(&self.pool, limit)
    }

    pub fn queue_len(&self) -> anyhow::Result<usize> {
        queue::queue_len(&self.pool)
    }

    pub fn clear_queue(&self) -> anyhow::Result<usize> {
        queue::clear_queue(&self.pool)
    }

    // ===============================
    // 限流账本
    // ===============================

    pub fn ledger_get(&self, event_key: &str) -> anyhow::Result<Option<f64>> {
        ledger::get(&self.pool, event_key)
    }

    pub fn ledger_set(&self, event_key: &str, last_sent: f64) -> anyhow::Result<()> {
        ledger::set(&self.pool, event_key, last_sent)
    }

    pub fn ledger_list(&self, limit: usize) -> anyhow::Result<Vec<LedgerEntry>> {
        ledger::list(&self.pool, limit)
    }

    pub fn clear_ledger(&self) -> anyhow::Result<usize> {
        ledger::clear(&self.pool)
    }

    // ===============================
    // 运行时开关
    // ===============================

    pub fn get_setting(&self, key: &str) -> anyhow::Result<Option<String>> {
        settings::get(&self.pool, key)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> anyhow::Result<()> {
        settings::set(&self.pool, key, value)
    }

    /// 获取底层数据库连接（用于测试或原始访问）
    pub fn get_conn(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }
}
