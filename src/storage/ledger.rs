use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use serde::Serialize;

type SqlitePool = Pool<SqliteConnectionManager>;

/// 限流账本中的一行
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LedgerEntry {
    pub event_key: String,
    /// Monotonic seconds at the last accepted capture.
    pub last_sent: f64,
}

pub(crate) fn get(pool: &SqlitePool, event_key: &str) -> anyhow::Result<Option<f64>> {
    let conn = pool.get()?;
    let mut stmt =
        conn.prepare_cached("SELECT last_sent FROM pulse_ratelimit WHERE event_key = ?1")?;
    let last_sent = stmt.query_row(params![event_key], |row| row.get(0));
    match last_sent {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn set(pool: &SqlitePool, event_key: &str, last_sent: f64) -> anyhow::Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO pulse_ratelimit (event_key, last_sent) VALUES (?1, ?2)
         ON CONFLICT(event_key) DO UPDATE SET last_sent = excluded.last_sent",
        params![event_key, last_sent],
    )?;
    Ok(())
}

pub(crate) fn list(pool: &SqlitePool, limit: usize) -> anyhow::Result<Vec<LedgerEntry>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare_cached(
        "SELECT event_key, last_sent FROM pulse_ratelimit ORDER BY event_key LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok(LedgerEntry {
            event_key: row.get(0)?,
            last_sent: row.get(1)?,
        })
    })?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

pub(crate) fn clear(pool: &SqlitePool) -> anyhow::Result<usize> {
    let conn = pool.get()?;
    Ok(conn.execute("DELETE FROM pulse_ratelimit", [])?)
}
