use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

type SqlitePool = Pool<SqliteConnectionManager>;

pub(crate) fn get(pool: &SqlitePool, key: &str) -> anyhow::Result<Option<String>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare_cached("SELECT value FROM pulse_settings WHERE key = ?1")?;
    let value = stmt.query_row(params![key], |row| row.get(0));
    match value {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn set(pool: &SqlitePool, key: &str, value: &str) -> anyhow::Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO pulse_settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        params![key, value],
    )?;
    Ok(())
}
