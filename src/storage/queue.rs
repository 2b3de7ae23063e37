use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Transaction, TransactionBehavior};

type SqlitePool = Pool<SqliteConnectionManager>;

pub(crate) fn push_fresh(pool: &SqlitePool, payload: &str, capacity: usize) -> anyhow::Result<()> {
    let mut conn = pool.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(
        "INSERT INTO pulse_queue (pos, payload)
         VALUES ((SELECT COALESCE(MAX(pos), 0) + 1 FROM pulse_queue), ?1)",
        params![payload],
    )?;
    trim(&tx, capacity)?;
    tx.commit()?;
    Ok(())
}

/// Inserts at the stale end; `payloads[0]` becomes the stalest entry.
pub(crate) fn push_stale_many(
    pool: &SqlitePool,
    payloads: &[String],
    capacity: usize,
) -> anyhow::Result<()> {
    let mut conn = pool.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO pulse_queue (pos, payload)
             VALUES ((SELECT COALESCE(MIN(pos), 1) - 1 FROM pulse_queue), ?1)",
        )?;
        for payload in payloads.iter().rev() {
            stmt.execute(params![payload])?;
        }
    }
    trim(&tx, capacity)?;
    tx.commit()?;
    Ok(())
}

/// Keeps the `capacity` freshest entries.
fn trim(tx: &Transaction<'_>, capacity: usize) -> rusqlite::Result<usize> {
    tx.execute(
        "DELETE FROM pulse_queue
         WHERE pos <= (SELECT pos FROM pulse_queue ORDER BY pos DESC LIMIT 1 OFFSET ?1)",
        params![capacity as i64],
    )
}

pub(crate) fn pop_stale(pool: &SqlitePool) -> anyhow::Result<Option<String>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare_cached(
        "DELETE FROM pulse_queue
         WHERE pos = (SELECT MIN(pos) FROM pulse_queue)
         RETURNING payload",
    )?;
    let payload = stmt.query_row([], |row| row.get(0));
    match payload {
        Ok(payload) => Ok(Some(payload)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn peek_fresh(pool: &SqlitePool, limit: usize) -> anyhow::Result<Vec<String>> {
    let conn = pool.get()?;
    let mut stmt =
        conn.prepare_cached("SELECT payload FROM pulse_queue ORDER BY pos DESC LIMIT ?1")?;
    let rows = stmt.query_map(params![limit as i64], |row| row.get(0))?;

    let mut payloads = Vec::new();
    for row in rows {
        payloads.push(row?);
    }
    Ok(payloads)
}

pub(crate) fn queue_len(pool: &SqlitePool) -> anyhow::Result<usize> {
    let conn = pool.get()?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM pulse_queue", [], |row| row.get(0))?;
    Ok(count as usize)
}

pub(crate) fn clear_queue(pool: &SqlitePool) -> anyhow::Result<usize> {
    let conn = pool.get()?;
    Ok(conn.execute("DELETE FROM pulse_queue", [])?)
}
