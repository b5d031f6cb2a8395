use rusqlite::{params, Connection};

use crate::db::DatabaseError;

/// One row of the request audit trail. `timestamp` uses SQLite's
/// `YYYY-MM-DD HH:MM:SS` form so retention pruning compares correctly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub timestamp: String,
    pub actor: String,
    pub action: String,
    pub outcome: String,
}

/// Write a batch of buffered entries.
pub fn insert_audit_entries(conn: &Connection, entries: &[AuditEntry]) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO audit_log (timestamp, actor, action, outcome) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for entry in entries {
        stmt.execute(params![entry.timestamp, entry.actor, entry.action, entry.outcome])?;
    }
    Ok(())
}

/// Most recent entries for an actor, newest first.
pub fn query_audit_by_actor(
    conn: &Connection,
    actor: &str,
    limit: usize,
) -> Result<Vec<AuditEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, actor, action, outcome FROM audit_log
         WHERE actor = ?1 ORDER BY id DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![actor, limit as i64], |row| {
            Ok(AuditEntry {
                timestamp: row.get(0)?,
                actor: row.get(1)?,
                action: row.get(2)?,
                outcome: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Prune audit entries older than the given number of days.
pub fn prune_audit_log(conn: &Connection, retention_days: i64) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM audit_log WHERE timestamp < datetime('now', ?1)",
        params![format!("-{retention_days} days")],
    )?;
    Ok(deleted)
}
