use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{uuid_column, DatabaseError};
use crate::models::enums::PrincipalKind;

/// A live bearer session. Times are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub token_hash: String,
    pub principal_kind: PrincipalKind,
    pub principal_id: Uuid,
    pub issued_at: i64,
    pub expires_at: i64,
}

pub fn insert_session(conn: &Connection, session: &SessionRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sessions (token_hash, principal_kind, principal_id, issued_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            session.token_hash,
            session.principal_kind,
            session.principal_id.to_string(),
            session.issued_at,
            session.expires_at,
        ],
    )?;
    Ok(())
}

pub fn find_session(
    conn: &Connection,
    token_hash: &str,
) -> Result<Option<SessionRow>, DatabaseError> {
    let session = conn
        .query_row(
            "SELECT token_hash, principal_kind, principal_id, issued_at, expires_at
             FROM sessions WHERE token_hash = ?1",
            params![token_hash],
            |row| {
                Ok(SessionRow {
                    token_hash: row.get(0)?,
                    principal_kind: row.get(1)?,
                    principal_id: uuid_column(row, 2)?,
                    issued_at: row.get(3)?,
                    expires_at: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(session)
}

pub fn delete_session(conn: &Connection, token_hash: &str) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM sessions WHERE token_hash = ?1",
        params![token_hash],
    )?;
    Ok(deleted > 0)
}

pub fn delete_sessions_for_principal(
    conn: &Connection,
    kind: PrincipalKind,
    principal_id: &Uuid,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM sessions WHERE principal_kind = ?1 AND principal_id = ?2",
        params![kind, principal_id.to_string()],
    )?;
    Ok(deleted)
}

/// Keep only the `keep` newest sessions of a principal. Returns how many were dropped.
pub fn retain_newest_sessions(
    conn: &Connection,
    kind: PrincipalKind,
    principal_id: &Uuid,
    keep: usize,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM sessions
         WHERE principal_kind = ?1 AND principal_id = ?2
           AND token_hash NOT IN (
               SELECT token_hash FROM sessions
               WHERE principal_kind = ?1 AND principal_id = ?2
               ORDER BY issued_at DESC, rowid DESC
               LIMIT ?3
           )",
        params![kind, principal_id.to_string(), keep as i64],
    )?;
    Ok(deleted)
}

pub fn purge_expired_sessions(conn: &Connection, now: i64) -> Result<usize, DatabaseError> {
    let deleted = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?;
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn row(hash: &str, principal: Uuid, issued_at: i64) -> SessionRow {
        SessionRow {
            token_hash: hash.into(),
            principal_kind: PrincipalKind::Patient,
            principal_id: principal,
            issued_at,
            expires_at: issued_at + 3600,
        }
    }

    #[test]
    fn insert_find_delete() {
        let conn = open_memory_database().unwrap();
        let principal = Uuid::new_v4();
        insert_session(&conn, &row("h1", principal, 100)).unwrap();

        let found = find_session(&conn, "h1").unwrap().unwrap();
        assert_eq!(found.principal_id, principal);
        assert_eq!(found.principal_kind, PrincipalKind::Patient);

        assert!(delete_session(&conn, "h1").unwrap());
        assert!(find_session(&conn, "h1").unwrap().is_none());
        assert!(!delete_session(&conn, "h1").unwrap());
    }

    #[test]
    fn retain_keeps_newest() {
        let conn = open_memory_database().unwrap();
        let principal = Uuid::new_v4();
        insert_session(&conn, &row("old", principal, 100)).unwrap();
        insert_session(&conn, &row("mid", principal, 200)).unwrap();
        insert_session(&conn, &row("new", principal, 300)).unwrap();

        let dropped = retain_newest_sessions(&conn, PrincipalKind::Patient, &principal, 1).unwrap();
        assert_eq!(dropped, 2);
        assert!(find_session(&conn, "new").unwrap().is_some());
        assert!(find_session(&conn, "old").unwrap().is_none());
    }

    #[test]
    fn retain_is_scoped_to_principal() {
        let conn = open_memory_database().unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        insert_session(&conn, &row("a1", a, 100)).unwrap();
        insert_session(&conn, &row("b1", b, 50)).unwrap();

        retain_newest_sessions(&conn, PrincipalKind::Patient, &a, 1).unwrap();
        assert!(find_session(&conn, "b1").unwrap().is_some());
    }

    #[test]
    fn purge_drops_expired_only() {
        let conn = open_memory_database().unwrap();
        let principal = Uuid::new_v4();
        insert_session(&conn, &row("expired", principal, 0)).unwrap();
        insert_session(&conn, &row("live", principal, 10_000)).unwrap();
        assert_eq!(purge_expired_sessions(&conn, 5_000).unwrap(), 1);
        assert!(find_session(&conn, "live").unwrap().is_some());
    }
}
