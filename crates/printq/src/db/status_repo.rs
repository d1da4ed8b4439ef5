//! Status taxonomy: named lifecycle states with completion/terminal flags.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DatabaseError};

/// One row of the `statuses` table.
#[derive(Debug, Clone)]
pub struct StatusRecord {
    pub id: i64,
    pub name: String,
    pub is_completed: bool,
    pub is_terminal: bool,
}

/// Finds a status by name.
pub fn find_by_name(db: &Database, name: &str) -> Result<Option<StatusRecord>, DatabaseError> {
    db.with_conn(|conn| find_by_name_in(conn, name))
}

/// Ensures a status exists, creating it with the supplied flags when new
/// status names show up at runtime. Existing rows keep their flags.
pub fn ensure_status(
    db: &Database,
    name: &str,
    is_completed: bool,
    is_terminal: bool,
) -> Result<StatusRecord, DatabaseError> {
    db.with_conn(|conn| ensure_status_in(conn, name, is_completed, is_terminal))
}

pub(crate) fn find_by_name_in(
    conn: &Connection,
    name: &str,
) -> Result<Option<StatusRecord>, DatabaseError> {
    let record = conn
        .query_row(
            "SELECT id, name, is_completed, is_terminal FROM statuses WHERE name = ?1",
            params![name],
            |row| {
                Ok(StatusRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    is_completed: row.get(2)?,
                    is_terminal: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(record)
}

pub(crate) fn ensure_status_in(
    conn: &Connection,
    name: &str,
    is_completed: bool,
    is_terminal: bool,
) -> Result<StatusRecord, DatabaseError> {
    if let Some(existing) = find_by_name_in(conn, name)? {
        return Ok(existing);
    }

    conn.execute(
        "INSERT INTO statuses (name, is_completed, is_terminal, created_at)
         VALUES (?1, ?2, ?3, datetime('now'))",
        params![name, is_completed, is_terminal],
    )?;

    Ok(StatusRecord {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        is_completed,
        is_terminal,
    })
}
