//! Schema migrations.
//!
//! The `schema_version` table holds the current version. A fresh database is
//! created at the current version in one step; a version 1 database (the
//! original single-table layout) is upgraded in place. ALTER TABLE ADD
//! COLUMN failing with "duplicate column name" is treated as success so a
//! partially applied upgrade can be re-run.

use log::info;
use rusqlite::Connection;

use super::error::DatabaseError;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 2;

const SCHEMA_SQL: &str = include_str!("sql/schema.sql");
const SEED_STATUSES_SQL: &str = include_str!("sql/seed_statuses.sql");

/// Columns added to `jobs` by the version 1 -> 2 upgrade.
const V2_JOB_COLUMNS: &[&str] = &[
    "ALTER TABLE jobs ADD COLUMN status_id INTEGER;",
    "ALTER TABLE jobs ADD COLUMN thumbnail_path TEXT;",
    "ALTER TABLE jobs ADD COLUMN metadata TEXT;",
    "ALTER TABLE jobs ADD COLUMN started_at TEXT;",
    "ALTER TABLE jobs ADD COLUMN completed_at TEXT;",
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &mut Connection) -> Result<(), DatabaseError> {
    let tx = conn.transaction()?;

    // Creating tables and seeding statuses is idempotent; it both bootstraps
    // a fresh database and supplies the tables a v1 upgrade needs.
    tx.execute_batch(SCHEMA_SQL)?;
    tx.execute_batch(SEED_STATUSES_SQL)?;

    let current: Option<u32> = tx
        .query_row(
            "SELECT MAX(version) FROM schema_version",
            [],
            |r| r.get::<_, Option<u32>>(0),
        )?;

    match current {
        None => {
            // Fresh database: the batch above already produced the full
            // current-version schema.
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
        }
        Some(version) if version == SCHEMA_VERSION => {}
        Some(1) => {
            info!("Upgrading database schema from version 1 to {}", SCHEMA_VERSION);
            upgrade_v1_to_v2(&tx)?;
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
        }
        Some(version) if version > SCHEMA_VERSION => {
            return Err(DatabaseError::SchemaTooNew {
                found: version,
                supported: SCHEMA_VERSION,
            });
        }
        Some(version) => {
            return Err(DatabaseError::Migration {
                version,
                reason: "no upgrade path from this version".to_string(),
            });
        }
    }

    tx.commit()?;
    Ok(())
}

/// Version 2 adds the status taxonomy, per-plate rows, the filament
/// placeholder table, and the job timestamp/asset columns, then back-fills
/// `status_id` from the legacy `status` text column.
fn upgrade_v1_to_v2(conn: &Connection) -> Result<(), DatabaseError> {
    for sql in V2_JOB_COLUMNS {
        execute_allow_duplicate_column(conn, sql)?;
    }

    conn.execute(
        "UPDATE jobs SET status_id = (SELECT id FROM statuses WHERE statuses.name = jobs.status)
         WHERE status_id IS NULL AND status IS NOT NULL",
        [],
    )?;

    Ok(())
}

/// Executes an ALTER TABLE ADD COLUMN statement, treating "duplicate column
/// name" as success so re-running an interrupted upgrade is harmless.
fn execute_allow_duplicate_column(conn: &Connection, sql: &str) -> Result<(), DatabaseError> {
    match conn.execute_batch(sql) {
        Ok(()) => Ok(()),
        Err(e) if e.to_string().contains("duplicate column name") => Ok(()),
        Err(e) => Err(DatabaseError::Migration {
            version: SCHEMA_VERSION,
            reason: e.to_string(),
        }),
    }
}

/// Checks whether a column exists on a table using `PRAGMA table_info`.
#[cfg(test)]
pub(crate) fn column_exists(
    conn: &Connection,
    table: &str,
    column: &str,
) -> Result<bool, DatabaseError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .any(|r| r.map(|name| name == column).unwrap_or(false));
    Ok(exists)
}

#[cfg(test)]
pub(crate) fn create_v1_schema(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT,
            status TEXT,
            printer_id INTEGER,
            file_path TEXT,
            created_at TEXT,
            updated_at TEXT
        );
        CREATE TABLE printers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            host TEXT NOT NULL,
            created_at TEXT
        );
        CREATE TABLE settings (key TEXT PRIMARY KEY, value TEXT);
        CREATE TABLE schema_version (version INTEGER NOT NULL);
        INSERT INTO schema_version (version) VALUES (1);",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    fn schema_version(conn: &Connection) -> u32 {
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_fresh_database_lands_on_current_version() {
        let mut conn = open();
        run_all(&mut conn).unwrap();

        assert_eq!(schema_version(&conn), SCHEMA_VERSION);
        for table in ["statuses", "printers", "jobs", "plates", "filaments", "settings"] {
            let count: u32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }

    #[test]
    fn test_statuses_are_seeded_with_flags() {
        let mut conn = open();
        run_all(&mut conn).unwrap();

        let (is_completed, is_terminal): (bool, bool) = conn
            .query_row(
                "SELECT is_completed, is_terminal FROM statuses WHERE name='completed'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert!(is_completed);
        assert!(is_terminal);

        for name in ["failed", "cancelled"] {
            let (is_completed, is_terminal): (bool, bool) = conn
                .query_row(
                    "SELECT is_completed, is_terminal FROM statuses WHERE name=?1",
                    [name],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .unwrap();
            assert!(!is_completed);
            assert!(is_terminal);
        }

        for name in ["queued", "running", "printing"] {
            let is_terminal: bool = conn
                .query_row(
                    "SELECT is_terminal FROM statuses WHERE name=?1",
                    [name],
                    |r| r.get(0),
                )
                .unwrap();
            assert!(!is_terminal);
        }
    }

    #[test]
    fn test_v1_upgrade_backfills_status_id() {
        let mut conn = open();
        create_v1_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO jobs (name, status, created_at, updated_at)
             VALUES ('legacy', 'queued', datetime('now'), datetime('now'))",
            [],
        )
        .unwrap();

        run_all(&mut conn).unwrap();

        assert_eq!(schema_version(&conn), 2);
        let (status_id, expected): (i64, i64) = conn
            .query_row(
                "SELECT jobs.status_id, statuses.id FROM jobs, statuses
                 WHERE jobs.name='legacy' AND statuses.name='queued'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(status_id, expected);
    }

    #[test]
    fn test_rerunning_migrations_is_a_noop() {
        let mut conn = open();
        create_v1_schema(&conn).unwrap();
        run_all(&mut conn).unwrap();
        run_all(&mut conn).unwrap();

        assert_eq!(schema_version(&conn), 2);
        let status_count: u32 = conn
            .query_row("SELECT COUNT(*) FROM statuses", [], |r| r.get(0))
            .unwrap();
        assert_eq!(status_count, 6);
    }

    #[test]
    fn test_duplicate_column_is_tolerated() {
        let conn = open();
        conn.execute_batch("CREATE TABLE jobs (id INTEGER PRIMARY KEY, status_id INTEGER);")
            .unwrap();
        execute_allow_duplicate_column(&conn, "ALTER TABLE jobs ADD COLUMN status_id INTEGER;")
            .unwrap();
    }

    #[test]
    fn test_upgrade_adds_expected_columns() {
        let mut conn = open();
        create_v1_schema(&conn).unwrap();
        run_all(&mut conn).unwrap();

        for column in ["status_id", "thumbnail_path", "metadata", "started_at", "completed_at"] {
            assert!(column_exists(&conn, "jobs", column).unwrap(), "{}", column);
        }
    }

    #[test]
    fn test_newer_schema_version_is_fatal() {
        let mut conn = open();
        run_all(&mut conn).unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (99)", [])
            .unwrap();

        let err = run_all(&mut conn).unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::SchemaTooNew { found: 99, supported: SCHEMA_VERSION }
        ));
    }
}
