//! Persistent job store.
//!
//! `Database` is the sole gateway to persistent state. All access funnels
//! through [`Database::with_conn`], which serializes writers behind a mutex;
//! the repo modules provide the actual operations.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::info;
use rusqlite::Connection;

pub mod error;
pub mod job_repo;
pub mod migrations;
pub mod printer_repo;
pub mod status_repo;

pub use error::DatabaseError;
pub use job_repo::{JobRecord, PlateDefinition, QueuedJob};
pub use status_repo::StatusRecord;

/// Database file name under the data directory.
pub const DB_FILE_NAME: &str = "jobs.db";

/// Status a freshly imported job starts in.
pub const STATUS_IMPORTED: &str = "imported";
pub const STATUS_QUEUED: &str = "queued";
pub const STATUS_RUNNING: &str = "running";
pub const STATUS_PRINTING: &str = "printing";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";
pub const STATUS_CANCELLED: &str = "cancelled";

/// Owns the SQLite connection. Mutations from the importer and the printer
/// coordinator are serialized by the internal mutex.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Opens (or creates) `jobs.db` under `data_dir`, enables foreign-key
    /// enforcement, and runs migrations.
    pub fn initialize<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        let path = data_dir.as_ref().join(DB_FILE_NAME);
        let conn = Connection::open(&path)?;
        let db = Self::setup(conn, Some(path.clone()))?;
        info!("Database initialized at {}", path.display());
        Ok(db)
    }

    /// In-memory database for tests; runs the same migrations.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::setup(Connection::open_in_memory()?, None)
    }

    fn setup(mut conn: Connection, path: Option<PathBuf>) -> Result<Self, DatabaseError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::run_all(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Path of the backing database file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let mut conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&mut conn)
    }
}
