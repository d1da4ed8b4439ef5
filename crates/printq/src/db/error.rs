//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when opening the database file.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// The on-disk schema is newer than this build understands.
    #[error("Database schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: u32, supported: u32 },

    /// A job row referenced by id does not exist.
    #[error("Job {0} not found")]
    JobNotFound(i64),

    /// Moving a job asset between the jobs and completed directories failed.
    #[error("Job asset relocation failed: {0}")]
    Asset(#[from] crate::error::StorageError),

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,
}
