//! Job rows and their lifecycle operations.
//!
//! Every mutation that touches more than one row runs inside an explicit
//! transaction; nothing persists when a sub-step fails. Status changes that
//! flip the `is_completed` flag also move the job's assets between the jobs
//! and completed directories, and a failed move aborts the whole update.

use std::path::{Path, PathBuf};

use log::info;
use rusqlite::{params, OptionalExtension, Row};

use crate::storage;

use super::status_repo;
use super::{Database, DatabaseError};
use super::{STATUS_CANCELLED, STATUS_COMPLETED, STATUS_FAILED, STATUS_IMPORTED, STATUS_PRINTING, STATUS_QUEUED, STATUS_RUNNING};

/// One plate within an artifact, as persisted alongside its job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateDefinition {
    pub plate_index: i64,
    pub name: String,
}

/// The next dispatchable job for a printer.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub id: i64,
    pub file_path: PathBuf,
    pub plate_index: i64,
}

/// A full job row joined with its status name.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: i64,
    pub name: String,
    pub status_id: i64,
    pub status_name: String,
    pub printer_id: Option<i64>,
    pub file_path: String,
    pub thumbnail_path: String,
    pub metadata: String,
    pub created_at: String,
    pub updated_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl JobRecord {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            status_id: row.get(2)?,
            status_name: row.get(3)?,
            printer_id: row.get(4)?,
            file_path: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            thumbnail_path: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            metadata: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
            created_at: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
            updated_at: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
            started_at: row.get(10)?,
            completed_at: row.get(11)?,
        })
    }
}

/// Inserts a job row plus one plate row per plate, atomically. The job
/// starts in the `imported` status.
pub fn insert_imported_job(
    db: &Database,
    name: &str,
    file_path: &str,
    thumbnail_path: &str,
    metadata: &str,
    plates: &[PlateDefinition],
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.transaction()?;

        let status = status_repo::ensure_status_in(&tx, STATUS_IMPORTED, false, false)?;
        tx.execute(
            "INSERT INTO jobs (name, status_id, status, file_path, thumbnail_path, metadata,
                               created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'), datetime('now'))",
            params![name, status.id, STATUS_IMPORTED, file_path, thumbnail_path, metadata],
        )?;
        let job_id = tx.last_insert_rowid();

        for plate in plates {
            tx.execute(
                "INSERT INTO plates (job_id, plate_index, name, status_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![job_id, plate.plate_index, plate.name, status.id],
            )?;
        }

        tx.commit()?;
        Ok(job_id)
    })
}

/// Moves a job to a new status as one logical operation: ensures the target
/// status exists (classifying `completed`/`failed`/`cancelled` as terminal),
/// relocates assets when the `is_completed` flag flips, stamps `updated_at`,
/// sets `started_at` once on the first transition into a running state, and
/// keeps `completed_at` non-null exactly while the status is completed.
pub fn update_job_status(
    db: &Database,
    job_id: i64,
    status_name: &str,
    jobs_dir: &Path,
    completed_dir: &Path,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.transaction()?;

        let current = tx
            .query_row(
                "SELECT jobs.status, jobs.file_path, jobs.thumbnail_path,
                        COALESCE(statuses.is_completed, 0)
                 FROM jobs LEFT JOIN statuses ON jobs.status_id = statuses.id
                 WHERE jobs.id = ?1",
                params![job_id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                        row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        row.get::<_, bool>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((current_status, file_path, thumbnail_path, current_is_completed)) = current
        else {
            return Err(DatabaseError::JobNotFound(job_id));
        };

        let new_is_completed = status_name.eq_ignore_ascii_case(STATUS_COMPLETED);
        let new_is_terminal = new_is_completed
            || status_name.eq_ignore_ascii_case(STATUS_FAILED)
            || status_name.eq_ignore_ascii_case(STATUS_CANCELLED);
        let status =
            status_repo::ensure_status_in(&tx, status_name, new_is_completed, new_is_terminal)?;

        let mut updated_file_path = file_path;
        let mut updated_thumbnail_path = thumbnail_path;
        if new_is_completed != current_is_completed {
            let target_dir = if new_is_completed { completed_dir } else { jobs_dir };
            updated_file_path = relocate_to(&updated_file_path, target_dir)?;
            updated_thumbnail_path = relocate_to(&updated_thumbnail_path, target_dir)?;
        }

        let is_running = status_name.eq_ignore_ascii_case(STATUS_RUNNING)
            || status_name.eq_ignore_ascii_case(STATUS_PRINTING);
        tx.execute(
            "UPDATE jobs SET status = ?1, status_id = ?2, file_path = ?3, thumbnail_path = ?4,
                    updated_at = datetime('now'),
                    started_at = CASE WHEN ?5 AND started_at IS NULL
                                      THEN datetime('now') ELSE started_at END,
                    completed_at = CASE WHEN ?6 THEN datetime('now') ELSE NULL END
             WHERE id = ?7",
            params![
                status_name,
                status.id,
                updated_file_path,
                updated_thumbnail_path,
                is_running,
                new_is_completed,
                job_id
            ],
        )?;

        tx.commit()?;
        info!(
            "Job {} status changed from '{}' to '{}'",
            job_id, current_status, status_name
        );
        Ok(())
    })
}

fn relocate_to(current: &str, target_dir: &Path) -> Result<String, DatabaseError> {
    match storage::relocate_asset(Path::new(current), target_dir)? {
        Some(path) => Ok(path.to_string_lossy().into_owned()),
        None => Ok(String::new()),
    }
}

/// Oldest queued job eligible for the given printer (unassigned jobs are
/// eligible for any printer), joined with its first plate.
pub fn get_next_queued_job(
    db: &Database,
    printer_id: i64,
) -> Result<Option<QueuedJob>, DatabaseError> {
    db.with_conn(|conn| {
        let job = conn
            .query_row(
                "SELECT jobs.id, jobs.file_path, plates.plate_index
                 FROM jobs
                 JOIN statuses ON jobs.status_id = statuses.id
                 JOIN plates ON plates.job_id = jobs.id
                 WHERE statuses.name = ?1
                   AND (jobs.printer_id IS NULL OR jobs.printer_id = ?2)
                 ORDER BY jobs.created_at ASC, jobs.id ASC, plates.plate_index ASC
                 LIMIT 1",
                params![STATUS_QUEUED, printer_id],
                |row| {
                    Ok(QueuedJob {
                        id: row.get(0)?,
                        file_path: PathBuf::from(row.get::<_, Option<String>>(1)?.unwrap_or_default()),
                        plate_index: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(job)
    })
}

/// Pins a job to a printer and bumps `updated_at`.
pub fn assign_job_to_printer(
    db: &Database,
    job_id: i64,
    printer_id: i64,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET printer_id = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![printer_id, job_id],
        )?;
        Ok(())
    })
}

/// Finds a non-completed job whose artifact's file name matches `file_name`
/// case-insensitively. When both the job's printer and `printer_id` are
/// known, they must agree; a zero `printer_id` matches any job.
pub fn find_active_job_by_file_name(
    db: &Database,
    file_name: &str,
    printer_id: i64,
) -> Result<Option<i64>, DatabaseError> {
    let target = file_name.to_lowercase();
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT jobs.id, jobs.file_path, jobs.printer_id
             FROM jobs
             JOIN statuses ON jobs.status_id = statuses.id
             WHERE statuses.is_completed = 0
             ORDER BY jobs.id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                row.get::<_, Option<i64>>(2)?.unwrap_or(0),
            ))
        })?;

        for row in rows {
            let (id, path, row_printer_id) = row?;
            let matches_name = Path::new(&path)
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase() == target)
                .unwrap_or(false);
            if !matches_name {
                continue;
            }
            if printer_id != 0 && row_printer_id != 0 && row_printer_id != printer_id {
                continue;
            }
            return Ok(Some(id));
        }
        Ok(None)
    })
}

/// All jobs whose status carries `is_completed`, ordered by `started_at`
/// then id.
pub fn get_completed_jobs_ordered(db: &Database) -> Result<Vec<JobRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT jobs.id, jobs.name, jobs.status_id, statuses.name, jobs.printer_id,
                    jobs.file_path, jobs.thumbnail_path, jobs.metadata, jobs.created_at,
                    jobs.updated_at, jobs.started_at, jobs.completed_at
             FROM jobs
             JOIN statuses ON jobs.status_id = statuses.id
             WHERE statuses.is_completed = 1
             ORDER BY jobs.started_at ASC, jobs.id ASC",
        )?;
        let jobs = stmt
            .query_map([], JobRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    })
}

/// Existence probe keeping the importer idempotent.
pub fn job_exists_for_file(db: &Database, file_path: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM jobs WHERE file_path = ?1 LIMIT 1",
                params![file_path],
                |r| r.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    })
}
