//! Test harness: an isolated daemon environment with temp directories, a
//! file-backed database, and constructors for the core components.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use printq::config::PrinterDefinition;
use printq::db::{job_repo, PlateDefinition};
use printq::printer::{ArtifactUploader, CommandPublisher, TelemetrySubscriber};
use printq::{AppConfig, ArtifactImporter, Database, ImportWatcher, PrinterCoordinator};

use super::builders;

pub struct TestHarness {
    temp: TempDir,
    pub config: AppConfig,
    pub db: Arc<Database>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let config = AppConfig::with_base_dir(temp.path());
        config
            .ensure_directories()
            .expect("Failed to create directories");
        let db = Arc::new(Database::initialize(&config.data_dir).expect("Failed to open database"));

        Self { temp, config, db }
    }

    pub fn with_printer(mut self, printer: PrinterDefinition) -> Self {
        self.config.printers.push(printer);
        self
    }

    pub fn importer(&self) -> ArtifactImporter {
        ArtifactImporter::new(&self.config.jobs_dir, Arc::clone(&self.db))
    }

    pub fn watcher(&self) -> ImportWatcher {
        ImportWatcher::new(&self.config.import_dir, self.importer())
    }

    pub fn coordinator(
        &self,
        uploader: Arc<dyn ArtifactUploader>,
        publisher: Arc<dyn CommandPublisher>,
        subscriber: Arc<dyn TelemetrySubscriber>,
    ) -> PrinterCoordinator {
        PrinterCoordinator::new(&self.config, Arc::clone(&self.db), uploader, publisher, subscriber)
    }

    /// Writes an artifact into the import directory.
    pub fn write_import_artifact(&self, file_name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = self.config.import_dir.join(file_name);
        builders::build_artifact(&path, entries);
        path
    }

    /// Creates an artifact file in the jobs directory and a queued job row
    /// pointing at it. Returns the job id.
    pub fn queue_job(&self, file_name: &str, plate_index: i64) -> i64 {
        let path = self.config.jobs_dir.join(file_name);
        std::fs::write(&path, b"artifact bytes").expect("Failed to write artifact");

        let job_id = job_repo::insert_imported_job(
            &self.db,
            &format!("{} - Plate {}", file_name, plate_index),
            &path.to_string_lossy(),
            "",
            "",
            &[PlateDefinition {
                plate_index,
                name: format!("Plate {}", plate_index),
            }],
        )
        .expect("Failed to insert job");

        job_repo::update_job_status(
            &self.db,
            job_id,
            "queued",
            &self.config.jobs_dir,
            &self.config.completed_dir,
        )
        .expect("Failed to queue job");

        job_id
    }

    pub fn job_status(&self, job_id: i64) -> String {
        self.db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT statuses.name FROM jobs JOIN statuses ON jobs.status_id = statuses.id
                     WHERE jobs.id = ?1",
                    [job_id],
                    |r| r.get(0),
                )?)
            })
            .expect("Failed to read job status")
    }

    pub fn job_printer_id(&self, job_id: i64) -> Option<i64> {
        self.db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT printer_id FROM jobs WHERE id = ?1", [job_id], |r| {
                    r.get(0)
                })?)
            })
            .expect("Failed to read printer id")
    }

    pub fn job_completed_at(&self, job_id: i64) -> Option<String> {
        self.db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT completed_at FROM jobs WHERE id = ?1", [job_id], |r| {
                    r.get(0)
                })?)
            })
            .expect("Failed to read completed_at")
    }

    pub fn job_count(&self) -> u32 {
        self.db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0))?))
            .expect("Failed to count jobs")
    }

    pub fn printer_row_id(&self, name: &str) -> i64 {
        self.db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT id FROM printers WHERE name = ?1", [name], |r| {
                    r.get(0)
                })?)
            })
            .expect("Failed to read printer row")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A fully specified printer definition for coordinator tests.
pub fn test_printer() -> PrinterDefinition {
    PrinterDefinition {
        name: "Workshop X1".to_string(),
        host: "10.0.0.5".to_string(),
        access_code: "12345678".to_string(),
        serial: "01S00A000000000".to_string(),
    }
}
