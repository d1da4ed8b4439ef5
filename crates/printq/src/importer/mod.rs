//! Artifact importer: turns a file dropped into the import directory into
//! one persisted job per plate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};

use crate::db::{job_repo, Database, PlateDefinition};
use crate::error::ImportError;
use crate::storage;

pub mod archive;
pub mod metadata;
pub mod plates;

use metadata::PrintMetadata;

/// Artifact file extension in the jobs directory.
const ARTIFACT_EXTENSION: &str = ".gcode.3mf";

pub struct ArtifactImporter {
    jobs_dir: PathBuf,
    db: Arc<Database>,
}

impl ArtifactImporter {
    pub fn new<P: AsRef<Path>>(jobs_dir: P, db: Arc<Database>) -> Self {
        Self {
            jobs_dir: jobs_dir.as_ref().to_path_buf(),
            db,
        }
    }

    /// Imports one artifact: inspects the container, relocates the file into
    /// the jobs directory, extracts the thumbnail, and inserts one job row
    /// per plate. Re-importing a path that already has a job is a no-op.
    ///
    /// On failure the source file is left in place (unless the plate inserts
    /// themselves fail, at which point the artifact has already moved into
    /// the jobs directory).
    pub fn import_file(&self, path: &Path) -> Result<(), ImportError> {
        if path.as_os_str().is_empty() {
            return Err(ImportError::MissingPath);
        }

        if job_repo::job_exists_for_file(&self.db, &path.to_string_lossy())? {
            return Ok(());
        }

        let inventory = archive::inspect(path)?;

        let print_metadata = match &inventory.metadata_entry {
            Some(entry) => match self.read_metadata(path, entry) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(
                        "Failed to read metadata entry '{}' from {}: {}",
                        entry,
                        path.display(),
                        e
                    );
                    PrintMetadata::default()
                }
            },
            None => PrintMetadata::default(),
        };

        let mut plate_list = plates::plates_from_entries(&inventory.gcode_entries);
        if plate_list.is_empty() {
            plate_list.push(PlateDefinition {
                plate_index: 1,
                name: "Plate 1".to_string(),
            });
        }

        let base_name = artifact_base_name(path);
        let target_path =
            storage::resolve_unique_path(&self.jobs_dir, &base_name, ARTIFACT_EXTENSION);
        storage::move_file(path, &target_path)?;

        let mut thumbnail_path = String::new();
        if let Some(entry) = &inventory.thumbnail_entry {
            let destination = storage::resolve_unique_path(
                &self.jobs_dir,
                &format!("{}_thumb", base_name),
                ".png",
            );
            match archive::extract_entry_to_file(&target_path, entry, &destination) {
                Ok(()) => thumbnail_path = destination.to_string_lossy().into_owned(),
                Err(e) => {
                    warn!(
                        "Thumbnail extraction failed for {}: {}",
                        target_path.display(),
                        e
                    );
                }
            }
        }

        let metadata_json = print_metadata.to_json();
        let target_str = target_path.to_string_lossy();
        for plate in &plate_list {
            let job_name = format!("{} - {}", base_name, plate.name);
            job_repo::insert_imported_job(
                &self.db,
                &job_name,
                &target_str,
                &thumbnail_path,
                &metadata_json,
                std::slice::from_ref(plate),
            )?;
        }

        info!(
            "Imported {} with {} plate(s)",
            target_path.display(),
            plate_list.len()
        );
        Ok(())
    }

    fn read_metadata(&self, path: &Path, entry: &str) -> Result<PrintMetadata, ImportError> {
        let xml = archive::read_entry_to_string(path, entry)?;
        metadata::parse_metadata_xml(&xml)
    }
}

/// Base name of an artifact: the file name with the `.gcode.3mf` suffix
/// stripped case-insensitively, falling back to the file stem.
fn artifact_base_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if file_name.to_lowercase().ends_with(ARTIFACT_EXTENSION) {
        return file_name[..file_name.len() - ARTIFACT_EXTENSION.len()].to_string();
    }

    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(file_name)
}
