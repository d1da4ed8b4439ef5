//! Filesystem primitives for job assets: collision-free target paths in the
//! jobs directory and moves between the jobs and completed directories.

use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Move a file from `src` to `dst`. Uses `rename` first (fast, atomic on the
/// same filesystem) and falls back to copy + delete for cross-device moves.
/// An existing `dst` is overwritten.
pub fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    std::fs::remove_file(src).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// Finds an unused path `<directory>/<base_name><extension>`, appending
/// `-1`, `-2`, ... to the base name until the candidate does not exist.
/// `extension` includes its leading dot and may be compound
/// (e.g. `.gcode.3mf`).
pub fn resolve_unique_path(directory: &Path, base_name: &str, extension: &str) -> PathBuf {
    let candidate = directory.join(format!("{}{}", base_name, extension));
    if !candidate.exists() {
        return candidate;
    }

    let mut counter = 1;
    loop {
        let candidate = directory.join(format!("{}-{}{}", base_name, counter, extension));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Moves an asset into `target_dir` keeping its file name, overwriting any
/// collision. Returns the destination path. An empty `current` path is a
/// no-op returning `None`; a missing source file is an error, since losing
/// track of an asset would orphan its job.
pub fn relocate_asset(current: &Path, target_dir: &Path) -> Result<Option<PathBuf>, StorageError> {
    if current.as_os_str().is_empty() {
        return Ok(None);
    }

    let file_name = current
        .file_name()
        .ok_or_else(|| StorageError::MissingAsset(current.to_path_buf()))?;
    let destination = target_dir.join(file_name);
    if current == destination {
        return Ok(Some(destination));
    }
    if !current.exists() {
        return Err(StorageError::MissingAsset(current.to_path_buf()));
    }

    move_file(current, &destination)?;
    Ok(Some(destination))
}
