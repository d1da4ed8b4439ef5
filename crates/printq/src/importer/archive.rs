//! Artifact container inspection.
//!
//! An artifact is a ZIP archive. Entry basenames (case-insensitive) decide
//! what each entry is: the first `*thumbnail.png|jpg|jpeg` entry is the
//! thumbnail, the first `*metadata.xml` entry carries print metadata, and
//! every `*.gcode` entry is a plate candidate.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use zip::ZipArchive;

use crate::error::{ImportError, StorageError};

/// Classified entries found in a single pass over the archive.
#[derive(Debug, Default)]
pub struct ArchiveInventory {
    pub thumbnail_entry: Option<String>,
    pub metadata_entry: Option<String>,
    pub gcode_entries: Vec<String>,
}

fn entry_basename(name: &str) -> String {
    name.rsplit('/').next().unwrap_or(name).to_lowercase()
}

fn is_thumbnail_entry(name: &str) -> bool {
    let basename = entry_basename(name);
    basename.ends_with("thumbnail.png")
        || basename.ends_with("thumbnail.jpg")
        || basename.ends_with("thumbnail.jpeg")
}

fn is_metadata_entry(name: &str) -> bool {
    entry_basename(name).ends_with("metadata.xml")
}

fn is_gcode_entry(name: &str) -> bool {
    entry_basename(name).ends_with(".gcode")
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>, ImportError> {
    let file = File::open(path).map_err(|e| ImportError::OpenArtifact {
        path: path.to_path_buf(),
        source: e,
    })?;
    ZipArchive::new(file).map_err(|e| ImportError::ReadArchive {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Enumerates the archive once and classifies its entries.
pub fn inspect(path: &Path) -> Result<ArchiveInventory, ImportError> {
    let mut archive = open_archive(path)?;
    let mut inventory = ArchiveInventory::default();

    for index in 0..archive.len() {
        let entry = archive.by_index(index).map_err(|e| ImportError::ReadArchive {
            path: path.to_path_buf(),
            source: e,
        })?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        if inventory.thumbnail_entry.is_none() && is_thumbnail_entry(&name) {
            inventory.thumbnail_entry = Some(name.clone());
        }
        if inventory.metadata_entry.is_none() && is_metadata_entry(&name) {
            inventory.metadata_entry = Some(name.clone());
        }
        if is_gcode_entry(&name) {
            inventory.gcode_entries.push(name);
        }
    }

    Ok(inventory)
}

/// Reads a named entry as UTF-8 text.
pub fn read_entry_to_string(path: &Path, entry_name: &str) -> Result<String, ImportError> {
    let mut archive = open_archive(path)?;
    let mut entry = archive
        .by_name(entry_name)
        .map_err(|_| ImportError::EntryNotFound {
            path: path.to_path_buf(),
            entry: entry_name.to_string(),
        })?;

    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| ImportError::OpenArtifact {
            path: path.to_path_buf(),
            source: e,
        })?;
    Ok(content)
}

/// Extracts a named entry's bytes to `destination`.
pub fn extract_entry_to_file(
    path: &Path,
    entry_name: &str,
    destination: &Path,
) -> Result<(), ImportError> {
    let mut archive = open_archive(path)?;
    let mut entry = archive
        .by_name(entry_name)
        .map_err(|_| ImportError::EntryNotFound {
            path: path.to_path_buf(),
            entry: entry_name.to_string(),
        })?;

    let mut output = File::create(destination).map_err(|e| StorageError::WriteFile {
        path: destination.to_path_buf(),
        source: e,
    })?;
    std::io::copy(&mut entry, &mut output).map_err(|e| StorageError::WriteFile {
        path: destination.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_archive(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_inspect_classifies_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("artifact.gcode.3mf");
        build_archive(
            &path,
            &[
                ("Metadata/plate_1.gcode", b"G1".as_ref()),
                ("Metadata/plate_2.gcode", b"G1".as_ref()),
                ("Metadata/plate_1_thumbnail.png", b"PNG".as_ref()),
                ("Metadata/slice_metadata.xml", b"<config/>".as_ref()),
                ("3D/model.model", b"mesh".as_ref()),
            ],
        );

        let inventory = inspect(&path).unwrap();
        assert_eq!(
            inventory.thumbnail_entry.as_deref(),
            Some("Metadata/plate_1_thumbnail.png")
        );
        assert_eq!(
            inventory.metadata_entry.as_deref(),
            Some("Metadata/slice_metadata.xml")
        );
        assert_eq!(inventory.gcode_entries.len(), 2);
    }

    #[test]
    fn test_inspect_takes_first_thumbnail_and_metadata() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("artifact.gcode.3mf");
        build_archive(
            &path,
            &[
                ("a/Thumbnail.PNG", b"1".as_ref()),
                ("b/thumbnail.png", b"2".as_ref()),
                ("a/METADATA.XML", b"<a/>".as_ref()),
                ("b/metadata.xml", b"<b/>".as_ref()),
            ],
        );

        let inventory = inspect(&path).unwrap();
        assert_eq!(inventory.thumbnail_entry.as_deref(), Some("a/Thumbnail.PNG"));
        assert_eq!(inventory.metadata_entry.as_deref(), Some("a/METADATA.XML"));
    }

    #[test]
    fn test_inspect_rejects_non_zip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("junk.gcode.3mf");
        std::fs::write(&path, b"not a zip").unwrap();

        assert!(matches!(
            inspect(&path),
            Err(ImportError::ReadArchive { .. })
        ));
    }

    #[test]
    fn test_read_entry_to_string() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("artifact.gcode.3mf");
        build_archive(&path, &[("Metadata/metadata.xml", b"<config/>".as_ref())]);

        let content = read_entry_to_string(&path, "Metadata/metadata.xml").unwrap();
        assert_eq!(content, "<config/>");

        assert!(matches!(
            read_entry_to_string(&path, "missing.xml"),
            Err(ImportError::EntryNotFound { .. })
        ));
    }

    #[test]
    fn test_extract_entry_to_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("artifact.gcode.3mf");
        build_archive(&path, &[("Metadata/plate_1_thumbnail.png", b"PNGDATA".as_ref())]);

        let dest = temp.path().join("thumb.png");
        extract_entry_to_file(&path, "Metadata/plate_1_thumbnail.png", &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"PNGDATA");
    }
}
