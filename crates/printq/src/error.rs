use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrintqError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Watcher error: {0}")]
    Watcher(#[from] WatcherError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Missing import path")]
    MissingPath,

    #[error("Failed to open artifact '{path}': {source}")]
    OpenArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read archive '{path}': {source}")]
    ReadArchive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Archive entry '{entry}' not found in '{path}'")]
    EntryNotFound { path: PathBuf, entry: String },

    #[error("Failed to parse metadata XML: {0}")]
    MetadataXml(String),

    #[error("Failed to import {failed} of {total} file(s): {details}")]
    Batch {
        failed: usize,
        total: usize,
        details: String,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing asset: {0}")]
    MissingAsset(PathBuf),

    #[error("File already exists: {0}")]
    FileExists(PathBuf),
}

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Import directory is not configured")]
    MissingImportDirectory,

    #[error("Directory scan failed for '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Watcher thread failed to start: {0}")]
    SpawnFailed(String),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Missing host or access code for printer '{0}'")]
    MissingCredentials(String),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("Failed to open upload source '{path}': {source}")]
    OpenSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("FTPS upload failed: {0}")]
    Ftps(String),

    #[error("MQTT publish failed: {0}")]
    Publish(String),

    #[error("MQTT subscribe failed: {0}")]
    Subscribe(String),
}

pub type Result<T> = std::result::Result<T, PrintqError>;
