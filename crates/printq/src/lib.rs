pub mod config;
pub mod db;
pub mod error;
pub mod importer;
pub mod printer;
pub mod storage;
pub mod watcher;

pub use config::{load_config, AppConfig, PrinterDefinition};
pub use db::{Database, DatabaseError, JobRecord, PlateDefinition, QueuedJob};
pub use error::{ConfigError, ImportError, PrintqError, Result, StorageError, TransportError, WatcherError};
pub use importer::ArtifactImporter;
pub use printer::{FtpsUploader, MqttTransport, PrinterCoordinator};
pub use watcher::{ImportCandidate, ImportWatcher};
