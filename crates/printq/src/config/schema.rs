use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One configured printer. `access_code` doubles as the FTPS and MQTT
/// password; `serial` selects the device's report/request topics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrinterDefinition {
    pub name: String,
    pub host: String,
    pub access_code: String,
    pub serial: String,
}

impl PrinterDefinition {
    /// Stable session key: the printer name, falling back to the host when
    /// the name is empty.
    pub fn key(&self) -> &str {
        if self.name.is_empty() {
            &self.host
        } else {
            &self.name
        }
    }
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Directory holding the database file.
    pub data_dir: PathBuf,
    /// Directory holding active job artifacts and thumbnails.
    pub jobs_dir: PathBuf,
    /// Directory holding assets of completed jobs.
    pub completed_dir: PathBuf,
    /// Drop zone scanned by the import watcher.
    pub import_dir: PathBuf,
    pub printers: Vec<PrinterDefinition>,
}

impl AppConfig {
    /// Derives the default directory layout under `base`.
    pub fn with_base_dir<P: AsRef<Path>>(base: P) -> Self {
        let base = base.as_ref();
        Self {
            data_dir: base.to_path_buf(),
            jobs_dir: base.join("jobs"),
            completed_dir: base.join("completed"),
            import_dir: base.join("import"),
            printers: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (label, dir) in [
            ("data_dir", &self.data_dir),
            ("jobs_dir", &self.jobs_dir),
            ("completed_dir", &self.completed_dir),
            ("import_dir", &self.import_dir),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::Validation {
                    message: format!("{} must not be empty", label),
                });
            }
        }
        Ok(())
    }

    /// Creates all configured directories. Failure here is fatal at startup.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        for dir in [
            &self.data_dir,
            &self.jobs_dir,
            &self.completed_dir,
            &self.import_dir,
        ] {
            std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDirectory {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(())
    }
}
